use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::domain::Hit;
use super::indices::IndexTarget;
use super::query::SearchRequest;

/// Ranked hits plus the total the service reported before paging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub total_hits: u64,
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("search service unavailable: {0}")]
    Unavailable(String),
    #[error("search request timed out")]
    Timeout,
    #[error("unexpected search response: {0}")]
    Decode(String),
}

impl SearchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }
}

/// Executes compiled requests against the listing indices.
#[async_trait]
pub trait SearchGateway: Send + Sync {
    async fn execute(
        &self,
        indices: &IndexTarget,
        request: &SearchRequest,
    ) -> Result<SearchResult, SearchError>;
}

/// Search cluster reached over its HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSearchGateway {
    client: Client,
    base_url: String,
}

impl HttpSearchGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, indices: &IndexTarget) -> String {
        format!("{}/{}", self.base_url, indices.search_path())
    }
}

#[async_trait]
impl SearchGateway for HttpSearchGateway {
    async fn execute(
        &self,
        indices: &IndexTarget,
        request: &SearchRequest,
    ) -> Result<SearchResult, SearchError> {
        let url = self.url(indices);
        debug!(%url, "executing digest search");

        let response = self
            .client
            .request(Method::GET, &url)
            .json(&request.to_json())
            .send()
            .await
            .map_err(|err| SearchError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Unavailable(format!("{status}: {body}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|err| SearchError::Decode(err.to_string()))?;
        Ok(body.into_result())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    total: TotalHits,
    #[serde(default)]
    hits: Vec<RawHit>,
}

/// Older clusters report a bare integer, newer ones `{ "value": n, "relation": .. }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Detailed { value: u64 },
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(default)]
    fields: HashMap<String, Vec<Value>>,
}

impl SearchResponse {
    fn into_result(self) -> SearchResult {
        let total_hits = match self.hits.total {
            TotalHits::Count(count) | TotalHits::Detailed { value: count } => count,
        };
        SearchResult {
            total_hits,
            hits: self.hits.hits.into_iter().map(RawHit::into_hit).collect(),
        }
    }
}

impl RawHit {
    fn into_hit(mut self) -> Hit {
        Hit {
            title: self.text("title"),
            profession: self.text("profession"),
            location: self
                .fields
                .remove("location")
                .unwrap_or_default()
                .iter()
                .filter_map(scalar_text)
                .collect(),
            offeror_name: self.text("offerorName"),
            rating: self.first("rating").and_then(|value| value.as_f64()),
            days: self.first("days").and_then(|value| value.as_i64()),
            pricing_type: self.text("pricing_type"),
            short_id: self.text("shortId"),
            id: self.id,
        }
    }

    fn first(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).and_then(|values| values.first())
    }

    fn text(&self, field: &str) -> Option<String> {
        self.first(field).and_then(scalar_text)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_integer_total_and_stored_fields() {
        let body: SearchResponse = serde_json::from_value(json!({
            "hits": {
                "total": 2,
                "hits": [
                    {
                        "_id": "abc",
                        "fields": {
                            "title": ["Welder"],
                            "location": ["Riga", "Jelgava"],
                            "offerorName": ["Acme"],
                            "rating": [4.5],
                            "days": [30],
                            "pricing_type": [1],
                            "shortId": ["x7"]
                        }
                    },
                    { "_id": "def" }
                ]
            }
        }))
        .expect("response decodes");

        let result = body.into_result();
        assert_eq!(result.total_hits, 2);
        assert_eq!(result.hits.len(), 2);

        let first = &result.hits[0];
        assert_eq!(first.id, "abc");
        assert_eq!(first.title.as_deref(), Some("Welder"));
        assert_eq!(first.location, vec!["Riga", "Jelgava"]);
        assert_eq!(first.rating, Some(4.5));
        assert_eq!(first.days, Some(30));
        assert_eq!(first.pricing_type.as_deref(), Some("1"));
        assert!(result.hits[1].title.is_none());
    }

    #[test]
    fn reads_object_total() {
        let body: SearchResponse = serde_json::from_value(json!({
            "hits": { "total": { "value": 0, "relation": "eq" }, "hits": [] }
        }))
        .expect("response decodes");
        assert_eq!(body.into_result(), SearchResult::default());
    }

    #[test]
    fn only_transport_failures_are_retryable() {
        assert!(SearchError::Timeout.is_retryable());
        assert!(SearchError::Unavailable("503".to_string()).is_retryable());
        assert!(!SearchError::Decode("bad".to_string()).is_retryable());
    }
}
