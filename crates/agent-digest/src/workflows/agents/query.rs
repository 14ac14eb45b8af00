//! Compiles a subscriber's saved criteria into a search request.
//!
//! Criteria groups (locations, professions) are added to a shared `should` list and
//! counted in `minimum_should_match`, so every group present must match while the
//! clauses inside a group are alternatives.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde_json::{json, Map, Value};

use super::domain::{Subscriber, DIGEST_PAGE_SIZE};

/// Fields returned for every hit.
pub const STORED_FIELDS: [&str; 8] = [
    "title",
    "profession",
    "location",
    "offerorName",
    "rating",
    "days",
    "pricing_type",
    "shortId",
];

/// Fields searched by the free-text keyword clause.
pub const KEYWORD_FIELDS: [&str; 5] = ["location", "profession", "title", "content", "offerorName"];

const SORT_FIELDS: [&str; 3] = ["rating", "days", "createdAt"];

/// Query DSL node.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term {
        field: &'static str,
        value: Value,
    },
    Terms {
        field: &'static str,
        values: Vec<Value>,
    },
    Exists {
        field: &'static str,
    },
    RangeGte {
        field: &'static str,
        value: String,
    },
    Match {
        field: &'static str,
        value: Value,
    },
    CrossFields {
        query: String,
        fields: Vec<&'static str>,
    },
    Nested {
        path: &'static str,
        query: Box<Query>,
    },
    Bool(BoolQuery),
}

impl Query {
    pub fn term(field: &'static str, value: impl Into<Value>) -> Self {
        Self::Term {
            field,
            value: value.into(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Query::Term { field, value } => json!({ "term": { *field: value } }),
            Query::Terms { field, values } => json!({ "terms": { *field: values } }),
            Query::Exists { field } => json!({ "exists": { "field": field } }),
            Query::RangeGte { field, value } => json!({ "range": { *field: { "gte": value } } }),
            Query::Match { field, value } => json!({ "match": { *field: value } }),
            Query::CrossFields { query, fields } => json!({
                "multi_match": {
                    "query": query,
                    "type": "cross_fields",
                    "fields": fields,
                    "operator": "and",
                }
            }),
            Query::Nested { path, query } => json!({
                "nested": { "path": path, "query": query.to_json() }
            }),
            Query::Bool(inner) => inner.to_json(),
        }
    }
}

/// Boolean combination of clauses. Built by value; never shared between subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub filter: Vec<Query>,
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
    pub minimum_should_match: Option<u32>,
}

impl BoolQuery {
    pub fn filter(mut self, clause: Query) -> Self {
        self.filter.push(clause);
        self
    }

    pub fn must(mut self, clause: Query) -> Self {
        self.must.push(clause);
        self
    }

    pub fn should(mut self, clauses: impl IntoIterator<Item = Query>) -> Self {
        self.should.extend(clauses);
        self
    }

    pub fn must_not(mut self, clause: Query) -> Self {
        self.must_not.push(clause);
        self
    }

    pub fn minimum_should_match(mut self, count: u32) -> Self {
        self.minimum_should_match = Some(count);
        self
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        for (key, clauses) in [
            ("filter", &self.filter),
            ("must", &self.must),
            ("should", &self.should),
            ("must_not", &self.must_not),
        ] {
            if !clauses.is_empty() {
                body.insert(
                    key.to_string(),
                    Value::Array(clauses.iter().map(Query::to_json).collect()),
                );
            }
        }
        if let Some(count) = self.minimum_should_match {
            body.insert("minimum_should_match".to_string(), json!(count));
        }
        json!({ "bool": body })
    }
}

/// Complete request body for one subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    query: BoolQuery,
    from: usize,
    size: usize,
}

impl SearchRequest {
    pub fn query(&self) -> &BoolQuery {
        &self.query
    }

    pub fn minimum_should_match(&self) -> u32 {
        self.query.minimum_should_match.unwrap_or(0)
    }

    pub fn from(&self) -> usize {
        self.from
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn to_json(&self) -> Value {
        let sort: Vec<Value> = SORT_FIELDS
            .iter()
            .map(|field| json!({ *field: { "order": "desc" } }))
            .collect();

        json!({
            "query": self.query.to_json(),
            "stored_fields": STORED_FIELDS,
            "sort": sort,
            "from": self.from,
            "size": self.size,
        })
    }
}

/// Lower bound for `createdAt`: one day back from `now`, rounded down to midnight UTC.
pub fn published_since(now: DateTime<Utc>) -> DateTime<Utc> {
    (now - Duration::days(1))
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc()
}

pub fn compile(subscriber: &Subscriber, domain_id: i64, now: DateTime<Utc>) -> SearchRequest {
    let since = published_since(now).format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let types = subscriber
        .digest_type
        .listing_types()
        .iter()
        .map(|code| json!(code))
        .collect();

    let mut query = BoolQuery::default()
        .filter(Query::term("domainId", domain_id))
        .filter(Query::Exists {
            field: "profession",
        })
        .filter(Query::term("isPublished", true))
        .filter(Query::RangeGte {
            field: "createdAt",
            value: since,
        })
        .filter(Query::Terms {
            field: "type",
            values: types,
        });

    let mut groups = 0;

    if let Some(clause) = location_group(subscriber) {
        query = query.should([clause]);
        groups += 1;
    }

    if !subscriber.professions.is_empty() {
        query = query.should(subscriber.professions.iter().map(|profession| {
            Query::term("professionId", profession.id.to_string())
        }));
        groups += 1;
    }

    if let Some(keywords) = subscriber.keywords() {
        query = query.must(Query::CrossFields {
            query: keywords.to_string(),
            fields: KEYWORD_FIELDS.to_vec(),
        });
    }

    SearchRequest {
        query: query.minimum_should_match(groups),
        from: 0,
        size: DIGEST_PAGE_SIZE,
    }
}

/// Nested match on any regional location, or "no location at all" when the
/// subscriber only picked the worldwide entry.
fn location_group(subscriber: &Subscriber) -> Option<Query> {
    if subscriber.locations.is_empty() {
        return None;
    }

    let alternatives: Vec<Query> = subscriber
        .regional_locations()
        .map(|location| Query::Match {
            field: "locations.id",
            value: json!(location.id),
        })
        .collect();

    if alternatives.is_empty() {
        let unlocated = BoolQuery::default().must_not(Query::Exists { field: "location" });
        return Some(Query::Bool(unlocated));
    }

    Some(Query::Nested {
        path: "locations",
        query: Box::new(Query::Bool(
            BoolQuery::default()
                .should(alternatives)
                .minimum_should_match(1),
        )),
    })
}
