use agent_digest::workflows::agents::{
    compile, select_indices, DigestType, EmailAddress, HttpSearchGateway, SearchError,
    SearchGateway, SearchRequest, Subscriber,
};
use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> SearchRequest {
    let subscriber = Subscriber {
        id: 9,
        digest_type: DigestType::Vacancies,
        email: EmailAddress {
            address: "reader@example.com".to_string(),
            confirmed: true,
        },
        languages: vec!["en".to_string(), "ru".to_string()],
        locations: Vec::new(),
        professions: Vec::new(),
        keywords: String::new(),
    };
    let now = Utc
        .with_ymd_and_hms(2026, 10, 19, 6, 0, 0)
        .single()
        .expect("valid instant");
    compile(&subscriber, 1, now)
}

#[tokio::test]
async fn posts_compiled_query_to_language_indices() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/offers-en,offers-ru/_search"))
        .and(body_partial_json(json!({ "from": 0, "size": 60 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": {
                "total": { "value": 134, "relation": "eq" },
                "hits": [
                    { "_id": "a1", "fields": { "title": ["Welder"], "location": ["Riga"] } },
                    { "_id": "b2", "fields": { "title": ["Cook"], "rating": [3.5] } }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpSearchGateway::new(server.uri());
    let indices = select_indices("offers", &["en", "ru"]);
    let result = gateway
        .execute(&indices, &request())
        .await
        .expect("search succeeds");

    assert_eq!(result.total_hits, 134);
    assert_eq!(result.hits.len(), 2);
    assert_eq!(result.hits[0].id, "a1");
    assert_eq!(result.hits[0].location, vec!["Riga"]);
    assert_eq!(result.hits[1].rating, Some(3.5));
}

#[tokio::test]
async fn server_error_is_retryable_unavailability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/offers-*/_search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("cluster_block_exception"))
        .mount(&server)
        .await;

    let gateway = HttpSearchGateway::new(format!("{}/", server.uri()));
    let indices = select_indices::<&str>("offers", &[]);
    let err = gateway
        .execute(&indices, &request())
        .await
        .expect_err("503 is an error");

    assert!(matches!(
        err,
        SearchError::Unavailable(ref reason) if reason.contains("cluster_block")
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let gateway = HttpSearchGateway::new(server.uri());
    let err = gateway
        .execute(&select_indices("offers", &["de"]), &request())
        .await
        .expect_err("body is not a search response");

    assert!(matches!(err, SearchError::Decode(_)));
    assert!(!err.is_retryable());
}
