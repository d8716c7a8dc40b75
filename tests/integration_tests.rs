//! Integration tests for Paper Search
//!
//! These tests drive the full HTTP surface: router, query parsing, plan
//! compilation, store execution and projection.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, FixedOffset};
use http_body_util::BodyExt;
use paper_search::api;
use paper_search::config::AuthConfig;
use paper_search::models::{Classification, Document, DocumentBuilder, Person, QueryLimits};
use paper_search::plan::FilterCapabilities;
use paper_search::search::{Projector, SearchService};
use paper_search::store::{DocumentStore, MemoryStore, MockStore, StoreError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const NONEXCLUSIVE: &str = "http://arxiv.org/licenses/nonexclusive-distrib/1.0/";
const CC_BY: &str = "http://creativecommons.org/licenses/by/4.0/";

fn date(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

fn corpus() -> Vec<Document> {
    let mut docs: Vec<Document> = (1..=6)
        .map(|i| {
            DocumentBuilder::new(
                format!("1901.0000{}", i),
                1,
                format!("Galaxy survey part {}", i),
                date(&format!("2019-01-{:02}T10:00:00-05:00", i)),
            )
            .author(Person::new("Vera Rubin"))
            .primary(Classification::new("grp_physics", "astro-ph", "astro-ph.GA"))
            .license(NONEXCLUSIVE)
            .format("pdf")
            .build()
        })
        .collect();

    docs.push(
        DocumentBuilder::new("1811.00536", 1, "Muon anomalous magnetic moment", date("2018-11-01T12:00:00-04:00"))
            .abstract_text("A measurement of the muon g-2.")
            .author(Person::new("Jane Doe"))
            .primary(Classification::new("grp_physics", "hep-ex", "hep-ex"))
            .license(CC_BY)
            .announced(2018, 11)
            .build(),
    );

    docs.push(
        DocumentBuilder::new("hep-th/9901001", 1, "String dualities", date("1999-01-04T12:00:00-05:00"))
            .primary(Classification::new("grp_physics", "hep-th", "hep-th"))
            .current(false)
            .build(),
    );
    docs.push(
        DocumentBuilder::new("hep-th/9901001", 2, "String dualities revisited", date("1999-03-04T12:00:00-05:00"))
            .submitted_date_first(date("1999-01-04T12:00:00-05:00"))
            .primary(Classification::new("grp_physics", "hep-th", "hep-th"))
            .build(),
    );

    // Same submission instant; ties break on paper_id_v
    for id in ["1902.00001", "1902.00002"] {
        docs.push(
            DocumentBuilder::new(id, 1, "Graph neural networks", date("2019-02-01T09:00:00Z"))
                .primary(Classification::new("grp_cs", "cs", "cs.LG"))
                .build(),
        );
    }

    docs
}

fn service_with(store: Arc<dyn DocumentStore>) -> Arc<SearchService> {
    Arc::new(SearchService::new(
        store,
        Projector::new("https://arxiv.org/abs", "http://localhost:8080"),
        QueryLimits::default(),
        Duration::from_millis(200),
    ))
}

fn app() -> Router {
    let store = Arc::new(MemoryStore::new(corpus()).unwrap());
    api::router(service_with(store), AuthConfig::default())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn results(body: &Value) -> &Vec<Value> {
    body["results"].as_array().unwrap()
}

#[tokio::test]
async fn test_license_scenario() {
    let uri = format!("/?size=5&license={}&include=license", NONEXCLUSIVE);
    let (status, body) = get(app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["size"], 5);
    assert_eq!(body["metadata"]["start"], 0);
    assert_eq!(body["metadata"]["total"], 6);
    assert_eq!(results(&body).len(), 5);
    for result in results(&body) {
        assert_eq!(result["license"]["uri"], NONEXCLUSIVE);
        assert!(result.get("title").is_none());
    }
}

#[tokio::test]
async fn test_get_versioned_paper() {
    let (status, body) = get(app(), "/1811.00536v1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paper_id_v"], "1811.00536v1");
    assert_eq!(body["version"], 1);
    assert_eq!(body["is_current"], true);
    assert_eq!(body["canonical"], "https://arxiv.org/abs/1811.00536v1");
    assert_eq!(body["href"], "http://localhost:8080/1811.00536v1");
    assert_eq!(body["abstract"], "A measurement of the muon g-2.");
}

#[tokio::test]
async fn test_get_unversioned_paper_matches_versioned() {
    let (_, versioned) = get(app(), "/1811.00536v1").await;
    let (status, unversioned) = get(app(), "/1811.00536").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(unversioned, versioned);
}

#[tokio::test]
async fn test_get_old_style_identifier() {
    let (status, body) = get(app(), "/hep-th/9901001").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 2);

    let (status, body) = get(app(), "/hep-th/9901001v1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_current"], false);
    assert_eq!(body["latest"]["version"], 2);
}

#[tokio::test]
async fn test_get_missing_and_malformed() {
    let (status, body) = get(app(), "/1811.00536v3").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);

    let (status, body) = get(app(), "/not-a-paper").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_inverted_date_range() {
    let (status, body) = get(app(), "/?start_date=1998-04-09&end_date=1998-04-03").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert!(body["message"].as_str().unwrap().contains("1998-04-09"));
}

#[tokio::test]
async fn test_unknown_parameter_rejected() {
    let (status, body) = get(app(), "/?titel=muon").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("titel"));
}

#[tokio::test]
async fn test_window_bounds() {
    let total = corpus().len();
    for (start, size) in [(0, 1), (0, 50), (3, 4), (9, 5), (10, 3), (25, 10)] {
        let (status, body) = get(app(), &format!("/?start={}&size={}", start, size)).await;
        assert_eq!(status, StatusCode::OK);

        let len = results(&body).len();
        assert_eq!(body["metadata"]["total"], total);
        assert!(len <= size);
        if start >= total {
            assert_eq!(len, 0);
        } else {
            assert!(start + len <= total);
            assert_eq!(len, size.min(total - start));
        }
    }
}

#[tokio::test]
async fn test_window_beyond_max_results_rejected() {
    let (status, body) = get(app(), "/?start=9990&size=50").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("10000"));
}

#[tokio::test]
async fn test_ordering() {
    let (_, body) = get(app(), "/?include=submitted_date").await;

    let rows: Vec<(DateTime<FixedOffset>, String)> = results(&body)
        .iter()
        .map(|r| {
            (
                date(r["submitted_date"].as_str().unwrap()),
                r["paper_id_v"].as_str().unwrap().to_string(),
            )
        })
        .collect();

    for pair in rows.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.0 > b.0 || (a.0 == b.0 && a.1 > b.1), "{:?} before {:?}", a, b);
    }
    assert_eq!(rows[0].1, "1902.00002v1");
    assert_eq!(rows[1].1, "1902.00001v1");
}

#[tokio::test]
async fn test_ascending_order() {
    let (status, body) = get(app(), "/?order=submitted_date&include=submitted_date").await;
    assert_eq!(status, StatusCode::OK);

    let ids: Vec<&str> = results(&body).iter().map(|r| r["paper_id_v"].as_str().unwrap()).collect();
    assert_eq!(ids[0], "hep-th/9901001v1");
    assert_eq!(&ids[ids.len() - 2..], ["1902.00001v1", "1902.00002v1"]);
    assert_eq!(
        body["metadata"]["query"],
        serde_json::json!([
            { "parameter": "order", "value": "submitted_date" },
            { "parameter": "include", "value": "submitted_date" }
        ])
    );

    let (status, body) = get(app(), "/?order=relevance").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("order"));
}

#[tokio::test]
async fn test_separator_only_values_rejected() {
    for uri in ["/?primary_classification=,", "/?include=,", "/?secondary_classification%5B%5D=%2C+%2C"] {
        let (status, body) = get(app(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["code"], 400);
    }
}

#[tokio::test]
async fn test_latest_included_with_one_batch_lookup() {
    let store = Arc::new(MockStore::new(corpus()).unwrap());
    let app = api::router(service_with(store.clone()), AuthConfig::default());

    let (status, body) = get(app, "/?size=20&include=latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results(&body).len(), corpus().len());
    assert_eq!(store.calls(), 2);

    let old = results(&body)
        .iter()
        .find(|r| r["paper_id_v"] == "hep-th/9901001v1")
        .unwrap();
    assert_eq!(old["latest"]["paper_id_v"], "hep-th/9901001v2");
}

#[tokio::test]
async fn test_idempotence() {
    let uri = "/?all=galaxy&primary_classification=astro-ph&include=title,license&size=3";
    let request = || Request::builder().uri(uri).body(Body::empty()).unwrap();

    let (_, first) = send(app(), request()).await;
    let (_, second) = send(app(), request()).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_classification_arrays_and_echo() {
    let (status, body) = get(
        app(),
        "/?primary_classification%5B%5D=cs&primary_classification%5B%5D=hep-ex&include%5B%5D=title",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["total"], 3);
    assert_eq!(
        body["metadata"]["query"],
        serde_json::json!([
            { "parameter": "primary_classification", "value": "cs" },
            { "parameter": "primary_classification", "value": "hep-ex" },
            { "parameter": "include", "value": "title" }
        ])
    );
}

#[tokio::test]
async fn test_text_search_and_wildcards() {
    let (_, body) = get(app(), "/?title=%22magnetic+moment%22").await;
    assert_eq!(body["metadata"]["total"], 1);

    let (_, body) = get(app(), "/?title=dualit*").await;
    assert_eq!(body["metadata"]["total"], 2);

    let (_, body) = get(app(), "/?author=rubin&title=survey").await;
    assert_eq!(body["metadata"]["total"], 6);
}

#[tokio::test]
async fn test_announced_date_range() {
    let (_, body) = get(
        app(),
        "/?start_date=2018-11-15&end_date=2018-11-30&date_type=announced_date_first",
    )
    .await;
    assert_eq!(body["metadata"]["total"], 1);
    assert_eq!(results(&body)[0]["paper_id"], "1811.00536");
}

#[tokio::test]
async fn test_bearer_token_required() {
    let store = Arc::new(MemoryStore::new(corpus()).unwrap());
    let app = api::router(
        service_with(store),
        AuthConfig {
            require_bearer_token: true,
        },
    );

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

    let request = Request::builder()
        .uri("/1811.00536")
        .header(header::AUTHORIZATION, "Bearer abc123")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(app, "/status").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_store_timeout_maps_to_504() {
    let store = Arc::new(MockStore::new(corpus()).unwrap());
    store.set_delay(Duration::from_secs(5));
    let app = api::router(service_with(store), AuthConfig::default());

    let (status, body) = get(app, "/?title=muon").await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], 504);
}

#[tokio::test]
async fn test_store_failure_maps_to_502() {
    let store = Arc::new(MockStore::new(corpus()).unwrap());
    store.set_failure(StoreError::Unavailable("connection refused".into()));
    let app = api::router(service_with(store), AuthConfig::default());

    let (status, body) = get(app.clone(), "/1811.00536").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body["message"].as_str().unwrap().contains("connection refused"));

    let (status, body) = get(app, "/status").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], 503);
}

#[tokio::test]
async fn test_unsupported_filter_maps_to_400() {
    let store = Arc::new(
        MockStore::new(corpus())
            .unwrap()
            .with_capabilities(FilterCapabilities::all() - FilterCapabilities::ORCID),
    );
    let app = api::router(service_with(store), AuthConfig::default());

    let (status, body) = get(app, "/?orcid=0000-0002-*").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("orcid"));
}

#[tokio::test]
async fn test_status_ok() {
    let (status, body) = get(app(), "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}
