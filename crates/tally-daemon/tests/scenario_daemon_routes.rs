//! In-process scenario tests for tally-daemon HTTP endpoints.
//!
//! These tests drive the Axum router via `tower::ServiceExt::oneshot`
//! without binding a TCP socket.
//!
//! # Invariants under test
//!
//! 1. Health reports the service and the seeded config hash.
//! 2. A second claim on a claimed entry is 409 with reference `AlreadyClaimed`.
//! 3. Unknown polling stations and entry numbers are 404 `EntryNotFound`.
//! 4. Save answers with the validation of every submitted section.
//! 5. Resolve on a station without differences is 409.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tally_daemon::{routes, state};
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const CONFIG: &str = r#"
election:
  election_id: 1
  layout:
    extra_investigation: false
    counting_differences: false
  political_groups:
    - number: 1
      name: "Lijst A"
      candidates:
        - { number: 1, name: "Jansen" }
        - { number: 2, name: "De Vries" }
polling_stations:
  - { id: 1, election_id: 1, number: 33, name: "Op Rolletjes" }
  - { id: 2, election_id: 1, number: 34, name: "Testschool" }
"#;

fn make_router() -> axum::Router {
    let loaded = tally_config::load_layered_yaml_from_strings(&[CONFIG]).unwrap();
    let cfg = loaded.typed().unwrap();
    let st = Arc::new(state::AppState::from_config(&cfg, loaded.config_hash));
    routes::build_router(st)
}

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn parse_json(b: bytes::Bytes) -> Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_with_config_hash() {
    let (status, body) = call(make_router(), get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "tally-daemon");
    assert_eq!(json["config_hash"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn polling_stations_are_listed_with_status() {
    let (status, body) = call(make_router(), get("/v1/polling_stations")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    let rows = json["polling_stations"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["id"], 1);
    assert_eq!(rows[0]["status"], "first_entry_not_started");
}

#[tokio::test]
async fn second_claim_is_409_already_claimed() {
    let router = make_router();
    let uri = "/v1/polling_stations/1/data_entries/1/claim";

    let (status, body) = call(router.clone(), post(uri, json!({"typist": "anna"}))).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["entry_number"], 1);
    assert!(json["snapshot"].is_null());

    let (status, body) = call(router.clone(), post(uri, json!({"typist": "bert"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let json = parse_json(body);
    assert_eq!(json["reference"], "AlreadyClaimed");
    assert_eq!(json["fatal"], false);

    let (status, body) = call(router, get("/v1/polling_stations/1/data_entries")).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["status"], "first_entry_in_progress");
    assert_eq!(json["first"]["typist"], "anna");
}

#[tokio::test]
async fn unknown_station_and_entry_are_404() {
    let router = make_router();

    let (status, body) = call(
        router.clone(),
        post(
            "/v1/polling_stations/99/data_entries/1/claim",
            json!({"typist": "anna"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse_json(body)["reference"], "EntryNotFound");

    let (status, body) = call(
        router,
        post(
            "/v1/polling_stations/1/data_entries/3/claim",
            json!({"typist": "anna"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(parse_json(body)["reference"], "EntryNotFound");
}

#[tokio::test]
async fn save_returns_validation_of_submitted_sections() {
    let router = make_router();
    call(
        router.clone(),
        post(
            "/v1/polling_stations/1/data_entries/1/claim",
            json!({"typist": "anna"}),
        ),
    )
    .await;

    let results = json!({
        "voters_counts": {
            "poll_card_count": 90,
            "proxy_certificate_count": 10,
            "voter_card_count": 0,
            "total_admitted_voters_count": 101
        },
        "votes_counts": {
            "votes_candidates_count": 100,
            "blank_votes_count": 0,
            "invalid_votes_count": 0,
            "total_votes_cast_count": 100
        },
        "differences_counts": {
            "more_ballots_count": 0,
            "fewer_ballots_count": 0,
            "unreturned_ballots_count": 0,
            "too_few_ballots_handed_out_count": 0,
            "too_many_ballots_handed_out_count": 0,
            "other_explanation_count": 0,
            "no_explanation_count": 0
        },
        "political_group_votes": [
            {"number": 1, "total": 0, "candidate_votes": [
                {"number": 1, "votes": 0}, {"number": 2, "votes": 0}
            ]}
        ]
    });
    let body = json!({
        "typist": "anna",
        "snapshot": {
            "results": results,
            "progress": {
                "current_section": "voters_votes_counts",
                "validation": { "voters_votes_counts": { "errors": [], "warnings": [] } }
            }
        }
    });

    let (status, body) = call(
        router,
        post("/v1/polling_stations/1/data_entries/1", body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    let errors = json["validation_results"]["voters_votes_counts"]["errors"]
        .as_array()
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], "F201");
}

#[tokio::test]
async fn resolve_without_differences_is_409() {
    let (status, body) = call(
        make_router(),
        post(
            "/v1/polling_stations/1/data_entries/resolve_differences",
            json!({"decision": "keep_first"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(parse_json(body)["reference"], "InvalidTransition");
}
