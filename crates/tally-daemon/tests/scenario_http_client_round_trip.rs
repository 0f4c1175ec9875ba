//! Scenario: the REST gateway talks to a live daemon.
//!
//! # Invariants under test
//!
//! 1. Errors rendered by the daemon come back as the same `GatewayError`
//!    variant with the same reference.
//! 2. A suspended entry is returned on re-claim over HTTP.
//! 3. Status changes reach the daemon's event bus.

use std::sync::Arc;

use tally_daemon::{routes, state};
use tally_gateway::{GatewayError, HttpSessionGateway, SessionGateway};
use tally_reconcile::DataEntryStatus;
use tally_schemas::{
    EntryNumber, PollingStationResults, ProgressMarker, SectionKey, SessionSnapshot, TypistId,
};

const CONFIG: &str = r#"
election:
  election_id: 1
  political_groups:
    - number: 1
      name: "Lijst A"
      candidates:
        - { number: 1, name: "Jansen" }
polling_stations:
  - { id: 1, election_id: 1, number: 33, name: "Op Rolletjes" }
"#;

async fn spawn_daemon() -> (String, Arc<state::AppState>) {
    let loaded = tally_config::load_layered_yaml_from_strings(&[CONFIG]).unwrap();
    let cfg = loaded.typed().unwrap();
    let st = Arc::new(state::AppState::from_config(&cfg, loaded.config_hash));
    state::spawn_status_forwarder(Arc::clone(&st));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::build_router(Arc::clone(&st));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), st)
}

#[tokio::test]
async fn conflicts_survive_the_wire() {
    let (base_url, _st) = spawn_daemon().await;
    let gw = HttpSessionGateway::new_with_base_url(base_url);

    gw.claim(1, EntryNumber::First, &TypistId::new("anna"))
        .await
        .unwrap();
    let err = gw
        .claim(1, EntryNumber::First, &TypistId::new("bert"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Conflict(_)));
    assert_eq!(err.reference(), Some("AlreadyClaimed"));

    let err = gw.status(42).await.unwrap_err();
    assert!(matches!(err, GatewayError::Rejected(_)));
    assert_eq!(err.reference(), Some("EntryNotFound"));
}

#[tokio::test]
async fn suspended_snapshot_comes_back_on_reclaim() {
    let (base_url, st) = spawn_daemon().await;
    let gw = HttpSessionGateway::new_with_base_url(base_url);
    let anna = TypistId::new("anna");

    let mut results = PollingStationResults::empty(&st.gateway.ctx());
    results.voters_counts.poll_card_count = 12;
    let snapshot = SessionSnapshot {
        results,
        progress: ProgressMarker {
            current_section: SectionKey::ExtraInvestigation,
            validation: Default::default(),
            accepted: Default::default(),
        },
    };

    gw.claim(1, EntryNumber::First, &anna).await.unwrap();
    gw.save(1, EntryNumber::First, &anna, &snapshot).await.unwrap();
    gw.release(1, EntryNumber::First, &anna).await.unwrap();

    let resp = gw.claim(1, EntryNumber::First, &anna).await.unwrap();
    assert_eq!(resp.snapshot, Some(snapshot));

    let status = gw.status(1).await.unwrap();
    assert!(matches!(
        status.status,
        DataEntryStatus::FirstEntryInProgress { .. }
    ));
}

#[tokio::test]
async fn status_changes_reach_the_bus() {
    let (base_url, st) = spawn_daemon().await;
    let mut rx = st.bus.subscribe();
    let gw = HttpSessionGateway::new_with_base_url(base_url);

    gw.claim(1, EntryNumber::First, &TypistId::new("anna"))
        .await
        .unwrap();

    let msg = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
        .await
        .expect("no bus message")
        .unwrap();
    match msg {
        state::BusMsg::StatusChange(change) => {
            assert_eq!(change.polling_station_id, 1);
            assert_eq!(change.status, "first_entry_in_progress");
        }
        other => panic!("unexpected bus message: {other:?}"),
    }
}
