//! Scenario: two typists enter the same polling station through the
//! in-memory gateway; a coordinator resolves what they disagree on.
//!
//! # Invariants under test
//!
//! 1. Two equal entries by different typists become definitive; the first
//!    typist can never take the second entry.
//! 2. One moved vote yields `entries_different` naming both candidates.
//! 3. Keep-first/keep-second require a fresh second entry by someone other
//!    than the typist of the kept entry, unless the policy says otherwise.
//! 4. Discard-both starts the station over.
//! 5. A first entry finalized with accepted errors waits for a coordinator;
//!    resuming hands it back to its typist, who can correct and finalize.

use tally_entry::{SessionPhase, UnsavedDecision};
use tally_gateway::{ClientError, FinaliseOutcome, SessionGateway};
use tally_reconcile::{DataEntryStatus, ResolveDecision, ResolveErrorsDecision, StatusPolicy};
use tally_schemas::{EntryNumber, FieldPath, RuleCode, SectionKey};
use tally_testkit::{election, enter_and_finalize, station, DoubleEntry, Tally};

const STATION: u32 = 7;

fn double_entry(policy: StatusPolicy) -> (DoubleEntry, Tally) {
    let ctx = election(&[2, 1], true);
    let tally = Tally::balanced(&ctx);
    (DoubleEntry::new(ctx, station(STATION), policy), tally)
}

fn reference(err: &ClientError) -> Option<&str> {
    match err {
        ClientError::Gateway(e) => e.reference(),
        ClientError::Session(_) => None,
    }
}

/// First entry by anna (balanced), second by bert with one vote moved.
async fn differing_entries(policy: StatusPolicy) -> (DoubleEntry, Tally, Tally) {
    let (de, tally) = double_entry(policy);
    let moved = tally.clone().with_moved_votes(1, 2, 1);

    let (_, outcome) = de.enter(EntryNumber::First, "anna", &tally).await.unwrap();
    assert_eq!(outcome, FinaliseOutcome::SecondEntryNeeded);
    let (_, outcome) = de.enter(EntryNumber::Second, "bert", &moved).await.unwrap();
    assert_eq!(outcome, FinaliseOutcome::Different);
    (de, tally, moved)
}

#[tokio::test]
async fn equal_entries_become_definitive() {
    let (de, tally) = double_entry(StatusPolicy::default());

    let (first, outcome) = de.enter(EntryNumber::First, "anna", &tally).await.unwrap();
    assert_eq!(outcome, FinaliseOutcome::SecondEntryNeeded);
    assert!(!first.has_accepted_errors());

    let err = de.claim(EntryNumber::Second, "anna").await.unwrap_err();
    assert_eq!(reference(&err), Some("DifferentTypistRequired"));

    let (_, outcome) = de.enter(EntryNumber::Second, "bert", &tally).await.unwrap();
    assert_eq!(outcome, FinaliseOutcome::Definitive);

    match de.status().await.unwrap() {
        DataEntryStatus::Definitive { result } => {
            assert_eq!(result.typist.as_str(), "anna");
            assert_eq!(&result.results, tally.results());
        }
        other => panic!("expected definitive, got {other}"),
    }

    let err = de.claim(EntryNumber::First, "carla").await.unwrap_err();
    assert_eq!(reference(&err), Some("AlreadyFinalized"));
}

#[tokio::test]
async fn moved_vote_is_reported_per_candidate() {
    let (de, _, _) = differing_entries(StatusPolicy::default()).await;

    let DataEntryStatus::EntriesDifferent { record } = de.status().await.unwrap() else {
        panic!("expected entries_different");
    };
    assert_eq!(record.polling_station_id, STATION);
    assert_eq!(
        record.diff.fields(),
        vec![
            &FieldPath::candidate(0, 0),
            &FieldPath::candidate(0, 1),
        ]
    );
    assert!(record.resolution.is_none());
}

#[tokio::test]
async fn keep_first_needs_a_new_typist() {
    let (de, tally, _) = differing_entries(StatusPolicy::default()).await;
    de.gateway
        .resolve_difference(STATION, ResolveDecision::KeepFirst)
        .await
        .unwrap();

    let err = de.claim(EntryNumber::Second, "anna").await.unwrap_err();
    assert_eq!(reference(&err), Some("DifferentTypistRequired"));

    let (_, outcome) = de.enter(EntryNumber::Second, "carla", &tally).await.unwrap();
    assert_eq!(outcome, FinaliseOutcome::Definitive);

    let err = de
        .gateway
        .resolve_difference(STATION, ResolveDecision::KeepFirst)
        .await
        .unwrap_err();
    assert_eq!(err.reference(), Some("InvalidTransition"));
}

#[tokio::test]
async fn keep_second_renumbers_the_kept_entry() {
    let (de, _, moved) = differing_entries(StatusPolicy::default()).await;
    de.gateway
        .resolve_difference(STATION, ResolveDecision::KeepSecond)
        .await
        .unwrap();

    match de.status().await.unwrap() {
        DataEntryStatus::SecondEntryNotStarted { first } => {
            assert_eq!(first.entry_number, EntryNumber::First);
            assert_eq!(first.typist.as_str(), "bert");
        }
        other => panic!("expected second_entry_not_started, got {other}"),
    }

    let err = de.claim(EntryNumber::Second, "bert").await.unwrap_err();
    assert_eq!(reference(&err), Some("DifferentTypistRequired"));

    let (_, outcome) = de.enter(EntryNumber::Second, "anna", &moved).await.unwrap();
    assert_eq!(outcome, FinaliseOutcome::Definitive);
}

#[tokio::test]
async fn keep_is_definitive_when_policy_allows() {
    let policy = StatusPolicy {
        keep_requires_new_second_entry: false,
    };
    let (de, tally, _) = differing_entries(policy).await;
    de.gateway
        .resolve_difference(STATION, ResolveDecision::KeepFirst)
        .await
        .unwrap();

    match de.status().await.unwrap() {
        DataEntryStatus::Definitive { result } => assert_eq!(&result.results, tally.results()),
        other => panic!("expected definitive, got {other}"),
    }
}

#[tokio::test]
async fn discard_both_starts_over() {
    let (de, _, _) = differing_entries(StatusPolicy::default()).await;
    de.gateway
        .resolve_difference(STATION, ResolveDecision::DiscardBoth)
        .await
        .unwrap();
    assert_eq!(de.status().await.unwrap(), DataEntryStatus::FirstEntryNotStarted);

    let client = de.claim(EntryNumber::First, "bert").await.unwrap();
    assert_eq!(*client.session().phase(), SessionPhase::Empty);
}

#[tokio::test]
async fn accepted_errors_wait_for_a_coordinator() {
    let (de, tally) = double_entry(StatusPolicy::default());
    let off_by_one = tally.clone().with_admitted_total(101);

    let (first, outcome) = de.enter(EntryNumber::First, "anna", &off_by_one).await.unwrap();
    assert_eq!(outcome, FinaliseOutcome::ErrorsPending);
    assert!(first.validation.codes().contains(&RuleCode::F201));

    let err = de.claim(EntryNumber::Second, "bert").await.unwrap_err();
    assert_eq!(reference(&err), Some("InvalidTransition"));

    de.gateway
        .resolve_errors(STATION, ResolveErrorsDecision::ResumeFirst)
        .await
        .unwrap();

    // Only anna may pick it up again, with the snapshot as finalized.
    let err = de.claim(EntryNumber::First, "bert").await.unwrap_err();
    assert_eq!(reference(&err), Some("AlreadyClaimed"));
    let mut client = de.claim(EntryNumber::First, "anna").await.unwrap();
    assert_eq!(
        *client.session().phase(),
        SessionPhase::AwaitingFinalConfirmation
    );
    assert_eq!(client.session().results(), off_by_one.results());

    client.navigate_to(SectionKey::VotersAndVotes).unwrap();
    let (fixed, outcome) = enter_and_finalize(&mut client, &tally).await.unwrap();
    assert_eq!(outcome, FinaliseOutcome::SecondEntryNeeded);
    assert!(!fixed.has_accepted_errors());
}

#[tokio::test]
async fn discard_first_drops_the_entry_with_errors() {
    let (de, tally) = double_entry(StatusPolicy::default());
    let off_by_one = tally.clone().with_admitted_total(101);
    de.enter(EntryNumber::First, "anna", &off_by_one).await.unwrap();

    de.gateway
        .resolve_errors(STATION, ResolveErrorsDecision::DiscardFirst)
        .await
        .unwrap();
    assert_eq!(de.status().await.unwrap(), DataEntryStatus::FirstEntryNotStarted);

    let (_, outcome) = de.enter(EntryNumber::First, "bert", &tally).await.unwrap();
    assert_eq!(outcome, FinaliseOutcome::SecondEntryNeeded);
}

#[tokio::test]
async fn unsaved_edit_survives_a_cancelled_navigation() {
    let (de, tally) = double_entry(StatusPolicy::default());
    let mut client = de.claim(EntryNumber::First, "anna").await.unwrap();

    let first = client.session().current_section();
    assert_eq!(first, SectionKey::ExtraInvestigation);
    client.submit_section(tally.values(first)).await.unwrap();
    let second = client.session().current_section();
    client.edit(tally.values(second)).unwrap();

    client.navigate_to(first).unwrap();
    client
        .resolve_unsaved(UnsavedDecision::Cancel)
        .await
        .unwrap();
    assert_eq!(client.session().current_section(), second);
    assert!(client.session().has_draft_changes());
}
