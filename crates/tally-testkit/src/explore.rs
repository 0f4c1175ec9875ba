//! Breadth-first traversal of an [`EntrySession`]'s reachable states.
//!
//! Every state is offered the full action alphabet, legal or not, so a test
//! can assert both what the session does and what it refuses. States are
//! identified by phase, working snapshot and the values the typist sees;
//! refused actions are recorded but never expanded.

use std::collections::{HashSet, VecDeque};

use tally_entry::{AbortDecision, EntrySession, SessionError, SessionPhase, UnsavedDecision};
use tally_schemas::{FinalResult, SectionKey};

use crate::Tally;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Edit the current section with the values of `tallies[variant]`.
    Edit { variant: usize },
    /// Submit the current section with the values of `tallies[variant]`.
    Submit { variant: usize },
    Accept,
    Navigate(SectionKey),
    ResolveUnsaved(UnsavedDecision),
    Abort,
    ResolveAbort(AbortDecision),
    Finalize,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub from: SessionPhase,
    pub action: Action,
    pub to: SessionPhase,
    pub error: Option<SessionError>,
    /// The state key did not change.
    pub unchanged: bool,
    pub finalized: Option<FinalResult>,
}

#[derive(Debug, Clone)]
pub struct Exploration {
    pub states: Vec<EntrySession>,
    pub steps: Vec<Step>,
    /// `max_states` was hit before the frontier emptied.
    pub truncated: bool,
}

pub fn explore(start: EntrySession, tallies: &[Tally], max_states: usize) -> Exploration {
    let mut seen = HashSet::from([state_key(&start)]);
    let mut queue = VecDeque::from([start]);
    let mut states = Vec::new();
    let mut steps = Vec::new();
    let mut truncated = false;

    while let Some(session) = queue.pop_front() {
        let before = state_key(&session);
        for action in alphabet(&session, tallies.len()) {
            let mut next = session.clone();
            let result = apply(&mut next, action, tallies);
            let after = state_key(&next);

            if result.is_ok() && !seen.contains(&after) {
                if seen.len() < max_states {
                    seen.insert(after.clone());
                    queue.push_back(next.clone());
                } else {
                    truncated = true;
                }
            }

            let (error, finalized) = match result {
                Ok(f) => (None, f),
                Err(e) => (Some(e), None),
            };
            steps.push(Step {
                from: session.phase().clone(),
                action,
                to: next.phase().clone(),
                error,
                unchanged: before == after,
                finalized,
            });
        }
        states.push(session);
    }

    Exploration {
        states,
        steps,
        truncated,
    }
}

fn alphabet(session: &EntrySession, variants: usize) -> Vec<Action> {
    let mut out = Vec::new();
    for variant in 0..variants {
        out.push(Action::Edit { variant });
        out.push(Action::Submit { variant });
    }
    out.push(Action::Accept);
    out.extend(session.plan().sections().iter().map(|k| Action::Navigate(*k)));
    out.extend(
        [
            UnsavedDecision::SaveAndContinue,
            UnsavedDecision::DiscardAndContinue,
            UnsavedDecision::Cancel,
        ]
        .map(Action::ResolveUnsaved),
    );
    out.push(Action::Abort);
    out.extend(
        [
            AbortDecision::SaveAndSuspend,
            AbortDecision::Discard,
            AbortDecision::Cancel,
        ]
        .map(Action::ResolveAbort),
    );
    out.push(Action::Finalize);
    out
}

pub fn apply(
    session: &mut EntrySession,
    action: Action,
    tallies: &[Tally],
) -> Result<Option<FinalResult>, SessionError> {
    let current = session.current_section();
    let values = |variant: usize| tallies[variant].values(current);
    match action {
        Action::Edit { variant } => session.edit(values(variant)).map(|_| None),
        Action::Submit { variant } => session.submit_section(values(variant)).map(|_| None),
        Action::Accept => session.accept_violations(current).map(|_| None),
        Action::Navigate(key) => session.navigate_to(key).map(|_| None),
        Action::ResolveUnsaved(d) => session.resolve_unsaved(d).map(|_| None),
        Action::Abort => session.abort().map(|_| None),
        Action::ResolveAbort(d) => session.resolve_abort(d).map(|_| None),
        Action::Finalize => session.finalize().map(Some),
    }
}

fn state_key(session: &EntrySession) -> String {
    let snapshot = serde_json::to_string(&session.snapshot()).unwrap_or_default();
    let values = serde_json::to_string(&session.current_values()).unwrap_or_default();
    format!("{:?}|{snapshot}|{values}", session.phase())
}
