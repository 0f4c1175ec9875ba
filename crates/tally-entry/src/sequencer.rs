use std::collections::BTreeSet;

use tally_schemas::{ElectionContext, PollingStation, SectionKey};

use crate::EntrySession;

/// The ordered list of sections for one entry.
///
/// Investigation → counting differences → voters and votes → differences →
/// one section per list (group number ascending) → final check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionPlan {
    sections: Vec<SectionKey>,
}

impl SectionPlan {
    pub fn new(ctx: &ElectionContext, station: &PollingStation) -> Self {
        let mut sections = Vec::new();

        // Corrections of an earlier session always go through the investigation.
        if ctx.layout.extra_investigation || station.has_previous_session_id() {
            sections.push(SectionKey::ExtraInvestigation);
        }
        if ctx.layout.counting_differences {
            sections.push(SectionKey::CountingDifferences);
        }
        sections.push(SectionKey::VotersAndVotes);
        sections.push(SectionKey::Differences);
        sections.extend(
            ctx.groups_in_order()
                .into_iter()
                .map(|g| SectionKey::PoliticalGroupVotes(g.number)),
        );
        sections.push(SectionKey::CheckAndSave);

        Self { sections }
    }

    pub fn sections(&self) -> &[SectionKey] {
        &self.sections
    }

    pub fn first(&self) -> SectionKey {
        // The plan always ends with CheckAndSave, so it is never empty.
        self.sections
            .first()
            .copied()
            .unwrap_or(SectionKey::CheckAndSave)
    }

    pub fn contains(&self, key: SectionKey) -> bool {
        self.sections.contains(&key)
    }

    pub fn position(&self, key: SectionKey) -> Option<usize> {
        self.sections.iter().position(|k| *k == key)
    }

    /// The section that follows `key`, or `None` after the final check.
    pub fn after(&self, key: SectionKey) -> Option<SectionKey> {
        let i = self.position(key)?;
        self.sections.get(i + 1).copied()
    }

    /// Sections whose cached validation becomes stale when `key`'s values change.
    pub fn dependents(&self, key: SectionKey) -> Vec<SectionKey> {
        let mut out = Vec::new();
        if key == SectionKey::VotersAndVotes && self.contains(SectionKey::Differences) {
            out.push(SectionKey::Differences);
        }
        if key != SectionKey::CheckAndSave {
            out.push(SectionKey::CheckAndSave);
        }
        out
    }
}

/// A section is reachable once every section before it is saved.
///
/// The first section is always reachable; the set is therefore a prefix of
/// the plan that ends at the first unsaved section.
pub fn reachable_sections(session: &EntrySession) -> BTreeSet<SectionKey> {
    let mut out = BTreeSet::new();
    for &key in session.plan().sections() {
        out.insert(key);
        if !session.is_saved(key) {
            break;
        }
    }
    out
}

/// The section after the current one, or `None` when the current section
/// is the final check.
pub fn next_section(session: &EntrySession) -> Option<SectionKey> {
    session.plan().after(session.current_section())
}
