use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use log::{debug, info};

use crate::config::TrackerConfig;
use crate::schema::{EditableRow, SaleId, SaleRecord};
use crate::store::MutationPlan;

pub struct DuplicateDetector<'a> {
    config: &'a TrackerConfig,
}

impl<'a> DuplicateDetector<'a> {
    pub fn new(config: &'a TrackerConfig) -> Self {
        Self { config }
    }

    /// Every row whose normalized policy number occurs at least twice, ordered
    /// by policy number and then id so groups are contiguous and stable
    /// between runs.
    pub fn find_duplicates(&self, ledger: &[SaleRecord]) -> Vec<SaleRecord> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in ledger {
            *counts
                .entry(self.config.policy_key(&record.details.policy_number))
                .or_insert(0) += 1;
        }

        let mut keyed: Vec<(String, &SaleRecord)> = ledger
            .iter()
            .map(|r| (self.config.policy_key(&r.details.policy_number), r))
            .filter(|(key, _)| counts.get(key).copied().unwrap_or(0) >= 2)
            .filter(|(key, _)| self.config.group_blank_policy_numbers || !key.is_empty())
            .collect();

        keyed.sort_by(|(ka, ra), (kb, rb)| ka.cmp(kb).then(ra.id.cmp(&rb.id)));

        let duplicates: Vec<SaleRecord> = keyed.into_iter().map(|(_, r)| r.clone()).collect();
        info!(
            "Duplicate scan: {} of {} rows share a policy number",
            duplicates.len(),
            ledger.len()
        );
        duplicates
    }

    /// The same rows as [`find_duplicates`](Self::find_duplicates), grouped by
    /// normalized policy number.
    pub fn duplicate_groups(&self, ledger: &[SaleRecord]) -> BTreeMap<String, Vec<SaleRecord>> {
        let mut groups: BTreeMap<String, Vec<SaleRecord>> = BTreeMap::new();
        for record in self.find_duplicates(ledger) {
            groups
                .entry(self.config.policy_key(&record.details.policy_number))
                .or_default()
                .push(record);
        }
        groups
    }

    /// Editable copy of the duplicate set with every selection flag cleared.
    pub fn editable_view(&self, ledger: &[SaleRecord]) -> Vec<EditableRow> {
        self.find_duplicates(ledger)
            .iter()
            .map(EditableRow::from)
            .collect()
    }
}

/// Compares an edited grid against the snapshot it was built from.
///
/// Only rows with a real field difference become updates; the selection flag
/// is ignored. Rows without an id, or with an id absent from the snapshot, are
/// rows added during editing and become inserts. Rows removed from the grid
/// produce nothing: deletion only happens through [`delete_selected`].
pub fn diff_edits(original: &[SaleRecord], edited: &[EditableRow]) -> MutationPlan {
    let snapshot: HashMap<SaleId, &SaleRecord> = original.iter().map(|r| (r.id, r)).collect();
    let mut seen: HashSet<SaleId> = HashSet::new();
    let mut plan = MutationPlan::default();

    for row in edited {
        let details = row.details.clone().normalized();
        match row.id.and_then(|id| snapshot.get(&id)) {
            Some(before) => {
                if !seen.insert(before.id) {
                    debug!("Ignoring repeated edited row for id={}", before.id);
                    continue;
                }
                if before.details != details {
                    plan.updates.push(SaleRecord::new(before.id, details));
                }
            }
            None => plan.inserts.push(details),
        }
    }

    info!(
        "Edit diff: {} changed row(s), {} new row(s) out of {} edited",
        plan.updates.len(),
        plan.inserts.len(),
        edited.len()
    );
    plan
}

/// Emits exactly the given ids as deletes. Nothing cascades to other rows of
/// the same policy number.
pub fn delete_selected(ids: &BTreeSet<SaleId>) -> MutationPlan {
    MutationPlan {
        deletes: ids.iter().copied().collect(),
        ..Default::default()
    }
}

/// Ids of the rows whose selection flag is set.
pub fn selected_ids(rows: &[EditableRow]) -> BTreeSet<SaleId> {
    rows.iter()
        .filter(|r| r.selected)
        .filter_map(|r| r.id)
        .collect()
}
