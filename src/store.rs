//! The ledger store seam and the batch applier.
//!
//! Engine components never touch a store. They return a [`MutationPlan`] and
//! the caller hands it to [`apply_plan`], which issues one independent store
//! call per row. There is no cross-row transaction and no version check: a
//! failed row is recorded and the batch carries on.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{MutationKind, Result, RowMutationFailure, TrackerError};
use crate::schema::{SaleDetails, SaleId, SaleRecord};

/// Row-level persistence for sale records.
///
/// Implementations must give read-after-write consistency for the usual
/// mutate-then-reload pattern. Ids are assigned by the store and never reused.
pub trait LedgerStore {
    fn list_all(&self) -> Result<Vec<SaleRecord>>;

    /// Stores a new row and returns its freshly assigned id.
    fn insert(&mut self, details: SaleDetails) -> Result<SaleId>;

    /// Full-row update: every field is replaced.
    fn update(&mut self, id: SaleId, details: SaleDetails) -> Result<()>;

    fn delete(&mut self, id: SaleId) -> Result<()>;
}

/// Rows an engine operation proposes to insert, update or delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationPlan {
    pub inserts: Vec<SaleDetails>,
    pub updates: Vec<SaleRecord>,
    pub deletes: Vec<SaleId>,
}

impl MutationPlan {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }
}

/// Outcome of [`apply_plan`]: what went through and what did not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub inserted: Vec<SaleId>,
    pub updated: Vec<SaleId>,
    pub deleted: Vec<SaleId>,
    pub failures: Vec<RowMutationFailure>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies deletes, then updates, then inserts, one row at a time. A failing
/// row never stops its siblings.
pub fn apply_plan<S: LedgerStore + ?Sized>(store: &mut S, plan: &MutationPlan) -> BatchReport {
    let mut report = BatchReport::default();

    for &id in &plan.deletes {
        match store.delete(id) {
            Ok(()) => report.deleted.push(id),
            Err(e) => record_failure(&mut report, MutationKind::Delete, Some(id), e),
        }
    }

    for record in &plan.updates {
        match store.update(record.id, record.details.clone()) {
            Ok(()) => report.updated.push(record.id),
            Err(e) => record_failure(&mut report, MutationKind::Update, Some(record.id), e),
        }
    }

    for details in &plan.inserts {
        match store.insert(details.clone()) {
            Ok(id) => report.inserted.push(id),
            Err(e) => record_failure(&mut report, MutationKind::Insert, None, e),
        }
    }

    info!(
        "Applied batch: {} inserted, {} updated, {} deleted, {} failed",
        report.inserted.len(),
        report.updated.len(),
        report.deleted.len(),
        report.failures.len()
    );
    report
}

fn record_failure(
    report: &mut BatchReport,
    kind: MutationKind,
    id: Option<SaleId>,
    error: TrackerError,
) {
    let failure = RowMutationFailure {
        kind,
        id,
        reason: error.to_string(),
    };
    warn!("{}", failure);
    report.failures.push(failure);
}

/// A store held in memory, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    rows: BTreeMap<SaleId, SaleDetails>,
    next_id: i64,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Seeds the store with existing rows. New ids continue after the largest one.
    pub fn with_records(records: impl IntoIterator<Item = SaleRecord>) -> Self {
        let rows: BTreeMap<SaleId, SaleDetails> =
            records.into_iter().map(|r| (r.id, r.details)).collect();
        let next_id = rows.keys().next_back().map(|id| id.0 + 1).unwrap_or(1);
        Self { rows, next_id }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: SaleId) -> Option<SaleRecord> {
        self.rows
            .get(&id)
            .map(|details| SaleRecord::new(id, details.clone()))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn list_all(&self) -> Result<Vec<SaleRecord>> {
        Ok(self
            .rows
            .iter()
            .map(|(id, details)| SaleRecord::new(*id, details.clone()))
            .collect())
    }

    fn insert(&mut self, details: SaleDetails) -> Result<SaleId> {
        let details = details.normalized();
        details.validate()?;

        let id = SaleId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.rows.insert(id, details);
        debug!("Inserted sale id={}", id);
        Ok(id)
    }

    fn update(&mut self, id: SaleId, details: SaleDetails) -> Result<()> {
        let details = details.normalized();
        details.validate()?;

        match self.rows.get_mut(&id) {
            Some(slot) => {
                *slot = details;
                Ok(())
            }
            None => Err(TrackerError::UnknownSale(id)),
        }
    }

    fn delete(&mut self, id: SaleId) -> Result<()> {
        self.rows
            .remove(&id)
            .map(|_| ())
            .ok_or(TrackerError::UnknownSale(id))
    }
}
