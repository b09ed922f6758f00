//! # Commission Tracker
//!
//! Reconciliation and forecasting engine for insurance policy sales entered by
//! agents.
//!
//! ## Core Concepts
//!
//! - **Ledger**: the full set of [`SaleRecord`]s at a point in time, always
//!   passed in as an immutable snapshot
//! - **Duplicates**: rows sharing a policy number, surfaced for review and
//!   resolved by edits or explicit deletes
//! - **Commission matching**: partition of the ledger against the policy
//!   numbers of a carrier statement
//! - **Backfill**: bulk import of historical rows whose policy number is new
//!   to the ledger
//! - **Pacing**: per-agent month-to-date totals extrapolated over business days
//!
//! No component writes to a store. Each returns what should change (a
//! [`MutationPlan`]) and the caller applies it with [`apply_plan`], which
//! reports per-row failures instead of aborting.
//!
//! ## Example
//!
//! ```rust,ignore
//! use commission_tracker::*;
//! use chrono::NaiveDate;
//!
//! let mut store = InMemoryLedgerStore::new();
//! let sale = SaleDetails::new_entry(
//!     "Jane Roe", "P100", 1200.0, "Acme Mutual",
//!     NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
//!     "Sam", "",
//! )?;
//! store.insert(sale)?;
//!
//! let tracker = SalesTracker::new(TrackerConfig::default());
//! let ledger = store.list_all()?;
//! let forecast = tracker.forecast(&ledger, NaiveDate::from_ymd_opt(2025, 3, 5).unwrap())?;
//! ```

pub mod backfill;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod forecast;
pub mod ingestion;
pub mod matcher;
pub mod reports;
pub mod schema;
pub mod store;
pub mod tabular;
pub mod utils;

pub use backfill::{BackfillMerger, BackfillPlan};
pub use config::TrackerConfig;
pub use duplicates::{delete_selected, diff_edits, selected_ids, DuplicateDetector};
pub use error::{CoercionWarning, MutationKind, Result, RowMutationFailure, TrackerError};
pub use forecast::{AgentForecast, MonthForecast, PacingForecaster};
pub use ingestion::{ingest_table, IngestedSales, SaleColumns};
pub use matcher::{CommissionMatch, CommissionMatcher};
pub use reports::*;
pub use schema::*;
pub use store::{apply_plan, BatchReport, InMemoryLedgerStore, LedgerStore, MutationPlan};
pub use tabular::Table;

use std::collections::BTreeSet;

use chrono::NaiveDate;
use log::{debug, info};

/// Entry point bundling the engine components behind one configuration.
pub struct SalesTracker {
    config: TrackerConfig,
}

impl SalesTracker {
    pub fn new(config: TrackerConfig) -> Self {
        debug!("Tracker configuration: {:?}", config);
        Self { config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn find_duplicates(&self, ledger: &[SaleRecord]) -> Vec<SaleRecord> {
        DuplicateDetector::new(&self.config).find_duplicates(ledger)
    }

    /// Edited duplicate grid to a plan of updates and inserts.
    pub fn resolve_duplicate_edits(&self, original: &[SaleRecord], edited: &[EditableRow]) -> MutationPlan {
        diff_edits(original, edited)
    }

    pub fn resolve_duplicate_deletes(&self, ids: &BTreeSet<SaleId>) -> MutationPlan {
        info!("Deleting {} selected duplicate row(s)", ids.len());
        delete_selected(ids)
    }

    pub fn match_statement(&self, ledger: &[SaleRecord], statement: &Table) -> Result<CommissionMatch> {
        CommissionMatcher::new(&self.config).match_statement(ledger, statement)
    }

    pub fn plan_backfill(&self, ledger: &[SaleRecord], historical: &Table, as_of: NaiveDate) -> Result<BackfillPlan> {
        BackfillMerger::new(&self.config).plan(ledger, historical, as_of)
    }

    pub fn forecast(&self, ledger: &[SaleRecord], as_of: NaiveDate) -> Result<MonthForecast> {
        PacingForecaster::new(as_of).forecast(ledger)
    }
}
