use std::collections::HashSet;

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;
use crate::error::{CoercionWarning, Result};
use crate::ingestion::ingest_table;
use crate::schema::{SaleDetails, SaleRecord};
use crate::store::MutationPlan;
use crate::tabular::Table;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackfillPlan {
    /// Historical rows new to the ledger, in input order, defaults applied.
    pub inserts: Vec<SaleDetails>,
    /// Rows dropped because their policy number is already in the ledger.
    pub filtered: usize,
    pub warnings: Vec<CoercionWarning>,
}

impl BackfillPlan {
    pub fn mutation_plan(&self) -> MutationPlan {
        MutationPlan {
            inserts: self.inserts.clone(),
            ..Default::default()
        }
    }
}

pub struct BackfillMerger<'a> {
    config: &'a TrackerConfig,
}

impl<'a> BackfillMerger<'a> {
    pub fn new(config: &'a TrackerConfig) -> Self {
        Self { config }
    }

    /// Keeps the historical rows whose policy number appears nowhere in
    /// `ledger`. Missing cells default to empty text, zero premium, `as_of`
    /// for dates and the configured status.
    ///
    /// Novelty is judged against the ledger as passed in, not against rows
    /// already accepted from the same file: two new rows sharing a policy
    /// number are both proposed.
    pub fn plan(&self, ledger: &[SaleRecord], historical: &Table, as_of: NaiveDate) -> Result<BackfillPlan> {
        let ingested = ingest_table(historical, self.config, as_of)?;
        let plan = self.plan_sales(ledger, ingested.sales, ingested.warnings);

        info!(
            "Historical backfill: {} new row(s), {} already in ledger",
            plan.inserts.len(),
            plan.filtered
        );
        Ok(plan)
    }

    fn plan_sales(
        &self,
        ledger: &[SaleRecord],
        sales: Vec<SaleDetails>,
        warnings: Vec<CoercionWarning>,
    ) -> BackfillPlan {
        let existing: HashSet<String> = ledger
            .iter()
            .map(|r| self.config.policy_key(&r.details.policy_number))
            .collect();

        let mut plan = BackfillPlan {
            warnings,
            ..Default::default()
        };
        for sale in sales {
            if existing.contains(&self.config.policy_key(&sale.policy_number)) {
                plan.filtered += 1;
            } else {
                plan.inserts.push(sale.normalized());
            }
        }
        plan
    }
}
