use std::collections::HashSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;
use crate::error::Result;
use crate::schema::SaleRecord;
use crate::tabular::Table;

/// Ledger partitioned against a commission statement. Every ledger row lands
/// in exactly one side; input order is preserved on both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommissionMatch {
    pub matched: Vec<SaleRecord>,
    pub unmatched: Vec<SaleRecord>,
}

impl CommissionMatch {
    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }

    pub fn unmatched_count(&self) -> usize {
        self.unmatched.len()
    }

    pub fn matched_table(&self) -> Table {
        Table::from_records(&self.matched)
    }

    pub fn unmatched_table(&self) -> Table {
        Table::from_records(&self.unmatched)
    }
}

pub struct CommissionMatcher<'a> {
    config: &'a TrackerConfig,
}

impl<'a> CommissionMatcher<'a> {
    pub fn new(config: &'a TrackerConfig) -> Self {
        Self { config }
    }

    /// Normalized policy numbers of an uploaded statement. Fails without a
    /// recognizable policy number column; blank cells are skipped.
    pub fn statement_policies(&self, statement: &Table) -> Result<HashSet<String>> {
        let col = statement.require_policy_column(self.config)?;
        let policies: HashSet<String> = (0..statement.len())
            .map(|row| self.config.policy_key(statement.cell(row, col)))
            .filter(|key| !key.is_empty())
            .collect();
        debug!(
            "Statement has {} distinct policy numbers in {} rows",
            policies.len(),
            statement.len()
        );
        Ok(policies)
    }

    /// Parses the statement first; nothing is partitioned if that fails.
    pub fn match_statement(&self, ledger: &[SaleRecord], statement: &Table) -> Result<CommissionMatch> {
        let policies = self.statement_policies(statement)?;
        Ok(self.partition(ledger, &policies))
    }

    /// Exact match after normalization. Statement entries with no ledger row
    /// are ignored.
    pub fn match_policies<S: AsRef<str>>(&self, ledger: &[SaleRecord], statement: &[S]) -> CommissionMatch {
        let policies: HashSet<String> = statement
            .iter()
            .map(|p| self.config.policy_key(p.as_ref()))
            .filter(|key| !key.is_empty())
            .collect();
        self.partition(ledger, &policies)
    }

    fn partition(&self, ledger: &[SaleRecord], policies: &HashSet<String>) -> CommissionMatch {
        let (matched, unmatched): (Vec<SaleRecord>, Vec<SaleRecord>) = ledger
            .iter()
            .cloned()
            .partition(|r| policies.contains(&self.config.policy_key(&r.details.policy_number)));

        info!(
            "Commission match: {} matched, {} unmatched",
            matched.len(),
            unmatched.len()
        );
        CommissionMatch { matched, unmatched }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SaleDetails, SaleId};
    use crate::tabular::read_csv;
    use crate::TrackerError;

    fn sale(id: i64, policy: &str) -> SaleRecord {
        SaleRecord::new(
            SaleId(id),
            SaleDetails {
                policy_number: policy.to_string(),
                ..Default::default()
            },
        )
    }

    fn ids(records: &[SaleRecord]) -> Vec<i64> {
        records.iter().map(|r| r.id.0).collect()
    }

    #[test]
    fn test_statement_only_policies_are_ignored() {
        let config = TrackerConfig::default();
        let ledger = vec![sale(1, "P100"), sale(2, "P200")];
        let result = CommissionMatcher::new(&config).match_policies(&ledger, &["P100", "P999"]);

        assert_eq!(ids(&result.matched), vec![1]);
        assert_eq!(ids(&result.unmatched), vec![2]);
        assert_eq!(result.matched_count() + result.unmatched_count(), ledger.len());
    }

    #[test]
    fn test_both_sides_are_trimmed() {
        let config = TrackerConfig::default();
        let ledger = vec![sale(1, " P100"), sale(2, "p100")];
        let result = CommissionMatcher::new(&config).match_policies(&ledger, &["P100  "]);
        assert_eq!(ids(&result.matched), vec![1]);
        assert_eq!(ids(&result.unmatched), vec![2]);
    }

    #[test]
    fn test_partition_is_total_and_disjoint() {
        let config = TrackerConfig::default();
        let ledger: Vec<SaleRecord> = (1..=20).map(|i| sale(i, &format!("P{}", i % 7))).collect();
        let statement = vec!["P1", "P3", "P5", "Q1", ""];
        let result = CommissionMatcher::new(&config).match_policies(&ledger, &statement);

        let matched: HashSet<i64> = ids(&result.matched).into_iter().collect();
        let unmatched: HashSet<i64> = ids(&result.unmatched).into_iter().collect();
        assert!(matched.is_disjoint(&unmatched));
        assert_eq!(matched.len() + unmatched.len(), ledger.len());
        assert!(result
            .matched
            .iter()
            .all(|r| ["P1", "P3", "P5"].contains(&r.details.policy_number.as_str())));
    }

    #[test]
    fn test_blank_ledger_policy_never_matches() {
        let config = TrackerConfig::default();
        let ledger = vec![sale(1, ""), sale(2, "P1")];
        let result = CommissionMatcher::new(&config).match_policies(&ledger, &["", "P1"]);
        assert_eq!(ids(&result.matched), vec![2]);
        assert_eq!(ids(&result.unmatched), vec![1]);
    }

    #[test]
    fn test_statement_table_without_policy_column_is_rejected() {
        let config = TrackerConfig::default();
        let statement = read_csv("carrier,commission\nAcme,12.5\n".as_bytes()).unwrap();
        let result = CommissionMatcher::new(&config).match_statement(&[sale(1, "P1")], &statement);
        assert!(matches!(result, Err(TrackerError::MalformedInput { .. })));
    }

    #[test]
    fn test_statement_table_numeric_policies() {
        let config = TrackerConfig::default();
        let statement = read_csv("Policy Number,Commission\n 12345 ,10\n777,3\n".as_bytes()).unwrap();
        let ledger = vec![sale(1, "12345"), sale(2, "777"), sale(3, "888")];
        let result = CommissionMatcher::new(&config)
            .match_statement(&ledger, &statement)
            .unwrap();
        assert_eq!(ids(&result.matched), vec![1, 2]);
        assert_eq!(ids(&result.unmatched), vec![3]);
        assert_eq!(result.unmatched_table().len(), 1);
    }
}
