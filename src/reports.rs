use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::schema::SaleRecord;
use crate::tabular::Table;

const MONTH_ABBR: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Case-insensitive substring search over customer name and policy number.
/// A blank term returns the whole ledger.
pub fn search(ledger: &[SaleRecord], term: &str) -> Vec<SaleRecord> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return ledger.to_vec();
    }
    ledger
        .iter()
        .filter(|r| {
            r.details.customer_name.to_lowercase().contains(&term)
                || r.details.policy_number.to_lowercase().contains(&term)
        })
        .cloned()
        .collect()
}

/// Rows sold within `[start, end]`. Undated rows are left out.
pub fn date_range_report(ledger: &[SaleRecord], start: NaiveDate, end: NaiveDate) -> Vec<SaleRecord> {
    let rows: Vec<SaleRecord> = ledger
        .iter()
        .filter(|r| {
            r.details
                .date_of_sale
                .is_some_and(|d| d >= start && d <= end)
        })
        .cloned()
        .collect();
    debug!("Date range {} to {}: {} row(s)", start, end, rows.len());
    rows
}

/// The date-range report ready for CSV or XLSX export.
pub fn date_range_table(ledger: &[SaleRecord], start: NaiveDate, end: NaiveDate) -> Table {
    Table::from_records(&date_range_report(ledger, start, end))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAgentTotal {
    pub month: u32,
    pub month_abbr: String,
    pub agent_name: String,
    pub premium: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: i32,
    pub total_premium: f64,
    /// Ordered by month, then agent.
    pub monthly: Vec<MonthlyAgentTotal>,
}

/// Premium per (month, agent) for one year. With `agents` set, only those
/// agents are counted; rows without an agent name are then excluded.
pub fn yearly_monthly_totals(
    ledger: &[SaleRecord],
    year: i32,
    agents: Option<&BTreeSet<String>>,
) -> YearSummary {
    let mut grouped: BTreeMap<(u32, String), f64> = BTreeMap::new();

    for record in ledger.iter().filter(|r| r.year() == Some(year)) {
        let agent = record.details.agent_name.trim();
        if let Some(selected) = agents {
            if !selected.contains(agent) {
                continue;
            }
        }
        let Some(month) = record.month() else {
            continue;
        };
        *grouped.entry((month, agent.to_string())).or_insert(0.0) +=
            record.details.premium_amount();
    }

    let monthly: Vec<MonthlyAgentTotal> = grouped
        .into_iter()
        .map(|((month, agent_name), premium)| MonthlyAgentTotal {
            month,
            month_abbr: MONTH_ABBR[(month as usize).saturating_sub(1) % 12].to_string(),
            agent_name,
            premium,
        })
        .collect();

    let total_premium = monthly.iter().map(|m| m.premium).sum();
    YearSummary {
        year,
        total_premium,
        monthly,
    }
}

/// Distinct sale years, ascending.
pub fn available_years(ledger: &[SaleRecord]) -> Vec<i32> {
    ledger
        .iter()
        .filter_map(SaleRecord::year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct non-blank agent names, ascending.
pub fn available_agents(ledger: &[SaleRecord]) -> Vec<String> {
    ledger
        .iter()
        .map(|r| r.details.agent_name.trim())
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
