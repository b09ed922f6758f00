//! Mid-month premium pacing.
//!
//! For the month being forecast, each agent gets:
//!
//! - **current total**: premium of every sale dated in the month, weekends and
//!   future-dated rows included
//! - **pace total**: premium of sales on a business day on or before the as-of date
//! - **forecast**: `pace_total / business_days_elapsed * business_days_in_month`
//!
//! Business days are Monday to Friday with no holidays. Elapsed days are
//! floored at one so a weekend or first-of-month as-of date never divides by
//! zero.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::schema::SaleRecord;
use crate::utils::{business_days_between, is_business_day, last_day_of_month};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentForecast {
    pub agent_name: String,
    pub current_total: f64,
    pub pace_total: f64,
    pub forecast: f64,
}

impl AgentForecast {
    /// Agent label for display; unnamed sales are grouped under "Unknown".
    pub fn display_name(&self) -> &str {
        if self.agent_name.is_empty() {
            "Unknown"
        } else {
            &self.agent_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthForecast {
    pub year: i32,
    pub month: u32,
    pub as_of: NaiveDate,
    pub business_days_elapsed: u32,
    pub business_days_in_month: u32,
    /// Premium of every sale in the month across all agents.
    pub agency_total: f64,
    /// One entry per agent with at least one sale in the month, ordered by name.
    pub agents: Vec<AgentForecast>,
}

impl MonthForecast {
    pub fn agent(&self, name: &str) -> Option<&AgentForecast> {
        self.agents.iter().find(|a| a.agent_name == name)
    }
}

pub struct PacingForecaster {
    as_of: NaiveDate,
}

impl PacingForecaster {
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    /// Forecast for the month containing the as-of date.
    pub fn forecast(&self, ledger: &[SaleRecord]) -> Result<MonthForecast> {
        self.forecast_month(ledger, self.as_of.year(), self.as_of.month())
    }

    pub fn forecast_month(&self, ledger: &[SaleRecord], year: i32, month: u32) -> Result<MonthForecast> {
        let month_start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| TrackerError::DateError(format!("invalid month {year}-{month:02}")))?;
        let month_end = last_day_of_month(year, month)
            .ok_or_else(|| TrackerError::DateError(format!("invalid month {year}-{month:02}")))?;

        let business_days_in_month = business_days_between(month_start, month_end);
        let business_days_elapsed =
            business_days_between(month_start, self.as_of.min(month_end)).max(1);

        // (current, pace) per agent; every agent with a sale in the month gets
        // an entry even when nothing falls in the pace window.
        let mut totals: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for record in ledger.iter().filter(|r| r.sold_in(year, month)) {
            let premium = record.details.premium_amount();
            let entry = totals
                .entry(record.details.agent_name.trim().to_string())
                .or_insert((0.0, 0.0));
            entry.0 += premium;

            if let Some(sold) = record.details.date_of_sale {
                if sold <= self.as_of && is_business_day(sold) {
                    entry.1 += premium;
                }
            }
        }

        let scale = business_days_in_month as f64 / business_days_elapsed as f64;
        let agents: Vec<AgentForecast> = totals
            .into_iter()
            .map(|(agent_name, (current_total, pace_total))| AgentForecast {
                agent_name,
                current_total,
                pace_total,
                forecast: pace_total * scale,
            })
            .collect();

        let agency_total: f64 = agents.iter().map(|a| a.current_total).sum();

        debug!(
            "Pacing {}-{:02}: {} of {} business days elapsed as of {}",
            year, month, business_days_elapsed, business_days_in_month, self.as_of
        );
        info!(
            "Forecast for {}-{:02}: {} agent(s), agency total {:.2}",
            year,
            month,
            agents.len(),
            agency_total
        );

        Ok(MonthForecast {
            year,
            month,
            as_of: self.as_of,
            business_days_elapsed,
            business_days_in_month,
            agency_total,
            agents,
        })
    }
}
