use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Store-assigned identifier of a sale row. Never reused, never recomputed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct SaleId(pub i64);

impl std::fmt::Display for SaleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Policy status. Open-ended: any label other than the known ones is kept
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum SaleStatus {
    #[default]
    Active,
    Cancelled,
    Other(String),
}

impl SaleStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "Active",
            Self::Cancelled => "Cancelled",
            Self::Other(label) => label,
        }
    }

    /// Parses a free-text status cell. Blank input yields `None` so the caller
    /// can apply its configured default.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed.to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Other(trimmed.to_string()),
        })
    }
}

impl From<String> for SaleStatus {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or_default()
    }
}

impl From<SaleStatus> for String {
    fn from(value: SaleStatus) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JsonSchema for SaleStatus {
    fn schema_name() -> String {
        "SaleStatus".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

/// Every field of a sale except its id. This is the payload of inserts and
/// full-row updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SaleDetails {
    #[schemars(description = "Name of the insured customer")]
    pub customer_name: String,

    #[schemars(description = "Carrier policy number. Not guaranteed unique across rows.")]
    pub policy_number: String,

    #[schemars(description = "Premium amount, never negative")]
    pub premium: f64,

    pub carrier: String,

    #[schemars(description = "Policy effective date (YYYY-MM-DD), absent when unknown")]
    pub effective_date: Option<NaiveDate>,

    #[schemars(description = "Date the sale was written (YYYY-MM-DD), absent when unknown")]
    pub date_of_sale: Option<NaiveDate>,

    pub agent_name: String,

    pub notes: String,

    #[serde(default)]
    pub status: SaleStatus,
}

impl Default for SaleDetails {
    fn default() -> Self {
        Self {
            customer_name: String::new(),
            policy_number: String::new(),
            premium: 0.0,
            carrier: String::new(),
            effective_date: None,
            date_of_sale: None,
            agent_name: String::new(),
            notes: String::new(),
            status: SaleStatus::Active,
        }
    }
}

impl SaleDetails {
    /// Builds a manually entered sale: text trimmed, status `Active`.
    #[allow(clippy::too_many_arguments)]
    pub fn new_entry(
        customer_name: &str,
        policy_number: &str,
        premium: f64,
        carrier: &str,
        effective_date: NaiveDate,
        date_of_sale: NaiveDate,
        agent_name: &str,
        notes: &str,
    ) -> Result<Self> {
        let details = Self {
            customer_name: customer_name.to_string(),
            policy_number: policy_number.to_string(),
            premium,
            carrier: carrier.to_string(),
            effective_date: Some(effective_date),
            date_of_sale: Some(date_of_sale),
            agent_name: agent_name.to_string(),
            notes: notes.to_string(),
            status: SaleStatus::Active,
        }
        .normalized();

        details.validate()?;
        Ok(details)
    }

    /// Trims every text field. Applied before anything is written.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.customer_name,
            &mut self.policy_number,
            &mut self.carrier,
            &mut self.agent_name,
            &mut self.notes,
        ] {
            *field = field.trim().to_string();
        }
        if let SaleStatus::Other(label) = &self.status {
            self.status = SaleStatus::parse(label).unwrap_or_default();
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.premium.is_finite() || self.premium < 0.0 {
            return Err(TrackerError::InvalidRecord {
                field: "premium".to_string(),
                details: format!("{} is not a non-negative amount", self.premium),
            });
        }
        Ok(())
    }

    /// Premium as used by aggregation: anything non-finite or negative counts as zero.
    pub fn premium_amount(&self) -> f64 {
        if self.premium.is_finite() && self.premium > 0.0 {
            self.premium
        } else {
            0.0
        }
    }
}

/// One stored sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SaleRecord {
    pub id: SaleId,
    #[serde(flatten)]
    pub details: SaleDetails,
}

impl SaleRecord {
    pub fn new(id: SaleId, details: SaleDetails) -> Self {
        Self { id, details }
    }

    /// Month of `date_of_sale`, derived on every call. `None` when the date is missing.
    pub fn month(&self) -> Option<u32> {
        self.details.date_of_sale.map(|d| d.month())
    }

    pub fn year(&self) -> Option<i32> {
        self.details.date_of_sale.map(|d| d.year())
    }

    pub fn sold_in(&self, year: i32, month: u32) -> bool {
        self.year() == Some(year) && self.month() == Some(month)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(SaleRecord)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// An editable row as held by a grid: the id is absent for rows added during
/// editing, and `selected` is a transient UI flag that is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableRow {
    pub id: Option<SaleId>,
    #[serde(flatten)]
    pub details: SaleDetails,
    #[serde(default)]
    pub selected: bool,
}

impl From<&SaleRecord> for EditableRow {
    fn from(record: &SaleRecord) -> Self {
        Self {
            id: Some(record.id),
            details: record.details.clone(),
            selected: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = SaleRecord::schema_as_json().unwrap();
        assert!(schema_json.contains("policy_number"));
        assert!(schema_json.contains("date_of_sale"));
        assert!(schema_json.contains("status"));
    }

    #[test]
    fn test_new_entry_trims_and_defaults_status() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let details = SaleDetails::new_entry(
            "  Jane Roe ",
            " P100 ",
            250.0,
            "Acme Mutual ",
            date,
            date,
            " Sam",
            "",
        )
        .unwrap();

        assert_eq!(details.customer_name, "Jane Roe");
        assert_eq!(details.policy_number, "P100");
        assert_eq!(details.carrier, "Acme Mutual");
        assert_eq!(details.agent_name, "Sam");
        assert_eq!(details.status, SaleStatus::Active);
    }

    #[test]
    fn test_new_entry_rejects_negative_premium() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let result = SaleDetails::new_entry("A", "P1", -5.0, "C", date, date, "Sam", "");
        assert!(matches!(result, Err(TrackerError::InvalidRecord { .. })));
    }

    #[test]
    fn test_month_and_year_follow_date_of_sale() {
        let mut record = SaleRecord::new(
            SaleId(1),
            SaleDetails {
                date_of_sale: NaiveDate::from_ymd_opt(2024, 2, 29),
                ..Default::default()
            },
        );
        assert_eq!(record.month(), Some(2));
        assert_eq!(record.year(), Some(2024));

        record.details.date_of_sale = NaiveDate::from_ymd_opt(2023, 11, 1);
        assert_eq!(record.month(), Some(11));
        assert!(record.sold_in(2023, 11));

        record.details.date_of_sale = None;
        assert_eq!(record.month(), None);
        assert!(!record.sold_in(2023, 11));
    }

    #[test]
    fn test_status_round_trips_as_plain_text() {
        assert_eq!(SaleStatus::parse("canceled"), Some(SaleStatus::Cancelled));
        assert_eq!(SaleStatus::parse("  "), None);
        assert_eq!(
            SaleStatus::parse("Lapsed"),
            Some(SaleStatus::Other("Lapsed".to_string()))
        );

        let record = SaleRecord::new(
            SaleId(7),
            SaleDetails {
                policy_number: "P7".to_string(),
                status: SaleStatus::Other("Pending".to_string()),
                ..Default::default()
            },
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"status\":\"Pending\""));
        assert!(json.contains("\"id\":7"));

        let back: SaleRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
