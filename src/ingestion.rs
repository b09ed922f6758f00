use chrono::NaiveDate;
use log::{debug, warn};

use crate::config::TrackerConfig;
use crate::error::{CoercionWarning, Result};
use crate::schema::{SaleDetails, SaleStatus};
use crate::tabular::Table;
use crate::utils::{parse_date, parse_premium};

/// Column positions of the sale fields in an uploaded table. Only the policy
/// number column is mandatory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleColumns {
    pub policy_number: usize,
    pub customer_name: Option<usize>,
    pub premium: Option<usize>,
    pub carrier: Option<usize>,
    pub effective_date: Option<usize>,
    pub date_of_sale: Option<usize>,
    pub agent_name: Option<usize>,
    pub notes: Option<usize>,
    pub status: Option<usize>,
}

impl SaleColumns {
    pub fn resolve(table: &Table, config: &TrackerConfig) -> Result<Self> {
        let columns = Self {
            policy_number: table.require_policy_column(config)?,
            customer_name: table.column_index("customer_name"),
            premium: table.column_index("premium"),
            carrier: table.column_index("carrier"),
            effective_date: table.column_index("effective_date"),
            date_of_sale: table.column_index("date_of_sale"),
            agent_name: table.column_index("agent_name"),
            notes: table.column_index("notes"),
            status: table.column_index("status"),
        };
        debug!("Resolved upload columns: {:?}", columns);
        Ok(columns)
    }
}

/// Rows of an uploaded table converted to strict sale values.
#[derive(Debug, Clone, Default)]
pub struct IngestedSales {
    /// One entry per data row, in input order.
    pub sales: Vec<SaleDetails>,
    pub warnings: Vec<CoercionWarning>,
}

/// Converts every row of `table`. Cells that cannot be typed fall back to a
/// default and leave a warning: premium becomes zero, dates become
/// `fallback_date`, status becomes the configured default.
pub fn ingest_table(
    table: &Table,
    config: &TrackerConfig,
    fallback_date: NaiveDate,
) -> Result<IngestedSales> {
    let columns = SaleColumns::resolve(table, config)?;
    let mut out = IngestedSales::default();

    for row in 0..table.len() {
        let sale = coerce_row(table, row, &columns, config, fallback_date, &mut out.warnings);
        out.sales.push(sale);
    }

    if !out.warnings.is_empty() {
        warn!(
            "{} cell(s) replaced by defaults while reading {} rows",
            out.warnings.len(),
            table.len()
        );
    }

    Ok(out)
}

pub fn coerce_row(
    table: &Table,
    row: usize,
    columns: &SaleColumns,
    config: &TrackerConfig,
    fallback_date: NaiveDate,
    warnings: &mut Vec<CoercionWarning>,
) -> SaleDetails {
    let text = |col: Option<usize>| -> String {
        col.map(|c| table.cell(row, c).trim().to_string())
            .unwrap_or_default()
    };

    let premium = match columns.premium {
        Some(col) => {
            let raw = table.cell(row, col);
            parse_premium(raw).unwrap_or_else(|| {
                warnings.push(CoercionWarning {
                    row,
                    field: "premium".to_string(),
                    value: raw.to_string(),
                    fallback: "0".to_string(),
                });
                0.0
            })
        }
        None => 0.0,
    };

    let mut date_field = |name: &str, col: Option<usize>| -> NaiveDate {
        let Some(col) = col else {
            return fallback_date;
        };
        let raw = table.cell(row, col);
        parse_date(raw, &config.date_formats).unwrap_or_else(|| {
            warnings.push(CoercionWarning {
                row,
                field: name.to_string(),
                value: raw.to_string(),
                fallback: fallback_date.to_string(),
            });
            fallback_date
        })
    };
    let effective_date = date_field("effective_date", columns.effective_date);
    let date_of_sale = date_field("date_of_sale", columns.date_of_sale);

    let status = columns
        .status
        .and_then(|col| SaleStatus::parse(table.cell(row, col)))
        .unwrap_or_else(|| config.default_status.clone());

    SaleDetails {
        customer_name: text(columns.customer_name),
        policy_number: table.cell(row, columns.policy_number).trim().to_string(),
        premium,
        carrier: text(columns.carrier),
        effective_date: Some(effective_date),
        date_of_sale: Some(date_of_sale),
        agent_name: text(columns.agent_name),
        notes: text(columns.notes),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::read_csv;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    }

    #[test]
    fn test_full_row_is_typed() {
        let data = "customer_name,policy_number,premium,carrier,effective_date,date_of_sale,agent_name,notes,status\n\
                    Jane ,P1,\"1,200\",Acme,2024-01-01,01/15/2024, Sam ,first,Cancelled\n";
        let table = read_csv(data.as_bytes()).unwrap();
        let out = ingest_table(&table, &TrackerConfig::default(), today()).unwrap();

        assert!(out.warnings.is_empty());
        let sale = &out.sales[0];
        assert_eq!(sale.customer_name, "Jane");
        assert_eq!(sale.premium, 1200.0);
        assert_eq!(sale.effective_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(sale.date_of_sale, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(sale.agent_name, "Sam");
        assert_eq!(sale.status, SaleStatus::Cancelled);
    }

    #[test]
    fn test_missing_columns_take_defaults_silently() {
        let table = read_csv("policy_number\nP1\n".as_bytes()).unwrap();
        let out = ingest_table(&table, &TrackerConfig::default(), today()).unwrap();

        assert!(out.warnings.is_empty());
        let sale = &out.sales[0];
        assert_eq!(sale.policy_number, "P1");
        assert_eq!(sale.premium, 0.0);
        assert_eq!(sale.customer_name, "");
        assert_eq!(sale.date_of_sale, Some(today()));
        assert_eq!(sale.effective_date, Some(today()));
        assert_eq!(sale.status, SaleStatus::Active);
    }

    #[test]
    fn test_bad_cells_are_defaulted_with_warnings() {
        let data = "policy_number,premium,date_of_sale,status\nP1,lots,someday,\n";
        let table = read_csv(data.as_bytes()).unwrap();
        let out = ingest_table(&table, &TrackerConfig::default(), today()).unwrap();

        let sale = &out.sales[0];
        assert_eq!(sale.premium, 0.0);
        assert_eq!(sale.date_of_sale, Some(today()));
        assert_eq!(sale.status, SaleStatus::Active);

        let fields: Vec<&str> = out.warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(fields, vec!["premium", "date_of_sale"]);
        assert_eq!(out.warnings[1].value, "someday");
        assert_eq!(out.warnings[1].fallback, "2024-06-14");
    }

    #[test]
    fn test_missing_policy_column_is_malformed() {
        let table = read_csv("customer_name,premium\nJane,10\n".as_bytes()).unwrap();
        let result = ingest_table(&table, &TrackerConfig::default(), today());
        assert!(matches!(
            result,
            Err(crate::TrackerError::MalformedInput { .. })
        ));
    }
}
