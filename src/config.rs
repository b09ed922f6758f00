use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::SaleStatus;
use crate::utils::{normalize_header, normalize_policy_number};

/// Engine-wide settings. Every field has a default, so an empty JSON object
/// is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TrackerConfig {
    #[schemars(
        description = "Compare policy numbers case-insensitively. Off by default: only surrounding whitespace is ignored."
    )]
    pub case_insensitive_policy_numbers: bool,

    #[schemars(
        description = "Whether blank policy numbers may form a duplicate group. Blanks are missing data, not exempt data."
    )]
    pub group_blank_policy_numbers: bool,

    #[schemars(
        description = "Header names accepted as the policy number column of an uploaded file. Matched ignoring case, spaces and underscores."
    )]
    pub policy_number_aliases: Vec<String>,

    #[schemars(description = "chrono format strings tried in order when a date cell is text")]
    pub date_formats: Vec<String>,

    #[schemars(description = "Status given to backfilled rows that carry none")]
    pub default_status: SaleStatus,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            case_insensitive_policy_numbers: false,
            group_blank_policy_numbers: true,
            policy_number_aliases: vec![
                "policy_number".to_string(),
                "policy number".to_string(),
                "policy no".to_string(),
                "policy #".to_string(),
                "policy".to_string(),
            ],
            date_formats: vec![
                "%Y-%m-%d".to_string(),
                "%m/%d/%Y".to_string(),
                "%Y/%m/%d".to_string(),
                "%m-%d-%Y".to_string(),
                "%d-%b-%Y".to_string(),
            ],
            default_status: SaleStatus::Active,
        }
    }
}

impl TrackerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Canonical key used for every policy number comparison in the engine.
    pub fn policy_key(&self, raw: &str) -> String {
        normalize_policy_number(raw, self.case_insensitive_policy_numbers)
    }

    pub fn is_policy_header(&self, header: &str) -> bool {
        let header = normalize_header(header);
        self.policy_number_aliases
            .iter()
            .any(|alias| normalize_header(alias) == header)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(TrackerConfig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = TrackerConfig::from_json_str("{}").unwrap();
        assert!(!config.case_insensitive_policy_numbers);
        assert!(config.group_blank_policy_numbers);
        assert_eq!(config.default_status, SaleStatus::Active);
        assert!(config.date_formats.contains(&"%m/%d/%Y".to_string()));
    }

    #[test]
    fn test_partial_override() {
        let config = TrackerConfig::from_json_str(
            r#"{"case_insensitive_policy_numbers": true, "default_status": "Pending"}"#,
        )
        .unwrap();
        assert!(config.case_insensitive_policy_numbers);
        assert_eq!(
            config.default_status,
            SaleStatus::Other("Pending".to_string())
        );
        assert_eq!(config.policy_key("  ab-12 "), "AB-12");
    }

    #[test]
    fn test_policy_header_aliases() {
        let config = TrackerConfig::default();
        assert!(config.is_policy_header("Policy Number"));
        assert!(config.is_policy_header("POLICY_NUMBER"));
        assert!(config.is_policy_header(" policy "));
        assert!(!config.is_policy_header("premium"));
    }

    #[test]
    fn test_schema_lists_fields() {
        let schema = serde_json::to_string(&TrackerConfig::generate_json_schema()).unwrap();
        assert!(schema.contains("policy_number_aliases"));
        assert!(schema.contains("date_formats"));
    }

    #[test]
    fn test_from_path_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            TrackerConfig::from_path(&path),
            Err(crate::TrackerError::SerializationError(_))
        ));
    }
}
