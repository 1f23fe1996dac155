use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, Write},
    path::Path,
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{data::Value, quality::QualityFilter, sniff::DEFAULT_SAMPLE_BYTES};

/// Replacement written into missing cells of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

impl FillValue {
    pub fn to_value(&self) -> Value {
        match self {
            FillValue::Number(n) => Value::Number(*n),
            FillValue::Text(s) => Value::Text(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleaningConfig {
    /// Columns whose missingness counts towards `missing_threshold`.
    pub critical_columns: Vec<String>,
    /// Rows with more missing critical cells than this are dropped.
    pub missing_threshold: usize,
    /// Used when delimiter detection is inconclusive.
    #[serde(with = "delimiter_serde")]
    pub default_delimiter: u8,
    pub sniff_sample_bytes: usize,
    pub chunk_size: Option<usize>,
    pub default_fill: BTreeMap<String, FillValue>,
    pub categorical_columns: Vec<String>,
    pub columns_to_drop: Vec<String>,
    pub date_column: Option<String>,
    pub numeric_columns: Vec<String>,
    pub claim_metrics: bool,
    pub quality_filters: Vec<QualityFilter>,
    /// Share of rows a quality filter must keep to be committed.
    pub retention_threshold: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        let default_fill = BTreeMap::from([
            ("bank".to_string(), FillValue::Text("Unknown".to_string())),
            (
                "gender".to_string(),
                FillValue::Text("Not specified".to_string()),
            ),
            ("customvalueestimate".to_string(), FillValue::Number(0.0)),
        ]);
        Self {
            critical_columns: strings(&[
                "totalclaims",
                "totalpremium",
                "gender",
                "transactionmonth",
            ]),
            missing_threshold: 2,
            default_delimiter: b'|',
            sniff_sample_bytes: DEFAULT_SAMPLE_BYTES,
            chunk_size: Some(100_000),
            default_fill,
            categorical_columns: strings(&["covertype", "covercategory", "gender"]),
            columns_to_drop: strings(&[
                "numberofvehiclesinfleet",
                "crossborder",
                "rebuilt",
                "converted",
                "writtenoff",
            ]),
            date_column: Some("transactionmonth".to_string()),
            numeric_columns: strings(&["totalpremium", "totalclaims", "customvalueestimate"]),
            claim_metrics: true,
            quality_filters: QualityFilter::defaults(),
            retention_threshold: 0.90,
        }
    }
}

impl CleaningConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: CleaningConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config file {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating config directory {parent:?}"))?;
        }
        let serialized = serde_yaml::to_string(self).context("Serializing config")?;
        let mut file =
            File::create(path).with_context(|| format!("Creating config file {path:?}"))?;
        file.write_all(serialized.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.retention_threshold),
            "retention_threshold must be between 0 and 1 (got {})",
            self.retention_threshold
        );
        ensure!(
            self.sniff_sample_bytes > 0,
            "sniff_sample_bytes must be positive"
        );
        ensure!(
            self.default_delimiter.is_ascii() && self.default_delimiter != b'"',
            "default_delimiter must be an ASCII character other than '\"'"
        );
        for filter in &self.quality_filters {
            filter.validate()?;
        }
        Ok(())
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

mod delimiter_serde {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use crate::cli::parse_delimiter;

    pub fn serialize<S: Serializer>(value: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::printable_delimiter(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let raw = if raw == "\\t" { "tab" } else { raw.as_str() };
        parse_delimiter(raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_keys() {
        let yaml = "missing_threshold: 1\ndefault_delimiter: comma\nretention_threshold: 0.5\n";
        let config: CleaningConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.missing_threshold, 1);
        assert_eq!(config.default_delimiter, b',');
        assert_eq!(config.retention_threshold, 0.5);
        assert_eq!(config.columns_to_drop.len(), 5);
        assert_eq!(config.quality_filters, QualityFilter::defaults());
    }

    #[test]
    fn fill_values_accept_numbers_and_text() {
        let yaml = "default_fill:\n  bank: Unknown\n  customvalueestimate: 0\n";
        let config: CleaningConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(
            config.default_fill.get("bank"),
            Some(&FillValue::Text("Unknown".into()))
        );
        assert_eq!(
            config.default_fill.get("customvalueestimate"),
            Some(&FillValue::Number(0.0))
        );
    }

    #[test]
    fn save_and_load_preserve_config() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("conf").join("cleaning.yml");
        let config = CleaningConfig::default();
        config.save(&path).expect("save");
        let loaded = CleaningConfig::load(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let config = CleaningConfig {
            retention_threshold: 1.5,
            ..CleaningConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
