// src/config.rs
use crate::aggregate::AggregateOptions;
use crate::normalize::{NormalizeOptions, DEFAULT_KEY_LABEL};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Where one input file lives and how to clean it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetConfig {
    pub path: PathBuf,
    /// First cell of the header row.
    pub header_label: String,
    pub drop_columns: Vec<String>,
    pub rename: BTreeMap<String, String>,
}

impl DatasetConfig {
    /// Census-style income table: junk rows, then a `State` header.
    pub fn income(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            header_label: "State".into(),
            drop_columns: Vec::new(),
            rename: BTreeMap::new(),
        }
    }

    /// Metro home-value export keyed by `RegionName`.
    pub fn home_values(path: impl Into<PathBuf>) -> Self {
        let opts = NormalizeOptions::home_values();
        Self {
            path: path.into(),
            header_label: "RegionID".into(),
            drop_columns: opts.drop_columns,
            rename: opts.rename,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    /// Canonical entity-key column name shared by all normalized tables.
    pub key_label: String,
    /// Income table the trends are fitted on.
    pub training: DatasetConfig,
    /// Income table the forecasts are checked against and correlated.
    pub evaluation: DatasetConfig,
    /// Monthly home values, aggregated to years before correlating.
    pub home_values: DatasetConfig,
    pub aggregate: AggregateOptions,
    /// `None` (or `"all"` in the file) means every entity.
    pub entity: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            key_label: DEFAULT_KEY_LABEL.into(),
            training: DatasetConfig::income("household_income_2018.csv"),
            evaluation: DatasetConfig::income("household_income_2023.csv"),
            home_values: DatasetConfig::home_values("zillow_data.csv"),
            aggregate: AggregateOptions::default(),
            entity: None,
        }
    }
}

/// YAML layer: every field optional, merged over the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    key_label: Option<String>,
    training: DatasetFile,
    evaluation: DatasetFile,
    home_values: DatasetFile,
    aggregate: Option<AggregateOptions>,
    entity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DatasetFile {
    path: Option<PathBuf>,
    header_label: Option<String>,
    drop_columns: Option<Vec<String>>,
    rename: Option<BTreeMap<String, String>>,
}

impl DatasetFile {
    fn merge_into(self, base: &mut DatasetConfig) {
        if let Some(p) = self.path {
            base.path = p;
        }
        if let Some(h) = self.header_label {
            base.header_label = h;
        }
        if let Some(d) = self.drop_columns {
            base.drop_columns = d;
        }
        if let Some(r) = self.rename {
            base.rename = r;
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(text).context("parsing pipeline config")?;
        let mut cfg = Self::default();
        if let Some(k) = file.key_label {
            cfg.key_label = k;
        }
        file.training.merge_into(&mut cfg.training);
        file.evaluation.merge_into(&mut cfg.evaluation);
        file.home_values.merge_into(&mut cfg.home_values);
        if let Some(a) = file.aggregate {
            cfg.aggregate = a;
        }
        cfg.entity = file.entity;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Normalizer settings for `dataset`. Renames that target the default key
    /// column are pointed at `key_label` instead.
    pub fn normalize_options(&self, dataset: &DatasetConfig) -> NormalizeOptions {
        let rename = dataset
            .rename
            .iter()
            .map(|(from, to)| {
                let to = if to == DEFAULT_KEY_LABEL {
                    self.key_label.clone()
                } else {
                    to.clone()
                };
                (from.clone(), to)
            })
            .collect();
        NormalizeOptions {
            key_label: self.key_label.clone(),
            drop_columns: dataset.drop_columns.clone(),
            rename,
        }
    }

    /// The single entity to analyse, or `None` for all of them.
    pub fn selection(&self) -> Option<&str> {
        self.entity
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty() && !e.eq_ignore_ascii_case("all"))
    }
}
