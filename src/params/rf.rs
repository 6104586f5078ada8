use serde::Deserialize;
use serde::Serialize;

use crate::params::push;
use crate::params::push_opt;
use crate::params::Query;
use crate::DatasetRef;
use crate::Error;
use crate::Result;

/// Split criterion of the forest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    #[default]
    Entropy,
    Gini,
}

impl StatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatType::Entropy => "entropy",
            StatType::Gini => "gini",
        }
    }
}

/// Random Forest training options
#[derive(Debug, Clone, PartialEq)]
pub struct RfParams {
    /// Number of trees (`ntree`)
    pub trees: u32,
    pub depth: Option<u32>,
    /// Sampling rate in percent, 1..=100
    pub sample: Option<u32>,
    pub bin_limit: Option<u32>,
    pub stat_type: StatType,
    pub seed: Option<u64>,
    /// Response column; the last column when unset
    pub class_col: Option<u32>,
    pub ignore: Vec<u32>,
    /// Model key; generated when unset
    pub model_key: Option<String>,
}

impl Default for RfParams {
    fn default() -> Self {
        Self {
            trees: 5,
            depth: None,
            sample: None,
            bin_limit: None,
            stat_type: StatType::default(),
            seed: None,
            class_col: None,
            ignore: vec![],
            model_key: None,
        }
    }
}

impl RfParams {
    pub fn with_trees(trees: u32) -> Self {
        Self {
            trees,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.trees == 0 {
            return Err(Error::InvalidParams("trees must be at least 1".into()));
        }
        if self.depth == Some(0) {
            return Err(Error::InvalidParams("depth must be at least 1".into()));
        }
        if let Some(sample) = self.sample {
            if !(1..=100).contains(&sample) {
                return Err(Error::InvalidParams(format!(
                    "sample must be within 1..=100, got {sample}"
                )));
            }
        }
        if self.bin_limit == Some(0) {
            return Err(Error::InvalidParams("bin_limit must be at least 1".into()));
        }
        if let Some(class) = self.class_col {
            if self.ignore.contains(&class) {
                return Err(Error::InvalidParams(format!(
                    "class column {class} is also ignored"
                )));
            }
        }
        if let Some(key) = &self.model_key {
            if key.trim().is_empty() {
                return Err(Error::InvalidParams("model_key cannot be blank".into()));
            }
        }
        Ok(())
    }

    pub(crate) fn to_query(
        &self,
        data: &DatasetRef,
        model_key: &str,
    ) -> Query {
        let mut query = Query::new();
        push(&mut query, "data_key", data.key());
        push(&mut query, "model_key", model_key);
        push(&mut query, "ntree", self.trees);
        push_opt(&mut query, "depth", self.depth);
        push_opt(&mut query, "sample", self.sample);
        push_opt(&mut query, "bin_limit", self.bin_limit);
        push(&mut query, "stat_type", self.stat_type.as_str());
        push_opt(&mut query, "seed", self.seed);
        push_opt(&mut query, "class", self.class_col);
        if !self.ignore.is_empty() {
            let ignore: Vec<String> = self.ignore.iter().map(u32::to_string).collect();
            push(&mut query, "ignore", ignore.join(","));
        }
        query
    }
}
