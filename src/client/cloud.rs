use serde::Deserialize;
use serde_json::Value;

/// Decoded `Cloud.json`: the membership view of one node
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CloudStatus {
    #[serde(default)]
    pub cloud_name: String,
    pub cloud_size: usize,
    /// Older service builds omit it; absent means agreed
    #[serde(default = "default_consensus")]
    pub consensus: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub nodes: Vec<Value>,
}

impl CloudStatus {
    /// True once this node sees exactly `expected` members and agrees on them
    pub fn is_formed(
        &self,
        expected: usize,
    ) -> bool {
        self.cloud_size == expected && self.consensus
    }
}

fn default_consensus() -> bool {
    true
}
