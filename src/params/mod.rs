//! Explicit job configuration.
//!
//! Each remote job type has a parameter struct with defaults matching the
//! service's, local validation, and an encoding into request query pairs.

mod glm;
mod parse;
mod rf;
pub use glm::*;
pub use parse::*;
pub use rf::*;


use crate::JobKind;
use crate::Result;

/// Parameters of any job `start_job` can submit
#[derive(Debug, Clone, PartialEq)]
pub enum JobParams {
    Parse(ParseParams),
    RandomForest(RfParams),
    Glm(GlmParams),
}

impl JobParams {
    pub fn kind(&self) -> JobKind {
        match self {
            JobParams::Parse(_) => JobKind::Parse,
            JobParams::RandomForest(_) => JobKind::RandomForest,
            JobParams::Glm(_) => JobKind::Glm,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            JobParams::Parse(p) => p.validate(),
            JobParams::RandomForest(p) => p.validate(),
            JobParams::Glm(p) => p.validate(),
        }
    }
}

impl From<ParseParams> for JobParams {
    fn from(p: ParseParams) -> Self {
        JobParams::Parse(p)
    }
}

impl From<RfParams> for JobParams {
    fn from(p: RfParams) -> Self {
        JobParams::RandomForest(p)
    }
}

impl From<GlmParams> for JobParams {
    fn from(p: GlmParams) -> Self {
        JobParams::Glm(p)
    }
}

/// Fresh key for objects the caller did not name, e.g. `rf_V1StGXR8`
pub fn generate_key(prefix: &str) -> String {
    const ALPHABET: [char; 36] = [
        '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h',
        'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    ];
    format!("{prefix}_{}", nanoid::nanoid!(10, &ALPHABET))
}

pub(crate) type Query = Vec<(String, String)>;

pub(crate) fn push(
    query: &mut Query,
    name: &str,
    value: impl ToString,
) {
    query.push((name.to_string(), value.to_string()));
}

pub(crate) fn push_opt<T: ToString>(
    query: &mut Query,
    name: &str,
    value: Option<T>,
) {
    if let Some(v) = value {
        push(query, name, v);
    }
}
