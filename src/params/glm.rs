use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::params::push;
use crate::params::push_opt;
use crate::params::Query;
use crate::DatasetRef;
use crate::Error;
use crate::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Family {
    #[default]
    Gaussian,
    Binomial,
    Poisson,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Gaussian => "gaussian",
            Family::Binomial => "binomial",
            Family::Poisson => "poisson",
        }
    }
}

impl FromStr for Family {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gaussian" => Ok(Family::Gaussian),
            "binomial" => Ok(Family::Binomial),
            "poisson" => Ok(Family::Poisson),
            other => Err(Error::InvalidParams(format!("unknown family {other:?}"))),
        }
    }
}

/// Regularization penalty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Norm {
    None,
    L1,
    L2,
}

impl Norm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Norm::None => "NONE",
            Norm::L1 => "L1",
            Norm::L2 => "L2",
        }
    }
}

/// Columns by index: `3`, `0,1,15` or an inclusive range `40:53`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelection {
    Columns(Vec<u32>),
    Range(u32, u32),
}

impl ColumnSelection {
    pub fn single(col: u32) -> Self {
        ColumnSelection::Columns(vec![col])
    }

    pub fn contains(
        &self,
        col: u32,
    ) -> bool {
        match self {
            ColumnSelection::Columns(cols) => cols.contains(&col),
            ColumnSelection::Range(lo, hi) => (*lo..=*hi).contains(&col),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            ColumnSelection::Columns(cols) => cols.is_empty(),
            ColumnSelection::Range(lo, hi) => lo > hi,
        }
    }
}

impl fmt::Display for ColumnSelection {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ColumnSelection::Columns(cols) => {
                let cols: Vec<String> = cols.iter().map(u32::to_string).collect();
                write!(f, "{}", cols.join(","))
            }
            ColumnSelection::Range(lo, hi) => write!(f, "{lo}:{hi}"),
        }
    }
}

impl FromStr for ColumnSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidParams(format!("invalid column selection {s:?}"));
        if let Some((lo, hi)) = s.split_once(':') {
            let lo = lo.trim().parse().map_err(|_| invalid())?;
            let hi = hi.trim().parse().map_err(|_| invalid())?;
            return Ok(ColumnSelection::Range(lo, hi));
        }
        let cols = s
            .split(',')
            .map(|c| c.trim().parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;
        Ok(ColumnSelection::Columns(cols))
    }
}

/// GLM training options
#[derive(Debug, Clone, PartialEq)]
pub struct GlmParams {
    /// Response column (`Y`)
    pub y: u32,
    /// Predictor columns (`X`); every other column when unset
    pub x: Option<ColumnSelection>,
    /// Columns excluded from the predictors (`-X`)
    pub negative_x: Option<ColumnSelection>,
    pub family: Family,
    /// Cross-validation folds; 0 disables it
    pub xval: Option<u32>,
    /// Decision threshold, binomial only
    pub threshold: Option<f64>,
    pub norm: Option<Norm>,
    pub lambda: Option<f64>,
    pub rho: Option<f64>,
    pub alpha: Option<f64>,
}

impl GlmParams {
    pub fn new(y: u32) -> Self {
        Self {
            y,
            x: None,
            negative_x: None,
            family: Family::default(),
            xval: None,
            threshold: None,
            norm: None,
            lambda: None,
            rho: None,
            alpha: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, selection) in [("X", &self.x), ("-X", &self.negative_x)] {
            if let Some(selection) = selection {
                if selection.is_empty() {
                    return Err(Error::InvalidParams(format!("{name} selects no columns")));
                }
                if selection.contains(self.y) {
                    return Err(Error::InvalidParams(format!(
                        "{name} {selection} contains response column {}",
                        self.y
                    )));
                }
            }
        }
        if self.xval == Some(1) {
            return Err(Error::InvalidParams(
                "xval must be 0 or at least 2 folds".into(),
            ));
        }
        if let Some(threshold) = self.threshold {
            if self.family != Family::Binomial {
                return Err(Error::InvalidParams(
                    "threshold only applies to the binomial family".into(),
                ));
            }
            if !(0.0..=1.0).contains(&threshold) {
                return Err(Error::InvalidParams(format!(
                    "threshold must be within [0, 1], got {threshold}"
                )));
            }
        }
        for (name, value) in [
            ("lambda", self.lambda),
            ("rho", self.rho),
            ("alpha", self.alpha),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(Error::InvalidParams(format!(
                        "{name} must be a non-negative number, got {v}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn to_query(
        &self,
        data: &DatasetRef,
    ) -> Query {
        let mut query = Query::new();
        push(&mut query, "key", data.key());
        push(&mut query, "Y", self.y);
        push_opt(&mut query, "X", self.x.as_ref());
        push_opt(&mut query, "-X", self.negative_x.as_ref());
        push(&mut query, "family", self.family.as_str());
        push_opt(&mut query, "xval", self.xval);
        push_opt(&mut query, "threshold", self.threshold);
        push_opt(&mut query, "norm", self.norm.map(|n| n.as_str()));
        push_opt(&mut query, "lambda", self.lambda);
        push_opt(&mut query, "rho", self.rho);
        push_opt(&mut query, "alpha", self.alpha);
        query
    }
}

/// Options [`GlmParamSpace::sample`] may overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlmOption {
    Y,
    X,
    NegativeX,
    Family,
    Xval,
    Threshold,
    Norm,
    Lambda,
    Rho,
    Alpha,
}

const GLM_OPTIONS: [GlmOption; 10] = [
    GlmOption::Y,
    GlmOption::X,
    GlmOption::NegativeX,
    GlmOption::Family,
    GlmOption::Xval,
    GlmOption::Threshold,
    GlmOption::Norm,
    GlmOption::Lambda,
    GlmOption::Rho,
    GlmOption::Alpha,
];

/// Candidate values for randomized GLM trials
#[derive(Debug, Clone, PartialEq)]
pub struct GlmParamSpace {
    pub y: Vec<u32>,
    pub x: Vec<u32>,
    pub negative_x: Vec<Option<ColumnSelection>>,
    pub family: Vec<Family>,
    pub xval: Vec<u32>,
    pub threshold: Vec<f64>,
    pub norm: Vec<Norm>,
    pub lambda: Vec<Option<f64>>,
    pub rho: Vec<Option<f64>>,
    pub alpha: Vec<Option<f64>>,
}

/// One sampled trial
#[derive(Debug, Clone, PartialEq)]
pub struct GlmTrial {
    pub params: GlmParams,
    /// The predictor column picked for `X`, when it was sampled
    pub x_col: Option<u32>,
}

impl Default for GlmParamSpace {
    /// The covtype space: response column 54, binomial only
    fn default() -> Self {
        let magnitudes = vec![None, Some(1e-4), Some(1.0), Some(10.0), Some(1e4)];
        Self {
            y: vec![54],
            x: vec![0, 1, 15, 33, 34],
            negative_x: vec![None, Some(ColumnSelection::Range(40, 53))],
            family: vec![Family::Binomial],
            xval: vec![2, 3, 4, 9, 15],
            threshold: vec![0.1, 0.5, 0.7, 0.9],
            norm: vec![Norm::L1, Norm::L2],
            lambda: magnitudes.clone(),
            rho: magnitudes.clone(),
            alpha: magnitudes,
        }
    }
}

impl GlmParamSpace {
    /// Overlays a random group of options on `base`.
    ///
    /// The group size is uniform in `1..=10`; each draw picks an option
    /// uniformly (repeats allowed) and a value from its candidates. Options
    /// with no candidates are left as in `base`.
    pub fn sample<R: Rng>(
        &self,
        base: &GlmParams,
        rng: &mut R,
    ) -> GlmTrial {
        let mut params = base.clone();
        let mut x_col = None;
        let group_size = rng.gen_range(1..=GLM_OPTIONS.len());
        for _ in 0..group_size {
            let option = GLM_OPTIONS[rng.gen_range(0..GLM_OPTIONS.len())];
            match option {
                GlmOption::Y => {
                    if let Some(y) = self.y.choose(rng) {
                        params.y = *y;
                    }
                }
                GlmOption::X => {
                    if let Some(x) = self.x.choose(rng) {
                        params.x = Some(ColumnSelection::single(*x));
                        x_col = Some(*x);
                    }
                }
                GlmOption::NegativeX => {
                    if let Some(nx) = self.negative_x.choose(rng) {
                        params.negative_x = nx.clone();
                    }
                }
                GlmOption::Family => {
                    if let Some(f) = self.family.choose(rng) {
                        params.family = *f;
                    }
                }
                GlmOption::Xval => {
                    if let Some(v) = self.xval.choose(rng) {
                        params.xval = Some(*v);
                    }
                }
                GlmOption::Threshold => {
                    if let Some(t) = self.threshold.choose(rng) {
                        params.threshold = Some(*t);
                    }
                }
                GlmOption::Norm => {
                    if let Some(n) = self.norm.choose(rng) {
                        params.norm = Some(*n);
                    }
                }
                GlmOption::Lambda => {
                    if let Some(v) = self.lambda.choose(rng) {
                        params.lambda = *v;
                    }
                }
                GlmOption::Rho => {
                    if let Some(v) = self.rho.choose(rng) {
                        params.rho = *v;
                    }
                }
                GlmOption::Alpha => {
                    if let Some(v) = self.alpha.choose(rng) {
                        params.alpha = *v;
                    }
                }
            }
        }
        GlmTrial { params, x_col }
    }
}
