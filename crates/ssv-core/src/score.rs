//! Per-row scores used to filter and sort the main heatmap.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::spreadsheet::Spreadsheet;

/// Correlation score of the grouping row against itself.
pub const SELF_CORRELATION_SCORE: f64 = f64::INFINITY;

/// Default ceiling for transformed correlation scores.
pub const DEFAULT_SCORE_CAP: f64 = 200.0;

/// Basis for selecting or ordering heatmap rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreType {
    #[default]
    Variance,
    Correlation,
    Original,
}

impl ScoreType {
    /// Score of row `idx`; higher ranks first.
    ///
    /// `None` when the backing array has not been populated.
    pub fn score(self, sheet: &Spreadsheet, idx: usize) -> Option<f64> {
        match self {
            ScoreType::Variance => sheet.variances().and_then(|v| v.get(idx).copied()),
            ScoreType::Correlation => sheet.correlations().and_then(|c| c.get(idx).copied()),
            ScoreType::Original => Some(-(idx as f64)),
        }
    }

    /// Whether this score can be computed for every row of `sheet` right now.
    pub fn is_available(self, sheet: &Spreadsheet) -> bool {
        match self {
            ScoreType::Variance => sheet.variances().is_some(),
            ScoreType::Correlation => sheet.correlations().is_some(),
            ScoreType::Original => true,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreType::Variance => "variance",
            ScoreType::Correlation => "correlation",
            ScoreType::Original => "original",
        }
    }
}

impl fmt::Display for ScoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ScoreType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "variance" => Ok(ScoreType::Variance),
            "correlation" => Ok(ScoreType::Correlation),
            "original" => Ok(ScoreType::Original),
            _ => Err(CoreError::InvalidArg {
                what: "score type must be variance, correlation or original",
            }),
        }
    }
}

/// Transform a raw p-value into a display score: `-10 * log10(p)`, capped.
pub fn pvalue_to_score(pvalue: f64, cap: f64) -> f64 {
    if !pvalue.is_finite() {
        return 0.0;
    }
    if pvalue <= 0.0 {
        return cap;
    }
    (-10.0 * pvalue.log10()).min(cap)
}

/// Descending comparison of two scores; NaN ranks after everything.
pub fn cmp_scores_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pvalue_transform() {
        assert!((pvalue_to_score(0.01, 200.0) - 20.0).abs() < 1e-9);
        assert_eq!(pvalue_to_score(1.0, 200.0), 0.0);
        assert_eq!(pvalue_to_score(1e-300, 200.0), 200.0);
        assert_eq!(pvalue_to_score(0.0, 200.0), 200.0);
        assert_eq!(pvalue_to_score(f64::NAN, 200.0), 0.0);
    }

    #[test]
    fn descending_order_puts_nan_last() {
        let mut scores = vec![0.5, f64::NAN, 2.0, f64::INFINITY, -1.0];
        scores.sort_by(|a, b| cmp_scores_desc(*a, *b));
        assert_eq!(scores[0], f64::INFINITY);
        assert_eq!(scores[1], 2.0);
        assert_eq!(scores[3], -1.0);
        assert!(scores[4].is_nan());
    }

    #[test]
    fn parse_score_type() {
        assert_eq!("Variance".parse::<ScoreType>().unwrap(), ScoreType::Variance);
        assert_eq!(" original ".parse::<ScoreType>().unwrap(), ScoreType::Original);
        assert!("entropy".parse::<ScoreType>().is_err());
    }
}
