/// Population variance of the present values, `None` when fewer than one value exists.
pub fn population_variance(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    if present.is_empty() {
        return None;
    }
    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    Some(present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n)
}

/// Minimum and maximum of the present finite values.
pub fn finite_min_max(values: &[Option<f64>]) -> Option<(f64, f64)> {
    values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variance_ignores_missing() {
        let v = population_variance(&[Some(1.0), None, Some(3.0)]).unwrap();
        assert!((v - 1.0).abs() < 1e-12);
    }

    #[test]
    fn variance_of_nothing_is_none() {
        assert_eq!(population_variance(&[None, None]), None);
        assert_eq!(population_variance(&[]), None);
    }

    #[test]
    fn min_max_skips_non_finite() {
        let mm = finite_min_max(&[Some(f64::NAN), Some(2.0), Some(-1.0), None]);
        assert_eq!(mm, Some((-1.0, 2.0)));
        assert_eq!(finite_min_max(&[None]), None);
    }
}
