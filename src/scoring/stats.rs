//! Series statistics shared by the scorers.
//!
//! Standard deviations here are population deviations (divide by N).

use statrs::statistics::Statistics;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().mean())
    }
}

pub fn population_std(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().population_std_dev())
    }
}

/// Least-squares slope of `values` against their index
pub fn linear_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().mean();

    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    Some(num / den)
}

/// Fractional change from the first to the last value
pub fn relative_change(values: &[f64]) -> Option<f64> {
    match (values.first(), values.last()) {
        (Some(first), Some(last)) if values.len() >= 2 && *first > 0.0 => Some((last - first) / first),
        _ => None,
    }
}

/// Mean of the later half over the mean of the earlier half, minus one
pub fn half_over_half(values: &[f64]) -> Option<f64> {
    if values.len() < 4 {
        return None;
    }
    let mid = values.len() / 2;
    let earlier = values[..mid].iter().mean();
    let later = values[values.len() - mid..].iter().mean();
    if earlier > 0.0 {
        Some(later / earlier - 1.0)
    } else {
        None
    }
}

/// Population std of simple period returns
pub fn return_volatility(prices: &[f64]) -> Option<f64> {
    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if returns.len() < 2 {
        return None;
    }
    population_std(&returns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_population_std() {
        assert_relative_eq!(population_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap(), 2.0, epsilon = 1e-12);
        assert!(population_std(&[]).is_none());
    }

    #[test]
    fn test_linear_slope() {
        assert_relative_eq!(linear_slope(&[1.0, 3.0, 5.0, 7.0]).unwrap(), 2.0);
        assert_relative_eq!(linear_slope(&[5.0, 5.0, 5.0]).unwrap(), 0.0);
        assert!(linear_slope(&[1.0]).is_none());
    }

    #[test]
    fn test_relative_change() {
        assert_relative_eq!(relative_change(&[100.0, 90.0, 125.0]).unwrap(), 0.25, epsilon = 1e-12);
        assert!(relative_change(&[0.0, 10.0]).is_none());
        assert!(relative_change(&[10.0]).is_none());
    }

    #[test]
    fn test_half_over_half() {
        assert_relative_eq!(half_over_half(&[10.0, 10.0, 20.0, 20.0]).unwrap(), 1.0);
        // odd lengths compare equal-sized halves, skipping the middle
        assert_relative_eq!(half_over_half(&[10.0, 10.0, 99.0, 15.0, 15.0]).unwrap(), 0.5);
        assert!(half_over_half(&[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn test_return_volatility() {
        let flat = return_volatility(&[1.0, 1.0, 1.0, 1.0]).unwrap();
        assert!(flat.abs() < 1e-12);
        // returns +1.0, -0.5 -> population std 0.75
        assert_relative_eq!(return_volatility(&[1.0, 2.0, 1.0]).unwrap(), 0.75, epsilon = 1e-12);
    }
}
