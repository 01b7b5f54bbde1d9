use crate::ForecastError;

/// Extra points required beyond one lookback before a model is fit.
pub const MIN_MARGIN: usize = 10;

/// One supervised example: `lookback` scaled prices and the next scaled price.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledWindow {
    pub input: Vec<f64>,
    pub target: f64,
}

/// Fails when `len < lookback + MIN_MARGIN`.
pub fn check_length(len: usize, lookback: usize) -> Result<(), ForecastError> {
    if lookback == 0 {
        return Err(ForecastError::InvalidConfig(
            "lookback must be at least 1".to_string(),
        ));
    }
    let needed = lookback + MIN_MARGIN;
    if len < needed {
        return Err(ForecastError::InsufficientData { needed, got: len });
    }
    Ok(())
}

/// Slide a `lookback`-wide window over `scaled`: exactly `len - lookback`
/// windows, window `i` targeting `scaled[i + lookback]`.
pub fn make_windows(scaled: &[f64], lookback: usize) -> Vec<ScaledWindow> {
    if lookback == 0 || scaled.len() <= lookback {
        return Vec::new();
    }
    scaled
        .windows(lookback + 1)
        .map(|w| ScaledWindow {
            input: w[..lookback].to_vec(),
            target: w[lookback],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_count_and_alignment() {
        for len in [11usize, 30, 90] {
            for lookback in [1usize, 5, 10] {
                let series: Vec<f64> = (0..len).map(|i| i as f64).collect();
                let windows = make_windows(&series, lookback);

                assert_eq!(windows.len(), len - lookback);
                for (i, w) in windows.iter().enumerate() {
                    assert_eq!(w.input.len(), lookback);
                    assert_eq!(w.input[0], i as f64);
                    assert_eq!(w.target, (i + lookback) as f64);
                }
            }
        }
    }

    #[test]
    fn test_too_short_series() {
        assert!(make_windows(&[1.0, 2.0], 2).is_empty());
        assert_eq!(
            check_length(29, 20),
            Err(ForecastError::InsufficientData { needed: 30, got: 29 })
        );
        assert!(check_length(30, 20).is_ok());
        assert!(check_length(100, 0).is_err());
    }
}
