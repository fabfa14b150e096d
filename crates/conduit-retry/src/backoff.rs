//! Backoff computation.

use conduit_common_config::RetryMode;
use std::time::Duration;

/// Delay before retry number `retry` (1-based).
///
/// Exponential mode yields `min(max, factor * 2^(retry - 1))`, fixed mode
/// yields `min(max, factor)`. Retry `0` means nothing has failed yet and
/// never waits. Negative or non-finite factors produce no delay.
pub fn compute_backoff(factor: f64, max: Duration, retry: u32, mode: RetryMode) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }

    let secs = match mode {
        RetryMode::Exponential => factor * 2f64.powi((retry - 1).min(1023) as i32),
        RetryMode::Fixed => factor,
    };

    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs.min(max.as_secs_f64())).unwrap_or(max)
}

/// Convert a seconds value from configuration into a duration, clamping
/// negative and non-finite values to zero.
pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MAX: Duration = Duration::from_secs(120);

    #[test]
    fn test_exponential_sequence() {
        let expected = [0.0, 0.8, 1.6, 3.2, 6.4, 12.8];
        for (k, want) in expected.iter().enumerate() {
            let got = compute_backoff(0.8, MAX, k as u32, RetryMode::Exponential);
            assert!((got.as_secs_f64() - want).abs() < 1e-6, "retry {k}: {got:?}");
        }
    }

    #[test]
    fn test_capped_at_max() {
        assert_eq!(
            compute_backoff(0.8, MAX, 20, RetryMode::Exponential),
            MAX
        );
        assert_eq!(
            compute_backoff(0.8, MAX, u32::MAX, RetryMode::Exponential),
            MAX
        );
    }

    #[test]
    fn test_fixed_mode() {
        for k in 1..5 {
            assert_eq!(
                compute_backoff(2.0, MAX, k, RetryMode::Fixed),
                Duration::from_secs(2)
            );
        }
        assert_eq!(
            compute_backoff(500.0, MAX, 1, RetryMode::Fixed),
            MAX
        );
    }

    #[test]
    fn test_degenerate_factors() {
        assert_eq!(
            compute_backoff(0.0, MAX, 3, RetryMode::Exponential),
            Duration::ZERO
        );
        assert_eq!(
            compute_backoff(-1.0, MAX, 3, RetryMode::Exponential),
            Duration::ZERO
        );
        assert_eq!(
            compute_backoff(f64::NAN, MAX, 3, RetryMode::Exponential),
            Duration::ZERO
        );
        assert_eq!(
            compute_backoff(f64::INFINITY, MAX, 3, RetryMode::Exponential),
            MAX
        );
    }

    #[test]
    fn test_secs_clamps() {
        assert_eq!(secs(1.5), Duration::from_millis(1500));
        assert_eq!(secs(-3.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
    }

    proptest! {
        #[test]
        fn backoff_follows_exponential_law(
            factor in 0.0f64..10.0,
            max_secs in 1u64..600,
            k in 1u32..40,
        ) {
            let max = Duration::from_secs(max_secs);
            let expected = (factor * 2f64.powi(k as i32 - 1)).min(max_secs as f64);
            let actual = compute_backoff(factor, max, k, RetryMode::Exponential);
            prop_assert!((actual.as_secs_f64() - expected).abs() < 1e-6);
            prop_assert!(actual <= max);
        }

        #[test]
        fn backoff_is_monotonic(factor in 0.0f64..10.0, k in 1u32..40) {
            let a = compute_backoff(factor, MAX, k, RetryMode::Exponential);
            let b = compute_backoff(factor, MAX, k + 1, RetryMode::Exponential);
            prop_assert!(a <= b);
        }
    }
}
