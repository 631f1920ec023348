//! The trend engine: directional classification over a sample window.
//!
//! The slope method is a half-window comparison: the mean response time
//! of the newer half of the window against the mean of the older half
//! (the middle sample of an odd-sized window belongs to neither). The
//! relative difference is compared against the configured threshold,
//! and the error rate of each half guards the classification:
//!
//! - `degrading`: relative slope above the threshold, or the newer
//!   half's error rate exceeds the older half's
//! - `improving`: relative slope below the negative threshold and the
//!   error rate is non-increasing
//! - `stable`: everything else
//!
//! Fewer than `min_samples` samples always yields a low-confidence
//! `stable` -- sparse data never makes a strong claim. Confidence
//! otherwise scales with how full the window is.

use foundry_core::config::HealthConfig;
use foundry_types::{HealthSample, HealthStatus, ServiceTrend, TrendDirection};

/// Classify the trend of one service from its sample window
/// (oldest first).
pub fn classify(samples: &[HealthSample], config: &HealthConfig) -> ServiceTrend {
    let count = samples.len();
    if count < config.min_samples {
        return ServiceTrend::sparse(count);
    }

    let half = count / 2;
    let older = samples.get(..half).unwrap_or_default();
    let newer = samples.get(count.saturating_sub(half)..).unwrap_or_default();

    let older_avg = mean_response_time(older);
    let newer_avg = mean_response_time(newer);
    let relative_slope = (newer_avg - older_avg) / older_avg.max(1.0);

    let older_errors = error_rate(older);
    let newer_errors = error_rate(newer);

    let direction = if relative_slope > config.slope_threshold || newer_errors > older_errors
    {
        TrendDirection::Degrading
    } else if relative_slope < -config.slope_threshold && newer_errors <= older_errors {
        TrendDirection::Improving
    } else {
        TrendDirection::Stable
    };

    ServiceTrend {
        direction,
        confidence: confidence_for(count, config.window_size),
        sample_count: count,
    }
}

/// Relative response-time change between window halves, for
/// recommendation messages ("response time increased N% over window").
pub fn relative_change(samples: &[HealthSample]) -> f64 {
    let count = samples.len();
    if count < 2 {
        return 0.0;
    }
    let half = count / 2;
    let older = samples.get(..half).unwrap_or_default();
    let newer = samples.get(count.saturating_sub(half)..).unwrap_or_default();
    let older_avg = mean_response_time(older);
    let newer_avg = mean_response_time(newer);
    (newer_avg - older_avg) / older_avg.max(1.0)
}

/// Fraction of samples with a non-healthy status.
pub fn error_rate(samples: &[HealthSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let errors = samples
        .iter()
        .filter(|s| s.status != HealthStatus::Healthy)
        .count();
    #[allow(clippy::cast_precision_loss)]
    let rate = errors as f64 / samples.len() as f64;
    rate
}

fn mean_response_time(samples: &[HealthSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let sum: f64 = samples.iter().map(|s| s.response_time_ms as f64).sum();
    #[allow(clippy::cast_precision_loss)]
    let len = samples.len() as f64;
    sum / len
}

/// Confidence grows linearly from 0.5 at the minimum toward 1.0 at a
/// full window.
fn confidence_for(count: usize, window_size: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let fill = count as f64 / window_size.max(1) as f64;
    (0.5 + 0.5 * fill).min(1.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use foundry_types::ServiceName;

    use super::*;

    fn samples_from(times: &[u64]) -> Vec<HealthSample> {
        times
            .iter()
            .map(|&ms| HealthSample {
                service: ServiceName::new("svc"),
                status: HealthStatus::Healthy,
                response_time_ms: ms,
                errors: Vec::new(),
                timestamp: Utc::now(),
            })
            .collect()
    }

    fn config() -> HealthConfig {
        HealthConfig {
            min_samples: 5,
            window_size: 20,
            slope_threshold: 0.10,
            ..HealthConfig::default()
        }
    }

    #[test]
    fn rising_response_times_degrade() {
        let samples = samples_from(&[100, 110, 120, 130, 140]);
        let trend = classify(&samples, &config());
        assert_eq!(trend.direction, TrendDirection::Degrading);
        assert_eq!(trend.sample_count, 5);
    }

    #[test]
    fn falling_response_times_improve() {
        let samples = samples_from(&[140, 130, 120, 110, 100]);
        let trend = classify(&samples, &config());
        assert_eq!(trend.direction, TrendDirection::Improving);
    }

    #[test]
    fn flat_response_times_are_stable() {
        let samples = samples_from(&[120, 118, 121, 119, 120]);
        let trend = classify(&samples, &config());
        assert_eq!(trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn sparse_windows_never_claim_direction() {
        // Steeply rising, but below the minimum sample count.
        let samples = samples_from(&[100, 200, 400]);
        let trend = classify(&samples, &config());
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert!(trend.confidence < 0.5);
        assert_eq!(trend.sample_count, 3);
    }

    #[test]
    fn rising_error_rate_degrades_despite_flat_times() {
        let mut samples = samples_from(&[100, 100, 100, 100, 100, 100]);
        // The newer half starts failing.
        for sample in samples.iter_mut().skip(4) {
            sample.status = HealthStatus::Unhealthy;
            sample.errors.push("boom".to_owned());
        }
        let trend = classify(&samples, &config());
        assert_eq!(trend.direction, TrendDirection::Degrading);
    }

    #[test]
    fn falling_times_with_rising_errors_are_not_improving() {
        let mut samples = samples_from(&[200, 190, 150, 120, 100, 90]);
        for sample in samples.iter_mut().skip(4) {
            sample.status = HealthStatus::Degraded;
        }
        let trend = classify(&samples, &config());
        assert_ne!(trend.direction, TrendDirection::Improving);
    }

    #[test]
    fn confidence_scales_with_window_fill() {
        let sparse = classify(&samples_from(&[100; 5]), &config());
        let full = classify(&samples_from(&[100; 20]), &config());
        assert!(full.confidence > sparse.confidence);
        assert!((full.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn error_rate_counts_non_healthy() {
        let mut samples = samples_from(&[1, 2, 3, 4]);
        samples.get_mut(0).unwrap().status = HealthStatus::Degraded;
        samples.get_mut(1).unwrap().status = HealthStatus::Unhealthy;
        assert!((error_rate(&samples) - 0.5).abs() < f64::EPSILON);
    }
}
