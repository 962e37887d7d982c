//! Metrics definitions for the dice service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `dice_` prefix
//! - `_total` suffix for counters
//!
//! Labels are bounded: `actor_type` has two values (room, roller) and
//! `endpoint` is bounded by the route table.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Room & Connection Metrics (Gauges)
// ============================================================================

/// Set the number of live rooms.
///
/// Metric: `dice_rooms_active`
/// Labels: none
pub fn set_rooms_active(count: u64) {
    // u64 to f64 conversion is safe for realistic room counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("dice_rooms_active").set(count as f64);
}

/// Set the number of connected rollers.
///
/// Metric: `dice_connections_active`
/// Labels: none
pub fn set_connections_active(count: u64) {
    // u64 to f64 conversion is safe for realistic connection counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("dice_connections_active").set(count as f64);
}

// ============================================================================
// Roll Metrics (Counters)
// ============================================================================

/// Record one resolved roll request.
///
/// Metrics: `dice_rolls_total`, `dice_dice_rolled_total`
/// Labels: none
///
/// `dice` is the number of dice that produced an outcome (sizes 0 and 1
/// are not counted).
pub fn record_roll(dice: usize) {
    counter!("dice_rolls_total").increment(1);
    counter!("dice_dice_rolled_total").increment(dice as u64);
}

// ============================================================================
// Operational Metrics
// ============================================================================

/// Record an actor task that ended in a panic.
///
/// Metric: `dice_actor_panics_total`
/// Labels: `actor_type`
///
/// Any non-zero value indicates a bug.
pub fn record_actor_panic(actor_type: &str) {
    counter!("dice_actor_panics_total", "actor_type" => actor_type.to_string()).increment(1);
}

/// Record a request rejected at the HTTP boundary.
///
/// Metric: `dice_errors_total`
/// Labels: `endpoint`, `status_code`
pub fn record_error(endpoint: &str, status_code: u16) {
    counter!(
        "dice_errors_total",
        "endpoint" => endpoint.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    // These run against the global no-op recorder; they only prove the
    // helpers do not panic without an installed recorder.

    #[test]
    fn test_set_gauges() {
        set_rooms_active(0);
        set_rooms_active(25);
        set_connections_active(0);
        set_connections_active(1_000);
    }

    #[test]
    fn test_record_counters() {
        record_roll(0);
        record_roll(3);
        record_actor_panic("room");
        record_actor_panic("roller");
        record_error("create_room", 400);
    }

    #[test]
    fn test_record_roll_values() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_roll(2);
            record_roll(3);
        });

        let mut rolls = 0;
        let mut dice = 0;
        for (key, _, _, value) in snapshotter.snapshot().into_vec() {
            if let DebugValue::Counter(v) = value {
                match key.key().name() {
                    "dice_rolls_total" => rolls = v,
                    "dice_dice_rolled_total" => dice = v,
                    _ => {}
                }
            }
        }
        assert_eq!(rolls, 2);
        assert_eq!(dice, 5);
    }
}
