//! Observability for the dice service.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `dice_rooms_active` | Gauge | none | Live rooms |
//! | `dice_connections_active` | Gauge | none | Connected rollers |
//! | `dice_rolls_total` | Counter | none | Resolved roll requests |
//! | `dice_dice_rolled_total` | Counter | none | Individual dice rolled |
//! | `dice_actor_panics_total` | Counter | `actor_type` | Actor task panics |
//! | `dice_errors_total` | Counter | `endpoint`, `status_code` | Rejected HTTP requests |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::{
    init_metrics_recorder, record_actor_panic, record_error, record_roll,
    set_connections_active, set_rooms_active,
};
