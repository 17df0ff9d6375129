//! Drag session configuration
//!
//! Supplied by the surrounding application's settings system; the engine
//! only reads it. Serde derives let the host persist and ship these as
//! JSON alongside its other tool settings.

use serde::{Deserialize, Serialize};

/// Conflict resolution strategy applied on every cursor update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DragStrategy {
    /// Relocate and flag collisions, no avoidance
    MarkObstacles,
    /// Displace colliding neighbors out of the way
    #[default]
    Shove,
    /// Reroute the dragged line around obstacles
    Walkaround,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragSettings {
    pub strategy: DragStrategy,
    /// Free-angle dragging forces mark-obstacles regardless of `strategy`
    pub free_angle: bool,
    /// Permit committing a route that still violates clearance
    pub allow_drc_violations: bool,
    /// Merge collinear segments of the dragged line
    pub smooth_dragged_segments: bool,
    /// Let the optimizer touch the whole line, not just the changed region
    pub optimize_entire_track: bool,
    /// Hard cap on walkaround hull-hugging iterations
    pub walkaround_iteration_limit: u32,
    /// Hard cap on shove displacement iterations
    pub shove_iteration_limit: u32,
    /// Cap on corners a shoved line may accumulate; 0 disables the cap
    /// (via-fanout shoving runs uncapped regardless)
    pub shove_corner_limit: u32,
    /// Fraction of a segment's length (in 1/n units) counted as "near an
    /// endpoint" when choosing corner- vs segment-drag
    pub corner_grab_divisor: u32,
}

impl Default for DragSettings {
    fn default() -> Self {
        Self {
            strategy: DragStrategy::Shove,
            free_angle: false,
            allow_drc_violations: false,
            smooth_dragged_segments: true,
            optimize_entire_track: false,
            walkaround_iteration_limit: 40,
            shove_iteration_limit: 100,
            shove_corner_limit: 64,
            corner_grab_divisor: 4,
        }
    }
}
