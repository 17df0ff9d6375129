//! Integer geometry kernel for the routing engine
//!
//! # Submodules
//! - `primitives` - points, boxes, segment/polygon math on i32/i64/i128
//! - `shape` - the closed shape union and hull construction
//! - `collide` - the pairwise collision / clearance / MTV oracle

pub mod collide;
pub mod primitives;
pub mod shape;

pub use collide::{collide, collide_simple, Collision};
pub use primitives::{BBox, Vec2};
pub use shape::{ArcShape, Chain, Circle, Seg, Shape};
