//! Interactive push-and-shove trace dragging for a PCB layout editor.
//!
//! The engine turns a cursor stream into legal board edits: grab a trace
//! segment, corner, or via, move the cursor, and the router relocates the
//! grabbed geometry while resolving clearance conflicts with one of three
//! strategies (mark obstacles, shove neighbors aside, walk around them).
//! All trial work happens on branch nodes layered over an immutable
//! world; nothing touches the board until the session commits.
//!
//! Module map:
//! - `geom` - integer vector/shape primitives and the collision oracle
//! - `item` - board items (segments, arcs, vias) and layer ranges
//! - `node` - branchable routing world with spatial index and joints
//! - `line` - multi-item electrical lines assembled from joints
//! - `settings` - drag session configuration
//! - `shove` - iterative neighbor displacement
//! - `walkaround` - hull-hugging obstacle avoidance
//! - `optimizer` - corner-reducing line simplification
//! - `dragger` - the session state machine callers drive
//! - `decorator` - debug annotation sink for visual tooling

pub mod decorator;
pub mod dragger;
pub mod geom;
pub mod item;
pub mod line;
pub mod node;
pub mod optimizer;
pub mod settings;
pub mod shove;
pub mod walkaround;

pub use decorator::{DebugDecorator, NullDecorator, RecordingDecorator};
pub use dragger::{DragState, Dragger};
pub use geom::{BBox, Vec2};
pub use item::{ArcItem, Item, ItemId, Layer, LayerRange, Net, SegmentItem, ViaHandle, ViaItem};
pub use line::Line;
pub use node::{RoutingNode, RuleResolver, UniformRules};
pub use settings::{DragSettings, DragStrategy};
pub use shove::ShoveStatus;
pub use walkaround::WalkaroundOutcome;
