//! Routable board items
//!
//! The three item kinds the engine routes: trace segments, trace arcs, and
//! vias. Items carry geometry plus net/layer bookkeeping; identity lives in
//! the arena handle (`ItemId`), never in the item itself.

use crate::geom::{ArcShape, BBox, Chain, Circle, Seg, Shape, Vec2};
use serde::{Deserialize, Serialize};

/// Stable arena handle for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Copper layer index
pub type Layer = i32;

/// Net code; items on different nets may collide, same-joint geometry never
pub type Net = i32;

/// Inclusive span of copper layers a via passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRange {
    pub start: Layer,
    pub end: Layer,
}

impl LayerRange {
    pub fn single(layer: Layer) -> Self {
        Self {
            start: layer,
            end: layer,
        }
    }

    pub fn new(start: Layer, end: Layer) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn contains(&self, layer: Layer) -> bool {
        layer >= self.start && layer <= self.end
    }

    pub fn overlaps(&self, other: &LayerRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    pub fn iter(&self) -> impl Iterator<Item = Layer> {
        self.start..=self.end
    }
}

/// Straight trace segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentItem {
    pub a: Vec2,
    pub b: Vec2,
    pub width: i32,
    pub layer: Layer,
    pub net: Net,
    pub locked: bool,
}

/// Circular trace arc through start/mid/end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcItem {
    pub start: Vec2,
    pub mid: Vec2,
    pub end: Vec2,
    pub width: i32,
    pub layer: Layer,
    pub net: Net,
    pub locked: bool,
}

/// Via spanning one or more layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViaItem {
    pub pos: Vec2,
    pub diameter: i32,
    pub layers: LayerRange,
    pub net: Net,
    pub locked: bool,
}

/// A routable board object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Item {
    Segment(SegmentItem),
    Arc(ArcItem),
    Via(ViaItem),
}

impl Item {
    pub fn net(&self) -> Net {
        match self {
            Item::Segment(s) => s.net,
            Item::Arc(a) => a.net,
            Item::Via(v) => v.net,
        }
    }

    pub fn layers(&self) -> LayerRange {
        match self {
            Item::Segment(s) => LayerRange::single(s.layer),
            Item::Arc(a) => LayerRange::single(a.layer),
            Item::Via(v) => v.layers,
        }
    }

    pub fn locked(&self) -> bool {
        match self {
            Item::Segment(s) => s.locked,
            Item::Arc(a) => a.locked,
            Item::Via(v) => v.locked,
        }
    }

    pub fn is_trace(&self) -> bool {
        matches!(self, Item::Segment(_) | Item::Arc(_))
    }

    /// Collision shape of the item
    pub fn shape(&self) -> Shape {
        match self {
            Item::Segment(s) => Shape::ThickSegment {
                seg: Seg::new(s.a, s.b),
                width: s.width,
            },
            Item::Arc(a) => Shape::Arc(ArcShape {
                start: a.start,
                mid: a.mid,
                end: a.end,
                width: a.width,
            }),
            Item::Via(v) => Shape::Circle(Circle {
                center: v.pos,
                radius: v.diameter / 2,
            }),
        }
    }

    pub fn bbox(&self) -> BBox {
        self.shape().bbox()
    }

    /// Joint anchor points: (position, layer) pairs where the item
    /// terminates. Vias anchor on every layer they span.
    pub fn anchors(&self) -> Vec<(Vec2, Layer)> {
        match self {
            Item::Segment(s) => vec![(s.a, s.layer), (s.b, s.layer)],
            Item::Arc(a) => vec![(a.start, a.layer), (a.end, a.layer)],
            Item::Via(v) => v.layers.iter().map(|l| (v.pos, l)).collect(),
        }
    }

    /// The item rigidly translated by `delta`
    pub fn translated(&self, delta: Vec2) -> Item {
        match *self {
            Item::Segment(s) => Item::Segment(SegmentItem {
                a: s.a + delta,
                b: s.b + delta,
                ..s
            }),
            Item::Arc(a) => Item::Arc(ArcItem {
                start: a.start + delta,
                mid: a.mid + delta,
                end: a.end + delta,
                ..a
            }),
            Item::Via(v) => Item::Via(ViaItem {
                pos: v.pos + delta,
                ..v
            }),
        }
    }

    /// Endpoint vertices of a trace item (None for vias)
    pub fn endpoints(&self) -> Option<(Vec2, Vec2)> {
        match self {
            Item::Segment(s) => Some((s.a, s.b)),
            Item::Arc(a) => Some((a.start, a.end)),
            Item::Via(_) => None,
        }
    }

    /// Centerline polyline of a trace item (None for vias)
    pub fn polyline(&self) -> Option<Vec<Vec2>> {
        match self {
            Item::Segment(s) => Some(vec![s.a, s.b]),
            Item::Arc(a) => Some(
                ArcShape {
                    start: a.start,
                    mid: a.mid,
                    end: a.end,
                    width: a.width,
                }
                .to_polyline(),
            ),
            Item::Via(_) => None,
        }
    }
}

/// Identifies a via independent of which node currently owns the item.
/// Shove and walkaround may replace the underlying item across branches
/// while the caller keeps dragging "the same via".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViaHandle {
    pub pos: Vec2,
    pub layers: LayerRange,
    pub net: Net,
}

impl ViaHandle {
    pub fn of(via: &ViaItem) -> Self {
        Self {
            pos: via.pos,
            layers: via.layers,
            net: via.net,
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        match item {
            Item::Via(v) => v.pos == self.pos && v.layers == self.layers && v.net == self.net,
            _ => false,
        }
    }
}

/// Wire chain for trace items: thick chain on a single layer
pub fn chain_shape(points: Vec<Vec2>, width: i32) -> Shape {
    Shape::Chain(Chain::open(points, width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_via_anchors_span_layers() {
        let via = Item::Via(ViaItem {
            pos: Vec2::new(10, 20),
            diameter: 600,
            layers: LayerRange::new(0, 2),
            net: 1,
            locked: false,
        });
        let anchors = via.anchors();
        assert_eq!(anchors.len(), 3);
        assert!(anchors.iter().all(|&(p, _)| p == Vec2::new(10, 20)));
    }

    #[test]
    fn test_translated_preserves_width_and_net() {
        let seg = Item::Segment(SegmentItem {
            a: Vec2::ZERO,
            b: Vec2::new(100, 0),
            width: 250,
            layer: 0,
            net: 3,
            locked: false,
        });
        let moved = seg.translated(Vec2::new(0, 50));
        assert_eq!(moved.net(), 3);
        assert_eq!(moved.endpoints(), Some((Vec2::new(0, 50), Vec2::new(100, 50))));
    }

    #[test]
    fn test_via_handle_matches_replacement_item() {
        let v = ViaItem {
            pos: Vec2::new(5, 5),
            diameter: 600,
            layers: LayerRange::new(0, 1),
            net: 7,
            locked: false,
        };
        let handle = ViaHandle::of(&v);
        assert!(handle.matches(&Item::Via(v)));
        assert!(!handle.matches(&Item::Via(ViaItem {
            pos: Vec2::new(6, 5),
            ..v
        })));
    }
}
