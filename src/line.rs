//! Line assembly
//!
//! A `Line` is the ordered run of trace items between two joints, treated
//! as one draggable unit. Assembly starts from a seed item and extends in
//! both directions while the joints it crosses are simple passthroughs
//! (exactly two trace items). The seed's index within the run is kept so
//! later operations can re-locate the dragged piece.

use crate::geom::primitives::point_segment_distance;
use crate::geom::{Chain, Shape, Vec2};
use crate::item::{Item, ItemId, Layer, Net, SegmentItem};
use crate::node::RoutingNode;
use indexmap::IndexSet;

/// Assembled electrical path between two joints
#[derive(Debug, Clone)]
pub struct Line {
    /// Constituent item ids, ordered end to end
    pub items: Vec<ItemId>,
    /// Centerline polyline (arcs flattened), oriented with `items`
    pub points: Vec<Vec2>,
    pub width: i32,
    pub layer: Layer,
    pub net: Net,
    /// Index of the seed item within `items`
    pub seed_index: usize,
}

impl Line {
    /// Assemble the line containing `seed`. Returns None when the seed is
    /// not a trace item.
    pub fn assemble(node: &RoutingNode, seed: ItemId) -> Option<Line> {
        let seed_item = node.get(seed);
        let (width, layer, net) = match seed_item {
            Item::Segment(s) => (s.width, s.layer, s.net),
            Item::Arc(a) => (a.width, a.layer, a.net),
            Item::Via(_) => return None,
        };
        let (seed_a, seed_b) = seed_item.endpoints()?;

        let back = walk(node, seed, seed_a, width, layer, net);
        let forward = walk(node, seed, seed_b, width, layer, net);

        // back is ordered outward from the seed; reverse it to get
        // end-to-end order
        let mut items: Vec<ItemId> = back.iter().rev().copied().collect();
        let seed_index = items.len();
        items.push(seed);
        items.extend(forward.iter().copied());

        // Stitch centerlines, orienting each item to continue the chain
        let first_start = if let Some(&first) = back.last() {
            far_end(node, first, shared_anchor(node, &items, 0))
        } else {
            seed_a
        };
        let mut points = vec![first_start];
        let mut cursor = first_start;
        for &id in &items {
            let mut poly = node.get(id).polyline()?;
            if *poly.last().unwrap() == cursor {
                poly.reverse();
            }
            debug_assert_eq!(poly[0], cursor);
            cursor = *poly.last().unwrap();
            points.extend(poly.into_iter().skip(1));
        }
        points.dedup();

        Some(Line {
            items,
            points,
            width,
            layer,
            net,
            seed_index,
        })
    }

    /// A line from bare geometry, not (yet) backed by node items
    pub fn from_points(points: Vec<Vec2>, width: i32, layer: Layer, net: Net) -> Line {
        Line {
            items: Vec::new(),
            points,
            width,
            layer,
            net,
            seed_index: 0,
        }
    }

    pub fn endpoints(&self) -> (Vec2, Vec2) {
        (*self.points.first().unwrap(), *self.points.last().unwrap())
    }

    /// Collision shape of the whole line
    pub fn shape(&self) -> Shape {
        Shape::Chain(Chain::open(self.points.clone(), self.width))
    }

    pub fn length(&self) -> i64 {
        self.points
            .windows(2)
            .map(|w| w[0].distance(w[1]))
            .sum()
    }

    /// Interior corner count (vertices excluding the two endpoints)
    pub fn corner_count(&self) -> usize {
        self.points.len().saturating_sub(2)
    }

    /// Remove this line's items from `node` and insert segments tracing
    /// `new_points` instead. Returns the rewritten line. Consecutive
    /// duplicate points are dropped and back-tracking collinear tails are
    /// collapsed, so the written run never overlaps itself along a
    /// straight; a line needs at least two vertices.
    pub fn replace_in(&self, node: &RoutingNode, new_points: Vec<Vec2>) -> Line {
        // Midpoint of the current seed item, captured before removal, so
        // the rewritten run can keep pointing at the dragged piece
        let seed_mid = self
            .items
            .get(self.seed_index)
            .and_then(|&id| node.get(id).endpoints())
            .map(|(a, b)| Vec2::new((a.x + b.x) / 2, (a.y + b.y) / 2));

        for &id in &self.items {
            node.remove(id);
        }
        let mut pts = new_points;
        collapse_spikes(&mut pts);
        let mut items = Vec::new();
        for w in pts.windows(2) {
            items.push(node.add(Item::Segment(SegmentItem {
                a: w[0],
                b: w[1],
                width: self.width,
                layer: self.layer,
                net: self.net,
                locked: false,
            })));
        }
        let seed_index = match seed_mid {
            Some(m) => pts
                .windows(2)
                .enumerate()
                .min_by_key(|(_, w)| point_segment_distance(m, w[0], w[1]))
                .map(|(i, _)| i)
                .unwrap_or(0),
            None => 0,
        };
        Line {
            seed_index,
            items,
            points: pts,
            width: self.width,
            layer: self.layer,
            net: self.net,
        }
    }

    /// Ids as a skip set for collision queries
    pub fn id_set(&self) -> IndexSet<ItemId> {
        self.items.iter().copied().collect()
    }
}

/// Drop duplicates and interior vertices where the path reverses onto
/// itself along the same straight. Such tails appear when a whole run is
/// translated while its end joints stay anchored; left in place they read
/// as the line colliding with its own body.
fn collapse_spikes(pts: &mut Vec<Vec2>) {
    loop {
        pts.dedup();
        let before = pts.len();
        let mut i = 1;
        while i + 1 < pts.len() {
            let a = pts[i] - pts[i - 1];
            let b = pts[i + 1] - pts[i];
            if a.cross(b) == 0 && a.dot(b) < 0 {
                pts.remove(i);
                if i > 1 {
                    i -= 1;
                }
            } else {
                i += 1;
            }
        }
        if pts.len() == before {
            return;
        }
    }
}

/// Walk outward from `seed` through the anchor at `from`, collecting items
/// while every joint crossed is a simple passthrough with matching width.
fn walk(
    node: &RoutingNode,
    seed: ItemId,
    from: Vec2,
    width: i32,
    layer: Layer,
    net: Net,
) -> Vec<ItemId> {
    let mut out = Vec::new();
    let mut prev = seed;
    let mut pos = from;
    loop {
        if !node.joint_is_passthrough(pos, layer, net) {
            break;
        }
        let joint = match node.find_joint(pos, layer, net) {
            Some(j) => j,
            None => break,
        };
        let next = match joint.items.iter().copied().find(|&id| id != prev) {
            Some(n) => n,
            None => break,
        };
        let item = node.get(next);
        let matches_run = match item {
            Item::Segment(s) => s.width == width,
            Item::Arc(a) => a.width == width,
            Item::Via(_) => false,
        };
        if !matches_run || out.contains(&next) || next == seed {
            break;
        }
        let (a, b) = match item.endpoints() {
            Some(e) => e,
            None => break,
        };
        out.push(next);
        pos = if a == pos { b } else { a };
        prev = next;
    }
    out
}

/// Endpoint of `id` away from `near`
fn far_end(node: &RoutingNode, id: ItemId, near: Vec2) -> Vec2 {
    let (a, b) = node.get(id).endpoints().expect("trace item");
    if a == near {
        b
    } else {
        a
    }
}

/// Anchor shared between items[i] and items[i + 1]
fn shared_anchor(node: &RoutingNode, items: &[ItemId], i: usize) -> Vec2 {
    let (a0, b0) = node.get(items[i]).endpoints().expect("trace item");
    if items.len() < 2 {
        return a0;
    }
    let (a1, b1) = node.get(items[i + 1]).endpoints().expect("trace item");
    if a0 == a1 || a0 == b1 {
        a0
    } else {
        debug_assert!(b0 == a1 || b0 == b1);
        b0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ViaItem;
    use crate::item::LayerRange;
    use crate::node::RoutingNode;
    use std::rc::Rc;

    fn seg(node: &RoutingNode, a: Vec2, b: Vec2) -> ItemId {
        node.add(Item::Segment(SegmentItem {
            a,
            b,
            width: 100,
            layer: 0,
            net: 1,
            locked: false,
        }))
    }

    #[test]
    fn test_assemble_three_segment_run() {
        let world = Rc::new(RoutingNode::new_world());
        let p = |x| Vec2::new(x, 0);
        let s0 = seg(&world, p(0), p(1000));
        let s1 = seg(&world, p(1000), p(2000));
        let s2 = seg(&world, p(2000), p(3000));

        let line = Line::assemble(&world, s1).unwrap();
        assert_eq!(line.items, vec![s0, s1, s2]);
        assert_eq!(line.seed_index, 1);
        assert_eq!(line.points, vec![p(0), p(1000), p(2000), p(3000)]);
        assert_eq!(line.endpoints(), (p(0), p(3000)));
    }

    #[test]
    fn test_assembly_stops_at_via() {
        let world = Rc::new(RoutingNode::new_world());
        let p = |x| Vec2::new(x, 0);
        let s0 = seg(&world, p(0), p(1000));
        let s1 = seg(&world, p(1000), p(2000));
        world.add(Item::Via(ViaItem {
            pos: p(2000),
            diameter: 600,
            layers: LayerRange::new(0, 1),
            net: 1,
            locked: false,
        }));
        let s2 = seg(&world, p(2000), p(3000));

        let line = Line::assemble(&world, s0).unwrap();
        // Via joint at x=2000 has three members, so the run ends there
        assert_eq!(line.items, vec![s0, s1]);
        assert!(!line.items.contains(&s2));
    }

    #[test]
    fn test_assembly_stops_at_tee() {
        let world = Rc::new(RoutingNode::new_world());
        let s0 = seg(&world, Vec2::new(0, 0), Vec2::new(1000, 0));
        let _s1 = seg(&world, Vec2::new(1000, 0), Vec2::new(2000, 0));
        let _tee = seg(&world, Vec2::new(1000, 0), Vec2::new(1000, 1000));

        let line = Line::assemble(&world, s0).unwrap();
        assert_eq!(line.items, vec![s0]);
    }

    #[test]
    fn test_replace_in_rewrites_items() {
        let world = Rc::new(RoutingNode::new_world());
        let p = |x, y| Vec2::new(x, y);
        let s0 = seg(&world, p(0, 0), p(1000, 0));
        let s1 = seg(&world, p(1000, 0), p(2000, 0));

        let trial = world.branch();
        let line = Line::assemble(&trial, s0).unwrap();
        let new_line = line.replace_in(
            &trial,
            vec![p(0, 0), p(1000, 500), p(2000, 0)],
        );
        assert!(!trial.contains(s0));
        assert!(!trial.contains(s1));
        assert_eq!(new_line.items.len(), 2);
        assert_eq!(new_line.endpoints(), (p(0, 0), p(2000, 0)));
    }

    #[test]
    fn test_replace_in_collapses_backtracking_tail() {
        let world = Rc::new(RoutingNode::new_world());
        let p = |x, y| Vec2::new(x, y);
        let s0 = seg(&world, p(0, 0), p(2000, 0));

        let trial = world.branch();
        let line = Line::assemble(&trial, s0).unwrap();
        // A translated run whose end stayed anchored doubles back on
        // itself; the rewrite must not emit the overlapping tail
        let new_line = line.replace_in(
            &trial,
            vec![p(0, 0), p(1000, 0), p(2500, 0), p(1500, 0)],
        );
        assert_eq!(
            new_line.points,
            vec![p(0, 0), p(1000, 0), p(1500, 0)]
        );
        // No pair of written segments overlaps along the straight
        for (i, &a) in new_line.items.iter().enumerate() {
            for &b in &new_line.items[i + 1..] {
                let (a1, a2) = trial.get(a).endpoints().unwrap();
                let (b1, b2) = trial.get(b).endpoints().unwrap();
                let ax = (a1.x.min(a2.x), a1.x.max(a2.x));
                let bx = (b1.x.min(b2.x), b1.x.max(b2.x));
                assert!(ax.1 <= bx.0 || bx.1 <= ax.0);
            }
        }
    }

    #[test]
    fn test_replace_in_tracks_seed_segment() {
        let world = Rc::new(RoutingNode::new_world());
        let p = |x, y| Vec2::new(x, y);
        seg(&world, p(0, 0), p(1000, 0));
        let s1 = seg(&world, p(1000, 0), p(2000, 0));
        seg(&world, p(2000, 0), p(3000, 0));

        let trial = world.branch();
        let line = Line::assemble(&trial, s1).unwrap();
        assert_eq!(line.seed_index, 1);

        let new_line = line.replace_in(
            &trial,
            vec![p(0, 0), p(1400, 300), p(1600, 300), p(3000, 0)],
        );
        // The rewritten run's seed is the segment nearest the old one
        assert_eq!(new_line.seed_index, 1);
        let (a, b) = trial.get(new_line.items[new_line.seed_index]).endpoints().unwrap();
        assert_eq!((a, b), (p(1400, 300), p(1600, 300)));
    }

    #[test]
    fn test_line_is_seed_only_when_neighbors_differ_in_width() {
        let world = Rc::new(RoutingNode::new_world());
        let p = |x| Vec2::new(x, 0);
        let s0 = seg(&world, p(0), p(1000));
        world.add(Item::Segment(SegmentItem {
            a: p(1000),
            b: p(2000),
            width: 400,
            layer: 0,
            net: 1,
            locked: false,
        }));
        let line = Line::assemble(&world, s0).unwrap();
        assert_eq!(line.items, vec![s0]);
    }
}
