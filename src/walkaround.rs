//! Obstacle-avoidance rerouting for a single conflicting path
//!
//! Starting from the colliding line, repeatedly hug the boundary of the
//! nearest blocking item's clearance hull, splicing the hull boundary
//! between the line's entry and exit crossings. One walk keeps a fixed
//! winding; the engine runs both windings independently and the dragger
//! picks the shorter survivor. Endpoints of the input line are always
//! preserved.

use crate::decorator::DebugDecorator;
use crate::geom::primitives::{point_in_polygon, segment_intersection};
use crate::geom::Vec2;
use crate::item::{Item, SegmentItem};
use crate::line::Line;
use crate::node::{RoutingNode, RuleResolver};
use crate::settings::DragSettings;
use indexmap::IndexSet;
use tracing::debug;

/// Extra hull growth so boundary-hugging points sit strictly clear
const HULL_SLOP: i32 = 4;

/// One direction's outcome
#[derive(Debug, Clone)]
pub enum WalkResult {
    /// Rerouted line; endpoints match the input
    Done(Line),
    Failed,
}

impl WalkResult {
    pub fn line(&self) -> Option<&Line> {
        match self {
            WalkResult::Done(l) => Some(l),
            WalkResult::Failed => None,
        }
    }
}

/// Both windings, each independently done or failed
#[derive(Debug, Clone)]
pub struct WalkaroundOutcome {
    pub cw: WalkResult,
    pub ccw: WalkResult,
}

impl WalkaroundOutcome {
    /// Shorter successful reroute, if any
    pub fn best(self) -> Option<Line> {
        match (self.cw, self.ccw) {
            (WalkResult::Done(a), WalkResult::Done(b)) => {
                Some(if a.length() <= b.length() { a } else { b })
            }
            (WalkResult::Done(a), WalkResult::Failed) => Some(a),
            (WalkResult::Failed, WalkResult::Done(b)) => Some(b),
            (WalkResult::Failed, WalkResult::Failed) => None,
        }
    }
}

/// Walk a candidate line around whatever blocks it, both windings
pub fn route(
    node: &RoutingNode,
    candidate: &Line,
    rules: &dyn RuleResolver,
    settings: &DragSettings,
    decorator: &mut dyn DebugDecorator,
) -> WalkaroundOutcome {
    WalkaroundOutcome {
        cw: walk_one(node, candidate, rules, settings, true, decorator),
        ccw: walk_one(node, candidate, rules, settings, false, decorator),
    }
}

fn walk_one(
    node: &RoutingNode,
    candidate: &Line,
    rules: &dyn RuleResolver,
    settings: &DragSettings,
    cw: bool,
    decorator: &mut dyn DebugDecorator,
) -> WalkResult {
    decorator.begin_group(if cw { "walk cw" } else { "walk ccw" });
    let mut pts = candidate.points.clone();
    for iter in 0..settings.walkaround_iteration_limit {
        let blocking = match first_blocking(node, &pts, candidate, rules) {
            Some(b) => b,
            None => {
                debug!(iter, cw, "walkaround clear");
                decorator.add_line(&pts, 0x40c040ff, "walk result");
                decorator.end_group();
                return WalkResult::Done(Line::from_points(
                    pts,
                    candidate.width,
                    candidate.layer,
                    candidate.net,
                ));
            }
        };
        let obstacle = node.get(blocking);
        // Hull the obstacle at the clearance the rules demand of this pair
        let probe = probe_segment(candidate, pts[0], *pts.last().unwrap());
        let clearance = rules.clearance(&probe, &obstacle);
        let grow = clearance + candidate.width / 2 + HULL_SLOP;
        let hull = obstacle.shape().hull(grow);
        decorator.add_line(&hull, 0x4080ffff, "hull");
        pts = match splice_around(&pts, &hull, cw) {
            Some(p) => p,
            None => {
                decorator.end_group();
                return WalkResult::Failed;
            }
        };
    }
    debug!(cw, "walkaround iteration limit hit");
    decorator.end_group();
    WalkResult::Failed
}

fn probe_segment(line: &Line, a: Vec2, b: Vec2) -> Item {
    Item::Segment(SegmentItem {
        a,
        b,
        width: line.width,
        layer: line.layer,
        net: line.net,
        locked: false,
    })
}

/// First obstacle hit scanning the chain in path order
fn first_blocking(
    node: &RoutingNode,
    pts: &[Vec2],
    line: &Line,
    rules: &dyn RuleResolver,
) -> Option<crate::item::ItemId> {
    let skip: IndexSet<crate::item::ItemId> = line.items.iter().copied().collect();
    for w in pts.windows(2) {
        let probe = probe_segment(line, w[0], w[1]);
        let cols = node.collisions_for(&probe, &skip, rules, false, true);
        if let Some((id, _)) = cols.into_iter().next() {
            return Some(id);
        }
    }
    None
}

/// Replace the chain portion crossing `hull` with the hull boundary path
/// in the requested winding. Returns None when an endpoint sits inside
/// the hull or no crossing can be found.
fn splice_around(pts: &[Vec2], hull: &[Vec2], cw: bool) -> Option<Vec<Vec2>> {
    if hull.len() < 3 || pts.len() < 2 {
        return None;
    }
    if point_in_polygon(pts[0], hull) || point_in_polygon(*pts.last().unwrap(), hull) {
        return None;
    }

    // All chain/hull crossings in path order
    struct Crossing {
        seg_index: usize,
        along: i64,
        hull_edge: usize,
        point: Vec2,
    }
    let mut crossings: Vec<Crossing> = Vec::new();
    let n = hull.len();
    for (si, w) in pts.windows(2).enumerate() {
        for he in 0..n {
            let (h1, h2) = (hull[he], hull[(he + 1) % n]);
            if let Some(p) = segment_intersection(w[0], w[1], h1, h2) {
                crossings.push(Crossing {
                    seg_index: si,
                    along: w[0].distance(p),
                    hull_edge: he,
                    point: p,
                });
            }
        }
    }
    if crossings.len() < 2 {
        return None;
    }
    crossings.sort_by_key(|c| (c.seg_index, c.along));
    let entry = crossings.first().unwrap();
    let exit = crossings.last().unwrap();

    // Boundary vertices between entry and exit, following the winding.
    // The hull ring is counterclockwise.
    let mut path: Vec<Vec2> = vec![entry.point];
    if cw {
        let mut v = entry.hull_edge;
        loop {
            path.push(hull[v]);
            if v == (exit.hull_edge + 1) % n {
                break;
            }
            v = (v + n - 1) % n;
        }
    } else {
        let mut v = (entry.hull_edge + 1) % n;
        loop {
            path.push(hull[v]);
            if v == exit.hull_edge {
                break;
            }
            v = (v + 1) % n;
        }
    }
    path.push(exit.point);

    let mut out: Vec<Vec2> = pts[..=entry.seg_index].to_vec();
    out.extend(path);
    out.extend(pts[exit.seg_index + 1..].iter().copied());
    out.dedup();
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorator::NullDecorator;
    use crate::item::{Item, LayerRange, SegmentItem, ViaItem};
    use crate::node::UniformRules;
    use std::rc::Rc;

    fn straight_candidate(a: Vec2, b: Vec2) -> Line {
        Line::from_points(vec![a, b], 100, 0, 1)
    }

    #[test]
    fn test_walk_clear_line_passes_through() {
        let world = Rc::new(RoutingNode::new_world());
        let cand = straight_candidate(Vec2::new(0, 0), Vec2::new(5000, 0));
        let rules = UniformRules(200);
        let out = route(&world, &cand, &rules, &DragSettings::default(), &mut NullDecorator);
        let best = out.best().unwrap();
        assert_eq!(best.points, cand.points);
    }

    #[test]
    fn test_walk_around_via_keeps_endpoints_and_lengthens() {
        let world = Rc::new(RoutingNode::new_world());
        // Via dead center on the candidate's straight path
        world.add(Item::Via(ViaItem {
            pos: Vec2::new(2500, 0),
            diameter: 600,
            layers: LayerRange::new(0, 1),
            net: 2,
            locked: false,
        }));
        let cand = straight_candidate(Vec2::new(0, 0), Vec2::new(5000, 0));
        let rules = UniformRules(200);
        let out = route(&world, &cand, &rules, &DragSettings::default(), &mut NullDecorator);

        for result in [&out.cw, &out.ccw] {
            let line = result.line().expect("both windings should succeed");
            assert_eq!(line.endpoints(), (Vec2::new(0, 0), Vec2::new(5000, 0)));
            assert!(line.length() > 5000);
            // Re-test: the reroute is clear of the obstacle set
            for w in line.points.windows(2) {
                let probe = Item::Segment(SegmentItem {
                    a: w[0],
                    b: w[1],
                    width: 100,
                    layer: 0,
                    net: 1,
                    locked: false,
                });
                assert!(!world.check_colliding_value(
                    &probe,
                    &Default::default(),
                    &rules
                ));
            }
        }
    }

    #[test]
    fn test_walk_fails_when_endpoint_is_buried() {
        let world = Rc::new(RoutingNode::new_world());
        // Obstacle right on top of the candidate's start point
        world.add(Item::Via(ViaItem {
            pos: Vec2::new(0, 0),
            diameter: 600,
            layers: LayerRange::new(0, 1),
            net: 2,
            locked: false,
        }));
        let cand = straight_candidate(Vec2::new(0, 0), Vec2::new(5000, 0));
        let rules = UniformRules(200);
        let out = route(&world, &cand, &rules, &DragSettings::default(), &mut NullDecorator);
        assert!(out.best().is_none());
    }

    #[test]
    fn test_walk_two_obstacles_in_sequence() {
        let world = Rc::new(RoutingNode::new_world());
        for x in [1500, 3500] {
            world.add(Item::Via(ViaItem {
                pos: Vec2::new(x, 0),
                diameter: 600,
                layers: LayerRange::new(0, 1),
                net: 2,
                locked: false,
            }));
        }
        let cand = straight_candidate(Vec2::new(0, 0), Vec2::new(5000, 0));
        let rules = UniformRules(200);
        let best = route(&world, &cand, &rules, &DragSettings::default(), &mut NullDecorator)
            .best()
            .expect("walk should clear both vias");
        assert_eq!(best.endpoints(), (Vec2::new(0, 0), Vec2::new(5000, 0)));
        assert!(best.length() > 5000);
    }
}

