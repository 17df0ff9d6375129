//! Corner-reducing simplification of a candidate line
//!
//! Operates on the dragged line's own shape: endpoints are never moved,
//! the designated preserve-vertex survives, and edits stay inside the
//! restrict area when one is given. A shortcut is accepted only when it
//! collides with nothing, so the optimizer can never introduce a
//! collision the input did not already have.

use crate::geom::{BBox, Vec2};
use crate::item::{Item, SegmentItem};
use crate::line::Line;
use crate::node::{RoutingNode, RuleResolver};
use tracing::trace;

/// Simplify `line`, merging collinear runs (when `smooth` is set) and
/// dropping interior corners whose shortcut stays collision-free.
pub fn optimize(
    node: &RoutingNode,
    line: &Line,
    restrict: Option<BBox>,
    preserve: Vec2,
    smooth: bool,
    rules: &dyn RuleResolver,
) -> Line {
    let mut pts = line.points.clone();
    let skip = line.id_set();

    if smooth {
        merge_collinear(&mut pts, preserve);
    }

    // Corner elimination: retry until a full pass removes nothing
    let mut changed = true;
    while changed && pts.len() > 2 {
        changed = false;
        let mut i = 1;
        while i + 1 < pts.len() {
            let v = pts[i];
            if v == preserve {
                i += 1;
                continue;
            }
            let (prev, next) = (pts[i - 1], pts[i + 1]);
            if let Some(area) = &restrict {
                let local = BBox::from_points(&[prev, v, next]);
                if !area.contains_box(&local) {
                    i += 1;
                    continue;
                }
            }
            let shortcut = Item::Segment(SegmentItem {
                a: prev,
                b: next,
                width: line.width,
                layer: line.layer,
                net: line.net,
                locked: false,
            });
            if node.check_colliding_value(&shortcut, &skip, rules) {
                i += 1;
                continue;
            }
            trace!(?v, "optimizer dropped corner");
            pts.remove(i);
            changed = true;
        }
    }

    Line::from_points(pts, line.width, line.layer, line.net)
}

/// Collinear merging alone, without corner elimination. Used on dragged
/// geometry where every corner is load-bearing.
pub fn smooth(line: &Line, preserve: Vec2) -> Line {
    let mut pts = line.points.clone();
    merge_collinear(&mut pts, preserve);
    Line::from_points(pts, line.width, line.layer, line.net)
}

/// Drop interior vertices that do not bend the path. The preserve-vertex
/// is kept even when collinear.
fn merge_collinear(pts: &mut Vec<Vec2>, preserve: Vec2) {
    let mut i = 1;
    while i + 1 < pts.len() {
        let v = pts[i];
        if v == preserve {
            i += 1;
            continue;
        }
        let a = v - pts[i - 1];
        let b = pts[i + 1] - v;
        if a.cross(b) == 0 && a.dot(b) >= 0 {
            pts.remove(i);
        } else {
            i += 1;
        }
    }
}
