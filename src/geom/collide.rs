//! Pairwise shape collision / clearance / MTV oracle
//!
//! Dispatch is by the unordered pair of shape kinds: each symmetric case is
//! implemented once in canonical order and the reversed order delegates to
//! it, negating any returned MTV. Width-bearing shapes reduce to their
//! width-less counterpart plus an inflated clearance. Arc-involving pairs
//! flatten the arc to a polyline, except arc-arc which evaluates a small
//! constant candidate-point set.
//!
//! When `need_mtv` is false the chain/compound scans short-circuit on the
//! first hit; MTV callers keep scanning for the minimum-distance pair.

use super::primitives::{
    circle_intersections, nearest_point_on_segment, point_in_polygon, point_line_distance,
    segment_intersection, segments_intersect, BBox, Vec2,
};
use super::shape::{ArcShape, Circle, Seg, Shape};

/// Outcome of a positive collision test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    /// Measured separation between the original shapes (0 when overlapping)
    pub distance: i64,
    /// Representative contact point
    pub point: Vec2,
    /// Displacement of shape A that separates the pair by exactly the
    /// requested clearance (plus one unit of slop). Present iff requested.
    pub mtv: Option<Vec2>,
}

/// Test two shapes against a clearance. Returns None when the measured
/// separation is >= `clearance`.
pub fn collide(a: &Shape, b: &Shape, clearance: i32, need_mtv: bool) -> Option<Collision> {
    if !a.bbox().inflated(clearance).intersects(&b.bbox()) {
        return None;
    }

    // Arc-arc runs on exact centerlines; flattening both would be wasteful
    if let (Shape::Arc(aa), Shape::Arc(ab)) = (a, b) {
        return collide_arc_arc(aa, ab, clearance, need_mtv);
    }

    if let Shape::Compound(subs) = a {
        return collide_compound(subs, b, clearance, need_mtv, false);
    }
    if let Shape::Compound(subs) = b {
        return collide_compound(subs, a, clearance, need_mtv, true);
    }

    let (ra, ea) = reduce(a);
    let (rb, eb) = reduce(b);
    let cl_eff = clearance as i64 + ea + eb;
    let col = collide_reduced(&ra, &rb, cl_eff, need_mtv)?;
    Some(Collision {
        distance: (col.distance - ea - eb).max(0),
        ..col
    })
}

/// Boolean-only entry point (short-circuits sub-shape scans)
pub fn collide_simple(a: &Shape, b: &Shape, clearance: i32) -> bool {
    collide(a, b, clearance, false).is_some()
}

fn negated(col: Collision) -> Collision {
    Collision {
        mtv: col.mtv.map(|v| -v),
        ..col
    }
}

fn collide_compound(
    subs: &[Shape],
    other: &Shape,
    clearance: i32,
    need_mtv: bool,
    flipped: bool,
) -> Option<Collision> {
    let mut best: Option<Collision> = None;
    for sub in subs {
        if let Some(col) = collide(sub, other, clearance, need_mtv) {
            if !need_mtv {
                best = Some(col);
                break;
            }
            if best.as_ref().map_or(true, |b| col.distance < b.distance) {
                best = Some(col);
            }
        }
    }
    best.map(|c| if flipped { negated(c) } else { c })
}

/// Width-less reduction: shape plus the clearance inflation its width
/// contributes
enum Reduced {
    Circle(Circle),
    Rect(BBox),
    Seg(Seg),
    Chain(Vec<Vec2>, bool),
}

impl Reduced {
    fn rank(&self) -> u8 {
        match self {
            Reduced::Circle(_) => 0,
            Reduced::Rect(_) => 1,
            Reduced::Seg(_) => 2,
            Reduced::Chain(..) => 3,
        }
    }
}

fn reduce(shape: &Shape) -> (Reduced, i64) {
    match shape {
        Shape::Circle(c) => (Reduced::Circle(*c), 0),
        Shape::Rect(r) => (Reduced::Rect(*r), 0),
        Shape::Segment(s) => (Reduced::Seg(*s), 0),
        Shape::ThickSegment { seg, width } => (Reduced::Seg(*seg), *width as i64 / 2),
        Shape::Arc(a) => (
            Reduced::Chain(a.to_polyline(), false),
            a.width as i64 / 2,
        ),
        Shape::Chain(c) => (
            Reduced::Chain(c.points.clone(), c.closed),
            c.width as i64 / 2,
        ),
        Shape::Compound(_) => unreachable!("compounds are decomposed before reduction"),
    }
}

fn collide_reduced(a: &Reduced, b: &Reduced, cl: i64, need_mtv: bool) -> Option<Collision> {
    if a.rank() > b.rank() {
        return collide_reduced(b, a, cl, need_mtv).map(negated);
    }
    match (a, b) {
        (Reduced::Circle(ca), Reduced::Circle(cb)) => circle_circle(ca, cb, cl, need_mtv),
        (Reduced::Circle(c), Reduced::Rect(r)) => circle_rect(c, r, cl, need_mtv),
        (Reduced::Circle(c), Reduced::Seg(s)) => circle_seg(c, s, cl, need_mtv),
        (Reduced::Circle(c), Reduced::Chain(pts, closed)) => {
            circle_chain(c, pts, *closed, cl, need_mtv)
        }
        (Reduced::Rect(ra), Reduced::Rect(rb)) => rect_rect(ra, rb, cl, need_mtv),
        (Reduced::Rect(r), Reduced::Seg(s)) => rect_seg(r, s, cl, need_mtv),
        (Reduced::Rect(r), Reduced::Chain(pts, closed)) => {
            rect_chain(r, pts, *closed, cl, need_mtv)
        }
        (Reduced::Seg(sa), Reduced::Seg(sb)) => seg_seg(sa, sb, cl, need_mtv),
        (Reduced::Seg(s), Reduced::Chain(pts, closed)) => {
            seg_chain(s, pts, *closed, cl, need_mtv)
        }
        (Reduced::Chain(pa, ca), Reduced::Chain(pb, cb)) => {
            chain_chain(pa, *ca, pb, *cb, cl, need_mtv)
        }
        _ => unreachable!("canonical ordering covers all pairs"),
    }
}

fn midpoint(a: Vec2, b: Vec2) -> Vec2 {
    Vec2::new(
        ((a.x as i64 + b.x as i64) / 2) as i32,
        ((a.y as i64 + b.y as i64) / 2) as i32,
    )
}

fn circle_circle(a: &Circle, b: &Circle, cl: i64, need_mtv: bool) -> Option<Collision> {
    let delta = a.center - b.center;
    let d = delta.length();
    let rsum = a.radius as i64 + b.radius as i64;
    let sep = (d - rsum).max(0);
    if sep >= cl {
        return None;
    }
    // Contact point on B's boundary toward A; coincident centers clamp to B
    let point = if d > 0 {
        b.center + delta.resized(b.radius as i64)
    } else {
        b.center
    };
    let mtv = need_mtv.then(|| {
        let dir = if d > 0 { delta } else { Vec2::new(1, 0) };
        dir.resized(rsum + cl - d + 1)
    });
    Some(Collision {
        distance: sep,
        point,
        mtv,
    })
}

fn circle_rect(c: &Circle, r: &BBox, cl: i64, need_mtv: bool) -> Option<Collision> {
    let clamped = Vec2::new(
        c.center.x.clamp(r.min.x, r.max.x),
        c.center.y.clamp(r.min.y, r.max.y),
    );
    if clamped == c.center {
        // Center inside the rectangle: push out along the cheapest axis
        let mtv = need_mtv.then(|| {
            let pens = [
                (c.center.x as i64 - r.min.x as i64, Vec2::new(-1, 0)),
                (r.max.x as i64 - c.center.x as i64, Vec2::new(1, 0)),
                (c.center.y as i64 - r.min.y as i64, Vec2::new(0, -1)),
                (r.max.y as i64 - c.center.y as i64, Vec2::new(0, 1)),
            ];
            let (pen, dir) = pens.iter().min_by_key(|(p, _)| *p).copied().unwrap();
            dir.resized(pen + c.radius as i64 + cl + 1)
        });
        return Some(Collision {
            distance: 0,
            point: c.center,
            mtv,
        });
    }
    let d = c.center.distance(clamped);
    let sep = (d - c.radius as i64).max(0);
    if sep >= cl {
        return None;
    }
    let mtv = need_mtv.then(|| (c.center - clamped).resized(c.radius as i64 + cl - d + 1));
    Some(Collision {
        distance: sep,
        point: clamped,
        mtv,
    })
}

fn circle_seg(c: &Circle, s: &Seg, cl: i64, need_mtv: bool) -> Option<Collision> {
    let pn = nearest_point_on_segment(c.center, s.a, s.b);
    let d = c.center.distance(pn);
    let sep = (d - c.radius as i64).max(0);
    if sep >= cl {
        return None;
    }
    let mtv = need_mtv.then(|| {
        let dir = if d > 0 {
            c.center - pn
        } else {
            let sd = s.b - s.a;
            if sd.squared_length() > 0 {
                sd.perpendicular()
            } else {
                Vec2::new(1, 0)
            }
        };
        dir.resized(c.radius as i64 + cl - d + 1)
    });
    Some(Collision {
        distance: sep,
        point: pn,
        mtv,
    })
}

fn rect_edges(r: &BBox) -> [Seg; 4] {
    let tr = Vec2::new(r.max.x, r.min.y);
    let bl = Vec2::new(r.min.x, r.max.y);
    [
        Seg::new(r.min, tr),
        Seg::new(tr, r.max),
        Seg::new(r.max, bl),
        Seg::new(bl, r.min),
    ]
}

fn rect_rect(a: &BBox, b: &BBox, cl: i64, need_mtv: bool) -> Option<Collision> {
    let gx = (a.min.x.max(b.min.x) as i64) - (a.max.x.min(b.max.x) as i64);
    let gy = (a.min.y.max(b.min.y) as i64) - (a.max.y.min(b.max.y) as i64);
    let sep = if gx <= 0 && gy <= 0 {
        0
    } else {
        let dx = gx.max(0) as f64;
        let dy = gy.max(0) as f64;
        (dx * dx + dy * dy).sqrt().round() as i64
    };
    if sep >= cl {
        return None;
    }
    let point = Vec2::new(
        ((a.min.x.max(b.min.x) as i64 + a.max.x.min(b.max.x) as i64) / 2) as i32,
        ((a.min.y.max(b.min.y) as i64 + a.max.y.min(b.max.y) as i64) / 2) as i32,
    );
    let mtv = need_mtv.then(|| {
        // Cheapest axis move of A away from B
        let need_x = cl - gx + 1;
        let need_y = cl - gy + 1;
        if need_x <= need_y {
            let sign = if a.center().x >= b.center().x { 1 } else { -1 };
            Vec2::new((need_x as i32) * sign, 0)
        } else {
            let sign = if a.center().y >= b.center().y { 1 } else { -1 };
            Vec2::new(0, (need_y as i32) * sign)
        }
    });
    Some(Collision {
        distance: sep,
        point,
        mtv,
    })
}

fn rect_seg(r: &BBox, s: &Seg, cl: i64, need_mtv: bool) -> Option<Collision> {
    let overlapping = r.contains_point(s.a)
        || r.contains_point(s.b)
        || rect_edges(r)
            .iter()
            .any(|e| segments_intersect(e.a, e.b, s.a, s.b));
    if overlapping {
        let rc = r.center();
        let pn = nearest_point_on_segment(rc, s.a, s.b);
        let point = if r.contains_point(s.a) { s.a } else { pn };
        let mtv = need_mtv.then(|| {
            let half_diag = r.min.distance(r.max) / 2;
            let dir = if rc != pn { rc - pn } else { Vec2::new(1, 0) };
            dir.resized((cl + half_diag - rc.distance(pn) + 1).max(cl + 1))
        });
        return Some(Collision {
            distance: 0,
            point,
            mtv,
        });
    }
    let mut best: Option<(i64, Vec2, Vec2)> = None;
    for e in rect_edges(r) {
        let (d, pa, pb) = seg_seg_approach(&e, s);
        if best.map_or(true, |(bd, _, _)| d < bd) {
            best = Some((d, pa, pb));
        }
    }
    let (d, pa, pb) = best?;
    if d >= cl {
        return None;
    }
    let mtv = need_mtv.then(|| (pa - pb).resized(cl - d + 1));
    Some(Collision {
        distance: d,
        point: midpoint(pa, pb),
        mtv,
    })
}

fn rect_chain(
    r: &BBox,
    pts: &[Vec2],
    closed: bool,
    cl: i64,
    need_mtv: bool,
) -> Option<Collision> {
    if closed && point_in_polygon(r.center(), pts) {
        return Some(containment_collision(r.center(), pts, cl, need_mtv));
    }
    let mut best: Option<Collision> = None;
    for w in chain_edges(pts, closed) {
        if let Some(col) = rect_seg(r, &w, cl, need_mtv) {
            if !need_mtv {
                return Some(col);
            }
            if best.as_ref().map_or(true, |b| col.distance < b.distance) {
                best = Some(col);
            }
        }
    }
    best
}

/// Nearest approach between two disjoint-or-touching segments via the four
/// endpoint projections; returns (distance, point on A, point on B)
fn seg_seg_approach(a: &Seg, b: &Seg) -> (i64, Vec2, Vec2) {
    let cands = [
        (a.a, nearest_point_on_segment(a.a, b.a, b.b)),
        (a.b, nearest_point_on_segment(a.b, b.a, b.b)),
        (nearest_point_on_segment(b.a, a.a, a.b), b.a),
        (nearest_point_on_segment(b.b, a.a, a.b), b.b),
    ];
    let mut best = (i64::MAX, a.a, b.a);
    for (pa, pb) in cands {
        let d = pa.distance(pb);
        if d < best.0 {
            best = (d, pa, pb);
        }
    }
    best
}

fn seg_seg(a: &Seg, b: &Seg, cl: i64, need_mtv: bool) -> Option<Collision> {
    if segments_intersect(a.a, a.b, b.a, b.b) {
        let point = segment_intersection(a.a, a.b, b.a, b.b).unwrap_or(a.a);
        let mtv = need_mtv.then(|| {
            // Crossing segments: push A along B's normal, toward the side
            // holding A's midpoint; the shove loop re-tests after moving
            let bd = b.b - b.a;
            let normal = if bd.squared_length() > 0 {
                bd.perpendicular()
            } else {
                Vec2::new(1, 0)
            };
            let mid = midpoint(a.a, a.b);
            let dir = if normal.dot(mid - b.a) >= 0 {
                normal
            } else {
                -normal
            };
            dir.resized(cl + point_line_distance(mid, b.a, b.b) + 1)
        });
        return Some(Collision {
            distance: 0,
            point,
            mtv,
        });
    }
    let (d, pa, pb) = seg_seg_approach(a, b);
    if d >= cl {
        return None;
    }
    let mtv = need_mtv.then(|| (pa - pb).resized(cl - d + 1));
    Some(Collision {
        distance: d,
        point: midpoint(pa, pb),
        mtv,
    })
}

fn chain_edges(pts: &[Vec2], closed: bool) -> Vec<Seg> {
    let n = pts.len();
    if n < 2 {
        return Vec::new();
    }
    let count = if closed { n } else { n - 1 };
    (0..count)
        .map(|i| Seg::new(pts[i], pts[(i + 1) % n]))
        .collect()
}

/// Collision reported when a reference point sits inside a closed chain:
/// full containment implies zero distance without iterating edges
fn containment_collision(p: Vec2, ring: &[Vec2], cl: i64, need_mtv: bool) -> Collision {
    let bb = BBox::from_points(ring);
    let mtv = need_mtv.then(|| {
        let dir = if p != bb.center() {
            p - bb.center()
        } else {
            Vec2::new(1, 0)
        };
        dir.resized(cl + bb.min.distance(bb.max) / 2 + 1)
    });
    Collision {
        distance: 0,
        point: p,
        mtv,
    }
}

fn circle_chain(
    c: &Circle,
    pts: &[Vec2],
    closed: bool,
    cl: i64,
    need_mtv: bool,
) -> Option<Collision> {
    if closed && point_in_polygon(c.center, pts) {
        return Some(containment_collision(c.center, pts, cl, need_mtv));
    }
    let mut best: Option<Collision> = None;
    for e in chain_edges(pts, closed) {
        if let Some(col) = circle_seg(c, &e, cl, need_mtv) {
            if !need_mtv {
                return Some(col);
            }
            if best.as_ref().map_or(true, |b| col.distance < b.distance) {
                best = Some(col);
            }
        }
    }
    best
}

fn seg_chain(
    s: &Seg,
    pts: &[Vec2],
    closed: bool,
    cl: i64,
    need_mtv: bool,
) -> Option<Collision> {
    if closed && point_in_polygon(s.a, pts) {
        return Some(containment_collision(s.a, pts, cl, need_mtv));
    }
    let mut best: Option<Collision> = None;
    for e in chain_edges(pts, closed) {
        if let Some(col) = seg_seg(s, &e, cl, need_mtv) {
            if !need_mtv {
                return Some(col);
            }
            if best.as_ref().map_or(true, |b| col.distance < b.distance) {
                best = Some(col);
            }
        }
    }
    best
}

fn chain_chain(
    pa: &[Vec2],
    ca: bool,
    pb: &[Vec2],
    cb: bool,
    cl: i64,
    need_mtv: bool,
) -> Option<Collision> {
    if cb && pa.first().map_or(false, |&p| point_in_polygon(p, pb)) {
        return Some(containment_collision(pa[0], pb, cl, need_mtv));
    }
    if ca && pb.first().map_or(false, |&p| point_in_polygon(p, pa)) {
        return Some(negated(containment_collision(pb[0], pa, cl, need_mtv)));
    }
    let mut best: Option<Collision> = None;
    for e in chain_edges(pa, ca) {
        if let Some(col) = seg_chain(&e, pb, cb, cl, need_mtv) {
            if !need_mtv {
                return Some(col);
            }
            if best.as_ref().map_or(true, |b| col.distance < b.distance) {
                best = Some(col);
            }
        }
    }
    best
}

/// Arc-arc collision on exact centerlines: evaluate a small candidate set
/// (arc endpoints, centerline circle intersections, and center-to-center
/// projections) instead of discretizing both arcs
fn collide_arc_arc(
    a: &ArcShape,
    b: &ArcShape,
    clearance: i32,
    need_mtv: bool,
) -> Option<Collision> {
    let mut cands = vec![a.start, a.end, b.start, b.end];
    if let (Some((ax, ay)), Some((bx, by))) = (a.center(), b.center()) {
        let ca = Vec2::new(ax.round() as i32, ay.round() as i32);
        let cb = Vec2::new(bx.round() as i32, by.round() as i32);
        let ra = a.radius().round() as i64;
        let rb = b.radius().round() as i64;
        cands.extend(circle_intersections(ca, ra, cb, rb));
        if ca != cb {
            // Perpendicular projections through the centers
            cands.push(ca + (cb - ca).resized(ra));
            cands.push(cb + (ca - cb).resized(rb));
        }
    }
    let mut best: Option<(i64, Vec2, Vec2)> = None;
    for p in cands {
        let pa = a.nearest_point(p);
        let pb = b.nearest_point(pa);
        let d = pa.distance(pb);
        if best.map_or(true, |(bd, _, _)| d < bd) {
            best = Some((d, pa, pb));
        }
    }
    let (d, pa, pb) = best?;
    let half_widths = a.width as i64 / 2 + b.width as i64 / 2;
    let sep = (d - half_widths).max(0);
    if sep >= clearance as i64 {
        return None;
    }
    let mtv = need_mtv.then(|| {
        let dir = if pa != pb { pa - pb } else { Vec2::new(1, 0) };
        dir.resized(clearance as i64 + half_widths - d + 1)
    });
    Some(Collision {
        distance: sep,
        point: midpoint(pa, pb),
        mtv,
    })
}
