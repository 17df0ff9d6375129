//! Closed shape union for the collision oracle
//!
//! Every routable item reduces to one of these geometric variants. Shapes
//! are immutable values carrying geometry only, no identity. Width-bearing
//! variants (ThickSegment, Arc) collide as their width-less counterpart with
//! an inflated clearance.

use super::primitives::{convex_hull, BBox, Vec2};
use serde::{Deserialize, Serialize};

/// Circle with integer center and radius
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Vec2,
    pub radius: i32,
}

/// Width-less segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seg {
    pub a: Vec2,
    pub b: Vec2,
}

impl Seg {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    pub fn length(&self) -> i64 {
        self.a.distance(self.b)
    }
}

/// Circular arc through three points (start, mid, end) with a trace width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcShape {
    pub start: Vec2,
    pub mid: Vec2,
    pub end: Vec2,
    pub width: i32,
}

/// Chord-to-arc deviation used when flattening arcs for collision tests
pub const ARC_APPROX_TOLERANCE: f64 = 50.0;

impl ArcShape {
    /// Circumcenter of the three defining points, or None when they are
    /// (near-)collinear and the arc degenerates to a segment.
    pub fn center(&self) -> Option<(f64, f64)> {
        let ax = self.start.x as f64;
        let ay = self.start.y as f64;
        let bx = self.mid.x as f64;
        let by = self.mid.y as f64;
        let cx = self.end.x as f64;
        let cy = self.end.y as f64;
        let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
        if d.abs() < 1e-6 {
            return None;
        }
        let ux = ((ax * ax + ay * ay) * (by - cy)
            + (bx * bx + by * by) * (cy - ay)
            + (cx * cx + cy * cy) * (ay - by))
            / d;
        let uy = ((ax * ax + ay * ay) * (cx - bx)
            + (bx * bx + by * by) * (ax - cx)
            + (cx * cx + cy * cy) * (bx - ax))
            / d;
        Some((ux, uy))
    }

    pub fn radius(&self) -> f64 {
        match self.center() {
            Some((cx, cy)) => {
                let dx = self.start.x as f64 - cx;
                let dy = self.start.y as f64 - cy;
                (dx * dx + dy * dy).sqrt()
            }
            None => 0.0,
        }
    }

    /// Start angle and signed sweep (start -> end passing through mid),
    /// or None for a degenerate arc
    pub fn angles(&self) -> Option<(f64, f64)> {
        let (cx, cy) = self.center()?;
        let angle_of = |p: Vec2| (p.y as f64 - cy).atan2(p.x as f64 - cx);
        let a0 = angle_of(self.start);
        let am = angle_of(self.mid);
        let a1 = angle_of(self.end);
        let norm = |a: f64| {
            let mut v = a;
            while v < 0.0 {
                v += std::f64::consts::TAU;
            }
            while v >= std::f64::consts::TAU {
                v -= std::f64::consts::TAU;
            }
            v
        };
        let ccw_m = norm(am - a0);
        let ccw_e = norm(a1 - a0);
        let sweep = if ccw_m <= ccw_e {
            ccw_e
        } else {
            ccw_e - std::f64::consts::TAU
        };
        Some((a0, sweep))
    }

    /// Nearest point on the arc's centerline to `p`, clamped to the
    /// angular range. Degenerate arcs use the chord.
    pub fn nearest_point(&self, p: Vec2) -> Vec2 {
        let (cx, cy) = match self.center() {
            Some(c) => c,
            None => {
                return crate::geom::primitives::nearest_point_on_segment(
                    p, self.start, self.end,
                )
            }
        };
        let (a0, sweep) = match self.angles() {
            Some(a) => a,
            None => return self.start,
        };
        let r = self.radius();
        let ap = (p.y as f64 - cy).atan2(p.x as f64 - cx);
        // Offset of p's angle from a0, measured in the sweep direction
        let mut off = ap - a0;
        let dir = if sweep >= 0.0 { 1.0 } else { -1.0 };
        off *= dir;
        while off < 0.0 {
            off += std::f64::consts::TAU;
        }
        while off >= std::f64::consts::TAU {
            off -= std::f64::consts::TAU;
        }
        if off <= sweep.abs() {
            let a = a0 + dir * off;
            return Vec2::new(
                (cx + r * a.cos()).round() as i32,
                (cy + r * a.sin()).round() as i32,
            );
        }
        if p.squared_distance(self.start) <= p.squared_distance(self.end) {
            self.start
        } else {
            self.end
        }
    }

    /// Flatten the arc to a polyline whose chords deviate from the true
    /// arc by at most `ARC_APPROX_TOLERANCE`. Degenerate arcs flatten to
    /// their chord.
    pub fn to_polyline(&self) -> Vec<Vec2> {
        let (cx, cy) = match self.center() {
            Some(c) => c,
            None => return vec![self.start, self.end],
        };
        let r = self.radius();
        if r < 1.0 {
            return vec![self.start, self.end];
        }
        let (a0, sweep) = match self.angles() {
            Some(a) => a,
            None => return vec![self.start, self.end],
        };

        // Chord error e = r (1 - cos(step/2)) <= tolerance
        let max_step = 2.0 * (1.0 - ARC_APPROX_TOLERANCE / r).max(-1.0).acos();
        let steps = (sweep.abs() / max_step.max(1e-3)).ceil().max(1.0) as usize;
        let mut out = Vec::with_capacity(steps + 1);
        out.push(self.start);
        for i in 1..steps {
            let a = a0 + sweep * (i as f64 / steps as f64);
            out.push(Vec2::new(
                (cx + r * a.cos()).round() as i32,
                (cy + r * a.sin()).round() as i32,
            ));
        }
        out.push(self.end);
        out
    }
}

/// Open or closed polyline; `width` > 0 makes every edge width-bearing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub points: Vec<Vec2>,
    pub closed: bool,
    pub width: i32,
}

impl Chain {
    pub fn open(points: Vec<Vec2>, width: i32) -> Self {
        Self {
            points,
            closed: false,
            width,
        }
    }

    pub fn closed_ring(points: Vec<Vec2>) -> Self {
        Self {
            points,
            closed: true,
            width: 0,
        }
    }

    /// Edges as width-less segments (closing edge included when closed)
    pub fn segments(&self) -> Vec<Seg> {
        let n = self.points.len();
        if n < 2 {
            return Vec::new();
        }
        let count = if self.closed { n } else { n - 1 };
        (0..count)
            .map(|i| Seg::new(self.points[i], self.points[(i + 1) % n]))
            .collect()
    }

    pub fn length(&self) -> i64 {
        self.segments().iter().map(|s| s.length()).sum()
    }
}

/// The closed set of collidable shape kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle(Circle),
    /// Axis-aligned rectangle (min corner + size)
    Rect(BBox),
    Segment(Seg),
    ThickSegment { seg: Seg, width: i32 },
    Arc(ArcShape),
    Chain(Chain),
    Compound(Vec<Shape>),
}

impl Shape {
    pub fn bbox(&self) -> BBox {
        match self {
            Shape::Circle(c) => BBox::new(
                Vec2::new(c.center.x - c.radius, c.center.y - c.radius),
                Vec2::new(c.center.x + c.radius, c.center.y + c.radius),
            ),
            Shape::Rect(r) => *r,
            Shape::Segment(s) => BBox::from_points(&[s.a, s.b]),
            Shape::ThickSegment { seg, width } => {
                BBox::from_points(&[seg.a, seg.b]).inflated(width / 2)
            }
            Shape::Arc(a) => {
                BBox::from_points(&a.to_polyline()).inflated(a.width / 2)
            }
            Shape::Chain(c) => BBox::from_points(&c.points).inflated(c.width / 2),
            Shape::Compound(shapes) => {
                let mut b = BBox::new(
                    Vec2::new(i32::MAX, i32::MAX),
                    Vec2::new(i32::MIN, i32::MIN),
                );
                for s in shapes {
                    b.merge(&s.bbox());
                }
                b
            }
        }
    }

    /// A representative point on or inside the shape, used by the closed
    /// chain containment pre-check
    pub fn reference_point(&self) -> Vec2 {
        match self {
            Shape::Circle(c) => c.center,
            Shape::Rect(r) => r.center(),
            Shape::Segment(s) => s.a,
            Shape::ThickSegment { seg, .. } => seg.a,
            Shape::Arc(a) => a.start,
            Shape::Chain(c) => c.points.first().copied().unwrap_or(Vec2::ZERO),
            Shape::Compound(shapes) => shapes
                .first()
                .map(|s| s.reference_point())
                .unwrap_or(Vec2::ZERO),
        }
    }

    /// Convex hull of the shape grown by `clearance`, as a ccw ring.
    /// Circles become octagons; everything else hulls its inflated corner
    /// points. Used by walkaround as the boundary to hug.
    pub fn hull(&self, clearance: i32) -> Vec<Vec2> {
        match self {
            Shape::Circle(c) => octagon(c.center, c.radius as i64 + clearance as i64),
            Shape::Rect(r) => {
                let g = r.inflated(clearance);
                vec![
                    g.min,
                    Vec2::new(g.max.x, g.min.y),
                    g.max,
                    Vec2::new(g.min.x, g.max.y),
                ]
            }
            Shape::Segment(s) => seg_hull(s, clearance as i64),
            Shape::ThickSegment { seg, width } => {
                seg_hull(seg, *width as i64 / 2 + clearance as i64)
            }
            Shape::Arc(a) => {
                let mut pts = Vec::new();
                let poly = a.to_polyline();
                let grow = a.width as i64 / 2 + clearance as i64;
                for w in poly.windows(2) {
                    pts.extend(seg_hull(&Seg::new(w[0], w[1]), grow));
                }
                convex_hull(&pts)
            }
            Shape::Chain(c) => {
                let grow = c.width as i64 / 2 + clearance as i64;
                let mut pts = Vec::new();
                for s in c.segments() {
                    pts.extend(seg_hull(&s, grow));
                }
                convex_hull(&pts)
            }
            Shape::Compound(shapes) => {
                let mut pts = Vec::new();
                for s in shapes {
                    pts.extend(s.hull(clearance));
                }
                convex_hull(&pts)
            }
        }
    }
}

/// Regular octagon circumscribing a circle of radius `r` around `center`,
/// ccw winding
fn octagon(center: Vec2, r: i64) -> Vec<Vec2> {
    // Half side of the circumscribing octagon: r * tan(22.5 deg)
    let t = (r as f64 * (std::f64::consts::PI / 8.0).tan()).ceil() as i64;
    let r = r as i32;
    let t = t as i32;
    vec![
        Vec2::new(center.x + r, center.y - t),
        Vec2::new(center.x + r, center.y + t),
        Vec2::new(center.x + t, center.y + r),
        Vec2::new(center.x - t, center.y + r),
        Vec2::new(center.x - r, center.y + t),
        Vec2::new(center.x - r, center.y - t),
        Vec2::new(center.x - t, center.y - r),
        Vec2::new(center.x + t, center.y - r),
    ]
}

/// Oriented rectangle around a segment, extended by `grow` beyond both
/// endpoints and sideways. Degenerate segments fall back to an octagon.
fn seg_hull(seg: &Seg, grow: i64) -> Vec<Vec2> {
    let d = seg.b - seg.a;
    if d.squared_length() == 0 {
        return octagon(seg.a, grow);
    }
    let along = d.resized(grow);
    let side = d.perpendicular().resized(grow);
    let a = seg.a - along;
    let b = seg.b + along;
    let corners = vec![a + side, b + side, b - side, a - side];
    convex_hull(&corners)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arc_polyline_endpoints_and_radius() {
        // Quarter circle of radius 1000 around the origin
        let arc = ArcShape {
            start: Vec2::new(1000, 0),
            mid: Vec2::new(707, 707),
            end: Vec2::new(0, 1000),
            width: 0,
        };
        let poly = arc.to_polyline();
        assert_eq!(*poly.first().unwrap(), arc.start);
        assert_eq!(*poly.last().unwrap(), arc.end);
        for p in &poly {
            let r = p.distance(Vec2::ZERO);
            assert!((r - 1000).abs() <= 5, "point {:?} off the circle: r={}", p, r);
        }
    }

    #[test]
    fn test_degenerate_arc_is_chord() {
        let arc = ArcShape {
            start: Vec2::new(0, 0),
            mid: Vec2::new(50, 0),
            end: Vec2::new(100, 0),
            width: 0,
        };
        assert_eq!(arc.to_polyline(), vec![arc.start, arc.end]);
    }

    #[test]
    fn test_segment_hull_contains_endpoints() {
        use crate::geom::primitives::point_in_polygon;
        let s = Seg::new(Vec2::new(0, 0), Vec2::new(1000, 0));
        let hull = seg_hull(&s, 100);
        assert!(hull.len() >= 4);
        assert!(point_in_polygon(s.a, &hull));
        assert!(point_in_polygon(s.b, &hull));
        assert!(point_in_polygon(Vec2::new(500, 90), &hull));
        assert!(!point_in_polygon(Vec2::new(500, 150), &hull));
    }

    #[test]
    fn test_circle_hull_is_octagon_outside_circle() {
        let c = Circle {
            center: Vec2::new(0, 0),
            radius: 100,
        };
        let hull = Shape::Circle(c).hull(50);
        assert_eq!(hull.len(), 8);
        for p in &hull {
            assert!(p.distance(c.center) >= 150);
        }
    }
}
