//! Integer 2D primitives shared by the whole engine
//!
//! Coordinates are `i32` board units; products (dot, cross, squared
//! distances) are widened to `i64`, and the few places that need a product
//! of two `i64` intermediates go through `i128`. Euclidean lengths pass
//! through `f64` only for the square root and are rounded back to integers.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// A 2D point / displacement in integer board units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Dot product, widened to i64
    pub fn dot(self, other: Vec2) -> i64 {
        self.x as i64 * other.x as i64 + self.y as i64 * other.y as i64
    }

    /// Z component of the cross product, widened to i64
    pub fn cross(self, other: Vec2) -> i64 {
        self.x as i64 * other.y as i64 - self.y as i64 * other.x as i64
    }

    pub fn squared_length(self) -> i64 {
        self.dot(self)
    }

    /// Euclidean length, rounded to the nearest integer unit
    pub fn length(self) -> i64 {
        (self.squared_length() as f64).sqrt().round() as i64
    }

    pub fn squared_distance(self, other: Vec2) -> i64 {
        (self - other).squared_length()
    }

    pub fn distance(self, other: Vec2) -> i64 {
        (self - other).length()
    }

    /// Left-hand perpendicular (rotate 90 degrees counterclockwise)
    pub fn perpendicular(self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    /// Scale this vector to the given length. A zero vector stays zero.
    pub fn resized(self, new_len: i64) -> Vec2 {
        let len = self.length();
        if len == 0 {
            return Vec2::ZERO;
        }
        let sx = self.x as f64 * new_len as f64 / len as f64;
        let sy = self.y as f64 * new_len as f64 / len as f64;
        Vec2::new(sx.round() as i32, sy.round() as i32)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Vec2,
    pub max: Vec2,
}

impl BBox {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Vec2]) -> Self {
        let mut b = BBox::new(
            Vec2::new(i32::MAX, i32::MAX),
            Vec2::new(i32::MIN, i32::MIN),
        );
        for &p in points {
            b.merge_point(p);
        }
        b
    }

    pub fn merge_point(&mut self, p: Vec2) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn merge(&mut self, other: &BBox) {
        self.merge_point(other.min);
        self.merge_point(other.max);
    }

    /// Grow the box by `amount` on all sides (saturating)
    pub fn inflated(&self, amount: i32) -> BBox {
        BBox::new(
            Vec2::new(
                self.min.x.saturating_sub(amount),
                self.min.y.saturating_sub(amount),
            ),
            Vec2::new(
                self.max.x.saturating_add(amount),
                self.max.y.saturating_add(amount),
            ),
        )
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn contains_box(&self, other: &BBox) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            ((self.min.x as i64 + self.max.x as i64) / 2) as i32,
            ((self.min.y as i64 + self.max.y as i64) / 2) as i32,
        )
    }
}

/// Nearest point on segment [a, b] to point p.
/// Degenerate (zero-length) segments collapse to `a`.
pub fn nearest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let d = b - a;
    let len_sq = d.squared_length();
    if len_sq == 0 {
        return a;
    }
    let t = (p - a).dot(d);
    if t <= 0 {
        return a;
    }
    if t >= len_sq {
        return b;
    }
    // t * d.x can exceed i64, widen through i128
    let x = a.x as i64 + (t as i128 * d.x as i128 / len_sq as i128) as i64;
    let y = a.y as i64 + (t as i128 * d.y as i128 / len_sq as i128) as i64;
    Vec2::new(x as i32, y as i32)
}

/// Distance from point p to segment [a, b]
pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> i64 {
    p.distance(nearest_point_on_segment(p, a, b))
}

/// Perpendicular distance from p to the infinite line through a and b.
/// Falls back to point distance for a degenerate line.
pub fn point_line_distance(p: Vec2, a: Vec2, b: Vec2) -> i64 {
    let d = b - a;
    let len = d.length();
    if len == 0 {
        return p.distance(a);
    }
    ((p - a).cross(d).abs() as f64 / len as f64).round() as i64
}

fn orient(a: Vec2, b: Vec2, c: Vec2) -> i64 {
    (b - a).cross(c - a)
}

fn on_segment(a: Vec2, b: Vec2, p: Vec2) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// True if segments [a1,a2] and [b1,b2] intersect (including touching
/// and collinear overlap).
pub fn segments_intersect(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> bool {
    let d1 = orient(b1, b2, a1);
    let d2 = orient(b1, b2, a2);
    let d3 = orient(a1, a2, b1);
    let d4 = orient(a1, a2, b2);

    if ((d1 > 0 && d2 < 0) || (d1 < 0 && d2 > 0))
        && ((d3 > 0 && d4 < 0) || (d3 < 0 && d4 > 0))
    {
        return true;
    }
    (d1 == 0 && on_segment(b1, b2, a1))
        || (d2 == 0 && on_segment(b1, b2, a2))
        || (d3 == 0 && on_segment(a1, a2, b1))
        || (d4 == 0 && on_segment(a1, a2, b2))
}

/// Intersection point of segments [a1,a2] and [b1,b2], rounded to integer
/// coordinates. Returns None for parallel or disjoint segments.
pub fn segment_intersection(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> Option<Vec2> {
    let r = a2 - a1;
    let s = b2 - b1;
    let denom = r.cross(s);
    if denom == 0 {
        return None;
    }
    let t_num = (b1 - a1).cross(s);
    let u_num = (b1 - a1).cross(r);
    // t in [0,1] iff t_num/denom in [0,1]; compare without division
    let in_range = |num: i64, den: i64| -> bool {
        if den > 0 {
            num >= 0 && num <= den
        } else {
            num <= 0 && num >= den
        }
    };
    if !in_range(t_num, denom) || !in_range(u_num, denom) {
        return None;
    }
    let x = a1.x as i64 + (t_num as i128 * r.x as i128 / denom as i128) as i64;
    let y = a1.y as i64 + (t_num as i128 * r.y as i128 / denom as i128) as i64;
    Some(Vec2::new(x as i32, y as i32))
}

/// Even-odd point-in-polygon test for a closed polygon given as a vertex
/// ring (no repeated last vertex). Points on the boundary count as inside.
pub fn point_in_polygon(p: Vec2, ring: &[Vec2]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let n = ring.len();
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        if orient(a, b, p) == 0 && on_segment(a, b, p) {
            return true;
        }
        if (a.y > p.y) != (b.y > p.y) {
            // x coordinate of the edge at height p.y, compared without division
            let lhs = (p.y as i64 - a.y as i64) * (b.x as i64 - a.x as i64);
            let rhs = (p.x as i64 - a.x as i64) * (b.y as i64 - a.y as i64);
            let crosses = if b.y > a.y { lhs > rhs } else { lhs < rhs };
            if crosses {
                inside = !inside;
            }
        }
    }
    inside
}

/// Convex hull of a point set (Andrew's monotone chain), returned as a
/// counterclockwise ring without a repeated last vertex.
pub fn convex_hull(points: &[Vec2]) -> Vec<Vec2> {
    let mut pts: Vec<Vec2> = points.to_vec();
    pts.sort_by_key(|p| (p.x, p.y));
    pts.dedup();
    if pts.len() <= 2 {
        return pts;
    }
    let mut hull: Vec<Vec2> = Vec::with_capacity(pts.len() * 2);
    // Lower hull
    for &p in &pts {
        while hull.len() >= 2 && orient(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0 {
            hull.pop();
        }
        hull.push(p);
    }
    // Upper hull
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev() {
        while hull.len() >= lower_len
            && orient(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// Intersection points of two circles, computed in f64 and rounded.
/// Coincident or fully nested circles yield no points.
pub fn circle_intersections(c0: Vec2, r0: i64, c1: Vec2, r1: i64) -> Vec<Vec2> {
    let d = c0.distance(c1);
    if d == 0 || d > r0 + r1 || d < (r0 - r1).abs() {
        return Vec::new();
    }
    let df = d as f64;
    let a = (r0 as f64 * r0 as f64 - r1 as f64 * r1 as f64 + df * df) / (2.0 * df);
    let h_sq = r0 as f64 * r0 as f64 - a * a;
    let h = if h_sq > 0.0 { h_sq.sqrt() } else { 0.0 };
    let ex = (c1.x - c0.x) as f64 / df;
    let ey = (c1.y - c0.y) as f64 / df;
    let mx = c0.x as f64 + a * ex;
    let my = c0.y as f64 + a * ey;
    let mut out = vec![Vec2::new(
        (mx + h * ey).round() as i32,
        (my - h * ex).round() as i32,
    )];
    if h > 0.5 {
        out.push(Vec2::new(
            (mx - h * ey).round() as i32,
            (my + h * ex).round() as i32,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_point_clamps_to_endpoints() {
        let a = Vec2::new(0, 0);
        let b = Vec2::new(100, 0);
        assert_eq!(nearest_point_on_segment(Vec2::new(-50, 10), a, b), a);
        assert_eq!(nearest_point_on_segment(Vec2::new(150, 10), a, b), b);
        assert_eq!(
            nearest_point_on_segment(Vec2::new(50, 10), a, b),
            Vec2::new(50, 0)
        );
    }

    #[test]
    fn test_degenerate_segment_distance() {
        let a = Vec2::new(5, 5);
        assert_eq!(point_segment_distance(Vec2::new(5, 15), a, a), 10);
    }

    #[test]
    fn test_segments_intersect_crossing_and_touching() {
        let o = Vec2::new(0, 0);
        assert!(segments_intersect(
            Vec2::new(-10, 0),
            Vec2::new(10, 0),
            Vec2::new(0, -10),
            Vec2::new(0, 10)
        ));
        // Touching at an endpoint counts
        assert!(segments_intersect(o, Vec2::new(10, 0), o, Vec2::new(0, 10)));
        assert!(!segments_intersect(
            Vec2::new(0, 1),
            Vec2::new(10, 1),
            Vec2::new(0, 5),
            Vec2::new(10, 5)
        ));
    }

    #[test]
    fn test_segment_intersection_point() {
        let p = segment_intersection(
            Vec2::new(-10, 0),
            Vec2::new(10, 0),
            Vec2::new(0, -10),
            Vec2::new(0, 10),
        );
        assert_eq!(p, Some(Vec2::new(0, 0)));
    }

    #[test]
    fn test_point_in_polygon_square() {
        let ring = [
            Vec2::new(0, 0),
            Vec2::new(10, 0),
            Vec2::new(10, 10),
            Vec2::new(0, 10),
        ];
        assert!(point_in_polygon(Vec2::new(5, 5), &ring));
        assert!(point_in_polygon(Vec2::new(0, 5), &ring)); // boundary
        assert!(!point_in_polygon(Vec2::new(15, 5), &ring));
    }

    #[test]
    fn test_convex_hull_square_with_interior_point() {
        let hull = convex_hull(&[
            Vec2::new(0, 0),
            Vec2::new(10, 0),
            Vec2::new(10, 10),
            Vec2::new(0, 10),
            Vec2::new(5, 5),
        ]);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Vec2::new(5, 5)));
    }

    #[test]
    fn test_circle_intersections() {
        let pts = circle_intersections(Vec2::new(0, 0), 10, Vec2::new(10, 0), 10);
        assert_eq!(pts.len(), 2);
        for p in pts {
            assert_eq!(p.x, 5);
            assert_eq!(p.y.abs(), (75f64).sqrt().round() as i32);
        }
        // Coincident centers: no intersection points
        assert!(circle_intersections(Vec2::ZERO, 10, Vec2::ZERO, 10).is_empty());
    }
}
