//! Optional debug visualization sink
//!
//! Routing algorithms emit named geometric annotations (points, lines,
//! boxes) for diagnostic overlays. The sink is injected once per session;
//! the default is a no-op and annotations never influence routing
//! decisions.

use crate::geom::{BBox, Vec2};
use std::time::Instant;

/// RGBA color packed as 0xRRGGBBAA
pub type Color = u32;

/// Receiver for debug annotations. Groups may nest.
pub trait DebugDecorator {
    fn begin_group(&mut self, _name: &str) {}
    fn end_group(&mut self) {}
    fn add_point(&mut self, _p: Vec2, _color: Color, _name: &str) {}
    fn add_line(&mut self, _points: &[Vec2], _color: Color, _name: &str) {}
    fn add_box(&mut self, _bbox: BBox, _color: Color, _name: &str) {}
    fn clear(&mut self) {}
}

/// Default sink: drops everything
#[derive(Debug, Default)]
pub struct NullDecorator;

impl DebugDecorator for NullDecorator {}

/// One recorded annotation with its capture time and group nesting depth
#[derive(Debug, Clone)]
pub struct DecoratorEvent {
    pub at: Instant,
    pub depth: usize,
    pub name: String,
    pub color: Color,
    pub kind: DecoratorShape,
}

#[derive(Debug, Clone)]
pub enum DecoratorShape {
    Point(Vec2),
    Line(Vec<Vec2>),
    Box(BBox),
}

/// Sink that records annotations in memory; used by tests and by hosts
/// that replay the overlay themselves
#[derive(Debug, Default)]
pub struct RecordingDecorator {
    pub events: Vec<DecoratorEvent>,
    depth: usize,
}

impl RecordingDecorator {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, color: Color, kind: DecoratorShape) {
        self.events.push(DecoratorEvent {
            at: Instant::now(),
            depth: self.depth,
            name: name.to_string(),
            color,
            kind,
        });
    }
}

impl DebugDecorator for RecordingDecorator {
    fn begin_group(&mut self, name: &str) {
        self.push(name, 0, DecoratorShape::Point(Vec2::ZERO));
        self.depth += 1;
    }

    fn end_group(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn add_point(&mut self, p: Vec2, color: Color, name: &str) {
        self.push(name, color, DecoratorShape::Point(p));
    }

    fn add_line(&mut self, points: &[Vec2], color: Color, name: &str) {
        self.push(name, color, DecoratorShape::Line(points.to_vec()));
    }

    fn add_box(&mut self, bbox: BBox, color: Color, name: &str) {
        self.push(name, color, DecoratorShape::Box(bbox));
    }

    fn clear(&mut self) {
        self.events.clear();
        self.depth = 0;
    }
}
