//! Interactive drag session state machine
//!
//! One `Dragger` drives one drag session: `start` latches onto the
//! selected item, every cursor update goes through `drag`, and the
//! session ends in `fix_route` (commit) or `cancel` (discard). Each
//! `drag` call branches a fresh trial node from the world, relocates the
//! dragged geometry, and applies exactly one conflict-resolution
//! strategy; the world itself is only ever mutated by the commit inside
//! `fix_route`.

use crate::decorator::{DebugDecorator, NullDecorator};
use crate::geom::{BBox, Vec2};
use crate::item::{Item, ItemId, ViaHandle, ViaItem};
use crate::line::Line;
use crate::node::{RoutingNode, RuleResolver};
use crate::optimizer;
use crate::settings::{DragSettings, DragStrategy};
use crate::shove::{self, ShoveStatus};
use crate::walkaround;
use anyhow::{bail, Result};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Started,
    Dragging,
    Fixed,
    Cancelled,
}

/// What exactly the cursor grabbed at start time. Trace grabs remember
/// original geometry by value: every drag call reassembles from the
/// unchanged world, so the values stay resolvable across the session.
#[derive(Debug, Clone)]
enum DragKind {
    /// Dragging a line vertex
    Corner { seed: ItemId, vertex: Vec2 },
    /// Dragging a whole segment mid-span
    Span {
        seed: ItemId,
        seg_a: Vec2,
        seg_b: Vec2,
        grab: Vec2,
    },
    /// Dragging a via and its fan-out
    Via { handle: ViaHandle },
}

pub struct Dragger<'a> {
    world: Rc<RoutingNode>,
    rules: &'a dyn RuleResolver,
    settings: DragSettings,
    decorator: Option<Rc<RefCell<dyn DebugDecorator>>>,
    state: DragState,
    kind: Option<DragKind>,
    /// Strategy resolved at start time (free-angle forces mark-obstacles)
    strategy: DragStrategy,
    last_node: Option<RoutingNode>,
    last_valid_point: Vec2,
    last_status: bool,
    last_via_handle: Option<ViaHandle>,
    traces: Vec<ItemId>,
}

impl<'a> Dragger<'a> {
    pub fn new(
        world: Rc<RoutingNode>,
        rules: &'a dyn RuleResolver,
        settings: DragSettings,
    ) -> Self {
        Self {
            world,
            rules,
            settings,
            decorator: None,
            state: DragState::Idle,
            kind: None,
            strategy: DragStrategy::MarkObstacles,
            last_node: None,
            last_valid_point: Vec2::ZERO,
            last_status: false,
            last_via_handle: None,
            traces: Vec::new(),
        }
    }

    /// Inject a debug annotation sink for this session
    pub fn with_decorator(mut self, decorator: Rc<RefCell<dyn DebugDecorator>>) -> Self {
        self.decorator = Some(decorator);
        self
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    /// The trial node produced by the most recent drag, for rendering
    pub fn current_node(&self) -> Option<&RoutingNode> {
        self.last_node.as_ref()
    }

    /// Items changed by the most recent drag, for incremental redraw
    pub fn traces(&self) -> &[ItemId] {
        &self.traces
    }

    pub fn last_valid_point(&self) -> Vec2 {
        self.last_valid_point
    }

    /// Latest via handle for a via drag (tracks shove displacement)
    pub fn via_handle(&self) -> Option<ViaHandle> {
        self.last_via_handle
    }

    /// Latch onto the first selectable candidate under the cursor.
    /// Fails without side effects on an empty selection, a locked item,
    /// or an item kind the engine does not route.
    pub fn start(&mut self, cursor: Vec2, candidates: &[ItemId]) -> Result<()> {
        if self.state != DragState::Idle {
            bail!("drag session already active");
        }
        let &seed = match candidates.first() {
            Some(s) => s,
            None => bail!("nothing selected to drag"),
        };
        if !self.world.contains(seed) {
            bail!("selected item is not part of the routing world");
        }
        let item = self.world.get(seed);
        if item.locked() {
            bail!("cannot drag a locked item");
        }

        self.kind = Some(match item {
            Item::Via(v) => DragKind::Via {
                handle: ViaHandle::of(&v),
            },
            Item::Segment(_) | Item::Arc(_) => {
                let (a, b) = item.endpoints().expect("trace item");
                let seg_len = a.distance(b);
                let grab_radius = seg_len / self.settings.corner_grab_divisor.max(1) as i64;
                let (da, db) = (cursor.distance(a), cursor.distance(b));
                if da.min(db) <= grab_radius {
                    DragKind::Corner {
                        seed,
                        vertex: if da <= db { a } else { b },
                    }
                } else {
                    DragKind::Span {
                        seed,
                        seg_a: a,
                        seg_b: b,
                        grab: crate::geom::primitives::nearest_point_on_segment(cursor, a, b),
                    }
                }
            }
        });

        self.strategy = if self.settings.free_angle {
            DragStrategy::MarkObstacles
        } else {
            self.settings.strategy
        };
        self.last_valid_point = cursor;
        self.state = DragState::Started;
        debug!(?cursor, strategy = ?self.strategy, "drag started");
        Ok(())
    }

    /// One cursor update: build a fresh trial node, relocate, resolve.
    /// Returns the drag status (true = geometrically valid). A false
    /// return still leaves a trial node for rendering, but does not
    /// advance the last valid point.
    pub fn drag(&mut self, cursor: Vec2) -> bool {
        if self.state != DragState::Started && self.state != DragState::Dragging {
            return false;
        }
        // Strictly sequential trials: drop the previous one first
        if let Some(n) = self.last_node.take() {
            n.discard();
        }
        let trial = self.world.branch();

        if let Some(d) = &self.decorator {
            d.borrow_mut().add_point(cursor, 0xffff00ff, "cursor");
        }

        let valid = match self.kind.clone().expect("started session has a kind") {
            DragKind::Corner { seed, vertex } => {
                self.drag_trace(&trial, seed, cursor, |pts| {
                    let mut out = pts.to_vec();
                    if let Some(p) = out.iter_mut().find(|p| **p == vertex) {
                        *p = cursor;
                    }
                    out
                })
            }
            DragKind::Span {
                seed,
                seg_a,
                seg_b,
                grab,
            } => {
                let delta = cursor - grab;
                self.drag_trace(&trial, seed, cursor, |pts| span_shift(pts, seg_a, seg_b, delta))
            }
            DragKind::Via { handle } => self.drag_via(&trial, &handle, cursor),
        };

        self.traces = trial.added_items();
        self.last_node = Some(trial);
        self.last_status = valid;
        if valid {
            self.last_valid_point = cursor;
        }
        self.state = DragState::Dragging;
        debug!(?cursor, valid, "drag step");
        valid
    }

    /// Commit the session. If the last step was invalid, retry at the
    /// last valid point first; refuse to commit a violating route unless
    /// violations are permitted.
    pub fn fix_route(&mut self) -> Result<()> {
        if self.state != DragState::Dragging {
            bail!("no drag in progress to fix");
        }
        if !self.last_status {
            let p = self.last_valid_point;
            self.drag(p);
        }
        if !self.last_status && !self.settings.allow_drc_violations {
            bail!("route still violates clearance and violations are not permitted");
        }
        let node = self.last_node.take().expect("dragging state has a trial");
        node.commit();
        self.state = DragState::Fixed;
        Ok(())
    }

    /// Abandon the session; the world is left untouched
    pub fn cancel(&mut self) {
        if let Some(n) = self.last_node.take() {
            n.discard();
        }
        self.traces.clear();
        self.state = DragState::Cancelled;
    }

    /// Run `f` against the injected annotation sink, or a no-op one
    fn with_sink<R>(&self, f: impl FnOnce(&mut dyn DebugDecorator) -> R) -> R {
        match &self.decorator {
            Some(d) => f(&mut *d.borrow_mut()),
            None => f(&mut NullDecorator),
        }
    }

    fn drag_trace(
        &mut self,
        trial: &RoutingNode,
        seed: ItemId,
        cursor: Vec2,
        relocate: impl Fn(&[Vec2]) -> Vec<Vec2>,
    ) -> bool {
        let line = match Line::assemble(trial, seed) {
            Some(l) => l,
            None => return false,
        };
        let new_pts = relocate(&line.points);
        let candidate = line.replace_in(trial, new_pts);

        match self.strategy {
            DragStrategy::MarkObstacles => {
                let candidate = self.smooth(trial, candidate, cursor);
                let colliding = trial.check_colliding_set(&candidate.items, self.rules);
                !colliding || self.settings.allow_drc_violations
            }
            DragStrategy::Shove => {
                let (status, head) = self.with_sink(|dec| {
                    shove::shove_line(trial, candidate, self.rules, &self.settings, dec)
                });
                if status != ShoveStatus::Failed {
                    self.smooth(trial, head, cursor);
                }
                status != ShoveStatus::Failed
            }
            DragStrategy::Walkaround => {
                if !trial.check_colliding_set(&candidate.items, self.rules) {
                    self.smooth(trial, candidate, cursor);
                    return true;
                }
                // Lift the naive candidate back out and search around
                let bare = Line::from_points(
                    candidate.points.clone(),
                    candidate.width,
                    candidate.layer,
                    candidate.net,
                );
                for &id in &candidate.items {
                    trial.remove(id);
                }
                let outcome = self.with_sink(|dec| {
                    walkaround::route(trial, &bare, self.rules, &self.settings, dec)
                });
                match outcome.best() {
                    Some(best) => {
                        let written = bare.replace_in(trial, best.points);
                        self.optimize_walk(trial, written, cursor, &bare.points);
                        true
                    }
                    None => {
                        // Keep the rejected geometry visible for rendering
                        bare.replace_in(trial, bare.points.clone());
                        false
                    }
                }
            }
        }
    }

    fn drag_via(&mut self, trial: &RoutingNode, handle: &ViaHandle, cursor: Vec2) -> bool {
        let via_id = match trial.find_via(handle) {
            Some(id) => id,
            None => return false,
        };
        let via = match trial.get(via_id) {
            Item::Via(v) => v,
            _ => return false,
        };
        let (new_id, fanout) = relocate_via(trial, via_id, &via, cursor);
        self.last_via_handle = match trial.get(new_id) {
            Item::Via(v) => Some(ViaHandle::of(&v)),
            _ => None,
        };

        match self.strategy {
            DragStrategy::MarkObstacles => {
                let mut all: Vec<ItemId> = vec![new_id];
                for l in &fanout {
                    all.extend(l.items.iter().copied());
                }
                let colliding = trial.check_colliding_set(&all, self.rules);
                !colliding || self.settings.allow_drc_violations
            }
            DragStrategy::Shove => {
                let (status, handle) = self.with_sink(|dec| {
                    shove::shove_via(trial, new_id, self.rules, &self.settings, dec)
                });
                if let Some(h) = handle {
                    self.last_via_handle = Some(h);
                }
                status != ShoveStatus::Failed
            }
            DragStrategy::Walkaround => {
                let mut ok = true;
                for line in fanout {
                    if !trial.check_colliding_set(&line.items, self.rules) {
                        continue;
                    }
                    let bare = Line::from_points(
                        line.points.clone(),
                        line.width,
                        line.layer,
                        line.net,
                    );
                    for &id in &line.items {
                        trial.remove(id);
                    }
                    let outcome = self.with_sink(|dec| {
                        walkaround::route(trial, &bare, self.rules, &self.settings, dec)
                    });
                    match outcome.best() {
                        Some(best) => {
                            bare.replace_in(trial, best.points);
                        }
                        None => {
                            bare.replace_in(trial, bare.points.clone());
                            ok = false;
                        }
                    }
                }
                ok
            }
        }
    }

    /// Collinear smoothing of a freshly written line, when enabled
    fn smooth(&self, trial: &RoutingNode, line: Line, cursor: Vec2) -> Line {
        if !self.settings.smooth_dragged_segments {
            return line;
        }
        let preserve = nearest_vertex(&line.points, cursor);
        let smoothed = optimizer::smooth(&line, preserve);
        if smoothed.points != line.points {
            return line.replace_in(trial, smoothed.points);
        }
        line
    }

    /// Full optimization of a walkaround result: corner elimination
    /// within the detoured region (or everywhere when configured)
    fn optimize_walk(
        &self,
        trial: &RoutingNode,
        line: Line,
        cursor: Vec2,
        naive_pts: &[Vec2],
    ) -> Line {
        let restrict = if self.settings.optimize_entire_track {
            None
        } else {
            // Only the spliced-in vertices bound the region worth
            // re-optimizing; the untouched run outside it stays as is
            let changed: Vec<Vec2> = line
                .points
                .iter()
                .copied()
                .filter(|p| !naive_pts.contains(p))
                .collect();
            if changed.is_empty() {
                return line;
            }
            Some(BBox::from_points(&changed).inflated(1))
        };
        let preserve = nearest_vertex(&line.points, cursor);
        let optimized = optimizer::optimize(
            trial,
            &line,
            restrict,
            preserve,
            self.settings.smooth_dragged_segments,
            self.rules,
        );
        if optimized.points != line.points {
            return line.replace_in(trial, optimized.points);
        }
        line
    }
}

/// Translate the span (seg_a, seg_b) by `delta`, keeping its neighbors
/// anchored through two connector corners
fn span_shift(pts: &[Vec2], seg_a: Vec2, seg_b: Vec2, delta: Vec2) -> Vec<Vec2> {
    let mut out = Vec::with_capacity(pts.len() + 2);
    let mut i = 0;
    while i < pts.len() {
        out.push(pts[i]);
        if i + 1 < pts.len() {
            let (p, q) = (pts[i], pts[i + 1]);
            if (p == seg_a && q == seg_b) || (p == seg_b && q == seg_a) {
                out.push(p + delta);
                out.push(q + delta);
            }
        }
        i += 1;
    }
    out
}

fn nearest_vertex(pts: &[Vec2], cursor: Vec2) -> Vec2 {
    *pts.iter()
        .min_by_key(|p| p.squared_distance(cursor))
        .unwrap_or(&cursor)
}

/// Move a via to `new_pos` and re-anchor every fan-out line endpoint.
/// Returns the new via id and the rewritten fan-out lines.
fn relocate_via(
    trial: &RoutingNode,
    via_id: ItemId,
    via: &ViaItem,
    new_pos: Vec2,
) -> (ItemId, Vec<Line>) {
    let fanout = shove::fanout_lines(trial, via);
    trial.remove(via_id);
    let new_id = trial.add(Item::Via(ViaItem {
        pos: new_pos,
        ..*via
    }));
    let mut moved = Vec::with_capacity(fanout.len());
    for line in fanout {
        let mut pts = line.points.clone();
        if let Some(first) = pts.first_mut() {
            if *first == via.pos {
                *first = new_pos;
            }
        }
        if let Some(last) = pts.last_mut() {
            if *last == via.pos {
                *last = new_pos;
            }
        }
        moved.push(line.replace_in(trial, pts));
    }
    (new_id, moved)
}
