//! Transitive displacement of colliding items
//!
//! Items found colliding with the dragged geometry are moved by the
//! minimum translation vector the oracle reports, then re-tested, and the
//! process repeats against the newly displaced set until no collisions
//! remain or the iteration cap is hit. Displaced lines keep their end
//! joints and bow their interior; locked obstacles push back on the head
//! instead, which surfaces as `HeadModified`.

use crate::decorator::DebugDecorator;
use crate::geom::Vec2;
use crate::item::{Item, ItemId, ViaHandle, ViaItem};
use crate::line::Line;
use crate::node::{RoutingNode, RuleResolver};
use crate::settings::DragSettings;
use indexmap::IndexSet;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Outcome of a shove pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShoveStatus {
    /// All collisions resolved, head untouched
    Ok,
    /// Resolved, but the shove altered the dragged geometry itself; the
    /// caller must adopt the returned head
    HeadModified,
    /// Could not resolve within the configured limits
    Failed,
}

enum Probe {
    Line { line: Line, is_head: bool },
    Via(ItemId),
}

/// Shove neighbors of a dragged line until it fits. Returns the final
/// status and the (possibly rewritten) head line.
pub fn shove_line(
    node: &RoutingNode,
    head: Line,
    rules: &dyn RuleResolver,
    settings: &DragSettings,
    decorator: &mut dyn DebugDecorator,
) -> (ShoveStatus, Line) {
    let corner_limit = if settings.shove_corner_limit > 0 {
        Some(settings.shove_corner_limit)
    } else {
        None
    };
    let mut engine = Engine {
        node,
        rules,
        settings,
        decorator,
        corner_limit,
        head_ids: head.id_set(),
        head_modified: false,
        current_via_id: None,
        current_via_handle: None,
    };
    let mut head = head;
    match engine.run(Probe::Line {
        line: head.clone(),
        is_head: true,
    }) {
        RunResult::Resolved(new_head) => {
            if let Some(l) = new_head {
                head = l;
            }
            let status = if engine.head_modified {
                ShoveStatus::HeadModified
            } else {
                ShoveStatus::Ok
            };
            (status, head)
        }
        RunResult::Failed => (ShoveStatus::Failed, head),
    }
}

/// Shove neighbors of a dragged via and its fan-out. The corner cap is
/// disabled here: via displacement legitimately needs more freedom.
/// Returns the updated handle on success.
pub fn shove_via(
    node: &RoutingNode,
    via: ItemId,
    rules: &dyn RuleResolver,
    settings: &DragSettings,
    decorator: &mut dyn DebugDecorator,
) -> (ShoveStatus, Option<ViaHandle>) {
    let via_item = match node.get(via) {
        Item::Via(v) => v,
        _ => return (ShoveStatus::Failed, None),
    };
    let mut head_ids: IndexSet<ItemId> = IndexSet::new();
    head_ids.insert(via);
    let fanout = fanout_lines(node, &via_item);
    for l in &fanout {
        head_ids.extend(l.items.iter().copied());
    }

    let mut engine = Engine {
        node,
        rules,
        settings,
        decorator,
        corner_limit: None,
        head_ids,
        head_modified: false,
        current_via_id: None,
        current_via_handle: None,
    };

    let mut queue: VecDeque<Probe> = VecDeque::new();
    queue.push_back(Probe::Via(via));
    for l in fanout {
        queue.push_back(Probe::Line {
            line: l,
            is_head: true,
        });
    }
    match engine.run_queue(queue) {
        RunResult::Resolved(_) => {
            let handle = engine
                .current_via_handle
                .or_else(|| Some(ViaHandle::of(&via_item)));
            let status = if engine.head_modified {
                ShoveStatus::HeadModified
            } else {
                ShoveStatus::Ok
            };
            (status, handle)
        }
        RunResult::Failed => (ShoveStatus::Failed, None),
    }
}

/// Lines terminating at the via's joints (its electrical fan-out)
pub fn fanout_lines(node: &RoutingNode, via: &ViaItem) -> Vec<Line> {
    let mut seen: IndexSet<ItemId> = IndexSet::new();
    let mut out = Vec::new();
    for layer in via.layers.iter() {
        if let Some(joint) = node.find_joint(via.pos, layer, via.net) {
            for id in joint.items {
                if seen.contains(&id) || !node.get(id).is_trace() {
                    continue;
                }
                if let Some(line) = Line::assemble(node, id) {
                    seen.extend(line.items.iter().copied());
                    out.push(line);
                }
            }
        }
    }
    out
}

enum RunResult {
    /// Resolved; carries the rewritten head line if it changed
    Resolved(Option<Line>),
    Failed,
}

struct Engine<'a> {
    node: &'a RoutingNode,
    rules: &'a dyn RuleResolver,
    settings: &'a DragSettings,
    decorator: &'a mut dyn DebugDecorator,
    corner_limit: Option<u32>,
    head_ids: IndexSet<ItemId>,
    head_modified: bool,
    /// Tracks the dragged via across displacements; shove_via reads these
    /// after the run
    current_via_id: Option<ItemId>,
    current_via_handle: Option<ViaHandle>,
}

impl<'a> Engine<'a> {
    fn run(&mut self, head: Probe) -> RunResult {
        let mut queue = VecDeque::new();
        queue.push_back(head);
        self.run_queue(queue)
    }

    fn run_queue(&mut self, mut queue: VecDeque<Probe>) -> RunResult {
        let mut new_head: Option<Line> = None;
        let mut iters = 0u32;
        loop {
            while let Some(probe) = queue.pop_front() {
                iters += 1;
                if iters > self.settings.shove_iteration_limit {
                    debug!(iters, "shove iteration limit hit");
                    return RunResult::Failed;
                }
                match probe {
                    Probe::Via(id) => {
                        if !self.node.contains(id) {
                            continue;
                        }
                        match self.step_via(id, &mut queue) {
                            StepResult::Clean => {}
                            StepResult::Progress => {}
                            StepResult::Stuck => return RunResult::Failed,
                        }
                    }
                    Probe::Line { line, is_head } => {
                        // Stale probes (rewritten since queued) are skipped
                        if !line.items.iter().all(|&id| self.node.contains(id)) {
                            continue;
                        }
                        match self.step_line(line, is_head, &mut queue) {
                            StepOutcome::Clean(line) => {
                                if is_head {
                                    new_head = Some(line);
                                }
                            }
                            StepOutcome::Progress => {}
                            StepOutcome::Stuck => return RunResult::Failed,
                        }
                    }
                }
            }
            // The queue drained, but line probes skip their whole run's
            // ids while the node's checker only exempts joint-connected
            // items. Re-verify every rewritten item against the node's
            // standard before declaring the shove resolved; anything
            // still colliding goes back on the queue under the same
            // iteration cap.
            let residual = self.residual_collisions();
            if residual.is_empty() {
                return RunResult::Resolved(new_head);
            }
            debug!(count = residual.len(), "residual collisions after drain");
            queue.extend(residual);
        }
    }

    /// Rewritten items the node's own checker still flags
    fn residual_collisions(&self) -> Vec<Probe> {
        let mut seen: IndexSet<ItemId> = IndexSet::new();
        let mut out = Vec::new();
        for id in self.node.added_items() {
            if seen.contains(&id) || !self.node.check_colliding(id, self.rules) {
                continue;
            }
            match self.node.get(id) {
                Item::Via(_) => {
                    seen.insert(id);
                    out.push(Probe::Via(id));
                }
                Item::Segment(_) | Item::Arc(_) => {
                    if let Some(line) = Line::assemble(self.node, id) {
                        seen.extend(line.items.iter().copied());
                        let is_head = line.items.iter().all(|i| self.head_ids.contains(i));
                        out.push(Probe::Line { line, is_head });
                    }
                }
            }
        }
        out
    }

    /// First collision of any of the line's items, with MTV
    fn first_collision(&self, line: &Line) -> Option<(ItemId, crate::geom::Collision)> {
        let skip = line.id_set();
        for &id in &line.items {
            let probe = self.node.get(id);
            let cols = self
                .node
                .collisions_for(&probe, &skip, self.rules, true, true);
            if let Some(c) = cols.into_iter().next() {
                return Some(c);
            }
        }
        None
    }

    fn step_line(&mut self, line: Line, is_head: bool, queue: &mut VecDeque<Probe>) -> StepOutcome {
        let (obstacle_id, col) = match self.first_collision(&line) {
            Some(c) => c,
            None => return StepOutcome::Clean(line),
        };
        let mtv = col.mtv.expect("shove probes request MTVs");
        let obstacle = self.node.get(obstacle_id);
        trace!(?obstacle_id, ?mtv, "shove collision");
        self.decorator.add_point(col.point, 0xff4040ff, "shove contact");
        self.decorator
            .add_line(&[col.point, col.point + mtv], 0xffa040ff, "shove mtv");

        let obstacle_is_head = self.head_ids.contains(&obstacle_id);
        if obstacle.locked() || obstacle_is_head {
            // Can't move the obstacle: bow the probe line away instead
            let moved = self.bow_line(&line, mtv);
            let moved = match moved {
                Some(m) => m,
                None => return StepOutcome::Stuck,
            };
            if is_head {
                // bow_line already remapped head_ids to the moved items
                self.head_modified = true;
            }
            queue.push_back(Probe::Line {
                line: moved,
                is_head,
            });
            return StepOutcome::Progress;
        }

        match obstacle {
            Item::Via(v) => {
                self.displace_via(obstacle_id, &v, -mtv, queue);
                queue.push_back(Probe::Line { line, is_head });
                StepOutcome::Progress
            }
            Item::Segment(_) | Item::Arc(_) => {
                let ol = match Line::assemble(self.node, obstacle_id) {
                    Some(l) => l,
                    None => return StepOutcome::Stuck,
                };
                let moved = match self.bow_line(&ol, -mtv) {
                    Some(m) => m,
                    None => return StepOutcome::Stuck,
                };
                queue.push_back(Probe::Line {
                    line: moved,
                    is_head: false,
                });
                queue.push_back(Probe::Line { line, is_head });
                StepOutcome::Progress
            }
        }
    }

    fn step_via(&mut self, id: ItemId, queue: &mut VecDeque<Probe>) -> StepResult {
        let mut skip: IndexSet<ItemId> = self.head_ids.clone();
        skip.insert(id);
        let probe = self.node.get(id);
        let cols = self
            .node
            .collisions_for(&probe, &skip, self.rules, true, true);
        let (obstacle_id, col) = match cols.into_iter().next() {
            Some(c) => c,
            None => return StepResult::Clean,
        };
        let mtv = col.mtv.expect("shove probes request MTVs");
        let obstacle = self.node.get(obstacle_id);
        self.decorator.add_point(col.point, 0xff4040ff, "shove contact");
        self.decorator
            .add_line(&[col.point, col.point + mtv], 0xffa040ff, "shove mtv");
        if obstacle.locked() {
            // Locked obstacle pushes the dragged via back
            if let Item::Via(v) = probe {
                self.displace_via(id, &v, mtv, queue);
                self.head_modified = true;
                queue.push_back(Probe::Via(self.current_via_id.unwrap_or(id)));
                return StepResult::Progress;
            }
            return StepResult::Stuck;
        }
        match obstacle {
            Item::Via(v) => {
                self.displace_via(obstacle_id, &v, -mtv, queue);
            }
            Item::Segment(_) | Item::Arc(_) => {
                let ol = match Line::assemble(self.node, obstacle_id) {
                    Some(l) => l,
                    None => return StepResult::Stuck,
                };
                if self.bow_line(&ol, -mtv).is_none() {
                    return StepResult::Stuck;
                }
            }
        }
        queue.push_back(Probe::Via(id));
        StepResult::Progress
    }

    /// Translate a line's interior by `delta`, keeping both end joints.
    /// A single-segment line gains two vertices (the classic shove bump).
    /// Returns None when the corner cap would be exceeded.
    fn bow_line(&mut self, line: &Line, delta: Vec2) -> Option<Line> {
        let (start, end) = line.endpoints();
        let mut pts = Vec::with_capacity(line.points.len() + 2);
        pts.push(start);
        for &p in &line.points {
            pts.push(p + delta);
        }
        pts.push(end);
        pts.dedup();
        if let Some(limit) = self.corner_limit {
            if pts.len().saturating_sub(2) as u32 > limit {
                debug!(corners = pts.len() - 2, limit, "shove corner cap hit");
                return None;
            }
        }
        let was_head = line
            .items
            .iter()
            .all(|id| self.head_ids.contains(id));
        let moved = line.replace_in(self.node, pts);
        if was_head {
            for id in line.items.iter() {
                self.head_ids.shift_remove(id);
            }
            self.head_ids.extend(moved.items.iter().copied());
        }
        Some(moved)
    }

    /// Move a via by `delta` and re-anchor every fan-out endpoint to the
    /// new center. Affected lines are requeued for re-testing.
    fn displace_via(
        &mut self,
        id: ItemId,
        via: &ViaItem,
        delta: Vec2,
        queue: &mut VecDeque<Probe>,
    ) {
        let new_pos = via.pos + delta;
        // Collect fan-out membership before mutating anything
        let fanout = fanout_lines(self.node, via);
        let was_head = self.head_ids.contains(&id);

        self.node.remove(id);
        let new_via = ViaItem {
            pos: new_pos,
            ..*via
        };
        let new_id = self.node.add(Item::Via(new_via));
        if was_head {
            self.head_ids.shift_remove(&id);
            self.head_ids.insert(new_id);
            self.current_via_id = Some(new_id);
            self.current_via_handle = Some(ViaHandle::of(&new_via));
        }

        for line in fanout {
            let line_is_head = line.items.iter().all(|i| self.head_ids.contains(i));
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
            let moved = line.replace_in(self.node, pts);
            if line_is_head {
                for i in line.items.iter() {
                    self.head_ids.shift_remove(i);
                }
                self.head_ids.extend(moved.items.iter().copied());
            }
            queue.push_back(Probe::Line {
                line: moved,
                is_head: line_is_head,
            });
        }
    }
}

enum StepOutcome {
    Clean(Line),
    Progress,
    Stuck,
}

enum StepResult {
    Clean,
    Progress,
    Stuck,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorator::NullDecorator;
    use crate::geom::Vec2;
    use crate::item::{LayerRange, SegmentItem};
    use crate::node::UniformRules;
    use std::rc::Rc;

    fn seg(node: &RoutingNode, a: Vec2, b: Vec2, net: i32) -> ItemId {
        node.add(Item::Segment(SegmentItem {
            a,
            b,
            width: 100,
            layer: 0,
            net,
            locked: false,
        }))
    }

    #[test]
    fn test_shove_displaces_single_neighbor() {
        let world = Rc::new(RoutingNode::new_world());
        let head_id = seg(&world, Vec2::new(1000, 0), Vec2::new(3000, 0), 1);
        // Parallel neighbor 150 away on another net: separation 50 < 200.
        // Its endpoints sit far beyond the head in x, so it can be bowed
        // clear without moving them.
        let neighbor = seg(&world, Vec2::new(-2000, 150), Vec2::new(6000, 150), 2);

        let trial = world.branch();
        let head = Line::assemble(&trial, head_id).unwrap();
        let rules = UniformRules(200);
        let settings = DragSettings::default();
        let (status, _head) = shove_line(&trial, head, &rules, &settings, &mut NullDecorator);

        assert_eq!(status, ShoveStatus::Ok);
        assert!(!trial.contains(neighbor));
        // Whatever replaced the neighbor is clear of the head
        for id in trial.added_items() {
            assert!(!trial.check_colliding(id, &rules));
        }
    }

    #[test]
    fn test_shove_locked_obstacle_modifies_head() {
        let world = Rc::new(RoutingNode::new_world());
        let head_id = seg(&world, Vec2::new(0, 0), Vec2::new(4000, 0), 1);
        // Short locked obstacle near the head's midspan; the head's own
        // endpoints stay well clear of it
        world.add(Item::Segment(SegmentItem {
            a: Vec2::new(1900, 150),
            b: Vec2::new(2100, 150),
            width: 100,
            layer: 0,
            net: 2,
            locked: true,
        }));

        let trial = world.branch();
        let head = Line::assemble(&trial, head_id).unwrap();
        let rules = UniformRules(200);
        let settings = DragSettings::default();
        let (status, new_head) = shove_line(&trial, head, &rules, &settings, &mut NullDecorator);

        assert_eq!(status, ShoveStatus::HeadModified);
        assert_eq!(new_head.endpoints(), (Vec2::new(0, 0), Vec2::new(4000, 0)));
        assert!(!trial.check_colliding_set(
            &new_head.items.iter().copied().collect::<Vec<_>>(),
            &rules
        ));
    }

    #[test]
    fn test_shove_terminates_on_packed_field() {
        let world = Rc::new(RoutingNode::new_world());
        let head_id = seg(&world, Vec2::new(0, 0), Vec2::new(4000, 0), 1);
        // Wall of locked lines on both sides: nothing can move
        for i in 1..10 {
            world.add(Item::Segment(SegmentItem {
                a: Vec2::new(0, i * 120),
                b: Vec2::new(4000, i * 120),
                width: 100,
                layer: 0,
                net: 100 + i,
                locked: true,
            }));
            world.add(Item::Segment(SegmentItem {
                a: Vec2::new(0, -i * 120),
                b: Vec2::new(4000, -i * 120),
                width: 100,
                layer: 0,
                net: 200 + i,
                locked: true,
            }));
        }
        let trial = world.branch();
        let head = Line::assemble(&trial, head_id).unwrap();
        let rules = UniformRules(200);
        let settings = DragSettings {
            shove_iteration_limit: 30,
            ..Default::default()
        };
        let (status, _) = shove_line(&trial, head, &rules, &settings, &mut NullDecorator);
        assert_eq!(status, ShoveStatus::Failed);
    }

    #[test]
    fn test_shove_chain_of_two_neighbors() {
        let world = Rc::new(RoutingNode::new_world());
        let head_id = seg(&world, Vec2::new(1000, 0), Vec2::new(3000, 0), 1);
        // Two stacked neighbors with staggered endpoints; shoving the
        // first pushes it into the second
        seg(&world, Vec2::new(-2000, 150), Vec2::new(6000, 150), 2);
        seg(&world, Vec2::new(-4000, 420), Vec2::new(8000, 420), 3);

        let trial = world.branch();
        let head = Line::assemble(&trial, head_id).unwrap();
        let rules = UniformRules(200);
        let settings = DragSettings::default();
        let (status, _) = shove_line(&trial, head, &rules, &settings, &mut NullDecorator);

        assert_eq!(status, ShoveStatus::Ok);
        // Everything in the trial is now clear
        for id in trial.items() {
            assert!(!trial.check_colliding(id, &rules), "item {:?} still colliding", id);
        }
    }

    fn via(node: &RoutingNode, pos: Vec2, net: i32) -> ItemId {
        node.add(Item::Via(ViaItem {
            pos,
            diameter: 600,
            layers: LayerRange::single(0),
            net,
            locked: false,
        }))
    }

    #[test]
    fn test_shove_via_with_fanout_clears_node_checker() {
        let world = Rc::new(RoutingNode::new_world());
        let head_id = seg(&world, Vec2::new(0, 1000), Vec2::new(4000, 1000), 1);
        // Unlocked via with a fan-out stub leading away from the head; the
        // via must be pushed up and the stub re-anchored to follow it
        via(&world, Vec2::new(2000, 1150), 2);
        seg(&world, Vec2::new(2000, 1150), Vec2::new(2000, 3000), 2);

        let trial = world.branch();
        let head = Line::assemble(&trial, head_id).unwrap();
        let rules = UniformRules(200);
        let settings = DragSettings::default();
        let (status, _) = shove_line(&trial, head, &rules, &settings, &mut NullDecorator);

        assert_eq!(status, ShoveStatus::Ok);
        // Every rewritten item passes the node's own checker, not just the
        // engine's probe filter
        for id in trial.added_items() {
            assert!(!trial.check_colliding(id, &rules), "item {:?} still colliding", id);
        }
    }

    #[test]
    fn test_shove_never_resolves_while_checker_still_fails() {
        let world = Rc::new(RoutingNode::new_world());
        let head_id = seg(&world, Vec2::new(0, 1000), Vec2::new(4000, 1000), 1);
        // The fan-out stub crosses the head itself, so displacing the via
        // can never clear it by bowing alone
        via(&world, Vec2::new(2000, 1150), 2);
        seg(&world, Vec2::new(2000, 1150), Vec2::new(2000, 0), 2);

        let trial = world.branch();
        let head = Line::assemble(&trial, head_id).unwrap();
        let rules = UniformRules(200);
        let settings = DragSettings {
            shove_iteration_limit: 50,
            ..Default::default()
        };
        let (status, _) = shove_line(&trial, head, &rules, &settings, &mut NullDecorator);

        // An unresolvable scenario must surface as Failed, never as a
        // success carrying collisions the node's checker would flag
        if status != ShoveStatus::Failed {
            for id in trial.added_items() {
                assert!(!trial.check_colliding(id, &rules), "item {:?} still colliding", id);
            }
        }
    }
}
