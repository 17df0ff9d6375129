// End-to-end drag sessions against small hand-built boards
use router_core::{
    DragSettings, DragState, DragStrategy, Dragger, Item, ItemId, LayerRange, RoutingNode,
    SegmentItem, UniformRules, Vec2, ViaItem,
};
use std::rc::Rc;

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: i32 = 100;
    const CLEARANCE: i32 = 200;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn seg(node: &RoutingNode, a: Vec2, b: Vec2, net: i32, locked: bool) -> ItemId {
        node.add(Item::Segment(SegmentItem {
            a,
            b,
            width: WIDTH,
            layer: 0,
            net,
            locked,
        }))
    }

    fn settings(strategy: DragStrategy) -> DragSettings {
        DragSettings {
            strategy,
            ..Default::default()
        }
    }

    fn assert_world_clear(world: &RoutingNode, rules: &UniformRules) {
        for id in world.items() {
            assert!(
                !world.check_colliding(id, rules),
                "world item {:?} violates clearance after commit",
                id
            );
        }
    }

    /// Mark-obstacles drag of a segment midpoint: the span follows the
    /// cursor exactly and the endpoints stay anchored.
    #[test]
    fn test_mark_obstacles_midpoint_drag() {
        init_tracing();
        let world = Rc::new(RoutingNode::new_world());
        let id = seg(&world, Vec2::new(0, 0), Vec2::new(2000, 0), 1, false);
        let rules = UniformRules(CLEARANCE);

        let mut dragger = Dragger::new(world.clone(), &rules, settings(DragStrategy::MarkObstacles));
        dragger.start(Vec2::new(1000, 0), &[id]).unwrap();

        // World must stay untouched while the session is live
        assert!(dragger.drag(Vec2::new(1000, 100)));
        assert_eq!(world.items().len(), 1);
        assert!(world.contains(id));

        dragger.fix_route().unwrap();
        assert_eq!(dragger.state(), DragState::Fixed);
        assert!(!world.contains(id));

        // The dragged span now runs along y == 100
        let shifted = world.items().iter().any(|&i| {
            world
                .get(i)
                .endpoints()
                .map(|(a, b)| {
                    (a, b) == (Vec2::new(0, 100), Vec2::new(2000, 100))
                        || (a, b) == (Vec2::new(2000, 100), Vec2::new(0, 100))
                })
                .unwrap_or(false)
        });
        assert!(shifted, "dragged span should sit at the cursor height");
        assert_world_clear(&world, &rules);
    }

    /// Shove drag: pushing a trace into a parallel neighbor displaces the
    /// neighbor and the committed world is collision free.
    #[test]
    fn test_shove_drag_displaces_neighbor() {
        init_tracing();
        let world = Rc::new(RoutingNode::new_world());
        let head = seg(&world, Vec2::new(0, 0), Vec2::new(4000, 0), 1, false);
        let neighbor = seg(&world, Vec2::new(-3000, 500), Vec2::new(7000, 500), 2, false);
        let rules = UniformRules(CLEARANCE);

        let mut dragger = Dragger::new(world.clone(), &rules, settings(DragStrategy::Shove));
        dragger.start(Vec2::new(2000, 0), &[head]).unwrap();
        assert!(dragger.drag(Vec2::new(2000, 300)));
        dragger.fix_route().unwrap();

        // The neighbor was rewritten out of the way
        assert!(!world.contains(neighbor));
        assert_world_clear(&world, &rules);

        // The dragged span really moved to the cursor height
        let at_cursor = world.items().iter().any(|&i| {
            world
                .get(i)
                .endpoints()
                .map(|(a, b)| a.y == 300 && b.y == 300)
                .unwrap_or(false)
        });
        assert!(at_cursor);
    }

    /// Via drag in shove mode with an unobstructed fan-out of three:
    /// status ok, handle tracks the new position, all lines re-anchor.
    #[test]
    fn test_via_drag_reanchors_fanout() {
        init_tracing();
        let world = Rc::new(RoutingNode::new_world());
        let via = world.add(Item::Via(ViaItem {
            pos: Vec2::new(0, 0),
            diameter: 600,
            layers: LayerRange::new(0, 1),
            net: 1,
            locked: false,
        }));
        seg(&world, Vec2::new(0, 0), Vec2::new(3000, 0), 1, false);
        seg(&world, Vec2::new(0, 0), Vec2::new(0, 3000), 1, false);
        seg(&world, Vec2::new(0, 0), Vec2::new(-3000, 0), 1, false);
        let rules = UniformRules(CLEARANCE);

        let mut dragger = Dragger::new(world.clone(), &rules, settings(DragStrategy::Shove));
        dragger.start(Vec2::new(0, 0), &[via]).unwrap();
        assert!(dragger.drag(Vec2::new(500, 500)));

        let handle = dragger.via_handle().expect("via drag exposes a handle");
        assert_eq!(handle.pos, Vec2::new(500, 500));

        let trial = dragger.current_node().unwrap();
        assert!(trial.find_via(&handle).is_some());

        // All three fan-out lines terminate at the displaced via
        let touching = trial
            .items()
            .iter()
            .filter(|&&i| {
                trial
                    .get(i)
                    .endpoints()
                    .map(|(a, b)| a == handle.pos || b == handle.pos)
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(touching, 3, "every fan-out line re-anchors to the via");

        dragger.fix_route().unwrap();
        assert_world_clear(&world, &rules);
    }

    /// Walkaround drag into a locked obstacle: the route detours around
    /// it, ends up longer than the straight span, and stays legal.
    #[test]
    fn test_walkaround_detours_around_locked_obstacle() {
        init_tracing();
        let world = Rc::new(RoutingNode::new_world());
        let head = seg(&world, Vec2::new(0, 0), Vec2::new(4000, 0), 1, false);
        seg(&world, Vec2::new(1900, 400), Vec2::new(2100, 400), 2, true);
        let rules = UniformRules(CLEARANCE);

        let mut dragger = Dragger::new(world.clone(), &rules, settings(DragStrategy::Walkaround));
        dragger.start(Vec2::new(2000, 0), &[head]).unwrap();
        assert!(dragger.drag(Vec2::new(2000, 400)));
        dragger.fix_route().unwrap();

        assert_world_clear(&world, &rules);

        // The committed route deviates from the naive push-through path
        let detoured = world.items().iter().any(|&i| {
            let it = world.get(i);
            it.net() == 1
                && it
                    .endpoints()
                    .map(|(a, b)| a.y > 404 || b.y > 404 || (a.y < 396 && a.y > 0) || (b.y < 396 && b.y > 0))
                    .unwrap_or(false)
        });
        assert!(detoured, "walkaround should bend the route off y == 400");
    }

    /// A cancelled session leaves no trace in the world, whatever was
    /// tried in between.
    #[test]
    fn test_cancel_restores_world() {
        init_tracing();
        let world = Rc::new(RoutingNode::new_world());
        let head = seg(&world, Vec2::new(0, 0), Vec2::new(4000, 0), 1, false);
        seg(&world, Vec2::new(-3000, 500), Vec2::new(7000, 500), 2, false);
        let before = world.items();
        let rules = UniformRules(CLEARANCE);

        let mut dragger = Dragger::new(world.clone(), &rules, settings(DragStrategy::Shove));
        dragger.start(Vec2::new(2000, 0), &[head]).unwrap();
        dragger.drag(Vec2::new(2000, 300));
        dragger.drag(Vec2::new(2000, 450));
        dragger.cancel();

        assert_eq!(world.items(), before);
        assert_eq!(dragger.state(), DragState::Cancelled);
    }

    /// Free-angle mode downgrades any configured strategy to
    /// mark-obstacles: a blocked cursor flags the step instead of shoving.
    #[test]
    fn test_free_angle_forces_mark_obstacles() {
        init_tracing();
        let world = Rc::new(RoutingNode::new_world());
        let head = seg(&world, Vec2::new(0, 0), Vec2::new(4000, 0), 1, false);
        let neighbor = seg(&world, Vec2::new(-3000, 500), Vec2::new(7000, 500), 2, false);
        let rules = UniformRules(CLEARANCE);

        let cfg = DragSettings {
            strategy: DragStrategy::Shove,
            free_angle: true,
            ..Default::default()
        };
        let mut dragger = Dragger::new(world.clone(), &rules, cfg);
        dragger.start(Vec2::new(2000, 0), &[head]).unwrap();

        // Within clearance of the neighbor: flagged, not resolved
        assert!(!dragger.drag(Vec2::new(2000, 300)));
        let trial = dragger.current_node().unwrap();
        assert!(trial.contains(neighbor), "mark-obstacles never moves neighbors");

        dragger.cancel();
    }
}
