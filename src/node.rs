//! Branchable routing world snapshot
//!
//! A `RoutingNode` is a copy-on-write view over an arena of items. The
//! root node's delta IS the committed world membership; every branch stores
//! only its local add/remove sets and falls through to its parent for
//! everything else. Joints are derived from the effective item set and
//! rebuilt lazily; the root additionally keeps an R-tree over item
//! envelopes for obstacle queries.
//!
//! The engine is single-threaded by contract, so interior mutability is
//! plain `RefCell` and branch chains share the arena through `Rc`.

use crate::geom::{collide, Collision, Shape, Vec2};
use crate::item::{Item, ItemId, Layer, Net};
use indexmap::{IndexMap, IndexSet};
use rstar::{RTree, RTreeObject, AABB};
use std::cell::RefCell;
use std::rc::Rc;

/// Clearance policy supplied by the external design-rule engine.
/// The router only consumes the numbers; deciding which rules apply is
/// the DRC engine's business.
pub trait RuleResolver {
    /// Required clearance between two items, in board units
    fn clearance(&self, a: &Item, b: &Item) -> i32;

    /// Upper bound on any clearance this resolver can return; used to
    /// inflate spatial query windows
    fn max_clearance(&self) -> i32;
}

/// Uniform clearance for every item pair
#[derive(Debug, Clone, Copy)]
pub struct UniformRules(pub i32);

impl RuleResolver for UniformRules {
    fn clearance(&self, _a: &Item, _b: &Item) -> i32 {
        self.0
    }

    fn max_clearance(&self) -> i32 {
        self.0
    }
}

/// Lookup key for a derived joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JointKey {
    pub pos: Vec2,
    pub layer: Layer,
    pub net: Net,
}

/// Graph vertex where one or more items terminate at a shared
/// (position, layer, net)
#[derive(Debug, Clone)]
pub struct Joint {
    pub pos: Vec2,
    pub layer: Layer,
    pub net: Net,
    pub items: Vec<ItemId>,
}

impl Joint {
    /// A joint continues a line iff exactly two trace items meet there
    pub fn is_line_passthrough(&self, arena: &ItemArena) -> bool {
        self.items.len() == 2 && self.items.iter().all(|&id| arena.get(id).is_trace())
    }
}

/// Append-only item storage shared by a whole branch chain
#[derive(Debug, Default)]
pub struct ItemArena {
    items: Vec<Item>,
}

impl ItemArena {
    fn alloc(&mut self, item: Item) -> ItemId {
        let id = ItemId(self.items.len() as u32);
        self.items.push(item);
        id
    }

    pub fn get(&self, id: ItemId) -> Item {
        self.items[id.0 as usize]
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }
}

#[derive(Clone, Debug)]
struct IndexedItem {
    id: ItemId,
    env: AABB<[i32; 2]>,
}

impl RTreeObject for IndexedItem {
    type Envelope = AABB<[i32; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.env
    }
}

type JointMap = IndexMap<JointKey, Joint>;

/// One snapshot in a branch chain
pub struct RoutingNode {
    arena: Rc<RefCell<ItemArena>>,
    parent: Option<Rc<RoutingNode>>,
    added: RefCell<IndexSet<ItemId>>,
    removed: RefCell<IndexSet<ItemId>>,
    joints: RefCell<Option<JointMap>>,
    index: RefCell<Option<RTree<IndexedItem>>>,
    arena_mark: usize,
}

impl RoutingNode {
    /// Create an empty root (world) node
    pub fn new_world() -> RoutingNode {
        RoutingNode {
            arena: Rc::new(RefCell::new(ItemArena::default())),
            parent: None,
            added: RefCell::new(IndexSet::new()),
            removed: RefCell::new(IndexSet::new()),
            joints: RefCell::new(None),
            index: RefCell::new(None),
            arena_mark: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Create a child node whose lookups fall through to `self`
    pub fn branch(self: &Rc<Self>) -> RoutingNode {
        let mark = self.arena.borrow().len();
        RoutingNode {
            arena: Rc::clone(&self.arena),
            parent: Some(Rc::clone(self)),
            added: RefCell::new(IndexSet::new()),
            removed: RefCell::new(IndexSet::new()),
            joints: RefCell::new(None),
            index: RefCell::new(None),
            arena_mark: mark,
        }
    }

    fn invalidate(&self) {
        *self.joints.borrow_mut() = None;
        *self.index.borrow_mut() = None;
    }

    /// Record a new item in this node only; never touches the parent
    pub fn add(&self, item: Item) -> ItemId {
        let id = self.arena.borrow_mut().alloc(item);
        self.added.borrow_mut().insert(id);
        self.invalidate();
        id
    }

    /// Remove an item from this node's view. Removing a non-member is a
    /// no-op.
    pub fn remove(&self, id: ItemId) {
        if self.added.borrow_mut().shift_remove(&id) {
            self.invalidate();
            return;
        }
        if self
            .parent
            .as_ref()
            .map_or(false, |p| p.contains(id))
        {
            self.removed.borrow_mut().insert(id);
            self.invalidate();
        }
    }

    /// Membership test across the whole branch chain
    pub fn contains(&self, id: ItemId) -> bool {
        if self.removed.borrow().contains(&id) {
            return false;
        }
        if self.added.borrow().contains(&id) {
            return true;
        }
        self.parent.as_ref().map_or(false, |p| p.contains(id))
    }

    /// Copy an item out of the arena
    pub fn get(&self, id: ItemId) -> Item {
        self.arena.borrow().get(id)
    }

    /// Effective item set, parent-first order
    pub fn items(&self) -> Vec<ItemId> {
        let mut out = match &self.parent {
            Some(p) => p.items(),
            None => Vec::new(),
        };
        {
            let removed = self.removed.borrow();
            if !removed.is_empty() {
                out.retain(|id| !removed.contains(id));
            }
        }
        out.extend(self.added.borrow().iter().copied());
        out
    }

    /// Items added by this node relative to its parent (the most recent
    /// edit set, for incremental redraw)
    pub fn added_items(&self) -> Vec<ItemId> {
        self.added.borrow().iter().copied().collect()
    }

    /// Fold this branch's edits into its parent in O(edits).
    /// Calling commit on the root is a logic error.
    pub fn commit(self) {
        let parent = self
            .parent
            .as_ref()
            .expect("commit called on the world root");
        for id in self.removed.borrow().iter() {
            // Parent resolves the add-vs-inherited distinction itself
            parent.remove(*id);
        }
        for id in self.added.borrow().iter() {
            parent.added.borrow_mut().insert(*id);
        }
        parent.invalidate();
    }

    /// Drop this branch and reclaim the arena tail it allocated.
    /// Valid only while this is the newest uncommitted branch.
    pub fn discard(self) {
        let mark = self.arena_mark;
        self.arena.borrow_mut().truncate(mark);
    }

    fn with_joints<R>(&self, f: impl FnOnce(&JointMap, &ItemArena) -> R) -> R {
        let arena = self.arena.borrow();
        let mut cache = self.joints.borrow_mut();
        if cache.is_none() {
            let mut map: JointMap = IndexMap::new();
            for id in self.items() {
                let item = arena.get(id);
                for (pos, layer) in item.anchors() {
                    let key = JointKey {
                        pos,
                        layer,
                        net: item.net(),
                    };
                    map.entry(key)
                        .or_insert_with(|| Joint {
                            pos,
                            layer,
                            net: item.net(),
                            items: Vec::new(),
                        })
                        .items
                        .push(id);
                }
            }
            *cache = Some(map);
        }
        f(cache.as_ref().unwrap(), &arena)
    }

    /// Joint at an exact (position, layer, net), if any item terminates
    /// there
    pub fn find_joint(&self, pos: Vec2, layer: Layer, net: Net) -> Option<Joint> {
        self.with_joints(|map, _| map.get(&JointKey { pos, layer, net }).cloned())
    }

    /// True if the joint at the seed anchor continues a line (exactly two
    /// trace items)
    pub fn joint_is_passthrough(&self, pos: Vec2, layer: Layer, net: Net) -> bool {
        self.with_joints(|map, arena| {
            map.get(&JointKey { pos, layer, net })
                .map_or(false, |j| j.is_line_passthrough(arena))
        })
    }

    /// Item ids sharing a joint with `probe` (electrically connected
    /// geometry, which must never "collide" with itself)
    fn joint_connected(&self, probe: &Item) -> IndexSet<ItemId> {
        let net = probe.net();
        self.with_joints(|map, _| {
            let mut out = IndexSet::new();
            for (pos, layer) in probe.anchors() {
                if let Some(j) = map.get(&JointKey { pos, layer, net }) {
                    out.extend(j.items.iter().copied());
                }
            }
            out
        })
    }

    fn ensure_index(&self) {
        let mut cache = self.index.borrow_mut();
        if cache.is_none() {
            let arena = self.arena.borrow();
            let entries: Vec<IndexedItem> = self
                .added
                .borrow()
                .iter()
                .map(|&id| {
                    let bb = arena.get(id).bbox();
                    IndexedItem {
                        id,
                        env: AABB::from_corners([bb.min.x, bb.min.y], [bb.max.x, bb.max.y]),
                    }
                })
                .collect();
            *cache = Some(RTree::bulk_load(entries));
        }
    }

    /// Candidate items whose envelope intersects `bbox`, across the chain.
    /// The root answers from its R-tree; branches scan their small deltas.
    fn candidates(&self, bbox: &crate::geom::BBox, out: &mut Vec<ItemId>) {
        if self.is_root() {
            self.ensure_index();
            let index = self.index.borrow();
            let query = AABB::from_corners([bbox.min.x, bbox.min.y], [bbox.max.x, bbox.max.y]);
            out.extend(
                index
                    .as_ref()
                    .unwrap()
                    .locate_in_envelope_intersecting(&query)
                    .map(|e| e.id),
            );
            return;
        }
        if let Some(p) = &self.parent {
            p.candidates(bbox, out);
        }
        {
            let removed = self.removed.borrow();
            if !removed.is_empty() {
                out.retain(|id| !removed.contains(id));
            }
        }
        let arena = self.arena.borrow();
        for &id in self.added.borrow().iter() {
            if arena.get(id).bbox().intersects(bbox) {
                out.push(id);
            }
        }
    }

    /// Resolve a via handle to the item currently occupying that
    /// (position, layer span, net) in this node
    pub fn find_via(&self, handle: &crate::item::ViaHandle) -> Option<ItemId> {
        let joint = self.find_joint(handle.pos, handle.layers.start, handle.net)?;
        joint
            .items
            .iter()
            .copied()
            .find(|&id| handle.matches(&self.get(id)))
    }

    /// Collisions of a probe item value against this node's obstacle set.
    /// `skip` suppresses the probe's own ids; joint-connected items are
    /// excluded automatically. `first_only` short-circuits for boolean
    /// callers; `need_mtv` requests translation vectors (and disables the
    /// chain-level short-circuit inside the oracle).
    pub fn collisions_for(
        &self,
        probe: &Item,
        skip: &IndexSet<ItemId>,
        rules: &dyn RuleResolver,
        need_mtv: bool,
        first_only: bool,
    ) -> Vec<(ItemId, Collision)> {
        let shape = probe.shape();
        let layers = probe.layers();
        let connected = self.joint_connected(probe);
        let window = shape.bbox().inflated(rules.max_clearance());

        let mut ids = Vec::new();
        self.candidates(&window, &mut ids);

        let mut out = Vec::new();
        for id in ids {
            if skip.contains(&id) || connected.contains(&id) {
                continue;
            }
            let other = self.get(id);
            if !layers.overlaps(&other.layers()) {
                continue;
            }
            let clearance = rules.clearance(probe, &other);
            if let Some(col) = collide(&shape, &other.shape(), clearance, need_mtv) {
                out.push((id, col));
                if first_only {
                    break;
                }
            }
        }
        out
    }

    /// Boolean collision check for a member item
    pub fn check_colliding(&self, id: ItemId, rules: &dyn RuleResolver) -> bool {
        let probe = self.get(id);
        let mut skip = IndexSet::new();
        skip.insert(id);
        !self
            .collisions_for(&probe, &skip, rules, false, true)
            .is_empty()
    }

    /// Boolean collision check for a set of member items; set members do
    /// not collide with each other
    pub fn check_colliding_set(&self, ids: &[ItemId], rules: &dyn RuleResolver) -> bool {
        let skip: IndexSet<ItemId> = ids.iter().copied().collect();
        ids.iter().any(|&id| {
            let probe = self.get(id);
            !self
                .collisions_for(&probe, &skip, rules, false, true)
                .is_empty()
        })
    }

    /// Collision check for a free-standing shape carried by a probe item
    /// value that is not (yet) a member of the node
    pub fn check_colliding_value(
        &self,
        probe: &Item,
        skip: &IndexSet<ItemId>,
        rules: &dyn RuleResolver,
    ) -> bool {
        !self
            .collisions_for(probe, skip, rules, false, true)
            .is_empty()
    }
}
