//! The per-node Chord state machine: finger table, predecessor/successor
//! pointers, lookup routing, join, leave, and key redistribution.
//!
//! Every method here that needs to address another peer takes `&RingManager`
//! and goes through it — see `registry.rs` for why that's always safe to call
//! reentrantly.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::id::{Id, IdSpace};
use crate::node::{FingerEntry, Node};
use crate::registry::RingManager;

/// One ring member's local view of the ring.
#[derive(Debug)]
pub struct Chord {
    self_node: Node,
    pub(crate) predecessor: Option<Node>,
    pub(crate) successor: Node,
    pub(crate) fingers: Vec<FingerEntry>,
    resources: BTreeMap<Id, String>,
}

impl Chord {
    /// Builds a node with its finger `start` values fixed but not yet joined
    /// to anything — call [`Chord::join`] to place it on a ring.
    pub fn new(self_node: Node, space: &IdSpace) -> Self {
        let fingers = (0..space.m())
            .map(|i| {
                let offset = 1u64 << i;
                let start = ((self_node.id as u64 + offset) % space.size()) as Id;
                FingerEntry::new(start, Node::empty())
            })
            .collect();
        Self {
            self_node,
            predecessor: None,
            successor: Node::empty(),
            fingers,
            resources: BTreeMap::new(),
        }
    }

    pub fn self_node(&self) -> &Node {
        &self.self_node
    }

    pub fn predecessor(&self) -> Option<&Node> {
        self.predecessor.as_ref().filter(|n| !n.is_empty())
    }

    pub fn successor(&self) -> &Node {
        &self.successor
    }

    pub fn fingers(&self) -> &[FingerEntry] {
        &self.fingers
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn resources(&self) -> impl Iterator<Item = (&Id, &String)> {
        self.resources.iter()
    }

    pub fn has_resource(&self, id: Id) -> bool {
        self.resources.contains_key(&id)
    }

    fn set_successor(&mut self, node: Node) {
        self.successor = node.clone();
        if let Some(f0) = self.fingers.first_mut() {
            f0.node = node;
        }
    }

    /// Initializes this node as the sole member of its own ring.
    pub(crate) fn init_solitary(&mut self) {
        self.predecessor = Some(self.self_node.clone());
        self.successor = self.self_node.clone();
        for finger in self.fingers.iter_mut() {
            finger.node = self.self_node.clone();
        }
        debug!(node = %self.self_node, "initialized solitary ring");
    }

    /// Returns the live node responsible for `id`.
    pub fn find_successor(&self, id: Id, registry: &RingManager) -> Node {
        if self.successor.is_empty() {
            return self.self_node.clone();
        }
        if id == self.self_node.id {
            return self.self_node.clone();
        }
        let space = registry.space();
        if space.in_half_open(id, self.self_node.id, self.successor.id) {
            return self.successor.clone();
        }
        if let Some(pred) = self.predecessor() {
            if space.in_half_open(id, pred.id, self.self_node.id) {
                return self.self_node.clone();
            }
        }
        let cp = self.closest_preceding_node(id, space);
        if cp.id == self.self_node.id || cp.is_empty() {
            return self.successor.clone();
        }
        match registry.with_node(cp.id, |chord, registry| chord.find_successor(id, registry)) {
            Some(result) => result,
            None => {
                warn!(node = %self.self_node, stale_peer = cp.id, "closest preceding node vanished mid-lookup, falling back to successor");
                self.successor.clone()
            }
        }
    }

    /// Scans the finger table from `m-1` down to `0` for the tightest finger
    /// strictly between self and `id`.
    pub fn closest_preceding_node(&self, id: Id, space: IdSpace) -> Node {
        for finger in self.fingers.iter().rev() {
            let candidate = &finger.node;
            if !candidate.is_empty()
                && candidate.id != self.self_node.id
                && candidate.id != id
                && space.in_open(candidate.id, self.self_node.id, id)
            {
                return candidate.clone();
            }
        }
        self.self_node.clone()
    }

    /// Iteratively walks forward until `id` falls in `(current, current.successor]`.
    ///
    /// Bounded by `2*m` hops; degrades to the last node reached if the bound
    /// is hit rather than looping forever under inconsistent state.
    pub fn find_predecessor(&self, id: Id, registry: &RingManager) -> Node {
        let space = registry.space();
        let mut current = self.self_node.clone();
        let mut current_successor = self.successor.clone();
        let max_hops = 2 * space.m() as usize;

        for _ in 0..max_hops {
            if current_successor.is_empty() {
                break;
            }
            if space.in_half_open(id, current.id, current_successor.id) {
                return current;
            }

            let next = if current.id == self.self_node.id {
                self.closest_preceding_node(id, space)
            } else {
                match registry.with_node(current.id, |chord, _| chord.closest_preceding_node(id, space)) {
                    Some(n) => n,
                    None => {
                        warn!(node = %self.self_node, stale_peer = current.id, "peer vanished during find_predecessor walk");
                        return current;
                    }
                }
            };
            if next.id == current.id {
                break;
            }
            current = next;
            current_successor = if current.id == self.self_node.id {
                self.successor.clone()
            } else {
                match registry.with_node(current.id, |chord, _| chord.successor.clone()) {
                    Some(s) => s,
                    None => {
                        warn!(node = %self.self_node, stale_peer = current.id, "peer vanished during find_predecessor walk");
                        return current;
                    }
                }
            };
        }
        warn!(node = %self.self_node, target = id, hops = max_hops, "find_predecessor hit its hop limit, returning best candidate");
        current
    }

    /// Joins the ring through `bootstrap`, or initializes solitary if
    /// `bootstrap` is empty or self.
    pub(crate) fn join(&mut self, bootstrap: Node, registry: &RingManager) {
        if bootstrap.is_empty() || bootstrap.id == self.self_node.id {
            self.init_solitary();
            return;
        }
        let space = registry.space();

        // 1. locate our successor through the bootstrap node.
        let succ = registry
            .with_node(bootstrap.id, |chord, registry| chord.find_successor(self.self_node.id, registry))
            .unwrap_or_else(|| bootstrap.clone());
        self.set_successor(succ.clone());

        // 2. adopt succ's current predecessor as our own, unless it's empty/self.
        let succ_pred = registry
            .with_node(succ.id, |chord, _| chord.predecessor.clone())
            .flatten()
            .unwrap_or_else(Node::empty);
        let adopted_pred = if succ_pred.is_empty() || succ_pred.id == self.self_node.id {
            succ.clone()
        } else {
            succ_pred.clone()
        };
        self.predecessor = Some(adopted_pred);

        // 3. tell succ we think we're its new predecessor.
        let self_identity = self.self_node.clone();
        registry.with_node(succ.id, move |chord, space| {
            chord.notify_predecessor(self_identity, space)
        });

        // 4. if succ's old predecessor was a real, distinct node, point it at us.
        if !succ_pred.is_empty() && succ_pred.id != self.self_node.id {
            let self_identity = self.self_node.clone();
            registry.with_node(succ_pred.id, move |chord, _| chord.set_successor(self_identity));
        }

        // 5. populate the remaining fingers by routing through the ring we just joined.
        for i in 1..self.fingers.len() {
            let start = self.fingers[i].start;
            self.fingers[i].node = self.find_successor(start, registry);
        }

        // 6. pull over the keys we now own from our successor.
        self.redistribute_from_successor(registry);

        debug!(node = %self.self_node, successor = %self.successor, predecessor = ?self.predecessor, "joined ring");
    }

    /// Accepts `candidate` as our new predecessor if our current one is
    /// empty or self (no real predecessor yet), or `candidate` is a tighter
    /// fit than whatever we currently have.
    pub(crate) fn notify_predecessor(&mut self, candidate: Node, space: IdSpace) -> bool {
        let accept = match &self.predecessor {
            None => true,
            Some(pred) if pred.is_empty() || pred.id == self.self_node.id => true,
            Some(pred) => space.in_open(candidate.id, pred.id, self.self_node.id),
        };
        if accept {
            debug!(node = %self.self_node, new_predecessor = %candidate, "accepted new predecessor");
            self.predecessor = Some(candidate);
        }
        accept
    }

    /// Updates any finger that `new_node` now sits in front of.
    pub(crate) fn update_finger_table(&mut self, new_node: Node, space: IdSpace) {
        for finger in self.fingers.iter_mut() {
            let should_update =
                new_node.id == finger.start || space.in_open(new_node.id, finger.start, finger.node.id);
            if should_update && finger.node.id != new_node.id {
                finger.node = new_node.clone();
            }
        }
        self.successor = self.fingers[0].node.clone();
    }

    /// Recomputes fingers `1..m` by routing through the ring. Finger 0 is
    /// never touched here — it is kept in sync with `successor` by whichever
    /// operation changes membership.
    pub(crate) fn fix_fingers(&mut self, registry: &RingManager) {
        for i in 1..self.fingers.len() {
            let start = self.fingers[i].start;
            let resolved = self.find_successor(start, registry);
            self.fingers[i].node = if resolved.is_empty() {
                self.successor.clone()
            } else {
                resolved
            };
        }
    }

    /// Pulls every key our successor holds that now belongs to us.
    fn redistribute_from_successor(&mut self, registry: &RingManager) {
        let succ_id = self.successor.id;
        if succ_id == self.self_node.id {
            return;
        }
        let pred_id = self.predecessor().map(|p| p.id).unwrap_or(self.self_node.id);
        let self_id = self.self_node.id;
        let space = registry.space();
        let moved = registry
            .with_node(succ_id, |chord, _| chord.extract_resources_in_range(pred_id, self_id, space))
            .unwrap_or_default();
        let moved_count = moved.len();
        for (id, value) in moved {
            self.resources.insert(id, value);
        }
        if moved_count > 0 {
            debug!(node = %self.self_node, count = moved_count, "pulled redistributed resources from successor");
        }
    }

    /// Removes and returns every resource whose key-id falls in
    /// `(pred_id, self_id]`, for handoff to whichever node now owns them.
    fn extract_resources_in_range(&mut self, pred_id: Id, self_id: Id, space: IdSpace) -> Vec<(Id, String)> {
        let matching: Vec<Id> = self
            .resources
            .keys()
            .copied()
            .filter(|&k| space.in_half_open(k, pred_id, self_id))
            .collect();
        matching
            .into_iter()
            .map(|k| {
                let value = self.resources.remove(&k).expect("key just observed present");
                (k, value)
            })
            .collect()
    }

    /// Leaves the ring: hands resources to the successor, splices the
    /// predecessor and successor together, and clears local resources.
    ///
    /// Deliberately leaves `self.predecessor`/`self.successor` intact
    /// (rather than clearing them) so the registry's leave broadcast — which
    /// runs before this node is actually removed from the registry — can
    /// still read "this node's former successor" off of it.
    pub(crate) fn leave(&mut self, registry: &RingManager) {
        if self.successor.id == self.self_node.id {
            self.resources.clear();
            debug!(node = %self.self_node, "left a solitary ring");
            return;
        }

        let succ_id = self.successor.id;
        let succ_node = self.successor.clone();
        let pred_opt = self.predecessor.clone();
        let resources = std::mem::take(&mut self.resources);
        let resource_count = resources.len();

        registry.with_node(succ_id, move |chord, _| {
            for (id, value) in resources {
                chord.add_resource_directly(id, value);
            }
        });

        if let Some(pred) = pred_opt.clone() {
            if !pred.is_empty() && pred.id != self.self_node.id {
                let new_succ = succ_node.clone();
                registry.with_node(pred.id, move |chord, _| chord.set_successor(new_succ));
            }
        }

        let new_pred = pred_opt.filter(|p| !p.is_empty());
        registry.with_node(succ_id, move |chord, _| chord.predecessor = new_pred);

        debug!(node = %self.self_node, handed_off = resource_count, "left ring, spliced neighbors");
    }

    /// Reacts to a peer's departure: repairs successor, predecessor, and any
    /// finger that pointed at it, then runs a local `fix_fingers`.
    pub(crate) fn handle_node_leave(&mut self, left: Node, registry: &RingManager) {
        if self.successor.id == left.id {
            let former_successor = registry.with_node(left.id, |chord, _| chord.successor.clone());
            let replacement = match former_successor {
                Some(s) if !s.is_empty() && s.id != left.id => s,
                _ => {
                    let probe = registry.space().next(left.id);
                    registry
                        .ring_wide_find_successor(probe)
                        .unwrap_or_else(|| self.self_node.clone())
                }
            };
            self.set_successor(replacement);
        }

        if matches!(&self.predecessor, Some(p) if p.id == left.id) {
            self.predecessor = None;
        }

        for i in 1..self.fingers.len() {
            if self.fingers[i].node.id == left.id {
                let start = self.fingers[i].start;
                let resolved = self.find_successor(start, registry);
                self.fingers[i].node = if resolved.is_empty() {
                    self.successor.clone()
                } else {
                    resolved
                };
            }
        }
        self.fingers[0].node = self.successor.clone();

        self.fix_fingers(registry);
        debug!(node = %self.self_node, left = %left, "handled peer departure");
    }

    /// Hashes `name` and inserts it, refusing if that id is already present.
    /// Returns `true` if the insert happened.
    pub fn add_resource(&mut self, name: &str, space: &IdSpace) -> bool {
        let id = space.hash_str(name);
        if self.resources.contains_key(&id) {
            return false;
        }
        self.resources.insert(id, name.to_string());
        true
    }

    /// Inserts `(id, name)` unconditionally, overwriting any existing entry.
    /// Used by redistribution, leave's key handoff, and ring-level `put`.
    pub fn add_resource_directly(&mut self, id: Id, name: String) {
        self.resources.insert(id, name);
    }

    /// Removes the resource at `id`, if present.
    pub fn remove_resource_directly(&mut self, id: Id) -> bool {
        self.resources.remove(&id).is_some()
    }
}

impl std::fmt::Display for Chord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chord({}, pred={}, succ={}, keys={})",
            self.self_node,
            self.predecessor.as_ref().map(|n| n.to_string()).unwrap_or_else(|| "none".into()),
            self.successor,
            self.resources.len()
        )
    }
}
