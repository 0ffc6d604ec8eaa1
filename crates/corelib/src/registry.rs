//! The ring-wide registry: owns every node's [`Chord`] state and plays
//! coordinator for the synchronous "RPCs" the simulation uses in place of a
//! network.
//!
//! # Reentrancy
//!
//! A node's `find_successor` may call back into the registry, which may route
//! straight back into the very node that originated the call — Chord's
//! routing makes no promise that a lookup won't loop through its initiator.
//! Holding a `&mut Chord` borrow across that kind of call would double-borrow
//! and panic.
//!
//! [`RingManager::with_node`] avoids this by taking the node **out** of the
//! map before handing it a `&mut` reference, and putting it back when the
//! callback returns. While a node is taken out, any other call that targets
//! the same id — including the node calling back into itself — finds nothing
//! there and gets `None`. That's also exactly the registry's contract for a
//! node that left mid-traversal, so the two cases share one code path: a
//! caller can't tell self-reentry from staleness, and per the fallback rules
//! it shouldn't need to.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::chord::Chord;
use crate::error::{ChordError, Result};
use crate::id::{Id, IdSpace};
use crate::node::Node;

pub struct RingManager {
    space: IdSpace,
    nodes: RefCell<BTreeMap<Id, Chord>>,
    ip_index: RefCell<HashMap<String, Id>>,
}

impl RingManager {
    pub fn new(space: IdSpace) -> Self {
        Self {
            space,
            nodes: RefCell::new(BTreeMap::new()),
            ip_index: RefCell::new(HashMap::new()),
        }
    }

    pub fn space(&self) -> IdSpace {
        self.space
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.nodes.borrow().contains_key(&id)
    }

    /// Every resident id, ascending.
    pub fn sorted_ids(&self) -> Vec<Id> {
        self.nodes.borrow().keys().copied().collect()
    }

    /// Looks up a resident node by id and returns its immutable identity
    /// (id + ip), without disturbing its state. `None` if no such node is
    /// resident. Safe to call from inside a `with_node` closure on a
    /// *different* id.
    pub fn find_chord(&self, id: Id) -> Option<Node> {
        self.nodes.borrow().get(&id).map(|chord| chord.self_node().clone())
    }

    pub fn node_by_ip(&self, ip: &str) -> Option<Node> {
        let id = *self.ip_index.borrow().get(ip)?;
        self.find_chord(id)
    }

    /// Takes the node at `id` out of the map, runs `f` against it with a
    /// fresh `&mut` and this registry, then puts it back. Returns `None` if
    /// `id` isn't resident — whether because it never joined, it already
    /// left, or it's the node currently in the middle of calling `with_node`
    /// on itself further up the stack.
    pub(crate) fn with_node<F, R>(&self, id: Id, f: F) -> Option<R>
    where
        F: FnOnce(&mut Chord, &RingManager) -> R,
    {
        let mut chord = {
            let mut map = self.nodes.borrow_mut();
            map.remove(&id)?
        };
        let result = f(&mut chord, self);
        self.nodes.borrow_mut().insert(id, chord);
        Some(result)
    }

    /// Scans the resident id list for the least id `>= id`, wrapping to the
    /// smallest resident id if none qualifies. Used only as a fallback when a
    /// node has no usable finger to route through — startup, or a stale
    /// finger left behind by a peer's departure.
    pub(crate) fn ring_wide_find_successor(&self, id: Id) -> Option<Node> {
        let ids = self.sorted_ids();
        if ids.is_empty() {
            return None;
        }
        let target = ids.iter().copied().find(|&x| x >= id).unwrap_or(ids[0]);
        self.find_chord(target)
    }

    /// Iterates every live node and runs its local `fix_fingers`. Invoked
    /// after every membership change, on top of whatever targeted broadcast
    /// already ran — cheap in this single-threaded simulation, and it
    /// catches any finger a targeted update missed.
    fn refresh_all_fingers(&self) {
        for id in self.sorted_ids() {
            self.with_node(id, |chord, registry| chord.fix_fingers(registry));
        }
    }

    fn lookup_owner(&self, id: Id) -> Node {
        let entry = *self.sorted_ids().first().expect("caller already checked the ring is non-empty");
        self.with_node(entry, |chord, registry| chord.find_successor(id, registry))
            .unwrap_or_else(|| self.find_chord(entry).expect("entry node is resident"))
    }

    /// Hashes `ip` to its id and joins it to the ring. If the ring already
    /// has members, any one of them is picked as the bootstrap automatically
    /// — callers never choose a bootstrap explicitly.
    pub fn join(&self, ip: &str) -> Result<Node> {
        let id = self.space.hash_str(ip);
        if self.contains(id) || self.ip_index.borrow().contains_key(ip) {
            return Err(ChordError::DuplicateIdentity { id, ip: ip.to_string() });
        }
        let bootstrap = self.any_node().unwrap_or_else(Node::empty);

        let node = Node::new(id, ip);
        self.nodes.borrow_mut().insert(id, Chord::new(node.clone(), &self.space));
        self.ip_index.borrow_mut().insert(ip.to_string(), id);

        self.with_node(id, |chord, registry| chord.join(bootstrap, registry));

        let space = self.space;
        for other_id in self.sorted_ids() {
            if other_id == id {
                continue;
            }
            let new_node = node.clone();
            self.with_node(other_id, move |chord, _| chord.update_finger_table(new_node, space));
        }
        self.refresh_all_fingers();

        debug!(node = %node, ring_size = self.len(), "node joined");
        Ok(node)
    }

    /// Removes the node at `ip` from the ring, handing off its resources and
    /// splicing its neighbors together first.
    pub fn leave_by_ip(&self, ip: &str) -> Result<()> {
        let node = self
            .node_by_ip(ip)
            .ok_or_else(|| ChordError::UnknownNode(ip.to_string()))?;

        self.with_node(node.id, |chord, registry| chord.leave(registry));

        for other_id in self.sorted_ids() {
            if other_id == node.id {
                continue;
            }
            let left = node.clone();
            self.with_node(other_id, move |chord, registry| chord.handle_node_leave(left, registry));
        }
        self.refresh_all_fingers();

        self.nodes.borrow_mut().remove(&node.id);
        self.ip_index.borrow_mut().remove(ip);
        debug!(node = %node, ring_size = self.len(), "node left");
        Ok(())
    }

    /// Hashes `name` and stores it at its owning node.
    pub fn put(&self, name: &str) -> Result<Id> {
        if self.is_empty() {
            return Err(ChordError::EmptyRing);
        }
        let id = self.space.hash_str(name);
        let owner = self.lookup_owner(id);
        self.with_node(owner.id, |chord, _| chord.add_resource_directly(id, name.to_string()));
        Ok(id)
    }

    /// Resolves which node owns `name` and whether it's actually stored there.
    pub fn lookup(&self, name: &str) -> Result<(Id, Node, bool)> {
        if self.is_empty() {
            return Err(ChordError::EmptyRing);
        }
        let id = self.space.hash_str(name);
        let owner = self.lookup_owner(id);
        let present = self.with_node(owner.id, |chord, _| chord.has_resource(id)).unwrap_or(false);
        Ok((id, owner, present))
    }

    /// Removes `name` from its owning node, if present there.
    pub fn remove(&self, name: &str) -> Result<bool> {
        if self.is_empty() {
            return Err(ChordError::EmptyRing);
        }
        let id = self.space.hash_str(name);
        let owner = self.lookup_owner(id);
        let removed = self
            .with_node(owner.id, |chord, _| chord.remove_resource_directly(id))
            .unwrap_or(false);
        Ok(removed)
    }

    /// Runs `f` against the node at `ip`, read-only, for introspection.
    pub fn inspect<F, R>(&self, ip: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Chord) -> R,
    {
        let node = self
            .node_by_ip(ip)
            .ok_or_else(|| ChordError::UnknownNode(ip.to_string()))?;
        let map = self.nodes.borrow();
        let chord = map.get(&node.id).expect("just resolved via node_by_ip");
        Ok(f(chord))
    }

    /// Any one resident node, for use as a lookup entry point. `None` iff the
    /// ring is empty.
    pub fn any_node(&self) -> Option<Node> {
        let id = *self.sorted_ids().first()?;
        self.find_chord(id)
    }

    /// Every resident node's ip, ascending by id.
    pub fn all_ips(&self) -> Vec<String> {
        self.sorted_ids()
            .into_iter()
            .filter_map(|id| self.find_chord(id))
            .map(|n| n.ip)
            .collect()
    }

    /// Every resource name stored anywhere on the ring, gathered by asking
    /// each node for its own key store.
    pub fn all_resource_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for id in self.sorted_ids() {
            let map = self.nodes.borrow();
            if let Some(chord) = map.get(&id) {
                names.extend(chord.resources().map(|(_, name)| name.clone()));
            }
        }
        names
    }
}
