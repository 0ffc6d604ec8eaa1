//! Serializable introspection snapshots, for `simctl show`/`simctl ring` and
//! for tests that want to assert on ring shape without reaching into
//! internals.

use serde::Serialize;

use crate::id::Id;
use crate::node::Node;
use crate::registry::RingManager;

#[derive(Debug, Clone, Serialize)]
pub struct FingerReport {
    pub start: Id,
    pub node: Node,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub node: Node,
    pub predecessor: Option<Node>,
    pub successor: Node,
    pub fingers: Vec<FingerReport>,
    pub resource_count: usize,
    pub resources: Vec<ResourceReport>,
}

/// Snapshots a single node's state by ip. `Err` if no such node is resident.
pub fn node_report(registry: &RingManager, ip: &str) -> crate::error::Result<NodeReport> {
    registry.inspect(ip, |chord| {
        let resources: Vec<ResourceReport> = chord
            .resources()
            .map(|(id, name)| ResourceReport { id: *id, name: name.clone() })
            .collect();
        NodeReport {
            node: chord.self_node().clone(),
            predecessor: chord.predecessor().cloned(),
            successor: chord.successor().clone(),
            fingers: chord
                .fingers()
                .iter()
                .map(|f| FingerReport { start: f.start, node: f.node.clone() })
                .collect(),
            resource_count: resources.len(),
            resources,
        }
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RingSummary {
    pub ring_bits: u32,
    pub ring_size: u64,
    pub node_count: usize,
    pub total_resources: usize,
    pub nodes: Vec<NodeReport>,
}

/// Snapshots the whole ring: every resident node's report plus totals.
pub fn ring_summary(registry: &RingManager) -> RingSummary {
    let nodes: Vec<NodeReport> = registry
        .sorted_ids()
        .into_iter()
        .filter_map(|id| registry.find_chord(id))
        .filter_map(|node| node_report(registry, &node.ip).ok())
        .collect();
    let total_resources = nodes.iter().map(|n| n.resource_count).sum();
    RingSummary {
        ring_bits: registry.space().m(),
        ring_size: registry.space().size(),
        node_count: nodes.len(),
        total_resources,
        nodes,
    }
}
