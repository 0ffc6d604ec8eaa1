//! The subcommands `simctl` understands, and what each one prints.

use anyhow::Result;
use clap::Subcommand;

use corelib::report::{self, NodeReport, RingSummary};
use corelib::RingManager;

pub type CommandResult = Result<()>;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a node to the ring, identified by its IP label.
    Join { ip: String },
    /// Remove a node from the ring by IP.
    Leave { ip: String },
    /// Insert (or overwrite) a resource by name.
    Put { name: String },
    /// Find which node owns a resource, if it's stored anywhere.
    Lookup { name: String },
    /// Remove a resource by name.
    Remove { name: String },
    /// List every resident node, sorted by id.
    Nodes,
    /// Dump one node's full state: predecessor, successor, fingers, keys.
    Show { ip: String },
    /// Dump a ring-wide summary: node count, resource count, per-node detail.
    Ring,
    /// Build a small ring, insert a few resources, and print what happened.
    Demo,
}

impl Command {
    pub fn execute(&self, registry: &RingManager, json: bool) -> CommandResult {
        match self {
            Command::Join { ip } => join(registry, ip, json),
            Command::Leave { ip } => leave(registry, ip, json),
            Command::Put { name } => put(registry, name, json),
            Command::Lookup { name } => lookup(registry, name, json),
            Command::Remove { name } => remove(registry, name, json),
            Command::Nodes => nodes(registry, json),
            Command::Show { ip } => show(registry, ip, json),
            Command::Ring => ring(registry, json),
            Command::Demo => demo(registry, json),
        }
    }
}

fn emit<T: serde::Serialize>(value: &T, json: bool, human: impl FnOnce() -> String) -> CommandResult {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", human());
    }
    Ok(())
}

fn join(registry: &RingManager, ip: &str, json: bool) -> CommandResult {
    let node = registry.join(ip)?;
    emit(&node, json, || format!("joined {node}"))
}

fn leave(registry: &RingManager, ip: &str, json: bool) -> CommandResult {
    registry.leave_by_ip(ip)?;
    emit(&ip, json, || format!("{ip} left the ring"))
}

fn put(registry: &RingManager, name: &str, json: bool) -> CommandResult {
    let id = registry.put(name)?;
    emit(&id, json, || format!("stored {name:?} at key-id {id}"))
}

fn lookup(registry: &RingManager, name: &str, json: bool) -> CommandResult {
    let (id, owner, present) = registry.lookup(name)?;
    if !present {
        anyhow::bail!("{name:?} (key-id {id}) is not stored on the ring");
    }
    emit(&owner, json, || format!("{name:?} (key-id {id}) is owned by {owner}"))
}

fn remove(registry: &RingManager, name: &str, json: bool) -> CommandResult {
    let removed = registry.remove(name)?;
    if !removed {
        anyhow::bail!("{name:?} was not stored on the ring");
    }
    emit(&removed, json, || format!("removed {name:?}"))
}

fn nodes(registry: &RingManager, json: bool) -> CommandResult {
    let ips = registry.all_ips();
    emit(&ips, json, || {
        if ips.is_empty() {
            "ring is empty".to_string()
        } else {
            ips.join("\n")
        }
    })
}

fn show(registry: &RingManager, ip: &str, json: bool) -> CommandResult {
    let report = report::node_report(registry, ip)?;
    emit(&report, json, || format_node_report(&report))
}

fn ring(registry: &RingManager, json: bool) -> CommandResult {
    let summary = report::ring_summary(registry);
    emit(&summary, json, || format_ring_summary(&summary))
}

fn demo(registry: &RingManager, json: bool) -> CommandResult {
    let ips = [
        "192.168.1.125",
        "192.168.1.63",
        "192.168.1.15",
        "192.168.1.107",
        "192.168.1.33",
    ];
    let resources = ["file1.txt", "doc.docx", "img.jpg", "data.json", "cfg.xml"];

    for ip in ips {
        registry.join(ip)?;
    }
    for name in resources {
        registry.put(name)?;
    }

    let summary = report::ring_summary(registry);
    emit(&summary, json, || {
        let mut out = format!(
            "built a {}-node ring and stored {} resources\n\n",
            summary.node_count, summary.total_resources
        );
        out.push_str(&format_ring_summary(&summary));
        out
    })
}

fn format_node_report(report: &NodeReport) -> String {
    let mut out = format!("{}\n", report.node);
    out.push_str(&format!(
        "  predecessor: {}\n",
        report.predecessor.as_ref().map(|n| n.to_string()).unwrap_or_else(|| "none".into())
    ));
    out.push_str(&format!("  successor:   {}\n", report.successor));
    out.push_str(&format!("  keys stored: {}\n", report.resource_count));
    out.push_str("  fingers:\n");
    for finger in &report.fingers {
        out.push_str(&format!("    start={:>3} -> {}\n", finger.start, finger.node));
    }
    out.push_str("  keys:\n");
    for resource in &report.resources {
        out.push_str(&format!("    id={:>3} -> {:?}\n", resource.id, resource.name));
    }
    out
}

fn format_ring_summary(summary: &RingSummary) -> String {
    let mut out = format!(
        "ring: m={} (N={}), {} node(s), {} resource(s)\n",
        summary.ring_bits, summary.ring_size, summary.node_count, summary.total_resources
    );
    for node in &summary.nodes {
        out.push_str(&format!("  {} — {} key(s)\n", node.node, node.resource_count));
    }
    out
}
