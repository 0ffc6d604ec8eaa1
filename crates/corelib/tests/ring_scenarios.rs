//! Whole-ring scenarios: build a ring, move keys around on membership
//! change, tear it back down, and check the invariants hold at each step.

use corelib::{IdSpace, RingManager};

const M: u32 = 8;

fn fresh_ring() -> RingManager {
    RingManager::new(IdSpace::new(M))
}

/// Invariant 1: every node's successor is the least resident id strictly
/// greater than its own, wrapping to the smallest id if it's the largest.
fn assert_successor_uniqueness(registry: &RingManager) {
    let ids = registry.sorted_ids();
    let n = ids.len();
    for (i, &id) in ids.iter().enumerate() {
        let expected_successor = ids[(i + 1) % n];
        let node = registry.find_chord(id).unwrap();
        let actual = registry.inspect(&node.ip, |c| c.successor().id).unwrap();
        assert_eq!(actual, expected_successor, "successor mismatch for node {id}");
    }
}

/// Invariant 2: after a global refresh, `n.successor.predecessor == n`.
fn assert_predecessor_symmetry(registry: &RingManager) {
    for id in registry.sorted_ids() {
        let node = registry.find_chord(id).unwrap();
        let succ = registry.inspect(&node.ip, |c| c.successor().clone()).unwrap();
        let succ_pred = registry.inspect(&succ.ip, |c| c.predecessor().cloned()).unwrap();
        assert_eq!(succ_pred.map(|p| p.id), Some(id), "predecessor symmetry broken at {id}");
    }
}

/// Invariant 4: every stored key-id falls in `(predecessor.id, self.id]`.
fn assert_key_ownership(registry: &RingManager) {
    let space = registry.space();
    let ids = registry.sorted_ids();
    for &id in &ids {
        let node = registry.find_chord(id).unwrap();
        let (pred_id, keys): (u32, Vec<u32>) = registry
            .inspect(&node.ip, |c| {
                let pred = c.predecessor().map(|p| p.id).unwrap_or(id);
                (pred, c.resources().map(|(k, _)| *k).collect())
            })
            .unwrap();
        for key in keys {
            assert!(
                space.in_half_open(key, pred_id, id),
                "key {key} stored on {id} but outside ({pred_id}, {id}]"
            );
        }
    }
}

/// Brute-force successor-by-scan: the least resident id `>= target`,
/// wrapping to the smallest resident id if none qualifies.
fn successor_by_scan(ids: &[u32], target: u32) -> u32 {
    ids.iter().copied().find(|&id| id >= target).unwrap_or(ids[0])
}

/// Invariant 3: for every node and every finger, `finger.node` is the
/// successor-by-scan of `finger.start`.
fn assert_finger_correctness(registry: &RingManager) {
    let ids = registry.sorted_ids();
    for &id in &ids {
        let node = registry.find_chord(id).unwrap();
        let fingers: Vec<(u32, u32)> = registry
            .inspect(&node.ip, |c| c.fingers().iter().map(|f| (f.start, f.node.id)).collect())
            .unwrap();
        for (start, actual) in fingers {
            let expected = successor_by_scan(&ids, start);
            assert_eq!(
                actual, expected,
                "node {id} finger at start={start} points to {actual}, expected {expected}"
            );
        }
    }
}

fn total_resource_count(registry: &RingManager) -> usize {
    registry
        .sorted_ids()
        .into_iter()
        .filter_map(|id| registry.find_chord(id))
        .filter_map(|n| registry.inspect(&n.ip, |c| c.resource_count()).ok())
        .sum()
}

#[test]
fn s1_solitary_ring() {
    let registry = fresh_ring();
    registry.join("10.0.0.1").unwrap();

    assert_eq!(registry.len(), 1);
    let node = registry.node_by_ip("10.0.0.1").unwrap();
    registry
        .inspect("10.0.0.1", |c| {
            assert_eq!(c.predecessor().unwrap().id, node.id);
            assert_eq!(c.successor().id, node.id);
            assert!(c.fingers().iter().all(|f| f.node.id == node.id));
        })
        .unwrap();
}

#[test]
fn s2_five_node_build_and_lookup() {
    let registry = fresh_ring();
    let ips = [
        "192.168.1.125",
        "192.168.1.63",
        "192.168.1.15",
        "192.168.1.107",
        "192.168.1.33",
    ];
    for ip in ips {
        registry.join(ip).unwrap();
        assert_successor_uniqueness(&registry);
        assert_predecessor_symmetry(&registry);
        assert_key_ownership(&registry);
        assert_finger_correctness(&registry);
    }
    assert_eq!(registry.len(), 5);

    let resources = ["file1.txt", "doc.docx", "img.jpg", "data.json", "cfg.xml"];
    for name in resources {
        registry.put(name).unwrap();
    }
    assert_key_ownership(&registry);

    // file1.txt/img.jpg/data.json/cfg.xml all hash into the wrap-around arc
    // owned by 192.168.1.107 (id 54); doc.docx lands on 192.168.1.33 (id 118).
    let (_, owner, present) = registry.lookup("file1.txt").unwrap();
    assert!(present);
    assert_eq!(owner.ip, "192.168.1.107");

    let (_, owner, present) = registry.lookup("doc.docx").unwrap();
    assert!(present);
    assert_eq!(owner.ip, "192.168.1.33");

    for name in ["img.jpg", "data.json", "cfg.xml"] {
        let (_, owner, present) = registry.lookup(name).unwrap();
        assert!(present);
        assert_eq!(owner.ip, "192.168.1.107");
    }
}

#[test]
fn s3_mid_join_redistribution() {
    let registry = fresh_ring();
    for ip in [
        "192.168.1.125",
        "192.168.1.63",
        "192.168.1.15",
        "192.168.1.107",
        "192.168.1.33",
    ] {
        registry.join(ip).unwrap();
    }
    for name in ["file1.txt", "doc.docx", "img.jpg", "data.json", "cfg.xml"] {
        registry.put(name).unwrap();
    }

    let before_total = total_resource_count(&registry);
    registry.join("192.168.1.50").unwrap();
    assert_successor_uniqueness(&registry);
    assert_predecessor_symmetry(&registry);
    assert_key_ownership(&registry);
    assert_finger_correctness(&registry);

    // 192.168.1.50 hashes to 134, owning (118, 134] — none of the five
    // resource ids fall in that arc, so nothing should have moved to it.
    let new_node = registry.node_by_ip("192.168.1.50").unwrap();
    let moved_in = registry.inspect("192.168.1.50", |c| c.resource_count()).unwrap();
    assert_eq!(moved_in, 0, "node {} unexpectedly gained resources", new_node.id);
    assert_eq!(total_resource_count(&registry), before_total);

    // every resource is still exactly where s2 put it.
    let (_, owner, present) = registry.lookup("doc.docx").unwrap();
    assert!(present);
    assert_eq!(owner.ip, "192.168.1.33");
}

#[test]
fn s4_graceful_leave_hands_off_resources() {
    let registry = fresh_ring();
    for ip in [
        "192.168.1.125",
        "192.168.1.63",
        "192.168.1.15",
        "192.168.1.107",
        "192.168.1.33",
        "192.168.1.50",
    ] {
        registry.join(ip).unwrap();
    }
    for name in ["file1.txt", "doc.docx", "img.jpg", "data.json", "cfg.xml"] {
        registry.put(name).unwrap();
    }

    let before_total = total_resource_count(&registry);
    registry.leave_by_ip("192.168.1.63").unwrap();

    assert_eq!(registry.len(), 5);
    assert_eq!(total_resource_count(&registry), before_total, "no resource lost or duplicated");
    assert_successor_uniqueness(&registry);
    assert_predecessor_symmetry(&registry);
    assert_key_ownership(&registry);
    assert_finger_correctness(&registry);

    let left_id = registry.space().hash_str("192.168.1.63");
    for id in registry.sorted_ids() {
        let node = registry.find_chord(id).unwrap();
        registry
            .inspect(&node.ip, |c| {
                assert!(
                    c.fingers().iter().all(|f| f.node.id != left_id),
                    "node {id} still has a finger pointing at departed node {left_id}"
                );
                assert_ne!(c.successor().id, left_id);
            })
            .unwrap();
    }
}

#[test]
fn s5_full_teardown() {
    let registry = fresh_ring();
    let ips = [
        "192.168.1.125",
        "192.168.1.63",
        "192.168.1.15",
        "192.168.1.107",
        "192.168.1.33",
    ];
    for ip in ips {
        registry.join(ip).unwrap();
    }
    for name in ["file1.txt", "doc.docx", "img.jpg", "data.json", "cfg.xml"] {
        registry.put(name).unwrap();
    }

    let mut remaining: Vec<&str> = ips.to_vec();
    while remaining.len() > 1 {
        let ip = remaining.remove(0);
        registry.leave_by_ip(ip).unwrap();
        assert_successor_uniqueness(&registry);
        assert_predecessor_symmetry(&registry);
        assert_key_ownership(&registry);
    }

    let last = remaining.remove(0);
    registry.leave_by_ip(last).unwrap();
    assert!(registry.is_empty());
    assert_eq!(total_resource_count(&registry), 0);
}

#[test]
fn s6_absent_lookup_on_nonempty_ring() {
    let registry = fresh_ring();
    registry.join("192.168.1.125").unwrap();
    registry.join("192.168.1.63").unwrap();
    registry.put("file1.txt").unwrap();

    let (_, _, present) = registry.lookup("never-inserted").unwrap();
    assert!(!present);
}

#[test]
fn lookup_and_put_refuse_on_empty_ring() {
    let registry = fresh_ring();
    assert!(registry.put("anything").is_err());
    assert!(registry.lookup("anything").is_err());
    assert!(registry.remove("anything").is_err());
}

#[test]
fn join_refuses_duplicate_identity() {
    let registry = fresh_ring();
    registry.join("192.168.1.125").unwrap();
    let err = registry.join("192.168.1.125").unwrap_err();
    assert!(matches!(err, corelib::ChordError::DuplicateIdentity { .. }));
}

#[test]
fn leave_and_lookup_refuse_unknown_ip() {
    let registry = fresh_ring();
    registry.join("192.168.1.125").unwrap();
    let err = registry.leave_by_ip("10.9.9.9").unwrap_err();
    assert!(matches!(err, corelib::ChordError::UnknownNode(_)));
}

#[test]
fn join_then_leave_restores_prior_ring_shape() {
    let registry = fresh_ring();
    for ip in ["192.168.1.125", "192.168.1.63", "192.168.1.15"] {
        registry.join(ip).unwrap();
    }
    registry.put("file1.txt").unwrap();

    let before: Vec<u32> = registry.sorted_ids();
    let before_total = total_resource_count(&registry);

    registry.join("192.168.1.107").unwrap();
    registry.leave_by_ip("192.168.1.107").unwrap();

    let after: Vec<u32> = registry.sorted_ids();
    assert_eq!(before, after, "membership should return to its pre-join shape");
    assert_eq!(total_resource_count(&registry), before_total);
    assert_successor_uniqueness(&registry);
    assert_predecessor_symmetry(&registry);
}
