//! Rings of in-process nodes, stabilized by hand.

use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;

use chord_dht::{ChordNode, Config, Id, LocalNetwork, NodeInfo};

const RING_BITS: u8 = 8;

fn config(id: u64) -> Config {
    Config {
        node: NodeInfo::new(
            format!("node-{id}"),
            format!("127.0.0.1:{}", 10_000 + id).parse().unwrap(),
        ),
        ring_bits: RING_BITS,
        id: Some(Id(id)),
        ..Default::default()
    }
}

fn stabilize_all(nodes: &[Arc<ChordNode>], rounds: usize) {
    for _ in 0..rounds {
        for node in nodes {
            node.check_predecessor();
            node.stabilize();
        }
    }
}

fn fix_all_fingers(nodes: &[Arc<ChordNode>]) {
    for _ in 0..RING_BITS {
        for node in nodes {
            node.fix_fingers();
        }
    }
}

/// Join every id through the first one, stabilizing after each join.
fn ring(network: &Arc<LocalNetwork>, ids: &[u64]) -> Vec<Arc<ChordNode>> {
    let mut nodes: Vec<Arc<ChordNode>> = vec![];

    for id in ids {
        let node = network.add_node(config(*id)).unwrap();

        if let Some(introducer) = nodes.first() {
            node.join(introducer.descriptor()).unwrap();
        }

        nodes.push(node);
        stabilize_all(&nodes, 3);
    }

    stabilize_all(&nodes, 2 * nodes.len());
    fix_all_fingers(&nodes);

    nodes
}

/// First id at or after `key`, wrapping around.
fn expected_owner(ids: &[u64], key: u64) -> u64 {
    let mut sorted = ids.to_vec();
    sorted.sort();

    sorted
        .iter()
        .copied()
        .find(|id| *id >= key)
        .unwrap_or(sorted[0])
}

fn assert_consistent(nodes: &[Arc<ChordNode>]) {
    let mut sorted: Vec<_> = nodes.iter().collect();
    sorted.sort_by_key(|node| *node.id());

    for (index, node) in sorted.iter().enumerate() {
        let next = sorted[(index + 1) % sorted.len()];
        let previous = sorted[(index + sorted.len() - 1) % sorted.len()];

        assert_eq!(
            node.successor(),
            *next.descriptor(),
            "successor of {:?}",
            node.id()
        );
        assert_eq!(
            node.get_predecessor().as_ref(),
            Some(previous.descriptor()),
            "predecessor of {:?}",
            node.id()
        );
    }
}

#[test]
fn singleton() {
    let network = LocalNetwork::new();
    let node = network.add_node(config(42)).unwrap();

    stabilize_all(&[node.clone()], 3);

    assert_eq!(node.successor(), *node.descriptor());
    assert_eq!(node.get_predecessor().as_ref(), Some(node.descriptor()));
    assert_eq!(node.find_successor(Id(0)).unwrap(), *node.descriptor());
}

#[test]
fn two_nodes_converge() {
    for (first, second) in [(200, 30), (30, 200)] {
        let network = LocalNetwork::new();
        let a = network.add_node(config(first)).unwrap();
        let b = network.add_node(config(second)).unwrap();

        b.join(a.descriptor()).unwrap();
        stabilize_all(&[a.clone(), b.clone()], 3);

        assert_eq!(a.successor(), *b.descriptor());
        assert_eq!(b.successor(), *a.descriptor());
        assert_eq!(a.get_predecessor().as_ref(), Some(b.descriptor()));
        assert_eq!(b.get_predecessor().as_ref(), Some(a.descriptor()));
    }
}

#[test]
fn ring_converges_and_routes_lookups() {
    let ids = [17, 250, 3, 99, 128, 64, 200, 180];

    let network = LocalNetwork::new();
    let nodes = ring(&network, &ids);

    assert_consistent(&nodes);

    for node in &nodes {
        for key in (0..256).step_by(7) {
            assert_eq!(
                node.find_successor(Id(key)).unwrap().id(),
                &Id(expected_owner(&ids, key)),
                "find_successor({key}) from {:?}",
                node.id()
            );
        }
    }
}

#[test]
fn fingers_point_to_successors_of_their_start() {
    let ids = [10, 40, 90, 160, 220];

    let network = LocalNetwork::new();
    let nodes = ring(&network, &ids);

    for node in &nodes {
        for finger in node.finger_table() {
            assert_eq!(
                finger.target,
                Some(Id(expected_owner(&ids, finger.start.0))),
                "finger {} of {:?}",
                finger.index,
                node.id()
            );
        }
    }
}

#[test]
fn add_key_is_idempotent() {
    let ids = [20, 120, 220];

    let network = LocalNetwork::new();
    let nodes = ring(&network, &ids);

    let first = nodes[0].add_key(Id(150)).unwrap();
    let second = nodes[1].add_key(Id(150)).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.id(), &Id(220));

    let owner = nodes.iter().find(|node| node.id() == first.id()).unwrap();
    assert_eq!(owner.keys(), vec![Id(150)]);

    for node in nodes.iter().filter(|node| node.id() != first.id()) {
        assert!(node.keys().is_empty());
    }
}

#[test]
fn concurrent_add_key() {
    let ids = [5, 60, 111, 170, 230];

    let network = LocalNetwork::new();
    let nodes = ring(&network, &ids);

    (0..256u64).into_par_iter().for_each(|key| {
        let from = &nodes[key as usize % nodes.len()];
        let owner = from.add_key(Id(key)).unwrap();

        assert_eq!(owner.id(), &Id(expected_owner(&ids, key)));
    });

    // Adding the same keys again, from other nodes, changes nothing.
    (0..256u64).into_par_iter().for_each(|key| {
        let from = &nodes[(key as usize + 1) % nodes.len()];
        from.add_key(Id(key)).unwrap();
    });

    let total: usize = nodes.iter().map(|node| node.keys().len()).sum();
    assert_eq!(total, 256);

    for node in &nodes {
        for key in node.keys() {
            assert_eq!(node.id(), &Id(expected_owner(&ids, key.0)));
        }
    }
}

#[test]
fn successor_failure_and_recovery() {
    let network = LocalNetwork::new();
    let nodes = ring(&network, &[10, 100, 200]);
    let (n, s, t) = (&nodes[0], &nodes[1], &nodes[2]);

    assert_eq!(n.successor(), *s.descriptor());

    network.set_reachable(s.descriptor(), false);

    n.stabilize();
    assert_eq!(n.successor(), *n.descriptor());

    // Without s, the ring closes over t.
    stabilize_all(&[n.clone(), t.clone()], 3);
    assert_eq!(n.successor(), *t.descriptor());
    assert_eq!(t.successor(), *n.descriptor());
    assert_eq!(t.get_predecessor().as_ref(), Some(n.descriptor()));

    network.set_reachable(s.descriptor(), true);

    stabilize_all(&nodes, 3);
    assert_consistent(&nodes);
}

#[test]
fn node_leaving_the_ring() {
    let network = LocalNetwork::new();
    let mut nodes = ring(&network, &[30, 80, 130, 180, 230]);

    let gone = nodes.remove(2);
    network.set_reachable(gone.descriptor(), false);

    stabilize_all(&nodes, 6);
    fix_all_fingers(&nodes);

    assert_consistent(&nodes);

    let ids = [30, 80, 180, 230];
    for node in &nodes {
        assert_eq!(
            node.find_successor(Id(131)).unwrap().id(),
            &Id(expected_owner(&ids, 131))
        );
    }
}

#[test]
fn pruning_keeps_routing_state() {
    let ids = [0, 40, 120];

    let network = LocalNetwork::new();
    let nodes: Vec<_> = ids
        .iter()
        .map(|id| {
            network
                .add_node(Config {
                    cache_ttl: Duration::ZERO,
                    ..config(*id)
                })
                .unwrap()
        })
        .collect();

    for node in &nodes[1..] {
        node.join(nodes[0].descriptor()).unwrap();
    }
    stabilize_all(&nodes, 6);
    fix_all_fingers(&nodes);

    for node in &nodes {
        node.prune_descriptor_cache();

        assert_eq!(
            node.successor().id(),
            &Id(expected_owner(&ids, node.id().0 + 1))
        );
    }

    assert_consistent(&nodes);
}
