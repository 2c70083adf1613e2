//! Nodes talking to each other over UDP on loopback.

use std::thread;
use std::time::{Duration, Instant};

use chord_dht::{Chord, Id, NodeInfo};

const RING_BITS: u8 = 16;
const INTERVAL: Duration = Duration::from_millis(20);

fn node(name: &str, bootstrap: Option<&Chord>) -> Chord {
    let mut builder = Chord::builder();

    builder
        .name(name)
        .ring_bits(RING_BITS)
        .request_timeout(Duration::from_millis(500))
        .stabilize_interval(INTERVAL)
        .fix_fingers_interval(INTERVAL)
        .check_predecessor_interval(INTERVAL);

    if let Some(bootstrap) = bootstrap {
        builder.bootstrap(NodeInfo::new(
            bootstrap.descriptor().name(),
            bootstrap.local_addr(),
        ));
    }

    builder.build().unwrap()
}

/// Poll until `condition` holds, or panic after a few seconds.
fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);

    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        thread::sleep(INTERVAL);
    }
}

fn converged(nodes: &[&Chord]) -> bool {
    let mut sorted = nodes.to_vec();
    sorted.sort_by_key(|chord| *chord.id());

    sorted.iter().enumerate().all(|(index, chord)| {
        let next = sorted[(index + 1) % sorted.len()];
        let previous = sorted[(index + sorted.len() - 1) % sorted.len()];

        let info = chord.info();

        info.successor() == next.descriptor() && info.predecessor() == Some(previous.descriptor())
    })
}

#[test]
fn two_nodes_over_udp() {
    let a = node("a", None);
    let b = node("b", Some(&a));

    eventually(|| converged(&[&a, &b]));

    let key = Id(a.id().0.wrapping_add(1) & 0xFFFF);
    let owner = a.add_key(key).unwrap();

    assert_eq!(b.find_successor(key).unwrap(), owner);
    assert!(a.node().keys().contains(&key) || b.node().keys().contains(&key));
}

#[test]
fn ring_over_udp() {
    let first = node("first", None);
    let others: Vec<Chord> = (0..4)
        .map(|index| node(&format!("node-{index}"), Some(&first)))
        .collect();

    let mut all: Vec<&Chord> = vec![&first];
    all.extend(others.iter());

    eventually(|| converged(&all));

    for key in (0..u16::MAX as u64).step_by(4099).map(Id) {
        let owner = first.find_successor(key).unwrap();

        for chord in &all {
            assert_eq!(chord.find_successor(key).unwrap(), owner);
        }
    }
}

#[test]
fn stopped_node_is_routed_around() {
    let a = node("a", None);
    let b = node("b", Some(&a));
    let mut c = node("c", Some(&a));

    eventually(|| converged(&[&a, &b, &c]));

    c.shutdown();

    eventually(|| converged(&[&a, &b]));
}
