//! Start a ring of local nodes, store some random keys, and print the ring
//! every few seconds until Ctrl+C.
//!
//! Run: `cargo run --example ring -- --nodes 8 --keys 32`

use std::sync::mpsc::channel;
use std::thread;
use std::time::Duration;

use chord_dht::{Chord, NodeInfo};

use clap::Parser;
use tracing::Level;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of nodes in the ring
    #[arg(short, long, default_value_t = 5)]
    nodes: usize,
    /// Number of bits of the ring ids
    #[arg(short, long, default_value_t = 16)]
    bits: u8,
    /// Number of random keys to store
    #[arg(short, long, default_value_t = 20)]
    keys: usize,
    /// Print debug logs
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    let first = Chord::builder()
        .name("node-0")
        .ring_bits(cli.bits)
        .build()
        .expect("failed to start first node");

    let mut ring = vec![first];

    for index in 1..cli.nodes {
        let bootstrap = NodeInfo::new("node-0", ring[0].local_addr());

        let node = Chord::builder()
            .name(&format!("node-{index}"))
            .ring_bits(cli.bits)
            .bootstrap(bootstrap)
            .build()
            .expect("failed to join ring");

        ring.push(node);
    }

    println!("Started {} nodes, waiting for the ring to stabilize...", ring.len());
    thread::sleep(Duration::from_secs(3));

    let space = *ring[0].node().space();

    for index in 0..cli.keys {
        let key = space.random_id();
        let from = &ring[index % ring.len()];

        match from.add_key(key) {
            Ok(owner) => println!("{key:?} -> {} {:?}", owner.name(), owner.id()),
            Err(error) => println!("{key:?} failed: {error}"),
        }
    }

    let (tx_interrupted, rx_interrupted) = channel();

    ctrlc::set_handler(move || {
        println!();
        println!("Received Ctrl+C! Shutting down...");
        let _ = tx_interrupted.send(());
    })
    .expect("Error setting Ctrl-C handler");

    while rx_interrupted.recv_timeout(Duration::from_secs(5)).is_err() {
        print_ring(&ring);
    }

    for node in ring.iter_mut() {
        node.shutdown();
    }
}

fn print_ring(ring: &[Chord]) {
    let mut infos: Vec<_> = ring.iter().map(|node| node.info()).collect();
    infos.sort_by_key(|info| *info.id());

    println!();
    for info in infos {
        println!(
            "{} {:?}: successor {:?}, predecessor {:?}, {} keys, {} known nodes",
            info.node().name(),
            info.id(),
            info.successor().id(),
            info.predecessor().map(|p| *p.id()),
            info.keys(),
            info.known_nodes(),
        );
    }
}
