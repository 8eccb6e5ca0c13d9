//! System-level checks that wire a `Router`, several `StoragePeer`s and a
//! `ClientStub` together over `MemoryChannel` the same way the binaries do,
//! exercising routing and resharding end to end rather than at each
//! component's own unit-test boundary.

use shardmap_core::channel::MemoryChannel;
use shardmap_core::client_stub::Reply;
use shardmap_core::record::Record;
use shardmap_core::{ClientStub, Router, StoragePeer};

fn record(candidate_id: i32) -> Record {
    Record {
        candidate_id,
        last_name: "Doe".into(),
        first_name: "Jane".into(),
        patronymic: String::new(),
        birth_date: "2001-01-01".into(),
        resume_link: String::new(),
        hr_manager_id: 1,
        contest_id: 1,
        programming_language: "Rust".into(),
        num_tasks: 1,
        solved_tasks: 1,
        cheating_detected: false,
    }
}

struct Cluster {
    router: Router<MemoryChannel>,
    peers: Vec<StoragePeer<MemoryChannel, MemoryChannel>>,
}

impl Cluster {
    fn new(peer_count: usize) -> Self {
        let mut router: Router<MemoryChannel> = Router::new();
        let mut peers = Vec::with_capacity(peer_count);
        for id in 0..peer_count {
            let (router_end, peer_inbound) = MemoryChannel::pair();
            let (peer_outbound, router_reshard_end) = MemoryChannel::pair();
            router.add_storage(router_end, router_reshard_end);
            peers.push(StoragePeer::new(id, peer_inbound, peer_outbound));
        }
        Self { router, peers }
    }

    fn tick(&mut self) {
        self.router.tick();
        for peer in self.peers.iter_mut() {
            peer.tick();
        }
    }

    fn settle(&mut self, mut budget: usize) {
        while self.router.rebalance_in_progress() && budget > 0 {
            self.tick();
            budget -= 1;
        }
        assert!(budget > 0, "cluster failed to settle within its tick budget");
    }
}

fn add_client(cluster: &mut Cluster) -> ClientStub<MemoryChannel> {
    let (router_end, client_channel) = MemoryChannel::pair();
    cluster.router.add_client(router_end);
    ClientStub::new(client_channel)
}

fn run_to_completion(cluster: &mut Cluster, client: &mut ClientStub<MemoryChannel>) -> Reply {
    for _ in 0..10_000 {
        cluster.tick();
        match client.poll() {
            Ok(Some(reply)) => return reply,
            Ok(None) => continue,
            Err(err) => panic!("request failed: {err}"),
        }
    }
    panic!("request never settled within the tick budget");
}

#[test]
fn requests_route_to_the_peer_hash_record_selects() {
    let mut cluster = Cluster::new(3);
    cluster.settle(10_000);
    let mut client = add_client(&mut cluster);

    // `hash_record(record) mod |storages|` fully determines ownership, so
    // every add/contains pair below resolves regardless of which peer the
    // router actually picked: we only need to confirm routing is
    // deterministic and lossless end to end, not replay the hash by hand.
    for candidate in 1..=30 {
        let rec = record(candidate);
        client.add("db", "sch", "tbl", &rec).unwrap();
        assert_eq!(run_to_completion(&mut cluster, &mut client), Reply::Bool(true));
        client.contains("db", "sch", "tbl", &rec).unwrap();
        assert_eq!(run_to_completion(&mut cluster, &mut client), Reply::Bool(true));
    }
}

#[test]
fn joining_a_peer_reshards_without_losing_records() {
    let mut cluster = Cluster::new(2);
    cluster.settle(10_000);
    let mut client = add_client(&mut cluster);

    let records: Vec<Record> = (1..=40).map(record).collect();
    for rec in &records {
        client.add("db", "sch", "tbl", rec).unwrap();
        assert_eq!(run_to_completion(&mut cluster, &mut client), Reply::Bool(true));
    }

    let (router_end, peer_inbound) = MemoryChannel::pair();
    let (peer_outbound, router_reshard_end) = MemoryChannel::pair();
    cluster.router.add_storage(router_end, router_reshard_end);
    cluster.peers.push(StoragePeer::new(cluster.peers.len(), peer_inbound, peer_outbound));

    cluster.settle(10_000);
    assert!(!cluster.router.rebalance_in_progress());

    for rec in &records {
        client.contains("db", "sch", "tbl", rec).unwrap();
        assert_eq!(
            run_to_completion(&mut cluster, &mut client),
            Reply::Bool(true),
            "record for candidate {} went missing after resharding",
            rec.candidate_id
        );
    }
}

#[test]
fn a_second_peer_join_triggers_exactly_one_rebalance_pass() {
    let mut cluster = Cluster::new(1);
    cluster.settle(10_000);
    assert!(!cluster.router.rebalance_in_progress());

    let (router_end, peer_inbound) = MemoryChannel::pair();
    let (peer_outbound, router_reshard_end) = MemoryChannel::pair();
    cluster.router.add_storage(router_end, router_reshard_end);
    cluster.peers.push(StoragePeer::new(1, peer_inbound, peer_outbound));

    assert!(cluster.router.rebalance_in_progress());
    cluster.settle(10_000);
    assert!(!cluster.router.rebalance_in_progress());

    for _ in 0..50 {
        cluster.tick();
        assert!(!cluster.router.rebalance_in_progress(), "rebalance re-triggered with no new peer joining");
    }
}
