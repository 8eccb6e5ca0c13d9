//! Router binary.
//!
//! This crate carries no shared-memory (or other) transport, so the
//! router and the peers/clients it serves can't live in separate OS
//! processes here (see DESIGN.md). This binary is instead the reference
//! deployment: it owns every `MemoryChannel` end itself, wiring a small
//! in-process cluster exactly the way a real transport would connect
//! separate processes, and runs the same cooperative tick loop each of
//! those processes would run on its own.

use std::thread::sleep;
use std::time::Duration;

use clap::Parser;
use shardmap_core::channel::MemoryChannel;
use shardmap_core::logging::{LogAggregator, LogSettings, Severity};
use shardmap_core::record::Record;
use shardmap_core::{ClientStub, Router, StoragePeer};

#[derive(Parser, Debug)]
#[command(name = "shardmap-router", about = "Router + in-process cluster demo")]
struct Args {
    /// Number of storage peers to start the cluster with.
    #[arg(long, default_value_t = 2)]
    peers: usize,

    /// Join one more peer mid-run to exercise resharding.
    #[arg(long)]
    grow: bool,

    /// Optional log settings JSON file (sink -> minimum severity).
    #[arg(long)]
    log_settings: Option<String>,

    /// Idle sleep between ticks once the demo workload settles, in ms.
    #[arg(long, default_value_t = 1000)]
    idle_sleep_ms: u64,

    /// Keep ticking indefinitely after the demo workload settles.
    #[arg(long)]
    serve: bool,
}

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let mut aggregator = args.log_settings.as_deref().map(load_aggregator);

    let mut router: Router<MemoryChannel> = Router::new();
    let mut peers: Vec<StoragePeer<MemoryChannel, MemoryChannel>> = Vec::new();
    for id in 0..args.peers {
        let (router_end, peer_inbound) = MemoryChannel::pair();
        let (peer_outbound, router_reshard_end) = MemoryChannel::pair();
        router.add_storage(router_end, router_reshard_end);
        peers.push(StoragePeer::new(id, peer_inbound, peer_outbound));
    }

    let (router_client_end, client_channel) = MemoryChannel::pair();
    router.add_client(router_client_end);
    let mut client = ClientStub::new(client_channel);

    if let Some(agg) = aggregator.as_mut() {
        agg.emit(Severity::Info, &format!("router starting with {} peers", args.peers));
    }

    let tick_all = |router: &mut Router<MemoryChannel>, peers: &mut [StoragePeer<MemoryChannel, MemoryChannel>]| {
        router.tick();
        for peer in peers.iter_mut() {
            peer.tick();
        }
    };

    for candidate_id in 1..=10 {
        client
            .add("db", "public", "submissions", &demo_record(candidate_id, 1))
            .expect("no request in flight yet");
        loop {
            tick_all(&mut router, &mut peers);
            match client.poll() {
                Ok(Some(reply)) => {
                    tracing::info!(candidate_id, ?reply, "demo add settled");
                    break;
                }
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(candidate_id, %err, "demo add failed");
                    break;
                }
            }
        }
    }

    if args.grow {
        tracing::info!("joining one more peer to trigger a rebalance");
        let id = peers.len();
        let (router_end, peer_inbound) = MemoryChannel::pair();
        let (peer_outbound, router_reshard_end) = MemoryChannel::pair();
        router.add_storage(router_end, router_reshard_end);
        peers.push(StoragePeer::new(id, peer_inbound, peer_outbound));

        let mut rounds = 0;
        while router.rebalance_in_progress() || rounds < 2 {
            tick_all(&mut router, &mut peers);
            rounds += 1;
            if rounds > 10_000 {
                tracing::warn!("rebalance did not settle within the demo's tick budget");
                break;
            }
        }
        tracing::info!(peer_count = peers.len(), "rebalance settled");
    }

    loop {
        tick_all(&mut router, &mut peers);
        if !args.serve {
            break;
        }
        sleep(Duration::from_millis(args.idle_sleep_ms));
    }
}

fn demo_record(candidate_id: i32, contest_id: i32) -> Record {
    Record {
        candidate_id,
        last_name: "Demo".into(),
        first_name: "Candidate".into(),
        patronymic: String::new(),
        birth_date: String::new(),
        resume_link: String::new(),
        hr_manager_id: 0,
        contest_id,
        programming_language: "Rust".into(),
        num_tasks: 0,
        solved_tasks: 0,
        cheating_detected: false,
    }
}

fn load_aggregator(path: &str) -> LogAggregator {
    let text = std::fs::read_to_string(path).expect("log settings file must be readable");
    let settings = LogSettings::from_json(&text).expect("log settings file must be valid JSON");
    LogAggregator::from_settings(&settings).expect("log sinks must be openable")
}
