//! Storage peer binary.
//!
//! This crate has no shared-memory (or other) transport implementation —
//! that layer is out of scope (see DESIGN.md) — so a standalone peer has
//! nobody to dial. This binary demonstrates the role in isolation: it
//! wires a `StoragePeer` to a local `MemoryChannel` pair, drives it
//! through a small scripted workload standing in for what a router would
//! otherwise dispatch, and ticks on the same ≈1s idle cadence every
//! process in this system uses.

use std::thread::sleep;
use std::time::Duration;

use clap::Parser;
use shardmap_core::channel::{Channel, MemoryChannel};
use shardmap_core::logging::{LogAggregator, LogSettings, Severity};
use shardmap_core::protocol::{RequestCode, RequestEnvelope, TransportEnvelope, TransportOp};
use shardmap_core::record::{Record, RecordCodec};
use shardmap_core::StoragePeer;

#[derive(Parser, Debug)]
#[command(name = "shardmap-peer", about = "Storage peer tick loop")]
struct Args {
    /// This peer's id, as assigned by a router at handshake.
    #[arg(long, default_value_t = 0)]
    id: usize,

    /// Optional log settings JSON file (sink -> minimum severity).
    #[arg(long)]
    log_settings: Option<String>,

    /// Idle sleep between ticks, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    idle_sleep_ms: u64,

    /// Exit after the scripted demo workload instead of idling forever.
    #[arg(long)]
    once: bool,
}

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let mut aggregator = args.log_settings.as_deref().map(load_aggregator);

    let (mut router_view, peer_inbound) = MemoryChannel::pair();
    let (peer_outbound, mut reshard_sink) = MemoryChannel::pair();
    let mut peer = StoragePeer::new(args.id, peer_inbound, peer_outbound);

    if let Some(agg) = aggregator.as_mut() {
        agg.emit(Severity::Info, &format!("peer {} starting", args.id));
    }

    for (candidate_id, contest_id) in [(1, 1), (2, 1), (3, 2)] {
        let record = demo_record(candidate_id, contest_id);
        let req = RequestEnvelope {
            code: RequestCode::Add,
            database: "db".into(),
            schema: "public".into(),
            table: "submissions".into(),
            payload: RecordCodec::encode(&record),
        };
        router_view.send(TransportEnvelope::ok(TransportOp::Request, Some(req.encode())));
        peer.tick();
        if let Some(reply) = router_view.try_recv() {
            tracing::info!(payload = ?reply.payload, "demo add acknowledged");
        }
    }

    loop {
        peer.tick();
        while let Some(forwarded) = reshard_sink.try_recv() {
            tracing::debug!(op = ?forwarded.op, "reshard forward emitted (no router attached to receive it)");
        }
        if args.once {
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
