//! Interactive and batch front end for the embedded cluster.
//!
//! This binary has no real router to dial into (see DESIGN.md), so it
//! starts its own small `EmbeddedCluster` and drives every command to
//! completion against it. Commands come either from stdin, one per line,
//! or from a `--batch FILE` of the same `;`-separated lines.

mod cluster;
mod commands;

use std::fs;
use std::io::{self, BufRead, Write};

use clap::Parser;
use shardmap_core::client_stub::Reply;
use shardmap_core::logging::{LogAggregator, LogSettings, Severity};
use shardmap_core::record::Record;

use cluster::EmbeddedCluster;
use commands::Command;

#[derive(Parser, Debug)]
#[command(name = "shardmap-client", about = "Interactive/batch client over an embedded cluster")]
struct Args {
    /// Number of storage peers in the embedded cluster.
    #[arg(long, default_value_t = 2)]
    peers: usize,

    /// Read `;`-separated commands from this file instead of stdin.
    #[arg(long)]
    batch: Option<String>,

    /// Optional log settings JSON file (sink -> minimum severity).
    #[arg(long)]
    log_settings: Option<String>,
}

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let mut aggregator = args.log_settings.as_deref().map(load_aggregator);
    let mut cluster = EmbeddedCluster::new(args.peers.max(1));

    if let Some(agg) = aggregator.as_mut() {
        agg.emit(Severity::Info, &format!("client starting with {} peers", args.peers));
    }

    match args.batch {
        Some(path) => run_batch(&mut cluster, &path),
        None => run_interactive(&mut cluster),
    }
}

fn run_batch(cluster: &mut EmbeddedCluster, path: &str) {
    let text = fs::read_to_string(path).expect("batch file must be readable");
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match commands::parse_line(line) {
            Ok(command) => execute(cluster, command),
            Err(err) => println!("line {}: {err}", line_no + 1),
        }
    }
}

fn run_interactive(cluster: &mut EmbeddedCluster) {
    print_menu();
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("EXIT") || line.eq_ignore_ascii_case("QUIT") {
            break;
        }
        if line.eq_ignore_ascii_case("HELP") {
            print_menu();
            continue;
        }
        match commands::parse_line(line) {
            Ok(command) => execute(cluster, command),
            Err(err) => println!("{err}"),
        }
    }
}

fn print_menu() {
    println!("Commands (`;`-separated fields, CONTEST_INFO is a space-separated 12-token record):");
    println!("  ADD;db;schema;table;CONTEST_INFO");
    println!("  GET;db;schema;table;candidate_id;contest_id");
    println!("  CONTAINS;db;schema;table;CONTEST_INFO");
    println!("  REMOVE;db;schema;table;CONTEST_INFO");
    println!("  REMOVE_DATABASE;db");
    println!("  REMOVE_SCHEMA;db;schema");
    println!("  REMOVE_TABLE;db;schema;table");
    println!("  HELP, EXIT");
}

fn probe_record(candidate_id: i32, contest_id: i32) -> Record {
    Record {
        candidate_id,
        last_name: String::new(),
        first_name: String::new(),
        patronymic: String::new(),
        birth_date: String::new(),
        resume_link: String::new(),
        hr_manager_id: 0,
        contest_id,
        programming_language: String::new(),
        num_tasks: 0,
        solved_tasks: 0,
        cheating_detected: false,
    }
}

fn execute(cluster: &mut EmbeddedCluster, command: Command) {
    let outcome = match command {
        Command::Add { database, schema, table, record } => {
            cluster.run(move |client| client.add(&database, &schema, &table, &record))
        }
        Command::Get { database, schema, table, candidate_id, contest_id } => {
            let probe = probe_record(candidate_id, contest_id);
            cluster.run(move |client| client.get_key(&database, &schema, &table, &probe))
        }
        Command::Contains { database, schema, table, record } => {
            cluster.run(move |client| client.contains(&database, &schema, &table, &record))
        }
        Command::Remove { database, schema, table, record } => {
            cluster.run(move |client| client.remove(&database, &schema, &table, &record))
        }
        Command::RemoveDatabase { database } => {
            cluster.run(move |client| client.delete_database(&database))
        }
        Command::RemoveSchema { database, schema } => {
            cluster.run(move |client| client.delete_schema(&database, &schema))
        }
        Command::RemoveTable { database, schema, table } => {
            cluster.run(move |client| client.delete_table(&database, &schema, &table))
        }
    };
    report(outcome);
}

fn report(outcome: Result<Reply, shardmap_core::client_stub::ClientError>) {
    match outcome {
        Ok(Reply::Ack) => println!("OK."),
        Ok(Reply::Bool(true)) => println!("Yes."),
        Ok(Reply::Bool(false)) => println!("No."),
        Ok(Reply::Record(Some(record))) => println!("Found: {record:?}"),
        Ok(Reply::Record(None)) => println!("Not found."),
        Err(err) => println!("Failed: {err}"),
    }
}

fn load_aggregator(path: &str) -> LogAggregator {
    let text = fs::read_to_string(path).expect("log settings file must be readable");
    let settings = LogSettings::from_json(&text).expect("log settings file must be valid JSON");
    LogAggregator::from_settings(&settings).expect("log sinks must be openable")
}
