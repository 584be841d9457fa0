//! Load generator for the segment chain.
//!
//! Streams seeded random edges through one writer thread while reader
//! threads run forward and reverse traversals, then reports throughput and
//! the final chain summary.

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use bipartite_segments::storage::{ChainStats, CounterMetrics};
use bipartite_segments::{
    ChainOptions, Direction, EdgeIterator, GraphError, NodeId, SegmentChain,
};
use clap::{Parser, ValueEnum};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "chain-bench",
    version,
    about = "Concurrent append/traverse benchmark for the segment chain"
)]
struct Cli {
    #[arg(long, default_value_t = 8, help = "Maximum retained segments")]
    segments: usize,

    #[arg(long, default_value_t = 65_536, help = "Edge capacity per segment")]
    edges_per_segment: u32,

    #[arg(
        long,
        default_value_t = 2,
        help = "Rollovers an evicted segment survives before reuse"
    )]
    reclaim_lag: usize,

    #[arg(long, default_value_t = 1_000_000, help = "Edges to append")]
    edges: u64,

    #[arg(long, default_value_t = 10_000, help = "Distinct left nodes")]
    nodes: u64,

    #[arg(long, default_value_t = 4, help = "Reader threads")]
    readers: usize,

    #[arg(long, env = "CHAIN_BENCH_SEED", default_value_t = 42)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Default, Debug, Clone, Copy, Serialize)]
struct ReaderReport {
    traversals: u64,
    edges_read: u64,
    reclaimed_reads: u64,
}

#[derive(Debug, Serialize)]
struct BenchReport {
    edges_written: u64,
    write_time_ms: u128,
    readers: usize,
    traversals: u64,
    edges_read: u64,
    reclaimed_reads: u64,
    segment_fetches: u64,
    chain: ChainStats,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    if cli.nodes == 0 {
        return Err("--nodes must be at least 1".into());
    }
    let metrics = Arc::new(CounterMetrics::default());
    let opts = ChainOptions::new()
        .max_segments(cli.segments)
        .edges_per_segment(cli.edges_per_segment)
        .reclaim_lag(cli.reclaim_lag)
        .metrics(metrics.clone());
    let chain = Arc::new(SegmentChain::new(opts)?);
    let done = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(cli.readers + 1));

    let mut handles = Vec::with_capacity(cli.readers);
    for reader_id in 0..cli.readers {
        let chain = Arc::clone(&chain);
        let done = Arc::clone(&done);
        let barrier = Arc::clone(&barrier);
        let seed = cli.seed.wrapping_add(reader_id as u64 + 1);
        let nodes = cli.nodes;
        handles.push(thread::spawn(move || {
            barrier.wait();
            read_loop(&chain, &done, nodes, seed)
        }));
    }

    barrier.wait();
    let written = write_edges(&chain, &cli);
    done.store(true, Ordering::Release);
    let write_time = written?;
    info!(edges = cli.edges, ?write_time, "writer finished");

    let mut totals = ReaderReport::default();
    for handle in handles {
        let report = handle.join().map_err(|_| "reader thread panicked")??;
        totals.traversals += report.traversals;
        totals.edges_read += report.edges_read;
        totals.reclaimed_reads += report.reclaimed_reads;
    }

    let report = BenchReport {
        edges_written: cli.edges,
        write_time_ms: write_time.as_millis(),
        readers: cli.readers,
        traversals: totals.traversals,
        edges_read: totals.edges_read,
        reclaimed_reads: totals.reclaimed_reads,
        segment_fetches: metrics.segment_fetches.load(Ordering::Relaxed),
        chain: chain.stats(),
    };
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report, write_time),
    }
    Ok(())
}

fn write_edges(chain: &Arc<SegmentChain>, cli: &Cli) -> Result<Duration, GraphError> {
    let mut writer = chain.acquire_writer()?;
    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    let start = Instant::now();
    for _ in 0..cli.edges {
        let left = NodeId(rng.gen_range(0..cli.nodes));
        let right = NodeId(rng.gen());
        writer.add_edge(left, right)?;
    }
    Ok(start.elapsed())
}

fn read_loop(
    chain: &SegmentChain,
    done: &AtomicBool,
    nodes: u64,
    seed: u64,
) -> Result<ReaderReport, GraphError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut forward = chain.iter(Direction::Forward);
    let mut reverse = chain.iter(Direction::Reverse);
    let mut report = ReaderReport::default();
    while !done.load(Ordering::Acquire) {
        let node = NodeId(rng.gen_range(0..nodes));
        let iter = if rng.gen_bool(0.5) {
            &mut forward
        } else {
            &mut reverse
        };
        report.traversals += 1;
        match drain(iter, node) {
            Ok(read) => report.edges_read += read,
            Err(GraphError::InvalidSegmentReference { segment, .. }) => {
                warn!(segment = segment.0, node = node.0, "traversal hit reclaimed segment");
                report.reclaimed_reads += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(report)
}

fn drain<I: EdgeIterator>(iter: &mut I, node: NodeId) -> Result<u64, GraphError> {
    let mut read = 0u64;
    iter.reset_for_node(node)?;
    while iter.has_next()? {
        iter.next_edge()?;
        read += 1;
    }
    Ok(read)
}

fn print_text(report: &BenchReport, write_time: Duration) {
    let secs = write_time.as_secs_f64().max(f64::EPSILON);
    println!("{:<20} {:>15}", "METRIC", "VALUE");
    println!("{:<20} {:>15}", "edges_written", report.edges_written);
    println!(
        "{:<20} {:>15.0}",
        "appends_per_sec",
        report.edges_written as f64 / secs
    );
    println!("{:<20} {:>15}", "readers", report.readers);
    println!("{:<20} {:>15}", "traversals", report.traversals);
    println!("{:<20} {:>15}", "edges_read", report.edges_read);
    println!("{:<20} {:>15}", "reclaimed_reads", report.reclaimed_reads);
    println!("{:<20} {:>15}", "segment_fetches", report.segment_fetches);
    println!(
        "{:<20} {:>15}",
        "window",
        format!(
            "[{}, {}]",
            report.chain.oldest_segment, report.chain.live_segment
        )
    );
    println!("{:<20} {:>15}", "retained_edges", report.chain.retained_edges);
}
