//! Interaction logging and offline evaluation.
//!
//! The `/chat` endpoint and `medrag ask` append one JSON line per
//! answered question to the configured log; `medrag eval report` reads
//! the log back and prints latency and retrieval statistics.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// One answered chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: String,
    pub query: String,
    pub response_len: usize,
    pub retrieved_count: usize,
    pub latency_ms: u64,
}

impl InteractionRecord {
    pub fn new(query: &str, response_len: usize, retrieved_count: usize, latency_ms: u64) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            query: query.to_string(),
            response_len,
            retrieved_count,
            latency_ms,
        }
    }
}

/// Append one record to the JSONL log, creating the file on first use.
pub fn append_interaction(path: &Path, record: &InteractionRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let line = serde_json::to_string(record)?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open interaction log {}", path.display()))?;
    writeln!(file, "{}", line)?;
    Ok(())
}

fn load_records(path: &Path) -> Result<Vec<InteractionRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read interaction log {}", path.display()))?;

    let mut records = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: InteractionRecord = serde_json::from_str(line)
            .with_context(|| format!("Bad record on line {}", lineno + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// CLI entry for `medrag eval report`.
pub fn run_report(config: &Config) -> Result<()> {
    let path = config
        .eval
        .log_path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("eval.log_path is not configured"))?;
    if !path.exists() {
        bail!("Interaction log does not exist: {}", path.display());
    }

    let records = load_records(path)?;
    if records.is_empty() {
        println!("No interactions logged.");
        return Ok(());
    }

    let mut latencies: Vec<u64> = records.iter().map(|r| r.latency_ms).collect();
    latencies.sort_unstable();
    let mean = latencies.iter().sum::<u64>() as f64 / latencies.len() as f64;
    let with_context = records.iter().filter(|r| r.retrieved_count > 0).count();
    let mean_retrieved =
        records.iter().map(|r| r.retrieved_count).sum::<usize>() as f64 / records.len() as f64;

    println!("Interaction Report");
    println!("==================");
    println!("  interactions:    {}", records.len());
    println!("  with context:    {}", with_context);
    println!("  mean retrieved:  {:.1}", mean_retrieved);
    println!("  latency mean:    {:.0} ms", mean);
    println!("  latency p50:     {} ms", percentile(&latencies, 50.0));
    println!("  latency p90:     {} ms", percentile(&latencies, 90.0));
    println!("  latency p95:     {} ms", percentile(&latencies, 95.0));

    Ok(())
}
