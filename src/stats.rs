//! Index statistics and health overview.
//!
//! Provides a quick summary of what's indexed: passage counts, embedding
//! models in use, and per-source breakdowns. Used by `medrag stats` to give
//! confidence that ingestion is working as expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::migrate;

/// Per-source breakdown of passage counts.
struct SourceStats {
    source: String,
    passage_count: i64,
    last_updated_ts: Option<i64>,
}

/// Run the stats command: query the index and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;

    let total_passages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM passages")
        .fetch_one(&pool)
        .await?;

    let total_sources: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT source) FROM passages")
        .fetch_one(&pool)
        .await?;

    let models: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT model FROM passages ORDER BY model")
            .fetch_all(&pool)
            .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("medrag — Index Stats");
    println!("====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Passages:    {}", total_passages);
    println!("  Sources:     {}", total_sources);
    println!(
        "  Models:      {}",
        if models.is_empty() {
            "none".to_string()
        } else {
            models.join(", ")
        }
    );

    // Per-source breakdown
    let source_rows = sqlx::query(
        r#"
        SELECT source,
               COUNT(*) AS passage_count,
               MAX(updated_at) AS last_updated
        FROM passages
        GROUP BY source
        ORDER BY passage_count DESC, source ASC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let source_stats: Vec<SourceStats> = source_rows
        .iter()
        .map(|row| SourceStats {
            source: row.get("source"),
            passage_count: row.get("passage_count"),
            last_updated_ts: row.get("last_updated"),
        })
        .collect();

    if !source_stats.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<40} {:>8}   {}", "SOURCE", "PASSAGES", "LAST UPDATED");
        println!("  {}", "-".repeat(72));

        for s in &source_stats {
            let updated_display = match s.last_updated_ts {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "  {:<40} {:>8}   {}",
                s.source, s.passage_count, updated_display
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KB * KB * KB {
        format!("{:.2} GB", b / (KB * KB * KB))
    } else if b >= KB * KB {
        format!("{:.1} MB", b / (KB * KB))
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
/// Future or very old timestamps fall back to the absolute form.
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }
    let (count, unit) = match delta {
        0..=59 => return "just now".to_string(),
        60..=3599 => (delta / 60, "min"),
        3600..=86399 => (delta / 3600, "hour"),
        86400..=2591999 => (delta / 86400, "day"),
        _ => return format_ts_iso(ts),
    };
    format!("{} {}{} ago", count, unit, if count == 1 { "" } else { "s" })
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
