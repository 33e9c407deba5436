use crate::config::{LogFormat, PingkitConfig};
use anyhow::anyhow;
use pingkit_core::{Engine, JobHandle, JobStatus, Snapshot};
use std::thread;
use std::time::Duration;

/// How often finished jobs are collected.
const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Run the pingkit application.
pub fn run_pingkit(cfg: &PingkitConfig) -> anyhow::Result<()> {
    configure_logging(cfg);
    let engine = Engine::new(cfg.engine.clone())?;
    tracing::debug!(privilege_mode = ?engine.privilege_mode(), "engine started");
    let mut pending = Vec::with_capacity(cfg.hosts.len());
    let mut failed = 0_usize;
    for host in &cfg.hosts {
        match engine.create(host, cfg.ping) {
            Ok(handle) => pending.push((host.as_str(), handle)),
            Err(err) => {
                println!("{host}: {err}");
                failed += 1;
            }
        }
    }
    while !pending.is_empty() {
        thread::sleep(POLL_INTERVAL);
        let mut still_pending = Vec::with_capacity(pending.len());
        for (host, handle) in pending {
            match poll(&engine, handle)? {
                Some(snapshot) => {
                    println!("{}", format_result(host, &snapshot));
                    if snapshot.status == JobStatus::Error {
                        failed += 1;
                    }
                    engine.discard(handle);
                }
                None => still_pending.push((host, handle)),
            }
        }
        pending = still_pending;
    }
    engine.shutdown();
    if failed > 0 {
        return Err(anyhow!("{failed} of {} hosts failed", cfg.hosts.len()));
    }
    Ok(())
}

/// The final snapshot of the job, if it has finished.
fn poll(engine: &Engine, handle: JobHandle) -> anyhow::Result<Option<Snapshot>> {
    let (finished, snapshot) = engine.poll(handle)?;
    Ok(finished.then_some(snapshot))
}

fn format_result(host: &str, snapshot: &Snapshot) -> String {
    let stats = &snapshot.stats;
    let mut line = format!(
        "{host}: {}, {} sent, {} received, {:.1}% lost",
        snapshot.status, stats.sent, stats.received, stats.pct_lost
    );
    if stats.received > 0 {
        line.push_str(&format!(
            ", rtt min/avg/max/stddev = {:.3}/{:.3}/{:.3}/{:.3} ms",
            stats.min_rtt, stats.avg_rtt, stats.max_rtt, stats.std_dev_rtt
        ));
    }
    line
}

fn configure_logging(cfg: &PingkitConfig) {
    if cfg.verbose {
        match cfg.log_format {
            LogFormat::Compact => {
                tracing_subscriber::fmt()
                    .with_env_filter(&cfg.log_filter)
                    .compact()
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt()
                    .with_env_filter(&cfg.log_filter)
                    .pretty()
                    .init();
            }
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .with_env_filter(&cfg.log_filter)
                    .json()
                    .init();
            }
        }
    }
}
