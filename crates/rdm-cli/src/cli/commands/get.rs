//! `rdm get` – admit URLs into a scheduler and print events until every job ends.

use anyhow::{bail, Context, Result};
use rdm_core::config::RdmConfig;
use rdm_core::url_model;
use rdm_core::{JobConfig, JobId, JobState, Scheduler, TransferEvent};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use crate::cli::format::{format_bytes, format_speed};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug)]
pub struct GetOptions {
    pub urls: Vec<String>,
    pub dir: Option<PathBuf>,
    pub connections: Option<usize>,
    pub jobs: Option<usize>,
    pub retries: Option<u32>,
    pub json: bool,
}

/// Applies command-line overrides on top of the config file.
fn job_config(cfg: &RdmConfig, opts: &GetOptions) -> JobConfig {
    let mut job = cfg.job_config();
    if let Some(connections) = opts.connections {
        job.connections = connections.max(1);
    }
    if let Some(retries) = opts.retries {
        job.retry.max_retries = retries;
    }
    job
}

pub fn run_get(cfg: &RdmConfig, opts: GetOptions) -> Result<()> {
    let dir = opts.dir.clone().unwrap_or_else(|| cfg.download_dir());
    fs::create_dir_all(&dir)
        .with_context(|| format!("cannot create download directory {}", dir.display()))?;
    let job_cfg = job_config(cfg, &opts);
    let limit = opts.jobs.unwrap_or(cfg.max_concurrent_jobs);

    let (tx, rx) = mpsc::channel::<TransferEvent>();
    let scheduler = Scheduler::new(limit, Arc::new(tx));

    let mut destinations = HashMap::new();
    let mut taken = HashSet::new();
    let mut rejected = 0usize;
    for url in &opts.urls {
        let dest = url_model::destination_for(&dir, url);
        if !taken.insert(dest.clone()) {
            eprintln!("skipping {}: {} is already a destination", url, dest.display());
            rejected += 1;
            continue;
        }
        match scheduler.admit(url, &dest, job_cfg) {
            Ok(id) => {
                if !opts.json {
                    println!("[{}] {} -> {}", id, url, dest.display());
                }
                destinations.insert(id, dest);
            }
            Err(e) => {
                eprintln!("skipping {}: {}", url, e);
                rejected += 1;
            }
        }
    }

    let failed = watch(&rx, &destinations, opts.json)?;
    tracing::info!(
        jobs = destinations.len(),
        failed,
        rejected,
        "get finished"
    );
    let bad = failed + rejected;
    if bad > 0 {
        bail!("{} of {} download(s) did not complete", bad, opts.urls.len());
    }
    Ok(())
}

/// Prints events until every admitted job has ended. Returns the number of
/// jobs that did not complete.
fn watch(
    rx: &mpsc::Receiver<TransferEvent>,
    destinations: &HashMap<JobId, PathBuf>,
    json: bool,
) -> Result<usize> {
    let mut open: HashSet<JobId> = destinations.keys().copied().collect();
    let mut last_print: HashMap<JobId, Instant> = HashMap::new();
    let mut failed = 0;

    while !open.is_empty() {
        let Ok(event) = rx.recv() else {
            break;
        };
        if json {
            println!("{}", serde_json::to_string(&event)?);
        }
        match &event {
            TransferEvent::Progress {
                id,
                transferred,
                total,
                speed,
            } if !json => {
                let now = Instant::now();
                let due = last_print
                    .get(id)
                    .map_or(true, |t| now.duration_since(*t) >= PROGRESS_INTERVAL);
                if due {
                    let total = total.map(format_bytes).unwrap_or_else(|| "?".to_string());
                    println!(
                        "[{}] {} / {}  {}",
                        id,
                        format_bytes(*transferred),
                        total,
                        format_speed(*speed)
                    );
                    last_print.insert(*id, now);
                }
            }
            TransferEvent::StateChanged { id, state } => {
                if !json && !state.is_terminal() {
                    println!("[{}] {}", id, state);
                }
                if *state == JobState::Cancelled && open.remove(id) {
                    failed += 1;
                }
            }
            TransferEvent::Completed { id } => {
                if !json {
                    if let Some(dest) = destinations.get(id) {
                        println!("[{}] completed: {}", id, dest.display());
                    }
                }
                open.remove(id);
            }
            TransferEvent::Failed { id, error, retries } => {
                if !json {
                    println!("[{}] failed after {} retries: {}", id, retries, error);
                }
                if open.remove(id) {
                    failed += 1;
                }
            }
            _ => {}
        }
    }
    Ok(failed)
}
