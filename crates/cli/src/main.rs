//! Command-line client for the SOP→BPMN conversion backend.
//!
//! Submits documents, watches the jobs to completion while printing each
//! output as the backend announces it, and writes the final diagram to disk.

mod config;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sopflow_client::{HttpBackend, JobBackend};
use sopflow_core::cleaning::{extract_diagram_xml, needs_cleaning};
use sopflow_core::projection::project;
use sopflow_core::{JobId, OutputKind};
use sopflow_events::{EventBus, JobEvent, OutputPayload};
use sopflow_jobs::JobRegistry;

use config::Config;

const USAGE: &str = "\
usage: sopflow <command>

commands:
  submit <file>        upload a document and watch the conversion job
  process <key>        convert an already-uploaded document (reuses outputs when complete)
  reprocess <key>      force a fresh conversion of an uploaded document
  batch <key>...       reprocess several documents, one independent job each
  results              print the results table
  list                 list inputs eligible for reprocessing";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sopflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let backend = Arc::new(HttpBackend::new(config.api_url.clone()));

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.split_first().map(|(cmd, rest)| (cmd.as_str(), rest)) {
        Some(("submit", [file])) => submit(&config, backend, file).await,
        Some(("process", [key])) => process_existing(&config, backend, key).await,
        Some(("reprocess", [key])) => reprocess(&config, backend, key).await,
        Some(("batch", keys)) if !keys.is_empty() => batch(&config, backend, keys).await,
        Some(("results", [])) => results(&backend).await,
        Some(("list", [])) => list(&backend).await,
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

// ---- commands ----

async fn submit(config: &Config, backend: Arc<HttpBackend>, file: &str) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {file}"))?;
    let file_name = Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file)
        .to_string();

    let response = backend.submit(&file_name, bytes).await?;
    println!("submitted {file_name} as job {}", response.job_id);

    watch_one(config, backend, &file_name, &response.job_id, false).await
}

async fn process_existing(
    config: &Config,
    backend: Arc<HttpBackend>,
    key: &str,
) -> anyhow::Result<()> {
    let response = backend.submit_existing(key).await?;
    if response.reused {
        println!("reusing existing outputs for {key} (job {})", response.job_id);
    } else {
        println!("processing {key} as job {}", response.job_id);
    }

    watch_one(config, backend, key, &response.job_id, response.reused).await
}

async fn reprocess(config: &Config, backend: Arc<HttpBackend>, key: &str) -> anyhow::Result<()> {
    let response = backend.reprocess(key).await?;
    println!("reprocessing {key} as job {}", response.job_id);

    watch_one(config, backend, key, &response.job_id, false).await
}

async fn batch(config: &Config, backend: Arc<HttpBackend>, keys: &[String]) -> anyhow::Result<()> {
    let jobs: Vec<(String, JobId)> = backend.reprocess_batch(keys).await?;
    for (key, job_id) in &jobs {
        println!("reprocessing {key} as job {job_id}");
    }

    let bus = Arc::new(EventBus::default());
    let rx = bus.subscribe();
    let registry = JobRegistry::new(backend.clone() as Arc<dyn JobBackend>, Arc::clone(&bus));

    let pending: HashSet<String> = jobs.iter().map(|(key, _)| key.clone()).collect();
    registry.start_batch(jobs).await;

    watch(&backend, &config.output_dir, rx, pending).await;
    registry.shutdown().await;
    Ok(())
}

async fn results(backend: &HttpBackend) -> anyhow::Result<()> {
    let catalog = backend.catalog().await?;
    let rows = project(&catalog);
    if rows.is_empty() {
        println!("no inputs uploaded yet");
        return Ok(());
    }

    for row in rows {
        let state = if row.fully_processed {
            "done"
        } else if row.outputs.is_empty() {
            "unprocessed"
        } else {
            "partial"
        };
        let updated = row
            .last_updated
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<40} {:<12} {}/{} outputs  updated {updated}",
            row.input_key,
            state,
            row.outputs.len(),
            OutputKind::ALL.len(),
        );
    }
    Ok(())
}

async fn list(backend: &HttpBackend) -> anyhow::Result<()> {
    let files = backend.reprocessable_files().await?;
    if files.is_empty() {
        println!("nothing to reprocess");
        return Ok(());
    }

    for file in files {
        if file.has_all_outputs {
            println!("{:<40} complete ({} outputs)", file.key, file.outputs_count);
        } else {
            let missing: Vec<&str> = file.missing_outputs.iter().map(|k| k.label()).collect();
            println!("{:<40} missing: {}", file.key, missing.join(", "));
        }
    }
    Ok(())
}

// ---- watch loop ----

/// Start one session and consume its announcements until it finishes.
async fn watch_one(
    config: &Config,
    backend: Arc<HttpBackend>,
    key: &str,
    job_id: &str,
    already_completed: bool,
) -> anyhow::Result<()> {
    let bus = Arc::new(EventBus::default());
    let rx = bus.subscribe();
    let registry = JobRegistry::new(backend.clone() as Arc<dyn JobBackend>, Arc::clone(&bus));

    if already_completed {
        registry.start_completed(key, job_id).await;
    } else {
        registry.start(key, job_id).await;
    }

    let pending: HashSet<String> = [key.to_string()].into();
    watch(&backend, &config.output_dir, rx, pending).await;
    registry.shutdown().await;
    Ok(())
}

/// Print announcements for the pending keys until every session finished.
async fn watch(
    backend: &HttpBackend,
    output_dir: &Path,
    mut rx: broadcast::Receiver<JobEvent>,
    mut pending: HashSet<String>,
) {
    while !pending.is_empty() {
        match rx.recv().await {
            Ok(event) => handle_event(backend, output_dir, &mut pending, event).await,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Event stream lagged, announcements were dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn handle_event(
    backend: &HttpBackend,
    output_dir: &Path,
    pending: &mut HashSet<String>,
    event: JobEvent,
) {
    match event {
        JobEvent::StatusChanged { key, status, .. } => {
            println!("[{key}] {status}");
        }
        JobEvent::OutputAvailable {
            key, kind, payload, ..
        } => match payload {
            OutputPayload::Inline(body) => {
                println!("[{key}] {}:", kind.label());
                println!("{body}");
            }
            OutputPayload::Reference(url) => {
                println!("[{key}] {}: {url}", kind.label());
            }
        },
        JobEvent::JobFailed { key, error, .. } => {
            eprintln!("[{key}] conversion failed: {error}");
        }
        JobEvent::JobCompleted { key, job_id } => {
            match download_final(backend, output_dir, &key, &job_id).await {
                Ok(path) => println!("[{key}] diagram written to {}", path.display()),
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "Final diagram download failed");
                }
            }
        }
        JobEvent::SessionFinished { key } => {
            pending.remove(&key);
        }
    }
}

/// Fetch the final diagram, strip any narrative wrapper, and write it next
/// to the other results as `<input stem>.bpmn.xml`.
async fn download_final(
    backend: &HttpBackend,
    output_dir: &Path,
    key: &str,
    job_id: &str,
) -> anyhow::Result<PathBuf> {
    let text = backend
        .fetch_artifact(job_id, OutputKind::DownloadableResult)
        .await?;
    let cleaned = if needs_cleaning(&text) {
        extract_diagram_xml(&text)
    } else {
        text.as_str()
    };

    let stem = Path::new(key)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(key);
    let path = output_dir.join(format!("{stem}.bpmn.xml"));
    tokio::fs::write(&path, cleaned)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
