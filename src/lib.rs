// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod notifier;
pub mod types;
pub mod upload;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::{ConfigFile, UploadConfig};
use crate::engine::{Runtime, RuntimeEvent, ServerRuntime, UploadQueue};
use crate::fs::{FileSystem, RealFileSystem};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the shared upload queue and one server runtime per `[servers.<name>]`
/// - startup reconciliation
/// - (optional) file watcher
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let queue = UploadQueue::new();

    let servers = build_servers(&cfg, queue.clone(), Arc::clone(&fs))?;

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(256);
    let runtime = Runtime::new(servers, queue, rt_rx)?;

    // Files that appeared while we were not running.
    let replayed = runtime.reconcile()?;
    info!(files = replayed, "startup scan complete");

    if args.no_watch {
        runtime.shutdown().await;
        info!("--no-watch: leftover uploads finished; exiting");
        return Ok(());
    }

    let _watcher_handle = crate::watch::spawn_watcher(runtime.watch_dirs(), rt_tx.clone())?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }
    drop(rt_tx);

    runtime.run().await?;
    Ok(())
}

/// One [`ServerRuntime`] per configured server, all sharing `queue`.
pub fn build_servers(
    cfg: &ConfigFile,
    queue: UploadQueue,
    fs: Arc<dyn FileSystem>,
) -> errors::Result<Vec<ServerRuntime>> {
    cfg.servers
        .iter()
        .map(|(name, server)| {
            ServerRuntime::from_config(
                name,
                server,
                &cfg.failed_upload_path,
                queue.clone(),
                Arc::clone(&fs),
            )
        })
        .collect()
}

/// Simple dry-run output: servers, watched directories and backends.
fn print_dry_run(cfg: &ConfigFile) {
    println!("artifacts-mover dry-run");
    println!("  failed_upload_path = {:?}", cfg.failed_upload_path);
    println!();

    println!("servers ({}):", cfg.servers.len());
    for (name, server) in cfg.servers.iter() {
        println!("  - {name}");
        match server.round_timeout {
            Some(timeout) => println!("      round_timeout: {timeout:?}"),
            None => println!("      round_timeout: disabled"),
        }
        if server.bf2demo_only() {
            println!("      bf2demo only: every demo is its own round");
        }
        for (typ, location) in server.types.iter() {
            println!("      {typ}: {:?}", location.location);
            if !location.upload_path.is_empty() {
                println!("        upload_path: {}", location.upload_path);
            }
            match location.move_path {
                Some(ref dir) => println!("        on success: move to {:?}", dir),
                None => println!("        on success: delete"),
            }
        }
        for upload in server.upload.iter() {
            match upload {
                UploadConfig::Scp(scp) => {
                    println!("      upload: scp {}@{}", scp.username, scp.address)
                }
                UploadConfig::Https(https) => println!("      upload: https {}", https.url),
            }
        }
        if let Some(ref notify) = server.notify {
            println!("      notify: {}", notify.webhook_url);
        }
    }

    debug!("dry-run complete (nothing uploaded)");
}
