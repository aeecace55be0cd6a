mod cli;

use batchforge::board::JobBoard;
use batchforge::{batch, config};

use anyhow::Result;
use bf_av::{ProbeClient, ToolRegistry};
use bf_core::config::Config;
use bf_core::{JobId, JobRequest, JobUpdate};
use bf_queue::JobQueue;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "batchforge=debug,bf_queue=debug,bf_av=debug,bf_core=debug".to_string()
        } else {
            "batchforge=info,bf_queue=warn,bf_av=warn,bf_core=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { batch } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let requests = batch::load_batch(&batch)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_jobs(&config, requests))
        }
        Commands::Convert {
            inputs,
            out_dir,
            ext,
            overwrite,
            args,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            if !out_dir.is_dir() {
                anyhow::bail!("Output directory does not exist: {:?}", out_dir);
            }
            let requests = batch::requests_for_inputs(&inputs, &out_dir, &ext, &args, overwrite);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_jobs(&config, requests))
        }
        Commands::Probe { file, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&config, &file, json))
        }
        Commands::CheckTools => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            check_tools(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("batchforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_jobs(config: &Config, requests: Vec<JobRequest>) -> Result<()> {
    if requests.is_empty() {
        println!("Nothing to do.");
        return Ok(());
    }

    let tools = ToolRegistry::discover(&config.tools).require_all()?;
    let queue = JobQueue::new(tools, &config.queue);
    let ids: Vec<JobId> = requests.iter().map(|r| r.id.clone()).collect();

    let mut board = JobBoard::new();
    let mut rx = queue.subscribe();
    let accepted = queue.submit(requests);
    tracing::info!("Submitted {} jobs", accepted);

    let print = |board: &mut JobBoard, update: &JobUpdate| {
        for line in board.apply(update) {
            println!("{}", line);
        }
    };

    let idle = queue.wait_idle();
    tokio::pin!(idle);
    let mut interrupted = false;

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(update) => print(&mut board, &update),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Dropped progress updates");
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut idle => break,
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal?;
                interrupted = true;
                tracing::warn!("Interrupted, canceling remaining jobs");
                for id in &ids {
                    queue.cancel(id);
                }
            }
        }
    }

    // Everything published before the queue went idle is already buffered.
    loop {
        match rx.try_recv() {
            Ok(update) => print(&mut board, &update),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }

    let summary = board.summary();
    println!("\n{}", summary);
    if !summary.is_success() {
        anyhow::bail!("Batch did not complete: {}", summary);
    }
    Ok(())
}

async fn probe_file(config: &Config, file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let registry = ToolRegistry::discover(&config.tools);
    let ffprobe = registry.require("ffprobe")?;
    let client = ProbeClient::new(ffprobe.to_path_buf(), config.queue.probe_timeout());

    let duration_ms = client.duration_ms(file).await;

    if json {
        let report = serde_json::json!({
            "file": file,
            "durationMs": duration_ms,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    match duration_ms {
        Some(ms) => {
            let secs = ms / 1000;
            let mins = secs / 60;
            let hours = mins / 60;
            println!(
                "Duration: {:02}:{:02}:{:02}.{:03} ({} ms)",
                hours,
                mins % 60,
                secs % 60,
                ms % 1000,
                ms
            );
        }
        None => println!("Duration: unknown"),
    }

    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
        Ok(())
    } else {
        anyhow::bail!("Some tools are missing. Install them or set their paths in the config.");
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let show = |path: &Option<std::path::PathBuf>| {
        path.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(search PATH)".to_string())
    };
    println!("  ffmpeg: {}", show(&config.tools.ffmpeg_path));
    println!("  ffprobe: {}", show(&config.tools.ffprobe_path));
    println!("  Event capacity: {}", config.queue.event_capacity);
    println!("  Probe timeout: {}s", config.queue.probe_timeout_secs);
    match config.queue.cancel_kill_after_secs {
        Some(secs) => println!("  Kill after cancel: {}s", secs),
        None => println!("  Kill after cancel: never"),
    }

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }

    Ok(())
}
