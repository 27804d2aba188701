//! skconf - Configure the Slurm kernel of a JupyterLab server from the terminal

mod client;
mod countdown;
mod display;
mod kernelspec;
mod models;
mod poller;
mod resolver;
mod session;
mod tui;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen},
};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use client::{ProvisionerApi, ProvisionerClient, Scope};
use countdown::{Countdown, KernelCountdown, unix_now};
use kernelspec::available_kernels;
use models::{AppConfig, AvailableKernels};
use resolver::{FormField, Resolver};

#[derive(Parser)]
#[command(name = "skconf")]
#[command(about = "Configure the Slurm kernel of a JupyterLab server", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the Slurm kernel's current configuration
    Show,

    /// List kernel allocations
    #[command(alias = "alloc")]
    Allocations {
        /// Include allocations of all servers, not only this one
        #[arg(short, long)]
        all: bool,

        /// Watch mode: refresh every N seconds
        #[arg(short, long, value_name = "SECONDS", default_value = "0")]
        watch: f64,
    },

    /// List Jupyter kernels that can run inside an allocation
    Kernels,

    /// Set the Slurm kernel's configuration
    Configure {
        /// Existing allocation id, or "New"
        #[arg(short, long)]
        allocation: Option<String>,

        /// Node inside the allocation, or "Any"
        #[arg(long)]
        node: Option<String>,

        /// Kernel to start inside the allocation
        #[arg(short, long)]
        kernel: Option<String>,

        /// Project (account) to charge
        #[arg(short = 'A', long)]
        project: Option<String>,

        /// Partition to allocate from
        #[arg(short, long)]
        partition: Option<String>,

        /// Number of nodes
        #[arg(short = 'N', long)]
        nodes: Option<String>,

        /// Number of GPUs
        #[arg(short, long)]
        gpus: Option<String>,

        /// Runtime in minutes
        #[arg(short, long)]
        runtime: Option<String>,

        /// Reservation, or "None"
        #[arg(long)]
        reservation: Option<String>,

        /// Print the resolved configuration without saving it
        #[arg(long)]
        dry_run: bool,
    },

    /// Cancel an allocation
    #[command(alias = "kill")]
    Cancel {
        /// Allocation id
        id: String,
    },

    /// Count down the remaining time of an allocation
    Countdown {
        /// Allocation id (defaults to the configured allocation)
        allocation: Option<String>,

        /// Follow the allocation holding this kernel
        #[arg(long, conflicts_with = "allocation")]
        kernel_id: Option<String>,
    },

    /// Launch interactive TUI mode
    #[command(alias = "ui")]
    Tui {
        /// Kernel the session is attached to
        #[arg(long)]
        kernel_id: Option<String>,

        /// Kernel spec name of that kernel
        #[arg(long, requires = "kernel_id")]
        kernel_name: Option<String>,

        /// Start with the side panel hidden
        #[arg(long)]
        no_panel: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let is_tui = matches!(cli.command, Some(Commands::Tui { .. }));

    if let Err(e) = init_logging(is_tui) {
        eprintln!("Warning: could not set up logging: {e:#}");
    }

    let (config, warnings) = match AppConfig::load() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if !is_tui {
        for warning in &warnings {
            eprintln!("Warning: {warning}");
        }
    }

    let rt = Runtime::new()?;
    let api = ProvisionerClient::new(&config.server)?;
    tracing::debug!(url = api.base_url(), "using provisioner");

    match cli.command.unwrap_or(Commands::Show) {
        Commands::Show => {
            let kernels = available_kernels();
            let output = rt.block_on(handle_show_command(&api, &kernels))?;
            println!("{}", output);
        }
        Commands::Allocations { all, watch } => {
            let scope = if all { Scope::All } else { Scope::Local };
            if watch > 0.0 {
                watch_loop(watch, || rt.block_on(handle_allocations_command(&api, scope)))?;
            } else {
                let output = rt.block_on(handle_allocations_command(&api, scope))?;
                println!("{}", output);
            }
        }
        Commands::Kernels => {
            println!("{}", display::format_kernels(&available_kernels()));
        }
        Commands::Configure {
            allocation,
            node,
            kernel,
            project,
            partition,
            nodes,
            gpus,
            runtime,
            reservation,
            dry_run,
        } => {
            let flags = ConfigureFlags {
                allocation,
                node,
                kernel,
                project,
                partition,
                nodes,
                gpus,
                runtime,
                reservation,
            };
            let kernels = available_kernels();
            let output = rt.block_on(handle_configure_command(&api, &kernels, &flags, dry_run))?;
            println!("{}", output);
        }
        Commands::Cancel { id } => {
            rt.block_on(api.cancel_allocation(&id))
                .with_context(|| format!("could not cancel allocation {id}"))?;
            println!("Cancel requested for allocation {id}");
        }
        Commands::Countdown {
            allocation,
            kernel_id,
        } => {
            rt.block_on(handle_countdown_command(&api, allocation, kernel_id))?;
        }
        Commands::Tui {
            kernel_id,
            kernel_name,
            no_panel,
        } => {
            // The TUI drives its own runtime
            drop(rt);
            let options = tui::TuiOptions {
                kernel_id,
                kernel_name,
                show_panel: no_panel.then_some(false),
            };
            tui::run(config, warnings, options)?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// CLI commands log to stderr; the TUI logs to a file since it owns the
/// terminal.
fn init_logging(to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env("SKCONF_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if to_file {
        let path = log_file_path().ok_or_else(|| anyhow!("no state directory for the log file"))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let file = File::options()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()
            .map_err(|e| anyhow!(e))?;
    } else {
        builder
            .with_writer(io::stderr)
            .try_init()
            .map_err(|e| anyhow!(e))?;
    }
    Ok(())
}

fn log_file_path() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_dir)
        .map(|dir| dir.join("skconf").join("skconf.log"))
}

/// Watch loop that repeatedly executes a command with flicker-free updates
fn watch_loop<F>(interval: f64, command: F) -> Result<()>
where
    F: Fn() -> Result<String>,
{
    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    // Enter alternate screen buffer and hide cursor for clean display
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, Hide)?;

    // Ensure we clean up on exit
    let cleanup = || -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Show, LeaveAlternateScreen)?;
        Ok(())
    };

    let result = (|| -> Result<()> {
        while running.load(Ordering::SeqCst) {
            let now = chrono::Local::now();
            let timestamp = now.format("%Y-%m-%d %H:%M:%S");

            let output = match command() {
                Ok(s) => s,
                Err(e) => format!("Error: {:#}", e),
            };

            let screen_content = format!(
                "{}\n\nLast updated: {} | Refreshing every {}s | Press Ctrl+C to exit",
                output, timestamp, interval
            );

            // Synchronized update (DEC private mode) so the frame appears at once
            write!(stdout, "\x1B[?2026h")?;
            write!(stdout, "\x1B[H{}\x1B[J", screen_content)?;
            write!(stdout, "\x1B[?2026l")?;
            stdout.flush()?;

            thread::sleep(Duration::from_secs_f64(interval));
        }
        Ok(())
    })();

    // Always clean up terminal state
    cleanup()?;

    println!("Watch mode stopped.");

    result
}

async fn handle_show_command<A: ProvisionerApi>(api: &A, kernels: &AvailableKernels) -> Result<String> {
    let catalog = api
        .fetch_options(Scope::Default)
        .await
        .context("could not load the current configuration")?;
    Ok(display::format_current_config(&catalog, kernels, unix_now()))
}

async fn handle_allocations_command<A: ProvisionerApi>(api: &A, scope: Scope) -> Result<String> {
    let catalog = api
        .fetch_options(scope)
        .await
        .context("could not load allocations")?;
    Ok(display::format_allocations(&catalog, unix_now()))
}

/// Field values given on the `configure` command line
struct ConfigureFlags {
    allocation: Option<String>,
    node: Option<String>,
    kernel: Option<String>,
    project: Option<String>,
    partition: Option<String>,
    nodes: Option<String>,
    gpus: Option<String>,
    runtime: Option<String>,
    reservation: Option<String>,
}

impl ConfigureFlags {
    fn get(&self, field: FormField) -> Option<&str> {
        let value = match field {
            FormField::Allocation => &self.allocation,
            FormField::Node => &self.node,
            FormField::Kernel => &self.kernel,
            FormField::Project => &self.project,
            FormField::Partition => &self.partition,
            FormField::Nodes => &self.nodes,
            FormField::Gpus => &self.gpus,
            FormField::Runtime => &self.runtime,
            FormField::Reservation => &self.reservation,
        };
        value.as_deref()
    }
}

/// Resolve the form from the current configuration, apply the flags in form
/// order, then save (or print) the result.
async fn handle_configure_command<A: ProvisionerApi>(
    api: &A,
    kernels: &AvailableKernels,
    flags: &ConfigureFlags,
    dry_run: bool,
) -> Result<String> {
    let catalog = api
        .fetch_options(Scope::All)
        .await
        .context("could not load the configuration options")?;

    let resolver = Resolver::new(&catalog, kernels);
    let mut form = resolver.resolve_current();

    for field in FormField::ORDER {
        if let Some(value) = flags.get(field) {
            resolver.select(&mut form, field, value)?;
        }
    }

    let config = form.to_kernel_config(kernels);
    if config.partition.is_empty() {
        bail!("no partition available; pass --partition or check the project");
    }

    let summary = display::format_kernel_config(&config);
    if dry_run {
        return Ok(summary);
    }

    api.submit_config(&config)
        .await
        .context("could not save the configuration")?;
    tracing::info!(jobid = %config.allocation, partition = %config.partition, "configuration saved");
    Ok(format!("{}\nConfiguration saved.", summary))
}

/// Print a live countdown until it reaches zero or Ctrl+C is pressed
async fn handle_countdown_command<A: ProvisionerApi>(
    api: &A,
    allocation: Option<String>,
    kernel_id: Option<String>,
) -> Result<()> {
    let catalog = api
        .fetch_options(Scope::Local)
        .await
        .context("could not load allocations")?;

    let (label, countdown) = match (allocation, kernel_id) {
        (_, Some(kernel_id)) => {
            let found = KernelCountdown::for_kernel(&catalog, &kernel_id)
                .ok_or_else(|| anyhow!("kernel {kernel_id} does not run in a known allocation"))?;
            (found.label(), found.countdown)
        }
        (Some(id), None) => {
            let alloc = catalog
                .allocation(&id)
                .ok_or_else(|| anyhow!("unknown allocation {id}"))?;
            (format!("Allocation {id}: "), Countdown::new(alloc.endtime))
        }
        (None, None) => {
            let endtime = catalog
                .current_endtime()
                .ok_or_else(|| anyhow!("the current configuration has no allocation"))?;
            ("Time left: ".to_string(), Countdown::new(endtime))
        }
    };

    let cancel = CancellationToken::new();
    let on_ctrlc = cancel.clone();
    ctrlc::set_handler(move || on_ctrlc.cancel()).context("Error setting Ctrl-C handler")?;

    let handle = countdown.spawn(cancel, move |tick| {
        let mut stdout = io::stdout();
        let _ = write!(stdout, "\r{}{}", label, display::format_tick(&tick));
        stdout.flush().is_ok()
    });
    handle.await?;
    println!();

    Ok(())
}
