use anyhow::{Context, Result};
use clap::Parser;
use anyhow::bail;
use log::{debug, info, warn};
use std::io;
use toaster::{
    BurnScheduler, HostProbe, IntervalSpec, PhaseKind, PhaseWriter, SchedulerConfig,
    StopCondition, StopToken, WorkerPool,
};

/// toaster: irregular background CPU noise
///
/// Sleeps for a random time, then saturates a pool of worker threads for a
/// random time, and repeats. Every phase is printed to stdout as
/// `<unix timestamp> <W|B> <milliseconds>`.
#[derive(Debug, Parser)]
#[clap(name = "toaster", version)]
struct Opts {
    /// Shortest wait between burns, in milliseconds.
    #[clap(short = 'w', long, default_value = "5000")]
    wait_min: u64,

    /// Longest wait between burns, in milliseconds.
    #[clap(short = 'W', long, default_value = "60000")]
    wait_max: u64,

    /// Shortest burn, in milliseconds.
    #[clap(short = 'b', long, default_value = "200")]
    burn_min: u64,

    /// Longest burn, in milliseconds.
    #[clap(short = 'B', long, default_value = "5000")]
    burn_max: u64,

    /// Number of burn worker threads. 0 uses one per logical CPU.
    #[clap(short = 't', long, default_value = "1")]
    threads: usize,

    /// Number of wait/burn iterations. Runs until interrupted if unset.
    #[clap(short = 'n', long)]
    iterations: Option<u64>,

    /// Enable verbose output, including per-burn system CPU usage. Specify
    /// multiple times to increase verbosity.
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Opts {
    fn scheduler_config(&self) -> Result<SchedulerConfig> {
        Ok(SchedulerConfig {
            wait: IntervalSpec::new(self.wait_min, self.wait_max)
                .context("Invalid wait range")?,
            burn: IntervalSpec::new(self.burn_min, self.burn_max)
                .context("Invalid burn range")?,
            stop: StopCondition::from(self.iterations),
        })
    }

    fn pool_size(&self) -> usize {
        match self.threads {
            0 => num_cpus::get(),
            n => n,
        }
    }
}

fn init_logging(verbose: u8) -> Result<()> {
    let llv = match verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        llv,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;
    Ok(())
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    init_logging(opts.verbose).context("Failed to initialize logging")?;

    let config = opts.scheduler_config()?;
    let size = opts.pool_size();
    info!(
        "wait {}-{}ms, burn {}-{}ms",
        config.wait.min_ms(),
        config.wait.max_ms(),
        config.burn.min_ms(),
        config.burn.max_ms()
    );

    let mut probe = HostProbe::new();
    let host = probe.summary();
    info!("host: {}", host);
    if size > host.logical_cpus {
        warn!(
            "{} workers on {} logical CPUs, burns will be time-sliced",
            size, host.logical_cpus
        );
    }

    let stop = StopToken::new();
    let stop_handler = stop.clone();
    let stop_output = stop.clone();
    ctrlc::set_handler(move || stop_handler.cancel())
        .context("Error setting Ctrl-C handler")?;

    let mut scheduler =
        BurnScheduler::new(config, stop).context("Failed to open the OS entropy source")?;
    let pool = WorkerPool::new(size).context("Failed to start the worker pool")?;

    let mut output = PhaseWriter::new(io::stdout());
    let mut after_burn = false;
    let result = scheduler.run(&pool, |phase| {
        match phase.kind {
            PhaseKind::Wait if after_burn => {
                log_burn_usage(&mut probe);
            }
            PhaseKind::Burn => probe.mark(),
            _ => {}
        }
        after_burn = phase.kind == PhaseKind::Burn;

        if !output.write(phase) {
            stop_output.cancel();
        }
    });

    if after_burn && result.is_ok() {
        log_burn_usage(&mut probe);
    }

    for stats in pool.shutdown() {
        info!(
            "worker {}: {} slices, {:.3}s burning, {} CPU",
            stats.index,
            stats.slices,
            stats.busy.as_secs_f64(),
            stats
                .cpu_time
                .map(|t| format!("{:.3}s", t.as_secs_f64()))
                .unwrap_or_else(|| "unknown".to_string())
        );
    }

    let summary = result.context("Burn scheduler failed")?;
    if output.failed() {
        bail!("Phase output closed after {} iteration(s)", summary.iterations);
    }
    info!(
        "{} iteration(s), {}ms waiting, {}ms burning{}",
        summary.iterations,
        summary.waited_ms,
        summary.burned_ms,
        if summary.cancelled { ", interrupted" } else { "" }
    );
    Ok(())
}

fn log_burn_usage(probe: &mut HostProbe) {
    debug!("system CPU usage over last burn: {:.1}%", probe.usage_since_mark());
}
