use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use panops::config::AppConfig;
use panops::context::AppContext;
use panops::core::{
    FailurePolicy, MigrationRequest, RunSummary, Sequencer, UpdateCategory, migrate,
    resolve_hostname, update,
};
use panops::logging::{self, LogConfig};
use serde::Serialize;
use tracing::warn;

#[derive(Parser)]
#[command(name = "panops", version)]
#[command(about = "Panorama operations: hostname lookup, device moves, content updates", long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    settings: SettingsArgs,

    /// TOML config file (default: /etc/panops/config.toml, ./panops.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the hostname of a firewall in a device-group by serial number
    Hostname(HostnameArgs),
    /// Move a firewall to another device-group and template-stack, then push
    MoveDevice(MoveDeviceArgs),
    /// Check, download and install the latest content through Panorama
    ContentUpdate(ContentUpdateArgs),
    /// Wait for an already submitted job to finish
    Job(JobArgs),
    /// Print the effective configuration
    Config,
}

/// Connection and behavior flags, merged over the config file.
#[derive(Args, Serialize)]
struct SettingsArgs {
    /// Panorama management address
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true, visible_aliases = ["panorama", "panorama-ip", "target-ip"])]
    host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(short, long, global = true)]
    username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(short, long, global = true)]
    password: Option<String>,

    /// Use an existing API key instead of username/password
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    verify_tls: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    request_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    poll_interval_secs: Option<u64>,

    /// Give up on a job after this many seconds (0 = never)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    poll_timeout_secs: Option<u64>,

    /// abort | continue
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    on_job_failure: Option<FailurePolicy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    log_json: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
    verbose: Option<bool>,
}

#[derive(Args)]
struct HostnameArgs {
    /// Firewall serial number
    #[arg(short, long, visible_alias = "serial_number")]
    serial_number: String,

    /// Device-group to search
    #[arg(short, long, visible_alias = "device_group")]
    device_group: String,
}

#[derive(Args)]
struct MoveDeviceArgs {
    /// Firewall serial number
    #[arg(short, long, visible_alias = "serial_number")]
    serial_number: String,

    /// Device-group moving from
    #[arg(long, visible_alias = "from_dg")]
    from_dg: String,

    /// Device-group moving to
    #[arg(long, visible_alias = "to_dg")]
    to_dg: String,

    /// Template-stack moving from
    #[arg(long, visible_alias = "from_ts")]
    from_ts: String,

    /// Template-stack moving to
    #[arg(long, visible_alias = "to_ts")]
    to_ts: String,
}

#[derive(Args)]
struct ContentUpdateArgs {
    /// Firewall serial number; Panorama proxies every call to it
    #[arg(short, long, visible_alias = "serial_number")]
    serial_number: String,

    /// Update categories, in order (default: content, anti-virus)
    #[arg(long = "category", value_enum)]
    categories: Vec<UpdateCategory>,
}

#[derive(Args)]
struct JobArgs {
    /// Job id
    id: String,

    /// Serial number the job was submitted to, when proxied by Panorama
    #[arg(long)]
    target: Option<String>,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let config = AppConfig::new(cli.config.as_deref(), Some(&cli.settings))?;

    if let Commands::Config = cli.command {
        return run_config(&config);
    }

    logging::init(LogConfig {
        json: config.log_json,
        verbose: config.verbose,
    })
    .context("Failed to initialize logging")?;

    let ctx = AppContext::new(config);
    watch_interrupt(&ctx);

    match cli.command {
        Commands::Hostname(args) => run_hostname(&ctx, args)
            .await
            .context("Hostname lookup failed"),
        Commands::MoveDevice(args) => run_move_device(&ctx, args)
            .await
            .context("Device move failed"),
        Commands::ContentUpdate(args) => run_content_update(&ctx, args)
            .await
            .context("Content update failed"),
        Commands::Job(args) => run_job(&ctx, args).await.context("Job polling failed"),
        Commands::Config => Ok(()),
    }
}

fn watch_interrupt(ctx: &AppContext) {
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            cancel.cancel();
        }
    });
}

fn finish(summary: &RunSummary) -> Result<()> {
    let failed: Vec<_> = summary.failed().map(|o| o.job_id.as_str()).collect();
    if !failed.is_empty() {
        bail!("{} job(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

async fn run_hostname(ctx: &AppContext, args: HostnameArgs) -> Result<()> {
    let session = ctx.connect().await?;

    ctx.progress
        .step(&format!("getting hostname for {}", args.serial_number));
    let hostname = resolve_hostname(
        &session,
        ctx.progress.as_ref(),
        &ctx.cancel,
        &args.serial_number,
        &args.device_group,
    )
    .await?;
    ctx.progress.step(&format!("hostname is {hostname}"));
    Ok(())
}

async fn run_move_device(ctx: &AppContext, args: MoveDeviceArgs) -> Result<()> {
    let session = ctx.connect().await?;
    let poller = ctx.poller();
    let sequencer = Sequencer::new(&session, &poller, ctx.config.on_job_failure);

    let request = MigrationRequest {
        serial_number: args.serial_number,
        from_device_group: args.from_dg,
        to_device_group: args.to_dg,
        from_template_stack: args.from_ts,
        to_template_stack: args.to_ts,
    };

    ctx.progress.step(&format!(
        "moving NGFW serial number {} to dg {} and stack {}",
        request.serial_number, request.to_device_group, request.to_template_stack
    ));
    let summary = migrate(&sequencer, &request).await?;
    finish(&summary)
}

async fn run_content_update(ctx: &AppContext, args: ContentUpdateArgs) -> Result<()> {
    let session = ctx.connect().await?;
    let poller = ctx.poller();
    let sequencer = Sequencer::new(&session, &poller, ctx.config.on_job_failure);

    let categories = if args.categories.is_empty() {
        UpdateCategory::ALL.to_vec()
    } else {
        args.categories
    };

    ctx.progress.step(&format!(
        "updating content for NGFW serial number {}",
        args.serial_number
    ));

    let mut summary = RunSummary::default();
    for category in categories {
        summary.extend(update(&sequencer, category, &args.serial_number).await?);
    }

    ctx.progress.step("content update complete");
    finish(&summary)
}

async fn run_job(ctx: &AppContext, args: JobArgs) -> Result<()> {
    let session = ctx.connect().await?;
    let outcome = ctx
        .poller()
        .await_job_id(&session, &args.id, args.target.as_deref())
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    if !outcome.is_success() {
        return Err(outcome.into_error().into());
    }
    Ok(())
}

fn run_config(config: &AppConfig) -> Result<()> {
    let shown =
        toml::to_string_pretty(&config.redacted()).context("Failed to serialize config")?;
    print!("{shown}");
    Ok(())
}
