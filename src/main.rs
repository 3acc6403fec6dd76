//! DEAL DESK: score dealer inventory against a lender approval.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the rule resolver (built-in programs, seed file, optional
//! upload) and runs the requested command.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use deal_desk::config::AppConfig;
use deal_desk::engine::{rank_by_advance, ScoringPipeline};
use deal_desk::finance::payment;
use deal_desk::lenders::resolver::RuleResolver;
use deal_desk::storage;

#[derive(Parser, Debug)]
#[command(
    name = "deal-desk",
    about = "Rank inventory by gross under a lender approval",
    version
)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score an inventory file against a deal file and print the report
    Score(ScoreArgs),
    /// Print the resolved lender rules
    Rules(RuleArgs),
    /// Payment totals (and optionally the amortization schedule) for a loan
    Payment(PaymentArgs),
    /// Rank a customer's approvals on one vehicle by total gross
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// JSON array of vehicles
    #[arg(long)]
    inventory: String,
    /// JSON object with `approval` and optional `trade`
    #[arg(long)]
    deal: String,
    #[command(flatten)]
    rules: RuleArgs,
}

#[derive(Args, Debug)]
struct RuleArgs {
    /// Rule upload applied on top of the configured rules
    #[arg(long)]
    rules: Option<String>,
    /// Append the upload instead of using the mode in the file
    #[arg(long, requires = "rules")]
    append: bool,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// JSON array of vehicles
    #[arg(long)]
    inventory: String,
    /// Id of the vehicle to compare approvals on
    #[arg(long)]
    vehicle: String,
    /// JSON object with `approvals` and optional `trade`
    #[arg(long)]
    approvals: String,
    #[command(flatten)]
    rules: RuleArgs,
}

#[derive(Args, Debug)]
struct PaymentArgs {
    #[arg(long)]
    principal: f64,
    /// APR in percent
    #[arg(long)]
    apr: f64,
    #[arg(long)]
    term: u32,
    /// Include the month-by-month schedule
    #[arg(long)]
    schedule: bool,
}

fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    let cfg = if std::path::Path::new(&cli.config).exists() {
        AppConfig::load(&cli.config)?
    } else {
        info!(path = %cli.config, "No config file, using defaults");
        AppConfig::default()
    };

    match cli.command {
        Command::Score(args) => {
            let resolver = build_resolver(&cfg, &args.rules)?;
            let inventory = storage::load_inventory(&args.inventory)?;
            let deal = storage::load_deal(&args.deal)?;

            let pipeline = ScoringPipeline::new(Arc::new(resolver), cfg.pipeline());
            let report = pipeline
                .run(&inventory, &deal.approval, &deal.trade)
                .context("Scoring pass rejected")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Rules(args) => {
            let resolver = build_resolver(&cfg, &args)?;
            println!("{}", serde_json::to_string_pretty(&resolver.list_rules())?);
        }
        Command::Payment(args) => {
            let summary = payment::payment_summary(args.principal, args.apr, args.term)?;
            let schedule = if args.schedule {
                Some(payment::amortization_schedule(args.principal, args.apr, args.term)?)
            } else {
                None
            };
            let out = serde_json::json!({ "summary": summary, "schedule": schedule });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Compare(args) => {
            let resolver = build_resolver(&cfg, &args.rules)?;
            let inventory = storage::load_inventory(&args.inventory)?;
            let vehicle = inventory
                .iter()
                .find(|v| v.id == args.vehicle)
                .with_context(|| format!("Vehicle {} not in {}", args.vehicle, args.inventory))?;
            let file = storage::load_approvals(&args.approvals)?;

            let pipeline = ScoringPipeline::new(Arc::new(resolver), cfg.pipeline());
            let by_gross = pipeline.compare_approvals(vehicle, &file.approvals, &file.trade);
            let by_advance = rank_by_advance(&file.approvals).context("Approvals cannot be ranked by advance")?;
            let out = serde_json::json!({ "byGross": by_gross, "byAdvance": by_advance });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn build_resolver(cfg: &AppConfig, args: &RuleArgs) -> Result<RuleResolver> {
    let guides = cfg
        .rules
        .booking_guide_file
        .as_deref()
        .map(storage::load_booking_guides)
        .transpose()?;
    let seed = match cfg.rules.seed_file.as_deref() {
        Some(path) => storage::load_rules(path)?.rules,
        None => Vec::new(),
    };
    let resolver = RuleResolver::from_config(cfg, guides, seed).context("Invalid lender configuration")?;

    if let Some(path) = args.rules.as_deref() {
        let mut upload = storage::load_rules(path)?;
        if args.append {
            upload.mode = deal_desk::lenders::rules::UploadMode::Append;
        }
        let total = resolver.apply_upload(upload.rules, upload.mode);
        info!(path, mode = ?upload.mode, total, "Rule upload applied");
    }
    Ok(resolver)
}

/// Initialise the tracing subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("deal_desk=info"));

    // stdout carries the report; logs go to stderr.
    if std::env::var("DEAL_DESK_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
