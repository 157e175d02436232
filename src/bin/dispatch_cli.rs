use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use dispatch_engine::{
    config::{self, EngineConfig},
    events::{process_events, Event, EventSender},
    models::{BaseOrderGroup, BaseOrderId, OrderGrouping, WorkflowStage},
    services::{
        load_pending_groups, submit_session, AllocationSession, InMemorySink, JsonFileSource,
        RecordNormalizer, SessionEvent, SessionOptions, SubmitOptions,
    },
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize()?;

    match cli.command {
        Commands::Group(args) => handle_group(&context, args, cli.json).await?,
        Commands::Allocate(args) => handle_allocate(&context, args, cli.json).await?,
        Commands::Submit(args) => handle_submit(&context, args, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "dispatch-cli",
    about = "Group pending dispatch orders and allocate approved quantities",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pending lines grouped by customer, base order and section
    Group(GroupArgs),
    /// Replay session events against one base order
    Allocate(AllocateArgs),
    /// Replay session events, then submit the eligible lines
    Submit(SubmitArgs),
}

#[derive(Args)]
struct SourceArgs {
    #[arg(help = "JSON file with pending order records")]
    file: PathBuf,
    #[arg(
        long,
        default_value = "approval",
        help = "Workflow stage to read (e.g. pre-approval, approval, dispatch)"
    )]
    stage: WorkflowStage,
}

#[derive(Args)]
struct GroupArgs {
    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Args)]
struct AllocateArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[arg(long, help = "Base order key, e.g. DO-5")]
    base: String,
    #[arg(long, help = "Customer name, when the base key is shared between customers")]
    customer: Option<String>,
    #[arg(long, help = "JSON file with a list of session events")]
    script: PathBuf,
}

#[derive(Args)]
struct SubmitArgs {
    #[command(flatten)]
    allocate: AllocateArgs,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Submit into an in-memory sink and print the payloads"
    )]
    dry_run: bool,
    #[arg(long, help = "Writes in flight; defaults to the configured value")]
    concurrency: Option<usize>,
}

struct CliContext {
    config: EngineConfig,
    normalizer: RecordNormalizer,
}

impl CliContext {
    fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load engine config")?;
        config::init_tracing(config.log_level(), config.log_json);
        debug!(target: "dispatch_cli", environment = %config.environment, "configuration ready");

        let normalizer = RecordNormalizer::from_config(&config);
        Ok(Self { config, normalizer })
    }

    async fn load(&self, source: &SourceArgs) -> Result<OrderGrouping> {
        if !source.file.exists() {
            bail!("pending order file {} does not exist", source.file.display());
        }
        let file_source = JsonFileSource::new(&source.file);
        Ok(load_pending_groups(&file_source, source.stage, &self.normalizer).await)
    }

    async fn session(&self, args: &AllocateArgs) -> Result<AllocationSession> {
        if !args.source.stage.allocates_quantity() {
            bail!(
                "quantities are not allocated at the {} stage",
                args.source.stage
            );
        }
        let grouping = self.load(&args.source).await?;
        let base = BaseOrderId::new(args.base.trim());
        let group = grouping
            .find_base_order(&base, args.customer.as_deref())
            .cloned()
            .ok_or_else(|| anyhow!("base order {} not found", base))?;

        let events = read_script(&args.script)?;
        let mut session = AllocationSession::new(group, SessionOptions::from_config(&self.config));
        session
            .apply_all(events)
            .context("failed to replay session events")?;
        Ok(session)
    }
}

fn read_script(path: &Path) -> Result<Vec<SessionEvent>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read event script {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("event script {} is not a list of session events", path.display()))
}

async fn handle_group(context: &CliContext, args: GroupArgs, json: bool) -> Result<()> {
    let grouping = context.load(&args.source).await?;
    if json {
        return print_json(&grouping);
    }

    if grouping.is_empty() {
        println!("No pending orders for {}", args.source.stage);
        return Ok(());
    }
    for customer in &grouping.customers {
        println!("{} ({} line(s))", customer.customer_name, customer.line_count());
        for order in &customer.orders {
            render_base_order(order, &context.config.currency_symbol);
        }
    }
    Ok(())
}

fn render_base_order(order: &BaseOrderGroup, currency: &str) {
    let budgets = order
        .category_budgets
        .iter()
        .map(|(category, budget)| format!("{} {}", category, budget))
        .collect::<Vec<_>>()
        .join(", ");
    println!("  Base order {} • budgets: {}", order.base_order, budgets);
    for section in &order.sections {
        println!(
            "    Section {} • {} • {}",
            section.order_number(),
            section.metadata.transport_type,
            section.metadata.payment_terms
        );
        for line in &section.lines {
            println!(
                "      • [{}] {} ({}) qty {} floor {}{}",
                line.line_id,
                line.product_name,
                line.category,
                line.ordered_qty,
                currency,
                line.unit_floor_rate
            );
        }
    }
}

#[derive(Serialize)]
struct LineView<'a> {
    line_id: &'a str,
    order_number: String,
    product_name: &'a str,
    category: String,
    selected: bool,
    eligible: bool,
    diagnostics: dispatch_engine::models::LineDiagnostics,
}

#[derive(Serialize)]
struct SessionView<'a> {
    base_order: &'a str,
    lines: Vec<LineView<'a>>,
    usage: Vec<dispatch_engine::services::CategoryUsage>,
    can_submit: bool,
}

fn session_view(session: &AllocationSession) -> SessionView<'_> {
    let lines = session
        .lines()
        .map(|line| LineView {
            line_id: line.line_id.as_str(),
            order_number: line.order_number(),
            product_name: &line.product_name,
            category: line.category.to_string(),
            selected: session.is_selected(&line.line_id),
            eligible: session.is_eligible(&line.line_id),
            diagnostics: session.diagnostics(&line.line_id),
        })
        .collect();
    SessionView {
        base_order: session.group().base_order.as_str(),
        lines,
        usage: session.category_usage(),
        can_submit: session.can_submit(),
    }
}

fn render_session(session: &AllocationSession) {
    let view = session_view(session);
    println!("Base order {}", view.base_order);
    for line in view.lines.iter().filter(|l| l.selected) {
        let marker = if line.eligible { "✓" } else { " " };
        println!(
            "  {} {} {} ({})",
            marker, line.order_number, line.product_name, line.category
        );
        if let Some(notice) = line.diagnostics.notice() {
            println!("      {}", notice);
        }
        for error in line.diagnostics.errors() {
            println!("      error: {}", error);
        }
    }
    for usage in &view.usage {
        println!(
            "  {}: {} approved of {} ({} remaining)",
            usage.category, usage.approved, usage.budget, usage.remaining
        );
    }
    println!("Ready to submit: {}", if view.can_submit { "yes" } else { "no" });
}

async fn handle_allocate(context: &CliContext, args: AllocateArgs, json: bool) -> Result<()> {
    let session = context.session(&args).await?;
    if json {
        print_json(&session_view(&session))
    } else {
        render_session(&session);
        Ok(())
    }
}

async fn handle_submit(context: &CliContext, args: SubmitArgs, json: bool) -> Result<()> {
    if !args.dry_run {
        bail!("no dispatch backend is configured; rerun with --dry-run");
    }
    let session = context.session(&args.allocate).await?;

    let (event_tx, event_rx) = mpsc::channel::<Event>(32);
    let events = tokio::spawn(process_events(event_rx));
    let options = SubmitOptions {
        concurrency: args
            .concurrency
            .unwrap_or(context.config.submission_concurrency)
            .max(1),
        events: Some(EventSender::new(event_tx)),
    };

    let sink = InMemorySink::new();
    let report = submit_session(&session, &sink, &options)
        .await
        .context("submission refused")?;
    drop(options);
    let processed = events.await.context("event processing task failed")?;
    debug!(target: "dispatch_cli", processed, "submission events drained");

    if json {
        #[derive(Serialize)]
        struct DryRun<'a> {
            report: &'a dispatch_engine::services::SubmissionReport,
            sections: Vec<dispatch_engine::services::SectionPayload>,
            lines: Vec<dispatch_engine::services::LinePayload>,
        }
        return print_json(&DryRun {
            report: &report,
            sections: sink.created_sections().await,
            lines: sink.submitted_lines().await,
        });
    }

    for section in sink.created_sections().await {
        println!(
            "- New section {} (from {})",
            section.order_number, section.source_order_number
        );
    }
    for line in sink.submitted_lines().await {
        println!(
            "- {} • {} x {} @ {}{}",
            line.order_number,
            line.sku_name,
            line.approval_qty,
            context.config.currency_symbol,
            line.final_rate
        );
    }
    for failure in &report.failed {
        println!(
            "  ✗ {} {} [{}]: {}",
            failure.order_number, failure.line_id, failure.code, failure.reason
        );
    }
    println!("{}", report.summary());
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
