//! Warden demo CLI
//!
//! Runs the enforcement scenarios against a scratch plugin directory, and
//! offers small inspection tools for real deployments.
//!
//! Usage:
//!   cargo run -p demo -- scenarios
//!   cargo run -p demo -- inspect-lock plugins/model-router
//!   cargo run -p demo -- verify-audit logs/audit.jsonl
//!   cargo run -p demo -- check plugins model-router file-read config/routes.toml

mod plugins;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use warden_audit::{first_break, read_log, InMemoryAuditRecorder};
use warden_contracts::{
    audit::Outcome,
    error::{WardenError, WardenResult},
    lock::{PermissionLock, LOCK_FILE_NAME},
    manifest::MANIFEST_FILE_NAME,
};
use warden_core::{ExecutionContext, Mediator};
use warden_host::{RequestContext, Warden, WardenConfig};
use warden_lock::LockStore;
use warden_policy::PatternMatcher;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Permission enforcement for third-party plugins.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Warden plugin permission enforcement demo",
    long_about = "Loads sample plugins under Warden and shows trust-on-first-use locks,\n\
                  per-plugin attribution, protected resources, and the audit chain."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario against a scratch plugin directory.
    Scenarios {
        /// Keep the scratch directory here instead of a temporary one.
        #[arg(long)]
        workdir: Option<PathBuf>,
    },
    /// Print the grants recorded in a plugin directory's lock file.
    InspectLock { plugin_dir: PathBuf },
    /// Check the hash chain of a JSONL audit file.
    VerifyAudit { path: PathBuf },
    /// Ask for one decision on behalf of a plugin.
    Check {
        plugins_dir: PathBuf,
        plugin: String,
        op_type: String,
        resource: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Scenarios { workdir } => run_scenarios(workdir).await,
        Command::InspectLock { plugin_dir } => inspect_lock(&plugin_dir),
        Command::VerifyAudit { path } => verify_audit(&path),
        Command::Check {
            plugins_dir,
            plugin,
            op_type,
            resource,
        } => check(&plugins_dir, &plugin, &op_type, &resource),
    };

    if let Err(e) = result {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

async fn run_scenarios(workdir: Option<PathBuf>) -> WardenResult<()> {
    print_banner();

    let scratch = tempfile::tempdir().map_err(|e| io_error(Path::new("<tempdir>"), e))?;
    let root = workdir.unwrap_or_else(|| scratch.path().to_path_buf());
    let plugins_dir = root.join("plugins");
    plugins::scaffold(&plugins_dir).map_err(|e| io_error(&plugins_dir, e))?;

    let mut config = WardenConfig::new(&plugins_dir);
    config.audit.path = Some(root.join("audit.jsonl"));
    let mut warden = Warden::new(config, plugins::registry())?;

    // Scenario 1: first load writes locks
    section("1. First load: locks are written from manifests");
    let report = warden.load_all().await?;
    for name in &report.loaded {
        let grants = warden.store().grants(name).unwrap_or_default();
        println!("  loaded {:<14} {} grant(s)", name, grants.len());
    }
    for (name, e) in &report.failed {
        println!("  FAILED {:<14} {}", name, e);
    }

    // Scenario 2: chain with nested attribution
    section("2. Chain model-router -> chat-logger");
    let request = RequestContext::new("/api/v1/router/chat", json!({"q": "hello"}));
    let ctx = warden.run_chain(&["model-router", "chat-logger"], request).await?;
    println!("  model chosen:          {}", field(&ctx, "model"));
    println!("  logger peeks router:   {}", field(&ctx, "logger_peek"));
    println!("  handler errors:        {}", ctx.errors.len());
    for line in &ctx.trace {
        println!("    trace: {}", line);
    }

    // Scenario 3: route dispatch
    section("3. Dispatch by registered route");
    for (route, owner) in warden.sandbox().routes().entries() {
        println!("  {} -> {}", route, owner);
    }
    let ctx = warden
        .dispatch("/api/v1/router/chat", json!({"q": "again"}))
        .await?;
    println!("  dispatched, model = {}", field(&ctx, "model"));

    // Scenario 4: protected resources
    section("4. Wildcard write grant vs. the plugin's own lock");
    let rogue_lock = plugins_dir.join("rogue").join(LOCK_FILE_NAME);
    let before = std::fs::read_to_string(&rogue_lock).map_err(|e| io_error(&rogue_lock, e))?;
    let ctx = warden.run_chain(&["rogue"], RequestContext::default()).await?;
    let after = std::fs::read_to_string(&rogue_lock).map_err(|e| io_error(&rogue_lock, e))?;
    for failure in &ctx.errors {
        println!("  {}: {}", failure.plugin, failure.error);
    }
    println!("  lock unchanged: {}", before == after);
    for event in warden.violations("rogue") {
        println!("  violation [{:?}] {} {}", event.severity, event.operation_type, event.resource);
    }

    // Scenario 5: trust on first use
    section("5. Manifest edits do not widen an existing lock");
    let router_manifest = plugins_dir.join("model-router").join(MANIFEST_FILE_NAME);
    let widened = format!("{}\n[[permissions]]\ntype = \"subprocess\"\nresource = \"*\"\n", plugins::ROUTER_MANIFEST);
    std::fs::write(&router_manifest, widened).map_err(|e| io_error(&router_manifest, e))?;
    let fresh = LockStore::new();
    let lock = fresh.load_plugin(&plugins_dir.join("model-router"))?;
    println!("  manifest now asks for subprocess; lock still holds {} grant(s)", lock.grants().len());
    ExecutionContext::sync_scope(|| -> WardenResult<()> {
        let _frame = ExecutionContext::enter("model-router")?;
        let decision = warden.sandbox().check("subprocess", "bash");
        println!("  subprocess bash -> {}", decision.reason_code());
        Ok(())
    })?;

    // Scenario 6: unknown operations
    section("6. Unknown operation types");
    println!("  socket-raw (host)  -> {}", warden.sandbox().check("socket-raw", "0.0.0.0:1").reason_code());

    warden.shutdown().await?;

    section("Audit trail");
    let audit_path = root.join("audit.jsonl");
    verify_audit(&audit_path)?;
    println!();
    println!("All scenarios completed.");
    Ok(())
}

// ── Tools ─────────────────────────────────────────────────────────────────────

fn inspect_lock(plugin_dir: &Path) -> WardenResult<()> {
    let path = plugin_dir.join(LOCK_FILE_NAME);
    let contents = std::fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
    let lock: PermissionLock = serde_json::from_str(&contents).map_err(|e| WardenError::LockCorrupt {
        plugin: plugin_dir.display().to_string(),
        reason: e.to_string(),
    })?;

    println!("plugin:  {}", lock.plugin_name());
    println!("created: {}", lock.created_at().to_rfc3339());
    for grant in lock.grants() {
        println!("  {:<20} {}", grant.op.as_str(), grant.resource_pattern);
    }
    Ok(())
}

fn verify_audit(path: &Path) -> WardenResult<()> {
    let records = read_log(path)?;
    let denials = records.iter().filter(|r| r.event.decision == Outcome::Deny).count();
    println!("  {} record(s), {} denial(s)", records.len(), denials);
    match first_break(&records) {
        None => println!("  chain intact"),
        Some(index) => {
            println!("  chain BROKEN at record {}", index);
            return Err(WardenError::ConfigError {
                reason: format!("audit chain in '{}' is broken at record {}", path.display(), index),
            });
        }
    }
    Ok(())
}

fn check(plugins_dir: &Path, plugin: &str, op_type: &str, resource: &str) -> WardenResult<()> {
    let store = Arc::new(LockStore::new());
    store.load_plugin(&plugins_dir.join(plugin))?;

    let audit = InMemoryAuditRecorder::new("check");
    let mediator = Mediator::new(store, Box::new(PatternMatcher::new()), Arc::new(audit.clone()));
    let decision = ExecutionContext::sync_scope(|| -> WardenResult<_> {
        let _frame = ExecutionContext::enter(plugin)?;
        Ok(mediator.check(op_type, resource))
    })?;

    println!("{} {} {} -> {}", plugin, op_type, resource, decision.reason_code());
    if let Some(event) = audit.events().last() {
        println!("  audit: {}", event.reason);
    }
    Ok(())
}

// ── Output helpers ────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Warden: Plugin Permission Enforcement");
    println!("======================================");
    println!();
    println!("Every sensitive call a plugin makes goes through one mediator:");
    println!("  [1] operation type must be one of the closed set");
    println!("  [2] acting plugin comes from the execution-context stack");
    println!("  [3] resource is normalized against the plugin's directory");
    println!("  [4] protected resources (locks, manifests, secure dirs) are refused");
    println!("  [5] otherwise a grant in the plugin's lock must match");
    println!("  [6] the decision is appended to the SHA-256 audit chain");
}

fn field(ctx: &RequestContext, key: &str) -> String {
    ctx.response
        .get(key)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}

fn section(title: &str) {
    println!();
    println!("── {} ", title);
}

fn io_error(path: &Path, e: std::io::Error) -> WardenError {
    WardenError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
