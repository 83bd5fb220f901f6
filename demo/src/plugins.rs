//! Sample plugins used by the scenarios.
//!
//! `model-router` owns a route and reads its own config. `chat-logger`
//! runs after it in the chain and may only write its log directory.
//! `rogue` holds a wildcard write grant and tries to widen it by
//! rewriting its own permission lock.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use warden_contracts::{
    error::{WardenError, WardenResult},
    lock::LOCK_FILE_NAME,
    manifest::MANIFEST_FILE_NAME,
};
use warden_host::{Next, Plugin, PluginRegistry, RequestContext, Sandbox};

pub const ROUTER_MANIFEST: &str = r#"
name = "model-router"
version = "1.2.0"
description = "Routes chat requests to a configured model"

[[permissions]]
type = "file-read"
resource = "config/*"
description = "Routing table"

[[permissions]]
type = "route-registration"
resource = "/api/v1/router/*"

[[permissions]]
type = "environment"
resource = "ROUTER_MODEL"
"#;

pub const LOGGER_MANIFEST: &str = r#"
name = "chat-logger"
version = "0.3.1"

[[permissions]]
type = "file-write"
resource = "logs/*"
"#;

pub const ROGUE_MANIFEST: &str = r#"
name = "rogue"
version = "6.6.6"
description = "Asks for everything"

[[permissions]]
type = "file-write"
resource = "*"
"#;

/// Lay out the three plugin directories under `plugins_dir`.
pub fn scaffold(plugins_dir: &Path) -> std::io::Result<()> {
    let router = plugins_dir.join("model-router");
    fs::create_dir_all(router.join("config"))?;
    fs::write(router.join(MANIFEST_FILE_NAME), ROUTER_MANIFEST)?;
    fs::write(router.join("config").join("routes.toml"), "default = \"claude\"\n")?;

    let logger = plugins_dir.join("chat-logger");
    fs::create_dir_all(logger.join("logs"))?;
    fs::write(logger.join(MANIFEST_FILE_NAME), LOGGER_MANIFEST)?;

    let rogue = plugins_dir.join("rogue");
    fs::create_dir_all(&rogue)?;
    fs::write(rogue.join(MANIFEST_FILE_NAME), ROGUE_MANIFEST)?;
    Ok(())
}

pub fn registry() -> PluginRegistry {
    PluginRegistry::new()
        .with("model-router", ModelRouter)
        .with("chat-logger", ChatLogger)
        .with("rogue", Rogue)
}

// ── model-router ─────────────────────────────────────────────────────────────

pub struct ModelRouter;

#[async_trait]
impl Plugin for ModelRouter {
    async fn initialize(&self, sandbox: &Sandbox) -> WardenResult<()> {
        sandbox.register_route("/api/v1/router/chat")?;
        Ok(())
    }

    async fn handle(&self, ctx: &mut RequestContext, sandbox: &Sandbox, next: Next<'_>) -> WardenResult<()> {
        let table = sandbox.read_to_string("config/routes.toml").await?;
        let model = sandbox
            .env_var("ROUTER_MODEL")?
            .unwrap_or_else(|| table.trim().trim_start_matches("default = ").trim_matches('"').to_string());
        ctx.response.insert("model".into(), json!(model));
        next.run(ctx).await;
        Ok(())
    }
}

// ── chat-logger ──────────────────────────────────────────────────────────────

pub struct ChatLogger;

#[async_trait]
impl Plugin for ChatLogger {
    async fn handle(&self, ctx: &mut RequestContext, sandbox: &Sandbox, next: Next<'_>) -> WardenResult<()> {
        // Peeking at the router's config is not ours to do.
        let peek = sandbox.check("file-read", "../model-router/config/routes.toml");
        ctx.response.insert("logger_peek".into(), json!(peek.reason_code()));

        let line = format!("{} {}\n", ctx.route, ctx.request);
        sandbox.write("logs/chat.log", line).await?;
        info!(route = %ctx.route, "request logged");
        next.run(ctx).await;
        Ok(())
    }
}

// ── rogue ────────────────────────────────────────────────────────────────────

pub struct Rogue;

#[async_trait]
impl Plugin for Rogue {
    async fn handle(&self, _ctx: &mut RequestContext, sandbox: &Sandbox, _next: Next<'_>) -> WardenResult<()> {
        let widened = json!({
            "pluginName": "rogue",
            "grants": [{"type": "subprocess", "resourcePattern": "*"}],
            "createdAt": "2020-01-01T00:00:00Z"
        });
        sandbox.write(LOCK_FILE_NAME, widened.to_string()).await?;
        Err(WardenError::PluginFailed {
            plugin: "rogue".to_string(),
            reason: "lock rewrite unexpectedly succeeded".to_string(),
        })
    }
}
