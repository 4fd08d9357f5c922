use anyhow::{Context, Result};
use priovar_common::{
    APP_NAME,
    observability::{self, LogConfig, LogFormat, default_data_dir, expand_home},
};
use priovar_config::{ListScope, PortalConfig, PortalConfigLoader};
use priovar_http::HttpClient;
use priovar_portal::{HttpPortalApi, PatientScope, PatientTable, RecordId, SessionStore};
use priovar_runtime::{ActorSystem, ShutdownHandle};
use priovar_tui::{TuiActor, TuiMsg, spawn_tui_feeders};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const TUI_MAILBOX: usize = 256;

/// Loads `path` when it exists; environment variables alone are enough otherwise.
pub fn load_config(path: &Path) -> Result<PortalConfig> {
    let cfg = PortalConfigLoader::new()
        .with_optional_file(path)
        .load()
        .with_context(|| format!("loading config from {}", path.display()))?;
    Ok(cfg)
}

/// The TUI owns the terminal, so stderr mirroring is forced off there.
pub fn init_logging(cfg: &PortalConfig, interactive: bool) -> Result<PathBuf> {
    observability::init_logging(log_config(cfg, interactive)?)
}

fn log_config(cfg: &PortalConfig, interactive: bool) -> Result<LogConfig> {
    let format = cfg
        .logging
        .format
        .parse::<LogFormat>()
        .map_err(anyhow::Error::msg)?;
    Ok(LogConfig {
        app_name: APP_NAME,
        log_dir: cfg.logging.dir.as_deref().map(|d| expand_home(Path::new(d))),
        emit_stderr: cfg.logging.stderr && !interactive,
        format,
        default_filter: cfg.logging.filter.clone(),
    })
}

pub fn session_path(cfg: &PortalConfig) -> PathBuf {
    match cfg.session.path.as_deref() {
        Some(p) => expand_home(Path::new(p)),
        None => default_data_dir(APP_NAME).join("session.json"),
    }
}

fn scope_of(scope: ListScope) -> PatientScope {
    match scope {
        ListScope::Requested => PatientScope::Requested,
        ListScope::Clinic => PatientScope::Clinic,
    }
}

/// HTTP client → API → stored session (seeded from config) → table.
pub async fn build_table(cfg: &PortalConfig) -> Result<Arc<PatientTable>> {
    let mut client = HttpClient::new(&cfg.api.base_url)
        .with_context(|| format!("invalid api.base_url `{}`", cfg.api.base_url))?
        .with_timeout(Duration::from_secs(cfg.api.timeout_secs))
        .with_retries(cfg.api.retries);
    if let Some(token) = cfg.api.token() {
        client = client.with_token(token);
    }
    let api = Arc::new(HttpPortalApi::new(client));

    let store = SessionStore::at(session_path(cfg));
    let mut session = store.load().await.context("loading session")?;
    if session.health_center_id().is_none() {
        if let Some(id) = cfg.session.health_center_id.as_deref() {
            session.set_health_center(RecordId::from(id));
        }
    }
    tracing::debug!(
        center = ?session.health_center_id(),
        session = ?store.path(),
        "app.session.ready"
    );

    Ok(Arc::new(PatientTable::new(
        api,
        store,
        session,
        scope_of(cfg.ui.scope),
    )))
}

pub async fn run_tui(
    table: Arc<PatientTable>,
    cfg: &PortalConfig,
    shutdown: ShutdownHandle,
) -> Result<()> {
    let mut system = ActorSystem::with_shutdown(shutdown.clone());
    let tick = Duration::from_millis(cfg.ui.tick_ms);
    let poll = (cfg.ui.poll_secs > 0).then(|| Duration::from_secs(cfg.ui.poll_secs));

    let tui = TuiActor::new(table, shutdown.clone(), tick)?;
    let addr = system.spawn(tui, TUI_MAILBOX);
    spawn_tui_feeders(addr.clone(), shutdown, tick, poll);
    if addr.try_send(TuiMsg::Start).is_err() {
        anyhow::bail!("terminal ui stopped before it started");
    }

    system.run_until_shutdown().await
}
