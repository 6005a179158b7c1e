mod admin;
mod credentials;
mod error;
mod session;
mod sheets;
mod site;
mod state;

use anyhow::Context;
use axum::{Router, http::StatusCode, routing::get};
use clap::Parser;
use credentials::CredentialStore;
use session::SessionStore;
use sheets::{CredentialSource, GoogleSheets};
use state::{AdminOptions, AppState};
use std::{path::PathBuf, sync::Arc};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "resource-hub", about = "Resource site with a spreadsheet-backed admin panel")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "5000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory holding `pages/*.html` fragments and `static/` assets.
    /// Defaults to a `site` directory adjacent to the server binary.
    #[arg(long, env = "SITE_ROOT")]
    site_root: Option<PathBuf>,

    /// URL of the Google Sheet backing the admin panel
    /// (anything containing `/spreadsheets/d/<id>`).
    #[arg(long, env = "SHEET_URL")]
    sheet_url: Option<String>,

    /// Service-account JSON key. If unset, the metadata server's default
    /// service account is used (Cloud Run / GCE).
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    google_credentials: Option<PathBuf>,

    /// Admin username.
    #[arg(long, env = "ADMIN_USERNAME", default_value = "admin")]
    admin_username: String,

    /// Argon2 PHC hash of the admin password. If unset, that account cannot log in.
    #[arg(long, env = "ADMIN_PASSWORD_HASH", hide_env_values = true)]
    admin_password_hash: Option<String>,

    /// JSON file of extra admin accounts: {"users":[{"username":..,"password_hash":..}]}
    #[arg(long, env = "ADMIN_USERS_FILE")]
    admin_users_file: Option<PathBuf>,

    /// Reject new resources that lack a title or URL.
    #[arg(long, env = "REQUIRE_TITLE_URL")]
    require_title_url: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resource_hub=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present (silently ignored if absent).
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let site_root = match args.site_root {
        Some(path) => path,
        None => {
            let exe = std::env::current_exe().context("Cannot determine binary path")?;
            exe.parent()
                .context("Binary has no parent directory")?
                .join("site")
        }
    };

    tracing::info!("site root: {}", site_root.display());
    if !site_root.exists() {
        tracing::warn!("site root does not exist yet: {}", site_root.display());
    }

    // Resolve symlinks in site_root for security comparisons at request time.
    // Falls back to the lexical path if the directory doesn't exist yet.
    let canonical_root = tokio::fs::canonicalize(&site_root)
        .await
        .unwrap_or_else(|_| site_root.clone());

    let credentials = CredentialStore::load(
        &args.admin_username,
        args.admin_password_hash.as_deref(),
        args.admin_users_file.as_deref(),
    )
    .await
    .context("Cannot load admin credentials")?;
    if credentials.is_empty() {
        tracing::warn!("No admin accounts configured; the admin panel is locked");
    }

    match &args.sheet_url {
        Some(url) if sheets::parse_sheet_id(url).is_some() => {
            tracing::info!("Admin panel backed by {}", url)
        }
        _ => tracing::warn!("SHEET_URL missing or malformed; admin actions will report not configured"),
    }
    let sheets = GoogleSheets::new(
        args.sheet_url,
        CredentialSource::from_key_file(args.google_credentials),
    );

    let state = AppState {
        site_root,
        canonical_root,
        sheets: Arc::new(sheets),
        credentials: Arc::new(credentials),
        sessions: SessionStore::default(),
        admin: AdminOptions {
            require_title_url: args.require_title_url,
        },
    };

    let app = build_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind to {addr}"))?;

    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// Full application router.
fn build_router(state: AppState) -> Router {
    // CatchPanicLayer is outermost so it recovers from panics anywhere in the stack.
    Router::new()
        .route("/healthz", get(|| async { StatusCode::OK }))
        .merge(admin::router(state.clone()))
        .merge(site::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result { tracing::error!("ctrl-c error: {}", e); }
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
    tracing::info!("Shutting down gracefully");
}

#[cfg(test)]
mod test_support {
    use std::{path::Path, sync::Arc};

    use crate::{
        credentials::{Account, CredentialStore, hash_password},
        session::SessionStore,
        sheets::memory::MemorySheets,
        state::{AdminOptions, AppState},
    };

    pub const ADMIN_USER: &str = "admin";
    pub const ADMIN_PASSWORD: &str = "correct horse";

    /// App state over an in-memory sheet with one admin account.
    pub fn state_with(sheets: MemorySheets, site_root: &Path) -> AppState {
        let credentials = CredentialStore::new([Account {
            username: ADMIN_USER.to_string(),
            password_hash: hash_password(ADMIN_PASSWORD).unwrap(),
        }])
        .unwrap();
        let canonical_root = std::fs::canonicalize(site_root).unwrap_or_else(|_| site_root.into());
        AppState {
            site_root: site_root.to_path_buf(),
            canonical_root,
            sheets: Arc::new(sheets),
            credentials: Arc::new(credentials),
            sessions: SessionStore::default(),
            admin: AdminOptions::default(),
        }
    }
}
