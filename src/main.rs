use std::sync::Arc;

use anyhow::Context;
use patient_intake::auth::{DatabaseSessions, GoogleIdentity, spawn_prune_task};
use patient_intake::config::AppConfig;
use patient_intake::forms::IntakeForms;
use patient_intake::onboarding::{AppState, Orchestrator, onboarding_routes};
use patient_intake::store::{Database, LibSqlBackend};

/// How often expired sessions are swept from the database.
const SESSION_PRUNE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    eprintln!("🩺 Patient Intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Register: {}/register", config.base_url);
    eprintln!("   API: http://0.0.0.0:{}/api", config.port);

    // ── Forms ────────────────────────────────────────────────────────────
    let forms = IntakeForms::new(config.physicians.clone()).context("Invalid form schema")?;
    eprintln!("   Physicians: {}", config.physicians.len());

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    let _prune_handle = spawn_prune_task(Arc::clone(&db), SESSION_PRUNE_INTERVAL);

    // ── Sign-in ──────────────────────────────────────────────────────────
    let mut sessions = DatabaseSessions::new(Arc::clone(&db), config.session_max_age);
    match &config.google {
        Some(google) => {
            sessions = sessions.with_identity(Arc::new(GoogleIdentity::new(
                google.client_id.clone(),
                google.client_secret.clone(),
                config.google_redirect_uri(),
            )));
            eprintln!("   Google sign-in: enabled");
        }
        None => eprintln!("   Google sign-in: disabled"),
    }

    // ── HTTP ─────────────────────────────────────────────────────────────
    let state = AppState {
        orchestrator: Arc::new(Orchestrator::new(Arc::clone(&db), forms)),
        sessions: Arc::new(sessions),
    };
    let origin = config.origin();
    let app = onboarding_routes(state, origin.as_deref());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Patient intake server started");
    axum::serve(listener, app).await?;

    Ok(())
}
