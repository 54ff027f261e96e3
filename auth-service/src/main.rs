//! auth-service entry point (HTTP-only).

use auth_service::{build_router, config::AuthConfig, db, services, AppState};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AuthConfig::from_env()?;

    init_tracing(&config);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting auth-service"
    );

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("PostgreSQL connection pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let database = services::Database::new(pool);

    let jwt = services::JwtService::new(&config.jwt)?;
    tracing::info!("JWT service initialized");

    let redis = Arc::new(services::RedisService::new(&config.redis).await?) as Arc<dyn services::TokenBlacklist>;
    tracing::info!("Redis connection established");

    let email = Arc::new(services::EmailService::new(&config.gmail)?) as Arc<dyn services::EmailProvider>;
    tracing::info!("Email service initialized");

    let sealing_key = hex::decode(&config.mfa.sealing_key_hex)
        .map_err(|e| anyhow::anyhow!("MFA_SEALING_KEY_HEX is not valid hex: {e}"))?;
    let totp = services::TotpService::new(&sealing_key, config.mfa.issuer.clone())?;

    let capability = services::CapabilityService::new(database.clone());
    let audit = services::AuditService::new(database.clone());
    let webhooks = Arc::new(services::WebhookDispatcher::new(database.clone())?);

    let state = AppState {
        config: config.clone(),
        db: database,
        email,
        jwt,
        redis,
        totp,
        capability,
        audit,
        webhooks: webhooks.clone(),
    };

    bootstrap_master_admin(&state).await?;

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let dispatcher = webhooks.clone();
    let delivery_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            if let Err(e) = dispatcher.dispatch_due().await {
                tracing::error!(error = %e, "webhook delivery sweep failed");
            }
        }
    });

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    delivery_task.abort();
    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Ensures a tenant-less `system_admin` principal exists, using the
/// environment-supplied password. Idempotent: no-op if the username is
/// already taken.
async fn bootstrap_master_admin(state: &AppState) -> anyhow::Result<()> {
    use auth_service::models::{Credential, User};

    let cfg = &state.config.bootstrap;
    if state.db.find_system_user_by_username(&cfg.master_username).await?.is_some() {
        return Ok(());
    }

    let password = std::env::var(&cfg.master_password_env_var).map_err(|_| {
        anyhow::anyhow!("bootstrap user does not exist and {} is not set", cfg.master_password_env_var)
    })?;

    let user = User::new_system_user(cfg.master_username.clone(), cfg.master_email.clone());
    state.db.insert_user(&user).await?;

    let password_hash = auth_service::utils::hash_password(&auth_service::utils::Password::new(password))?.into_string();
    state.db.insert_credential(&Credential::new(user.user_id, password_hash)).await?;

    let role = state.db.find_or_create_system_role("system_admin").await?;
    let permission = state.db.find_or_create_permission("*:*").await?;
    state.db.assign_permission_to_system_role(role.system_role_id, permission.permission_id).await?;
    state.db.assign_system_role_to_user(user.user_id, role.system_role_id).await?;

    tracing::warn!(username = %cfg.master_username, "bootstrapped master admin principal");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}

/// Initialize tracing with JSON format for PLG stack.
///
/// When OTLP_ENDPOINT is configured, traces are exported to Tempo.
/// Logs are always output as JSON to stdout for Promtail collection.
fn init_tracing(config: &AuthConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    if let Some(ref otlp_endpoint) = config.otlp_endpoint {
        let otlp_exporter = opentelemetry_otlp::new_exporter().tonic().with_endpoint(otlp_endpoint);

        match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(otlp_exporter)
            .with_trace_config(sdktrace::Config::default().with_resource(Resource::new(vec![
                KeyValue::new("service.name", config.service_name.clone()),
                KeyValue::new("service.version", config.service_version.clone()),
            ])))
            .install_batch(runtime::Tokio)
        {
            Ok(tracer) => {
                let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(telemetry)
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_file(true)
                            .with_line_number(true)
                            .with_target(true)
                            .json()
                            .flatten_event(true),
                    )
                    .init();
                return;
            }
            Err(e) => {
                eprintln!(
                    "Failed to initialize OTLP tracer (endpoint: {}): {}. Falling back to JSON-only logging.",
                    otlp_endpoint, e
                );
            }
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .json()
                .flatten_event(true),
        )
        .init();
}
