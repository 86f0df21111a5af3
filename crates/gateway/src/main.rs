mod api;
mod background;
mod cli;
mod ranking;
mod session_cache;
mod state;

use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use sha2::Digest;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, ConfigCommand};
use grov_adapter::anthropic::AnthropicAdapter;
use grov_adapter::openai_compat::OpenAiCompatAdapter;
use grov_adapter::AdapterRegistry;
use grov_domain::config::{Config, ConfigSeverity, CorsConfig, UpstreamKind};
use grov_providers::ProviderRegistry;
use grov_store::Store;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            let _debug_guard = init_tracing(cli.debug);
            let (config, _config_path) = cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = cli::load_config()?;
            let passed = cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = cli::load_config()?;
            let valid = cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = cli::load_config()?;
            cli::config::show(&config);
            Ok(())
        }
    }
}

/// Default sink is a compact human line on stdout. `--debug` switches to a
/// JSON file sink under `./logs/grov.debug.log` so `TraceEvent::emit()`
/// entries (REQUEST/RESPONSE/INJECTION) can be tailed and grepped without
/// drowning the console. Returns the file-appender guard, which must stay
/// alive for the process lifetime or buffered lines are lost on exit.
fn init_tracing(debug: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,grov_gateway=debug"));
    if debug {
        let file_appender = tracing_appender::rolling::never("logs", "grov.debug.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt().with_env_filter(filter).json().with_writer(non_blocking).init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).compact().init();
        None
    }
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("grov starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let store = Arc::new(Store::open(std::path::Path::new(&config.store.db_path)).context("opening store")?);
    tracing::info!(path = %config.store.db_path, "store ready");

    let aux_llm = Arc::new(ProviderRegistry::from_config(&config.llm).context("initializing auxiliary LLM providers")?);
    tracing::info!(roles = config.llm.roles.len(), "auxiliary LLM registry ready");

    let upstream_key = grov_providers::resolve_api_key(
        "upstream",
        &grov_domain::config::AuthConfig {
            key: None,
            env: Some(config.upstream.api_key_env.clone()),
        },
    )
    .ok();
    if upstream_key.is_none() {
        tracing::warn!(
            env = %config.upstream.api_key_env,
            "no upstream API key resolved — requests will be forwarded without auth and the upstream will reject them"
        );
    }

    let adapter: Arc<dyn grov_adapter::AgentAdapter> = match config.upstream.kind {
        UpstreamKind::Anthropic => {
            Arc::new(AnthropicAdapter::new(config.upstream.base_url.clone()).context("constructing Anthropic adapter")?)
        }
        UpstreamKind::OpenaiCompat => Arc::new(
            OpenAiCompatAdapter::new(config.upstream.base_url.clone()).context("constructing OpenAI-compatible adapter")?,
        ),
    };
    let adapters = Arc::new(AdapterRegistry::new(vec![adapter]));
    tracing::info!(base_url = %config.upstream.base_url, kind = ?config.upstream.kind, "upstream adapter ready");

    let admin_token_hash = match std::env::var(&config.admin.token_env) {
        Ok(token) if !token.is_empty() => {
            tracing::info!("admin bearer-token auth enabled");
            Some(sha2::Sha256::digest(token.as_bytes()).to_vec())
        }
        _ => {
            tracing::warn!(env = %config.admin.token_env, "admin bearer-token auth DISABLED — set this env var to enable /v1/context");
            None
        }
    };

    let state = AppState::new(config.clone(), store.clone(), adapters, aux_llm, admin_token_hash);

    // ── Maintenance sweep ────────────────────────────────────────────
    {
        let store = store.clone();
        let sessions_config = config.sessions.clone();
        let interval_sec = config.store.cleanup_interval_sec.max(1);
        tokio::spawn(async move {
            let retention = chrono::Duration::hours(sessions_config.completion_retention_hours as i64);
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_sec));
            loop {
                interval.tick().await;
                match store.cleanup_old_completed(retention) {
                    Ok(removed) if removed > 0 => tracing::info!(removed, "cleaned up old completed sessions"),
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "maintenance sweep failed"),
                }
            }
        });
    }

    let cors_layer = build_cors_layer(&config.server.cors);
    let max_concurrent = config.server.max_concurrent_requests;
    tracing::info!(max_concurrent, "concurrency limit set");

    let governor_layer = config.server.rate_limit.as_ref().map(|rl| {
        use tower_governor::governor::GovernorConfigBuilder;
        use tower_governor::GovernorLayer;

        let gov_config = GovernorConfigBuilder::default()
            .per_second(rl.requests_per_second.into())
            .burst_size(rl.burst_size)
            .finish()
            .expect("rate_limit: requests_per_second and burst_size must be > 0");

        tracing::info!(
            requests_per_second = rl.requests_per_second,
            burst_size = rl.burst_size,
            "per-IP rate limiting enabled"
        );

        GovernorLayer {
            config: Arc::new(gov_config),
        }
    });
    if governor_layer.is_none() {
        tracing::info!("per-IP rate limiting disabled (no [server.rate_limit] in config)");
    }

    let router = api::router(state)
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent));
    let app = if let Some(gov) = governor_layer {
        router.layer(gov)
    } else {
        router
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "grov listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins. Origins may
/// carry a trailing `:*` wildcard for the port segment; a lone `"*"`
/// allows everything (not recommended for production).
fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
