//! Hookgate server - Main entry point
//!
//! Serves the hook admin API (configuration, dry runs) and its Swagger UI.
//! Configuration comes from the YAML file named by `HOOKGATE_CONFIG`, or
//! from environment variables alone when it is unset.

use anyhow::Result;
use hookgate::{
    api::{router, HookApiState},
    core::{init_tracing, AppConfig},
    scripting::HookEngine,
    services::{HookStore, HookTestService, ProviderService},
};
use std::net::SocketAddr;
use std::sync::Arc;

fn main() -> Result<()> {
    // Load .env file if present (before reading any environment variables)
    dotenvy::dotenv().ok();

    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or_else(|| detect_cpu_limit().unwrap_or(1));

    println!("Tokio runtime: using {} worker threads", worker_threads);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    init_tracing();

    let config_path = std::env::var("HOOKGATE_CONFIG").ok();
    let config = match &config_path {
        Some(path) => {
            tracing::info!(path = %path, "Loading configuration file");
            AppConfig::load(path)?
        }
        None => {
            tracing::info!("HOOKGATE_CONFIG not set, using environment configuration");
            AppConfig::from_env()
        }
    };

    let admin_key = config
        .admin_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| anyhow::anyhow!("ADMIN_KEY environment variable is required"))?;

    let engine = HookEngine::from_config(&config.hooks);
    tracing::info!(
        default_timeout_ms = config.hooks.default_timeout_ms,
        memory_limit_bytes = config.hooks.memory_limit_bytes,
        "Hook engine configured"
    );

    let providers = Arc::new(ProviderService::new(config.providers.clone()));
    providers.log_providers();

    let store = match &config.store_path {
        Some(path) => Arc::new(HookStore::open(path).await?),
        None => {
            tracing::warn!("HOOK_STORE_PATH not set, hooks are kept in memory only");
            Arc::new(HookStore::in_memory())
        }
    };

    let tester = Arc::new(HookTestService::new(engine.clone(), providers.clone()));
    let state = Arc::new(HookApiState {
        store,
        providers,
        tester,
        engine,
        admin_key,
        config_path,
    });

    let app = router(state);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid HOST '{}': {}", config.server.host, e))?;
    let addr = SocketAddr::new(host, config.server.port);
    tracing::info!("Starting Hookgate on {}", addr);
    tracing::info!("Admin API: /admin/v1/hooks");
    tracing::info!("Swagger UI: /swagger-ui");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Detect CPU limit from cgroup (for containerized environments)
fn detect_cpu_limit() -> Option<usize> {
    if let Ok(max) = std::fs::read_to_string("/sys/fs/cgroup/cpu.max") {
        let parts: Vec<&str> = max.split_whitespace().collect();
        if parts.len() == 2 {
            if let (Ok(quota), Ok(period)) = (parts[0].parse::<i64>(), parts[1].parse::<i64>()) {
                if quota > 0 {
                    let cores = ((quota as f64 / period as f64).ceil() as usize).max(1);
                    println!("Detected CPU limit from cgroup v2: {} cores", cores);
                    return Some(cores);
                }
            }
        }
    }

    let quota = std::fs::read_to_string("/sys/fs/cgroup/cpu/cpu.cfs_quota_us")
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()?;
    let period = std::fs::read_to_string("/sys/fs/cgroup/cpu/cpu.cfs_period_us")
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()?;

    if quota > 0 {
        let cores = ((quota as f64 / period as f64).ceil() as usize).max(1);
        println!("Detected CPU limit from cgroup v1: {} cores", cores);
        Some(cores)
    } else {
        None
    }
}
