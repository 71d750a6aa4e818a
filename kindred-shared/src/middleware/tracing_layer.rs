use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber: pretty output locally, JSON lines when
/// `KINDRED_ENV=production`. `RUST_LOG` overrides the default filter.
pub fn init_tracing(service_name: &str) {
    let crate_target = service_name.replace('-', "_");
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,{crate_target}=debug,tower_http=debug")));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if is_production() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
    };

    match result {
        Ok(()) => tracing::info!(service = service_name, production = is_production(), "tracing initialized"),
        Err(e) => eprintln!("tracing already initialized: {e}"),
    }
}

fn is_production() -> bool {
    std::env::var("KINDRED_ENV").is_ok_and(|v| v == "production")
}
