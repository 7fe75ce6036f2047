//! Logging setup
//!
//! In the browser events go to the developer console; elsewhere they go to
//! stderr, filtered by `RUST_LOG` when it is set.

use tracing::Level;

/// Install the global subscriber; later calls are no-ops.
#[cfg(target_arch = "wasm32")]
pub fn init(level: Level) {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let console = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time()
        .with_writer(tracing_web::MakeWebConsoleWriter::new());

    let _ = tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(console)
        .try_init();
}

/// Install the global subscriber; later calls are no-ops.
#[cfg(not(target_arch = "wasm32"))]
pub fn init(level: Level) {
    use tracing_subscriber::EnvFilter;

    let level = level.as_str().to_lowercase();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("pos_frontend_common={level},pos_http={level},pos_core={level}").into()
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init(Level::DEBUG);
        init(Level::INFO);
        tracing::info!("logging initialized");
    }
}
