use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Env var naming an extra log file that receives DEBUG output
pub const LOG_FILE_ENV: &str = "SKEIN_LOG_FILE";

pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// Install the global subscriber: stderr filtered by `RUST_LOG` (or
/// `default_filter`), plus a DEBUG file layer when `SKEIN_LOG_FILE` is set.
pub fn init_tracing_with_default(default_filter: &str) {
    let file_logging = std::env::var(LOG_FILE_ENV).ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file = file_logging.as_deref().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => Some(file),
            Err(err) => {
                eprintln!("Failed to open log file {}: {}", log_path, err);
                None
            }
        }
    });

    if let Some(file) = file {
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

        // try_init: a test harness or embedding app may have installed one already
        let _ = registry.with(file_layer).try_init();
    } else {
        let _ = registry.try_init();
    }
}
