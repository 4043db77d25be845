#![forbid(unsafe_code)]

use std::sync::Once;

static INIT: Once = Once::new();

pub const LOG_ENV: &str = "COVENANT_LOG";

/// Installs a compact `tracing` subscriber once per process.
///
/// `level` wins over `COVENANT_LOG`, which wins over `RUST_LOG`; the
/// fallback is `warn`. Does nothing if a global subscriber already exists.
pub fn init_with_level(level: Option<&str>) {
    INIT.call_once(|| {
        if tracing::dispatcher::has_been_set() {
            return;
        }

        let directives = match level {
            Some(l) if !l.is_empty() => l.to_string(),
            _ => std::env::var(LOG_ENV)
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "warn".to_string()),
        };

        let filter = tracing_subscriber::EnvFilter::try_new(&directives).unwrap_or_else(|e| {
            eprintln!("WARN: invalid log filter '{directives}': {e}; falling back to 'warn'");
            tracing_subscriber::EnvFilter::new("warn")
        });

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    });
}
