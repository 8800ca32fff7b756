/// Development helper: initialize a tracing subscriber for tests and demos.
///
/// Filters with `RUST_LOG` when it is set, otherwise with `default_directive`
/// (for example `"rsock_proto=debug"`). This is a no-op when a global
/// subscriber is already installed.
pub fn init_tracing_with(default_directive: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    // Best-effort: another test may have installed one already.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}

/// Like [`init_tracing_with`], but silent unless `RUST_LOG` is set.
///
/// Benches and tests can call `rsock::dev_tracing::init_tracing()` to enable
/// structured logging for debugging.
pub fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        init_tracing_with("off");
    }
}
