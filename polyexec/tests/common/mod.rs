use tracing_subscriber::EnvFilter;

/// Routes `tracing` output through the test harness.
///
/// Set `RUST_LOG=polyexec=trace` to see pool transitions while a test runs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
