use tracing_subscriber::EnvFilter;

/// Events go to stderr so command output on stdout stays clean. `RUST_LOG`
/// wins over `level` when set.
pub fn init(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let tracing_format = tracing_subscriber::fmt::format()
        .with_level(true)
        .with_target(false);

    let tracing_builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(tracing_format);

    if json {
        tracing_builder.json().init();
    } else {
        tracing_builder.with_ansi(true).init();
    }
}
