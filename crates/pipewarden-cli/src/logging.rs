// Logging setup for the pipewarden binary

use tracing::Level;

/// Parse a configured level name, falling back to INFO
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the tracing subscriber
///
/// Logs go to stderr so they never mix with the child's stdout.
pub fn init_logging(level_name: &str) {
    let level = parse_level(level_name);
    let verbose = level >= Level::DEBUG;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .with_writer(std::io::stderr)
        .init();
}
