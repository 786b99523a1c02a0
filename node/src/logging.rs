//! # Structured Logging
//!
//! `tracing` subscriber for `shade-node`, written to stderr so stdout stays
//! clean for the JSON the subcommands print.
//!
//! The filter is chosen in this order:
//!
//! 1. `SHADE_LOG`, when set
//! 2. `RUST_LOG`, when set
//! 3. the `-v` count: `info` for the SHADE crates by default, then `debug`
//!    and `trace`
//!
//! sled is held at `warn` unless an environment filter says otherwise.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Checked before `RUST_LOG`.
pub const SHADE_LOG_ENV: &str = "SHADE_LOG";

const SHADE_TARGETS: [&str; 2] = ["shade_node", "shade_protocol"];

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, with thread names so anchor races can be followed.
    Pretty,
    /// One JSON object per line, for the `run` sweeper under a supervisor.
    Json,
}

impl LogFormat {
    /// "json" (any case) selects JSON. Anything else is `Pretty`.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Filter directives for `verbose` repetitions of `-v`.
pub fn verbosity_directives(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut directives: Vec<String> = SHADE_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect();
    directives.push("sled=warn".to_string());
    directives.push("warn".to_string());
    directives.join(",")
}

/// The directives in effect given the two environment variables.
fn select_directives(shade_log: Option<String>, rust_log: Option<String>, verbose: u8) -> String {
    shade_log
        .filter(|s| !s.trim().is_empty())
        .or_else(|| rust_log.filter(|s| !s.trim().is_empty()))
        .unwrap_or_else(|| verbosity_directives(verbose))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(verbose: u8, format: LogFormat) -> Result<(), TryInitError> {
    let directives = select_directives(
        std::env::var(SHADE_LOG_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
        verbose,
    );
    let env_filter = EnvFilter::try_new(&directives)
        .unwrap_or_else(|_| EnvFilter::new(verbosity_directives(verbose)));

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false),
            )
            .try_init()?,
    }

    tracing::debug!(?format, %directives, "logging initialized");
    Ok(())
}
