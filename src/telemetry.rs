//! Tracing setup for the binary.

use std::io::{self, IsTerminal};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// RFC3339 UTC timer, e.g. `2025-09-12T10:20:30Z`.
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let s = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&s)
    }
}

/// `RUST_LOG` when set, otherwise `default`. `verbose` adds DEBUG for the
/// selector and gateway crates.
pub fn env_filter(default: &str, verbose: bool) -> EnvFilter {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    if verbose {
        for d in ["prompt_selector=debug", "pr_gateway=debug", "ai_llm_service=debug"] {
            if let Ok(directive) = d.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

/// Installs the global subscriber: compact single-line events to stderr.
pub fn init(default: &str, verbose: bool) {
    let layer = fmt::layer()
        .compact()
        .with_timer(ChronoRfc3339Utc)
        .with_target(false)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal());

    // No-op when a subscriber is already installed.
    let _ = tracing_subscriber::registry()
        .with(env_filter(default, verbose))
        .with(layer)
        .try_init();
}
