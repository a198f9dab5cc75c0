use std::env;

use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV_VAR: &str = "RESHELVE_LOG";

pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "reshelve_lib=debug,reshelve=debug,info"
    } else {
        "warn"
    }
}

/// Installs the global subscriber. `RESHELVE_LOG` overrides the level picked by `--debug`.
pub fn init_logger(debug: bool) {
    let filter = env::var(LOG_ENV_VAR).unwrap_or_else(|_| default_directive(debug).to_string());
    let filter_layer = EnvFilter::new(filter);

    let registry = tracing_subscriber::registry().with(filter_layer).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .with_ansi(true),
    );
    if registry.try_init().is_err() {
        return;
    }

    debug!("Tracing is configured for stderr logging.");
}

/// Shortens prompts and responses before they reach the debug log.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}... [truncated]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_raises_crate_level() {
        assert!(default_directive(true).contains("reshelve_lib=debug"));
        assert_eq!(default_directive(false), "warn");
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdef", 3), "abc... [truncated]");
    }
}
