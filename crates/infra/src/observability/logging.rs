//! Structured logging setup
//!
//! `RUST_LOG` always wins over the default directive passed in.

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `RUST_LOG` or `default_filter`
///
/// Returns `false` when a global subscriber was already installed (for
/// example by the embedding application or a previous test).
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_reported() {
        let _ = init_tracing("courier=debug");
        assert!(!init_tracing("courier=debug"));
    }
}
