//! Structured logging setup.
//!
//! Library code emits `tracing` events; binaries call [`init_subscriber`] once
//! to print them on stderr.

use tracing_subscriber::EnvFilter;

/// Default filter when neither `RUST_LOG` nor an explicit level is given.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Initialise the global subscriber on stderr.
///
/// `RUST_LOG` wins over `level` when set. Later calls are no-ops.
pub fn init_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init fails only when a subscriber is already installed
    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_subscriber(DEFAULT_LOG_LEVEL);
        init_subscriber("debug");
        tracing::debug!("still logging");
    }
}
