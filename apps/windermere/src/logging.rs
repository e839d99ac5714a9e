//! Tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with the given default filter directive.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_logging(filter: &str) {
    let filter_layer = match EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter))
    {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!("FATAL: failed to create log filter: {err}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter_layer)
        .init();
}
