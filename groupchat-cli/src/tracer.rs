//! Logging setup. Log lines go to stderr so the chat transcript on stdout
//! stays readable.

use shared::config::{ClientConfig, LogFormat};
use tracing::{Subscriber, level_filters::LevelFilter};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, MakeWriter},
    util::SubscriberInitExt,
};

/// Installs the global subscriber and returns the configured level.
///
/// `RUST_LOG` wins over the configured level when set. A subscriber that is
/// already installed is left in place.
#[must_use]
pub fn initialize_tracing(config: &ClientConfig) -> String {
    let subscriber = build_subscriber(config, std::io::stderr);
    if subscriber.try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    config.logging.level.clone()
}

fn build_subscriber<W>(config: &ClientConfig, writer: W) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let builder = fmt::fmt()
        .with_env_filter(build_env_filter(config))
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(writer);

    match config.logging.format {
        LogFormat::Json => Box::new(builder.json().with_ansi(false).finish()),
        LogFormat::Text => Box::new(builder.with_ansi(false).finish()),
    }
}

fn build_env_filter(config: &ClientConfig) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}
