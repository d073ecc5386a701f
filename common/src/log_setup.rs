use tracing::Level;
use tracing_subscriber::filter::FromEnvError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, thiserror::Error)]
pub enum LogSetupError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] FromEnvError),
    #[error("Logger initialization failed: {0}")]
    Init(#[from] TryInitError),
}

/// Install the console subscriber.
///
/// Directives in `RUST_LOG` are added on top of `base_level`. Output goes to
/// stderr so stdout stays free for command results.
pub fn setup_logging(base_level: Level) -> Result<(), LogSetupError> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(base_level.into())
        .from_env()?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()?;

    Ok(())
}
