use crate::config::LayoutConfig;
use crate::encoder::ConfigurerRegistry;
use crate::env::config_from_env;
use crate::error::InitError;
use crate::layer::JsonLineLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Install a global `tracing` subscriber that prints every event to stdout
/// as a JSON line.
///
/// **Parameters**
/// - `config`: layout settings; started against `registry` here, so an
///   unresolvable builder configurer fails before anything is installed.
/// - `registry`: builder configurers that `config` may refer to by name.
///
/// **Returns**
/// - `Err(InitError::Config)` if the layout cannot start.
/// - `Err(InitError::AlreadyInstalled)` if a global subscriber exists.
pub fn init_json_logging_with_config(
    config: LayoutConfig,
    registry: &ConfigurerRegistry,
) -> Result<(), InitError> {
    let layout = config.start(registry)?;
    let subscriber = Registry::default().with(JsonLineLayer::new(layout));
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Initialize JSON logging from `LOG_LAYOUT_*` environment variables and
/// the built-in configurers.
///
/// This is the recommended entrypoint for typical services.
pub fn init_json_logging() -> Result<(), InitError> {
    let config = config_from_env()?;
    init_json_logging_with_config(config, &ConfigurerRegistry::with_builtins())
}
