use std::error::Error;

/// Boxed error returned by builder-configurer factories.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Error raised while turning a [`LayoutConfig`](crate::config::LayoutConfig)
/// into a usable [`JsonLineLayout`](crate::layout::JsonLineLayout).
///
/// All variants are fatal: a layout that failed to start is never handed
/// out, so nothing is deferred to the first `layout` call.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot resolve builder configurer {0:?}: no such name is registered")]
    UnknownConfigurer(String),

    #[error("cannot create builder configurer {name:?}")]
    ConfigurerInit {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid date format {0:?}")]
    InvalidDateFormat(String),

    #[error("unsupported character encoding {0:?}")]
    UnknownCharset(String),

    #[error("unknown layout option {0:?}")]
    UnknownOption(String),
}

/// Error returned by a single `layout` call.
///
/// Never retried or swallowed by the layout; the caller decides whether to
/// drop the event or abort.
#[derive(thiserror::Error, Debug)]
pub enum LayoutError {
    #[error("i/o failure while writing log line: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot encode log event as JSON: {0}")]
    Encode(#[source] serde_json::Error),
}

impl From<serde_json::Error> for LayoutError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            // serde_json keeps the underlying io::Error; surface it directly.
            LayoutError::Io(std::io::Error::from(err))
        } else {
            LayoutError::Encode(err)
        }
    }
}

/// Error returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}
