pub mod chain;
pub mod config;
pub mod encoder;
pub mod error;
pub mod extras;
pub mod layout;
pub mod record;

pub mod env;
pub mod init;
pub mod layer;

pub use config::{Charset, FieldNames, LayoutConfig};
pub use encoder::{BuilderConfigurer, ConfigurerRegistry, EncoderBuilder};
pub use error::{ConfigError, InitError, LayoutError};
pub use extras::{active_extras, clear_active_extras, run_with_extras, set_active_extras, ExtraFields, ExtraValue};
pub use layer::JsonLineLayer;
pub use layout::JsonLineLayout;
pub use record::{LogEvent, ThrowableChain, ThrowableFrame};
