use json_line_layout::{
    encoder::{BuilderConfigurer, ConfigurerRegistry, EncoderBuilder},
    extras::run_with_extras,
    init::init_json_logging_with_config,
    LayoutConfig,
};
use tracing::info;

/// Example of plugging a custom encoder configuration by name. Imagine the
/// name comes from a configuration file shipped with the service.
#[derive(Default)]
struct ReadableDates;

impl BuilderConfigurer for ReadableDates {
    fn configure(&self, builder: &mut EncoderBuilder) {
        builder.date_format("%d %b %Y %H:%M:%S").html_escaping(false);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut registry = ConfigurerRegistry::with_builtins();
    registry.register::<ReadableDates>("readable-dates");

    let config = LayoutConfig::new()
        .with_line_separator("\"\n\"")
        .with_builder_configurer("readable-dates");
    init_json_logging_with_config(config, &registry)?;

    run_with_extras(|extras| {
        extras.insert("startedAt", chrono::Utc::now());
        extras.insert("html", "<b>bold</b>");
        info!("custom configurer example started");
    });
    Ok(())
}
