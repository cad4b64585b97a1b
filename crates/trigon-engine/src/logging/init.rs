use std::sync::Once;

use log::LevelFilter;

/// Crates that log every pipeline and module creation at info level.
const NOISY_MODULES: [&str; 3] = ["wgpu_core", "wgpu_hal", "naga"];

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "debug",
/// "trigon_shader=debug,wgpu_core=warn") and wins over `RUST_LOG`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    /// Level used when neither `env_filter` nor `RUST_LOG` is set.
    pub default_level: LevelFilter,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            default_level: LevelFilter::Info,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match config.env_filter.or_else(|| std::env::var("RUST_LOG").ok()) {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            None => {
                builder.filter_level(config.default_level);
                for module in NOISY_MODULES {
                    builder.filter_module(module, LevelFilter::Warn);
                }
            }
        }

        builder.write_style(config.write_style);

        if builder.try_init().is_err() {
            // Another logger (e.g. a test harness) got there first.
            return;
        }

        log::debug!("logging initialized");
    });
}
