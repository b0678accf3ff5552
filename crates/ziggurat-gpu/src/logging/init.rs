use std::sync::Once;

/// Filter applied when neither the config nor `RUST_LOG` sets one. The
/// wgpu internals log per-resource traffic at info, which drowns out the
/// engine's own output, so they are held back to warn.
const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info", "warn",
/// "ziggurat_gpu=debug,wgpu=warn"). When unset, `RUST_LOG` takes over; with
/// neither, the engine crates log at info and the GPU backend internals at
/// warn.
///
/// `write_style` controls ANSI coloring behavior.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// Idempotent; subsequent calls are ignored. Intended usage is early in
/// `main`, before any backend is constructed.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.parse_filters(DEFAULT_FILTER);
        }

        builder.write_style(config.write_style);
        builder.init();

        log::debug!("logger installed");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_ignored() {
        init_logging(LoggingConfig::default());
        // A second call must not reach `Builder::init`, which panics when a
        // global logger is already set.
        init_logging(LoggingConfig {
            env_filter: Some("debug".to_owned()),
            write_style: env_logger::WriteStyle::Never,
        });
    }
}
