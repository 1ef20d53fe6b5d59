use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_chrome::ChromeLayerBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::AppConfig;

/// Keeps background writers alive; drop it last to flush logs and traces.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
    _chrome_guard: Option<tracing_chrome::FlushGuard>,
}

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

/// Installs the global subscriber. Logs go to stderr (stdout is reserved
/// for command output) and optionally to a daily-rolling file.
/// A second call is a no-op.
pub fn init_logging(config: &AppConfig) -> Result<LoggingGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let json = config.log_format.eq_ignore_ascii_case("json");

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let stderr_layer: BoxedLayer = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };
    layers.push(stderr_layer);

    let file_guard = if config.log_to_file {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, "nash.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file_layer: BoxedLayer = if json {
            fmt::layer().json().with_ansi(false).with_writer(writer).boxed()
        } else {
            fmt::layer().with_ansi(false).with_writer(writer).boxed()
        };
        layers.push(file_layer);
        Some(guard)
    } else {
        None
    };

    let chrome_guard = if config.trace_profile_enabled {
        let (chrome_layer, guard) = ChromeLayerBuilder::new().include_args(true).build();
        layers.push(chrome_layer.boxed());
        Some(guard)
    } else {
        None
    };

    // Ignore error if already set (tests, repeated CLI setup)
    let _ = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
        _chrome_guard: chrome_guard,
    })
}
