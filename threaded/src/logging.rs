// Logging for the threaded decorators
//
// Built on the `tracing` ecosystem. The library itself only emits events;
// applications pick a subscriber with one of the `init*` functions below.
//
// # Usage Examples
//
// ```rust
// use threaded::logging;
//
// // INFO level, human-readable console output
// logging::init_default();
//
// // Or a custom configuration
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// Development and production presets:
//
// ```rust
// use threaded::logging;
//
// logging::init_development(); // DEBUG, TRACE for executors, file/line info
// logging::init_production();  // INFO, JSON, no file/line info
// ```
//
// Executor and decorator events carry structured fields:
//
// ```rust
// use threaded::{log_executor, executor_span};
// use threaded_api::ExecutorKind;
//
// log_executor!(ExecutorKind::ThreadPool, "created", capacity = 8);
// let span = executor_span!(ExecutorKind::ThreadPool, "pool-1");
// let _guard = span.enter();
// ```

use std::io;
use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

/// Configuration for the logging subscriber
///
/// # Examples
///
/// ```rust
/// use threaded::logging::LogConfig;
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     json_format: true,
///     show_file_line: false,
///     show_thread_info: true,
///     show_time: true,
///     target_filters: Some("threaded=debug,threaded::executor=trace".to_string()),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id. Worker threads are named after
    /// their pool, dedicated threads after their target.
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Only the first initialization takes effect
static INIT: Once = Once::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());
    if let Some(filters) = &config.target_filters {
        for filter in filters.split(',') {
            if let Ok(directive) = filter.trim().parse() {
                env_filter = env_filter.add_directive(directive);
            }
        }
    }
    env_filter
}

fn console_layer(config: &LogConfig) -> BoxedLayer {
    if config.json_format {
        let layer = fmt::layer()
            .json()
            .flatten_event(true)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);
        return if config.show_time {
            layer.boxed()
        } else {
            layer.without_time().boxed()
        };
    }

    let layer = fmt::layer()
        .with_ansi(atty::is(atty::Stream::Stdout))
        .with_file(config.show_file_line)
        .with_line_number(config.show_file_line)
        .with_thread_names(config.show_thread_info)
        .with_thread_ids(config.show_thread_info);
    if config.show_time {
        layer.boxed()
    } else {
        layer.without_time().boxed()
    }
}

/// Initialize the logging system with the given configuration
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::registry()
            .with(console_layer(&config))
            .with(env_filter(&config));
        set_global_subscriber(subscriber);
    });
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Open `path` for appending log lines, creating it if needed.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Box::new(file))
}

/// Initialize logging with both console and file output
///
/// The file is opened up front so a bad path is reported to the caller.
/// File output never uses ANSI colors and always carries file/line and
/// thread information.
///
/// # Examples
///
/// ```rust
/// use threaded::logging::{self, LogConfig};
///
/// logging::init_with_file(LogConfig::default(), "threaded.log").expect("log file");
/// ```
pub fn init_with_file(config: LogConfig, log_file: &str) -> io::Result<()> {
    file_writer(log_file)?;

    INIT.call_once(|| {
        let log_file_path = log_file.to_string();
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || match file_writer(&log_file_path) {
                Ok(writer) => writer,
                Err(_) => Box::new(io::stderr()),
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(console_layer(&config))
            .with(file_layer)
            .with(env_filter(&config));
        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level with human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

pub fn init_default_with_file(path: &str) -> io::Result<()> {
    init_with_file(LogConfig::default(), path)
}

fn development_config() -> LogConfig {
    LogConfig {
        level: Level::DEBUG,
        json_format: false,
        show_file_line: true,
        show_thread_info: true,
        show_time: true,
        target_filters: Some("threaded=debug,threaded::executor=trace".to_string()),
    }
}

/// Initialize logging for development
///
/// - DEBUG level for the crate, TRACE for executors (worker start/exit)
/// - Colorized console output with file/line information
/// - Thread names and IDs displayed
pub fn init_development() {
    init(development_config());
}

pub fn init_development_with_file(path: &str) -> io::Result<()> {
    init_with_file(development_config(), path)
}

fn production_config() -> LogConfig {
    LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    }
}

/// Initialize logging for production: INFO level, JSON output, no file/line.
pub fn init_production() {
    init(production_config());
}

pub fn init_production_with_file(path: &str) -> io::Result<()> {
    init_with_file(production_config(), path)
}

fn test_config() -> LogConfig {
    LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    }
}

/// Initialize logging for tests
///
/// Warnings and errors only, no thread information and no timestamps.
///
/// ```rust
/// #[test]
/// fn my_test() {
///     threaded::logging::init_test();
///     // ...
/// }
/// ```
pub fn init_test() {
    init(test_config());
}

pub fn init_test_with_file(path: &str) -> io::Result<()> {
    init_with_file(test_config(), path)
}

/// Span for work done on behalf of one executor instance
///
/// ```rust
/// use threaded::executor_span;
/// use threaded_api::ExecutorKind;
///
/// let span = executor_span!(ExecutorKind::ThreadPool, "pool-1");
/// let _guard = span.enter();
///
/// let span = executor_span!(ExecutorKind::BlockingPool, "pool-2", worker = 3);
/// ```
#[macro_export]
macro_rules! executor_span {
    ($kind:expr, $id:expr) => {
        tracing::info_span!("executor", kind = %$kind, id = %$id)
    };
    ($kind:expr, $id:expr, $($fields:tt)*) => {
        tracing::info_span!("executor", kind = %$kind, id = %$id, $($fields)*)
    };
}

/// Log executor lifecycle events (created, replaced, shutdown)
///
/// ```rust
/// use threaded::log_executor;
/// use threaded_api::ExecutorKind;
///
/// log_executor!(ExecutorKind::ThreadPool, "shutdown");
/// log_executor!(ExecutorKind::ThreadPool, "created", capacity = 8);
/// ```
#[macro_export]
macro_rules! log_executor {
    ($kind:expr, $event:expr) => {
        tracing::info!(executor_kind = %$kind, event = $event);
    };
    ($kind:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(executor_kind = %$kind, event = $event, $($fields)*);
    };
}

/// Log per-call decorator events; emitted at TRACE since they fire on every call
///
/// ```rust
/// use threaded::log_decorator;
///
/// log_decorator!("pooled", "submit");
/// log_decorator!("threaded", "started", thread = "Threaded: compute");
/// ```
#[macro_export]
macro_rules! log_decorator {
    ($decorator:expr, $event:expr) => {
        tracing::trace!(decorator = $decorator, event = $event);
    };
    ($decorator:expr, $event:expr, $($fields:tt)*) => {
        tracing::trace!(decorator = $decorator, event = $event, $($fields)*);
    };
}

/// Log error events
///
/// ```rust
/// use threaded::log_error;
///
/// let error = threaded_api::PoolError::Shutdown;
/// log_error!(error);
/// log_error!(error, executor = "thread_pool");
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        tracing::error!(error = %$error);
    };
    ($error:expr, $($fields:tt)*) => {
        tracing::error!(error = %$error, $($fields)*);
    };
}

/// The current tracing dispatcher, for threads that should log the same way.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

pub use tracing::{debug, error, info, trace, warn};
