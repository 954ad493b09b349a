use ganyan::config::LoggingConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},ganyan=debug", config.level)));

    // GANYAN_LOG_DIR wins over logging.dir; no directory means console only.
    let log_dir: Option<PathBuf> = std::env::var("GANYAN_LOG_DIR")
        .ok()
        .map(PathBuf::from)
        .or_else(|| config.dir.clone());

    // `tracing_appender::rolling::daily` panics if it can't create the initial
    // log file, so preflight writability first.
    let file_layer = log_dir.as_ref().and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "Warning: Could not create log directory {} ({}), file logging disabled",
                dir.display(),
                e
            );
            return None;
        }
        let test_path = dir.join(".ganyan_write_test");
        match std::fs::OpenOptions::new().create(true).append(true).open(&test_path) {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                let file_appender = tracing_appender::rolling::daily(dir, "ganyan.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                // Keep the guard alive for the whole process
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    dir.display(),
                    e
                );
                None
            }
        }
    });

    let (json_layer, console_layer) = if config.json {
        (Some(tracing_subscriber::fmt::layer().json().with_target(true)), None)
    } else {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
        )
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {}/ganyan.log", dir.display());
    }
}

pub fn init_logging_simple() {
    // Minimal logging for short CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
