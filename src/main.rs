use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Notify;

use rootserve::config::{self, AppState, Config};
use rootserve::logger;
use rootserve::server;
use rootserve::startup::{self, StartupError};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[FATAL] {e}");
            eprintln!("        {}", e.remediation());
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), StartupError> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg).map_err(StartupError::Logging)?;

    let addr = cfg.get_socket_addr().map_err(StartupError::Address)?;
    let root = startup::check_served_root(Path::new(&cfg.server.root))?;

    // Multi-threaded runtime; connections are spread over the worker pool
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build().map_err(StartupError::Runtime)?;

    runtime.block_on(async move {
        let listener = server::create_listener(addr)
            .map_err(|source| StartupError::Bind { addr, source })?;

        logger::log_server_start(&addr, &root, &cfg);
        let state = Arc::new(AppState::new(&cfg, root));

        let shutdown = Arc::new(Notify::new());
        server::signal::start_signal_handler(Arc::clone(&shutdown));

        if let Err(e) = server::run(listener, state, shutdown).await {
            logger::log_error(&format!("Server loop failed: {e}"));
        }
        logger::write_info("[Shutdown] Server stopped");
        Ok(())
    })
}
