use std::process::ExitCode;

use lil_webserv::config::Config;
use lil_webserv::error::{Result, ServerError};
use lil_webserv::logger;
use lil_webserv::server::{start_signal_handler, Server};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        logger::log_usage("./lil_webserv");
        return ExitCode::FAILURE;
    }

    match run(&args[1]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger::log_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(port: &str) -> Result<()> {
    let cfg = Config::load(port)?;
    logger::init(&cfg).map_err(ServerError::Logger)?;

    // Worker thread count comes from config, default is one per core
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        logger::log_info(&format!("[CONFIG] Using {workers} worker threads"));
    }

    let runtime = runtime_builder.build().map_err(ServerError::Runtime)?;
    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<()> {
    let server = Server::bind(cfg).await?;
    start_signal_handler(server.shutdown_handle())?;
    server.run().await;
    Ok(())
}
