use swapengine::{
    arguments::parse_cli,
    logger::{self as logger, LogTag},
};

/// Main entry point for swapengine
///
/// Directories and the logger come up before the command line is parsed so
/// that argument errors still reach the log file.
#[tokio::main]
async fn main() {
    // Logger needs the logs directory to create its file
    if let Err(e) = swapengine::paths::ensure_all_directories() {
        eprintln!("❌ Failed to create required directories: {}", e);
        std::process::exit(1);
    }

    logger::init();

    let cli = parse_cli();
    logger::debug(LogTag::System, &format!("Command: {:?}", cli.command));

    if let Err(e) = swapengine::run::run(cli).await {
        logger::error(LogTag::System, &format!("{:#}", e));
        logger::flush();
        std::process::exit(1);
    }

    logger::flush();
}
