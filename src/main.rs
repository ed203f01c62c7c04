/*!
Here we go!
*/
use std::sync::Arc;

use simplelog::{ColorChoice, TerminalMode, TermLogger};

use hwtrack::config;
use hwtrack::inter;

const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// The first command-line argument, else `$HWTRACK_CONFIG`, else the default.
fn config_path() -> String {
    if let Some(arg) = std::env::args().nth(1) {
        return arg;
    }
    match std::env::var("HWTRACK_CONFIG") {
        Ok(path) => path,
        Err(_) => DEFAULT_CONFIG_FILE.to_owned(),
    }
}

#[tokio::main]
async fn main() {
    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("hwtrack")
        .build();
    if let Err(e) = TermLogger::init(
        hwtrack::log_level_from_env(),
        log_cfg,
        TerminalMode::Stdout,
        ColorChoice::Auto
    ) {
        eprintln!("Unable to start logging: {}", &e);
    }
    log::info!("Logging started.");

    let path = config_path();
    let glob = match config::load_configuration(&path).await {
        Ok(glob) => glob,
        Err(e) => {
            log::error!("Error loading configuration from {:?}: {}", &path, &e);
            std::process::exit(1);
        },
    };

    let addr = glob.addr;
    let app = inter::router(Arc::new(glob));

    log::info!("Listening on {}", &addr);

    if let Err(e) = axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
    {
        log::error!("Server error: {}", &e);
        std::process::exit(1);
    }
}
