/*!
Homework tracking between teachers and the students paired with them.

The core is the homework lifecycle (`homework`, `registry`), the
teacher/student pairing (`pairing`), and the rules deciding who may do what
(`policy`). Everything else (`auth`, `notify`, `inter`) is plumbing around it.
*/

pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod homework;
pub mod inter;
pub mod notify;
pub mod pairing;
pub mod policy;
pub mod registry;
pub mod store;
pub mod user;

pub use error::HwError;

pub fn log_level_from_env() -> simplelog::LevelFilter {
    use simplelog::LevelFilter;

    let mut level_string = match std::env::var("LOG_LEVEL") {
        Err(_) => { return LevelFilter::Warn; },
        Ok(s) => s,
    };

    level_string.make_ascii_lowercase();
    match level_string.as_str() {
        "max" => LevelFilter::max(),
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn ensure_logging() {
        use simplelog::{TermLogger, TerminalMode, ColorChoice};
        let log_cfg = simplelog::ConfigBuilder::new()
            .add_filter_allow_str("hwtrack")
            .build();
        let res = TermLogger::init(
            log_level_from_env(),
            log_cfg,
            TerminalMode::Stdout,
            ColorChoice::Auto
        );

        match res {
            Ok(_) => { log::info!("Test logging started."); },
            Err(_) => { log::info!("Test logging already started."); },
        }
    }
}
