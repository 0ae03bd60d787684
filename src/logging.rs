// src/logging.rs

use crate::{cli::LogLevel, constants};
use log::warn;
use std::{env, path::PathBuf};

fn level_filter(level: LogLevel) -> log::LevelFilter {
    match level {
        LogLevel::Off => log::LevelFilter::Off,
        LogLevel::Error => log::LevelFilter::Error,
        LogLevel::Warn => log::LevelFilter::Warn,
        LogLevel::Info => log::LevelFilter::Info,
        LogLevel::Debug => log::LevelFilter::Debug,
        LogLevel::Trace => log::LevelFilter::Trace,
    }
}

/// `~/.canvas-transcriber/canvas-transcriber.log`, or the temp dir when
/// there is no home directory.
pub fn log_file_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(constants::CONFIG_DIR_NAME).join(constants::LOG_FILE_NAME),
        None => {
            eprintln!("Warning: no home directory, logging to the temp directory.");
            env::temp_dir().join(clap::crate_name!()).join(constants::LOG_FILE_NAME)
        }
    }
}

/// File-only logging; the terminal belongs to the progress output. Nothing
/// is set up for `LogLevel::Off`.
pub fn init_logger(level: LogLevel) {
    if level == LogLevel::Off {
        return;
    }

    let log_file_path = log_file_path();
    if let Some(dir) = log_file_path.parent()
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("Warning: cannot create log directory {:?}: {}", dir, e);
    }

    let file_appender = match fern::log_file(&log_file_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: cannot open log file {:?}: {}. Trying a fallback file.", log_file_path, e);
            let fallback_path = env::temp_dir().join(format!(
                "{}-{}",
                clap::crate_name!(),
                constants::LOG_FALLBACK_FILE_NAME
            ));
            match fern::log_file(&fallback_path) {
                Ok(fb_file) => {
                    warn!("Logging to fallback file: {:?}", fallback_path);
                    fb_file
                }
                Err(e_fb) => {
                    eprintln!("Error: cannot open fallback log file {:?}: {}. File logging disabled.", fallback_path, e_fb);
                    return;
                }
            }
        }
    };

    let result = fern::Dispatch::new()
        .level(level_filter(level))
        // CDP traffic would drown everything else at debug level
        .level_for("chromiumoxide", log::LevelFilter::Warn)
        .level_for("tungstenite", log::LevelFilter::Warn)
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] [{:<5}] [{}:{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.line().unwrap_or(0),
                message
            ))
        })
        .chain(file_appender)
        .apply();

    if let Err(e) = result {
        eprintln!("Warning: logger initialisation failed: {}", e);
    }
}
