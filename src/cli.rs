// src/cli.rs

use crate::constants;
use clap::{Args, Parser, Subcommand, ValueEnum, crate_version};
use std::path::PathBuf;

/// Log file verbosity
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "canvas-transcriber",
    version = crate_version!(),
    about = "Extract transcripts from Canvas/Kaltura lecture videos",
    long_about = None,
    arg_required_else_help = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// (hidden) Log file verbosity, for debugging
    #[arg(long, value_enum, default_value_t = LogLevel::Off, global = true, hide = true)]
    pub log_level: LogLevel,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Extract video links from a single Canvas page
    ExtractPage(LinkArgs),
    /// Crawl every module item of a Canvas course (/modules URL)
    CrawlCourse(LinkArgs),
    /// Download transcripts for the Kaltura videos in a links file
    ExtractVideo(VideoArgs),
}

impl Command {
    pub fn session(&self) -> &SessionArgs {
        match self {
            Command::ExtractPage(a) | Command::CrawlCourse(a) => &a.session,
            Command::ExtractVideo(a) => &a.session,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Session cookie file
    #[arg(long, value_name = "PATH", env = "CT_SESSION_FILE", default_value_os_t = PathBuf::from(constants::DEFAULT_SESSION_FILE), help_heading = "Session")]
    pub session_file: PathBuf,
    /// Run the browser without a window (login must already be saved)
    #[arg(long, env = "CT_HEADLESS", action = clap::ArgAction::SetTrue, help_heading = "Session")]
    pub headless: bool,
    /// Seconds to wait for SSO/MFA login
    #[arg(long, value_name = "SECS", env = "CT_LOGIN_TIMEOUT", default_value_t = constants::DEFAULT_LOGIN_TIMEOUT_SECS, help_heading = "Session")]
    pub login_timeout: u64,
}

#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Canvas page or /modules URL
    pub url: String,
    /// Output JSON file for the discovered links
    #[arg(long, value_name = "FILE", env = "CT_LINKS_FILE", default_value_os_t = PathBuf::from(constants::DEFAULT_LINKS_FILE), help_heading = "Options")]
    pub output: PathBuf,
    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct VideoArgs {
    /// Links JSON produced by extract-page / crawl-course
    #[arg(long, value_name = "FILE", env = "CT_LINKS_FILE", default_value_os_t = PathBuf::from(constants::DEFAULT_LINKS_FILE), help_heading = "Options")]
    pub links_file: PathBuf,
    /// Transcript output directory
    #[arg(long, value_name = "DIR", env = "CT_OUTPUT_DIR", default_value_os_t = PathBuf::from(constants::DEFAULT_OUTPUT_DIR), help_heading = "Options")]
    pub output_dir: PathBuf,
    /// Deep-inspect the first video and save kaltura_debug.json
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub debug: bool,
    /// Retry only videos that failed in the previous run
    #[arg(long, action = clap::ArgAction::SetTrue, conflicts_with = "debug", help_heading = "Options")]
    pub retry_failed: bool,
    #[command(flatten)]
    pub session: SessionArgs,
}
