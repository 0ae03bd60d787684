// src/constants.rs

pub const UI_WIDTH: usize = 88;
pub const TITLE_TRUNCATE_LENGTH: usize = 60;
pub const MAX_FILENAME_BYTES: usize = 100;
pub const LINK_TEXT_MAX_CHARS: usize = 200;
pub const TRANSCRIPT_PREVIEW_CHARS: usize = 200;
pub const CONFIG_DIR_NAME: &str = concat!(".", clap::crate_name!());
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = concat!(clap::crate_name!(), ".log");
pub const LOG_FALLBACK_FILE_NAME: &str = "fallback.log";
pub const DEFAULT_SESSION_FILE: &str = "session.json";
pub const DEFAULT_LINKS_FILE: &str = "links_output.json";
pub const DEFAULT_OUTPUT_DIR: &str = "transcripts";
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 180;
pub const METADATA_FILE_NAME: &str = "metadata.json";
pub const DEBUG_FILE_NAME: &str = "kaltura_debug.json";
pub const UNTITLED_VIDEO: &str = "untitled_video";
pub const LEDGER_VERSION: u32 = 1;
pub const SESSION_VERSION: u32 = 1;
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// URL fragments that mark an SSO / login page rather than course content.
pub const LOGIN_URL_MARKERS: &[&str] = &["login", "sso", "saml"];

pub mod kaltura {
    /// Both fragments must appear in the lowercased request URL.
    pub const CAPTION_RESOLUTION_PATTERN: &[&str] = &["caption_captionasset", "geturl"];
    pub const NO_CAPTION_INTERCEPTED: &str = "no caption_captionasset/getUrl intercepted";
    pub const DEBUG_NETWORK_KEYS: &[&str] = &["vtt", "srt", "caption", "transcript", "kaltura"];
}

pub mod canvas {
    pub const MODULES_PATH: &str = "/modules";
    pub const MODULE_ITEMS_PATH: &str = "/modules/items";
    pub const COURSES_PATH: &str = "/courses/";
}
