// src/models/debug.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameReport {
    pub url: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub transcript_caption_elements: Vec<ElementInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_caption_elements_error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementInfo {
    pub tag: String,
    pub id: Option<String>,
    pub text: Option<String>,
    pub aria_label: Option<String>,
    pub class_name: Option<String>,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkHit {
    pub url: String,
    pub status: i64,
    pub content_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextTrack {
    pub kind: String,
    pub src: String,
    pub srclang: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IframeInfo {
    pub src: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    pub entry_id: Option<String>,
    pub media_id: Option<String>,
    pub captions: Vec<String>,
    pub caption_urls: Vec<String>,
}

/// Single-video diagnostic snapshot, saved as `kaltura_debug.json`.
/// Never read back by the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugReport {
    pub title: String,
    pub source_url: String,
    pub final_url: Option<String>,
    pub page_title: Option<String>,
    pub frames: Vec<FrameReport>,
    /// Matching responses grouped by the substring that matched.
    pub network_urls: BTreeMap<String, Vec<NetworkHit>>,
    pub text_tracks: Vec<TextTrack>,
    pub iframes: Vec<IframeInfo>,
    pub player_config: Option<PlayerConfig>,
    pub transcript_buttons: Vec<ElementInfo>,
    pub captions_buttons: Vec<ElementInfo>,
    pub suggested_actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
