// src/crawler/provider.rs

use crate::models::VideoProvider;

/// Ordered: the first provider with a matching fragment wins.
const PROVIDER_PATTERNS: &[(VideoProvider, &[&str])] = &[
    (VideoProvider::Panopto, &["panopto"]),
    (VideoProvider::Kaltura, &["kaltura", "kaf"]),
    (VideoProvider::Yuja, &["yuja"]),
    (VideoProvider::Zoom, &["zoom.us"]),
    (VideoProvider::Youtube, &["youtube.com", "youtu.be"]),
    (VideoProvider::CanvasMedia, &["instructuremedia", "mediaobjects"]),
    (VideoProvider::Vimeo, &["vimeo.com"]),
];

/// Pure function of the URL; `None` when no pattern matches.
pub fn classify_provider(href: &str) -> VideoProvider {
    let lower = href.to_lowercase();
    PROVIDER_PATTERNS
        .iter()
        .find(|(_, fragments)| fragments.iter().any(|f| lower.contains(f)))
        .map(|(provider, _)| *provider)
        .unwrap_or(VideoProvider::None)
}
