//! Inline `[MM:SS]` markers in transcript text, turned into seekable video links.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use url::Url;

/// A moment in a video referenced by a transcript marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampReference {
    /// Marker time as written, `MM:SS`.
    pub time: String,
    /// Transcript text following the marker, trimmed.
    pub text: String,
    /// Deep link into the video at `time`.
    pub url: String,
}

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"\[(\d{2}:\d{2})\]").expect("marker pattern is valid"))
}

fn embed_regex() -> &'static Regex {
    static EMBED: OnceLock<Regex> = OnceLock::new();
    EMBED.get_or_init(|| Regex::new(r"/embed/([^/?&#]+)").expect("embed pattern is valid"))
}

/// Convert `MM:SS` or `H:MM:SS` to seconds.
pub fn time_to_seconds(timestamp: &str) -> Option<u32> {
    let parts = timestamp
        .split(':')
        .map(|p| p.trim().parse::<u32>().ok())
        .collect::<Option<Vec<u32>>>()?;

    let (hours, minutes, seconds) = match parts.as_slice() {
        [minutes, seconds] => (0, *minutes, *seconds),
        [hours, minutes, seconds] => (*hours, *minutes, *seconds),
        _ => return None,
    };
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

fn watch_url(video_id: &str, seconds: u32) -> String {
    format!("https://www.youtube.com/watch?v={}&t={}", video_id, seconds)
}

/// Build a link that opens `video_url` at `timestamp`.
///
/// Returns the url unchanged if the timestamp does not parse.
pub fn create_timestamp_url(video_url: &str, timestamp: &str) -> String {
    let Some(seconds) = time_to_seconds(timestamp) else {
        return video_url.to_string();
    };

    if !(video_url.contains("youtube.com") || video_url.contains("youtu.be")) {
        return format!("{}#t={}", video_url, seconds);
    }

    if let Some((_, rest)) = video_url.split_once("youtu.be/") {
        let video_id = rest.split(['?', '#']).next().unwrap_or_default();
        if !video_id.is_empty() {
            return watch_url(video_id, seconds);
        }
    }

    if video_url.contains("youtube.com/watch") {
        let video_id = Url::parse(video_url).ok().and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned())
        });
        if let Some(video_id) = video_id.filter(|id| !id.is_empty()) {
            return watch_url(&video_id, seconds);
        }
    }

    if video_url.contains("/embed/") {
        if let Some(caps) = embed_regex().captures(video_url) {
            return watch_url(&caps[1], seconds);
        }
    }

    // Unrecognized YouTube shape: drop extra params and tack on the offset
    let base = video_url.split('&').next().unwrap_or(video_url);
    let separator = if video_url.contains('?') { '&' } else { '?' };
    format!("{}{}t={}", base, separator, seconds)
}

/// Pull every `[MM:SS]` marker out of `text`, in order.
///
/// Each reference's text runs from its marker to the next marker or the end.
pub fn extract_timestamps(text: &str, video_url: &str) -> Vec<TimestampReference> {
    let markers: Vec<_> = marker_regex().captures_iter(text).collect();

    markers
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let whole = caps.get(0)?;
            let time = caps.get(1)?.as_str();
            let end = markers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(text.len());

            Some(TimestampReference {
                time: time.to_string(),
                text: text[whole.end()..end].trim().to_string(),
                url: create_timestamp_url(video_url, time),
            })
        })
        .collect()
}
