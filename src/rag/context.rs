//! Context formatting for RAG prompts.
//!
//! Everything here is a pure function of the retrieved chunks and products.

use super::timestamps::{extract_timestamps, TimestampReference};
use crate::store::{Product, TranscriptChunk};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Rendered when no product bullets survive filtering.
pub const NO_PRODUCTS: &str = "No related products found.";

const PRODUCTS_HEADER: &str = "### **Related Products**";

/// Longest transcript excerpt shown next to a timestamp in the guide.
const GUIDE_EXCERPT_CHARS: usize = 80;

fn paragraph_break_regex() -> &'static Regex {
    static BREAK: OnceLock<Regex> = OnceLock::new();
    BREAK.get_or_init(|| Regex::new(r"\n\s*\n").expect("paragraph pattern is valid"))
}

fn link_gap_regex() -> &'static Regex {
    static GAP: OnceLock<Regex> = OnceLock::new();
    GAP.get_or_init(|| Regex::new(r"\]\s+\(").expect("link gap pattern is valid"))
}

fn product_link_regex() -> &'static Regex {
    static LINK: OnceLock<Regex> = OnceLock::new();
    LINK.get_or_init(|| {
        Regex::new(r"^\s*-\s*\[((?:\\.|[^\\\]])*)\]\((.*)\)\s*$").expect("link pattern is valid")
    })
}

/// Render transcript chunks as plain text for the prompt.
///
/// Chunk text is reflowed: whitespace inside a paragraph is collapsed, words
/// and `[MM:SS]` markers are kept as retrieved.
pub fn format_transcripts(chunks: &[TranscriptChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            format!(
                "Content: {}\nTitle: {}\nURL: {}\nChunk ID: {}\nSimilarity: {:.4}\n---",
                reflow_paragraphs(&chunk.text),
                chunk.title,
                chunk.url,
                chunk.chunk_index,
                chunk.similarity_score
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn escape_link_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('[', "\\[")
        .replace(']', "\\]")
}

fn unescape_link_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Render products as a markdown list of links, one entry per product id.
pub fn format_product_links(products: &[Product]) -> String {
    let mut seen = HashSet::new();
    let links: Vec<String> = products
        .iter()
        .filter(|p| !p.title.trim().is_empty() && !p.link.trim().is_empty())
        .filter(|p| seen.insert(p.id.as_str()))
        .map(|p| {
            let title = p.title.split_whitespace().collect::<Vec<_>>().join(" ");
            format!("- [{}]({})", escape_link_text(&title), p.link.trim())
        })
        .collect();

    if links.is_empty() {
        return NO_PRODUCTS.to_string();
    }

    format!("{}\n\n{}", PRODUCTS_HEADER, links.join("\n"))
}

/// Recover `(title, link)` pairs from a rendered product section.
pub fn parse_product_links(section: &str) -> Vec<(String, String)> {
    section
        .lines()
        .filter_map(|line| {
            let caps = product_link_regex().captures(line)?;
            Some((unescape_link_text(&caps[1]), caps[2].trim().to_string()))
        })
        .collect()
}

/// Normalize whitespace paragraph by paragraph.
///
/// Prose lines are joined with single spaces; list items and headings keep
/// their own lines. Markdown links split across whitespace are rejoined.
pub fn reflow_paragraphs(text: &str) -> String {
    paragraph_break_regex()
        .split(text)
        .filter_map(|paragraph| {
            let lines: Vec<String> = paragraph
                .lines()
                .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|line| !line.is_empty())
                .collect();
            if lines.is_empty() {
                return None;
            }

            let joined = if lines.iter().any(|line| is_block_line(line)) {
                lines.join("\n")
            } else {
                lines.join(" ")
            };
            Some(link_gap_regex().replace_all(&joined, "](").into_owned())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn is_block_line(line: &str) -> bool {
    if line.starts_with("- ") || line.starts_with("* ") || line.starts_with('#') {
        return true;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(". ")
}

/// Timestamp references for one source video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoTimestamps {
    pub title: String,
    pub url: String,
    pub timestamps: Vec<TimestampReference>,
}

/// Every extracted timestamp, grouped by video, for answers that deep-link.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TimestampGuide {
    pub videos: Vec<VideoTimestamps>,
}

impl TimestampGuide {
    /// Collect timestamps from chunks, merging chunks of the same video.
    pub fn from_chunks(chunks: &[TranscriptChunk]) -> Self {
        let mut videos: Vec<VideoTimestamps> = Vec::new();
        for chunk in chunks {
            let timestamps = extract_timestamps(&chunk.text, &chunk.url);
            if timestamps.is_empty() {
                continue;
            }
            match videos.iter_mut().find(|v| v.url == chunk.url) {
                Some(video) => {
                    for reference in timestamps {
                        if !video.timestamps.contains(&reference) {
                            video.timestamps.push(reference);
                        }
                    }
                }
                None => videos.push(VideoTimestamps {
                    title: chunk.title.clone(),
                    url: chunk.url.clone(),
                    timestamps,
                }),
            }
        }
        Self { videos }
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    /// An example of the inline link format, using the first timestamp.
    pub fn example(&self) -> Option<String> {
        self.videos
            .first()
            .and_then(|v| v.timestamps.first())
            .map(|t| format!("[{}]({})", t.time, t.url))
    }

    /// Render the guide for the prompt. Empty when there are no timestamps.
    pub fn render(&self) -> String {
        let Some(example) = self.example() else {
            return String::new();
        };

        let mut out = format!(
            "### Timestamp Guide\nTo point at a specific moment, use these links exactly, for example: {}\n",
            example
        );
        for video in &self.videos {
            out.push_str(&format!("\nTitle: {}\n", video.title));
            for t in &video.timestamps {
                out.push_str(&format!("- [{}]({}) {}\n", t.time, t.url, excerpt(&t.text)));
            }
        }
        out.trim_end().to_string()
    }
}

/// Render the timestamp guide for `chunks`, or `None` if they carry no markers.
pub fn format_timestamp_guide(chunks: &[TranscriptChunk]) -> Option<String> {
    let guide = TimestampGuide::from_chunks(chunks);
    (!guide.is_empty()).then(|| guide.render())
}

fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= GUIDE_EXCERPT_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(GUIDE_EXCERPT_CHARS).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Per-video summary of the retrieved chunks, one entry per url.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoReference {
    pub id: String,
    pub title: String,
    pub url: String,
    pub text: String,
    pub timestamps: Vec<TimestampReference>,
}

/// Summarize retrieved chunks by video, keeping the first chunk per url.
pub fn video_data(chunks: &[TranscriptChunk]) -> Vec<VideoReference> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|chunk| seen.insert(chunk.url.as_str()))
        .map(|chunk| VideoReference {
            id: chunk.id.clone(),
            title: chunk.title.clone(),
            url: chunk.url.clone(),
            text: chunk.text.clone(),
            timestamps: extract_timestamps(&chunk.text, &chunk.url),
        })
        .collect()
}

/// Assemble the context block handed to the answer prompt.
pub fn assemble_context(transcripts: &str, product_section: &str, guide: Option<&str>) -> String {
    let mut context = transcripts.to_string();
    if let Some(guide) = guide.filter(|g| !g.is_empty()) {
        context.push_str("\n\n");
        context.push_str(guide);
    }
    context.push_str(
        "\n\n# After you answer the user's question, please include the following product links section exactly as written:\n\n",
    );
    context.push_str(product_section);
    context.trim().to_string()
}
