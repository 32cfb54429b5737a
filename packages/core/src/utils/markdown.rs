//! Markdown content analysis
//!
//! Derives a node's [`NodeMeta`] from its markdown content:
//!
//! - **title**: text of the first heading, else the first non-blank line
//! - **lead**: text of the first paragraph
//! - **links**: destinations of the form `../<node path>`, ascending and deduped
//! - **tags**: the `tags:` entry of a leading `---` front matter block
//!
//! Front matter tags may be written inline (`tags: [a, b]`, `tags: a, b`) or
//! as a YAML list of `- a` lines. Tag names never contain whitespace; inner
//! runs of whitespace are folded into `-` so every tag fits the `dex/tags`
//! line format.

use crate::models::{NodeIdentifier, NodeMeta};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

const FRONT_MATTER_FENCE: &str = "---";
const LINK_PREFIX: &str = "../";

/// Derives node metadata from raw content
pub trait ContentAnalyzer: Send + Sync {
    fn analyze(&self, content: &str) -> NodeMeta;
}

/// Lowercase hex SHA-256 of `content`
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// [`ContentAnalyzer`] for CommonMark content with optional front matter
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownAnalyzer;

impl MarkdownAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl ContentAnalyzer for MarkdownAnalyzer {
    fn analyze(&self, content: &str) -> NodeMeta {
        let (front_matter, body) = split_front_matter(content);
        let tags = front_matter.map(parse_tags).unwrap_or_default();

        let mut heading: Option<String> = None;
        let mut lead: Option<String> = None;
        let mut links = BTreeSet::new();
        let mut capture = Capture::None;
        let mut buffer = String::new();

        for event in Parser::new(body) {
            match event {
                Event::Start(Tag::Heading { .. }) if heading.is_none() => {
                    capture = Capture::Heading;
                    buffer.clear();
                }
                Event::End(TagEnd::Heading(_)) if capture == Capture::Heading => {
                    heading = Some(collapse_whitespace(&buffer));
                    capture = Capture::None;
                }
                Event::Start(Tag::Paragraph) if lead.is_none() && capture == Capture::None => {
                    capture = Capture::Paragraph;
                    buffer.clear();
                }
                Event::End(TagEnd::Paragraph) if capture == Capture::Paragraph => {
                    lead = Some(collapse_whitespace(&buffer));
                    capture = Capture::None;
                }
                Event::Start(Tag::Link { dest_url, .. }) => {
                    if let Some(target) = link_target(&dest_url) {
                        links.insert(target);
                    }
                }
                Event::Text(text) | Event::Code(text) if capture != Capture::None => {
                    buffer.push_str(&text);
                }
                Event::SoftBreak | Event::HardBreak if capture != Capture::None => {
                    buffer.push(' ');
                }
                _ => {}
            }
        }

        let title = heading
            .filter(|h| !h.is_empty())
            .or_else(|| first_line(body))
            .unwrap_or_default();

        NodeMeta {
            title,
            lead: lead.unwrap_or_default(),
            tags,
            links: links.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    Heading,
    Paragraph,
}

/// Split a leading `---` ... `---` block from the body
fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some(rest) = content
        .strip_prefix(FRONT_MATTER_FENCE)
        .and_then(|rest| rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")))
    else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_FENCE {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, content)
}

fn parse_tags(front_matter: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    let mut lines = front_matter.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(value) = line.strip_prefix("tags:") else {
            continue;
        };
        let value = value.trim();

        if value.is_empty() {
            while let Some(item) = lines.next_if(|l| l.trim_start().starts_with('-')) {
                let item = item.trim_start().trim_start_matches('-');
                tags.extend(normalize_tag(item));
            }
        } else {
            let value = value
                .strip_prefix('[')
                .and_then(|v| v.strip_suffix(']'))
                .unwrap_or(value);
            tags.extend(value.split(',').filter_map(normalize_tag));
        }
    }
    tags
}

fn normalize_tag(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    let tag = raw.split_whitespace().collect::<Vec<_>>().join("-");
    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}

/// Node addressed by a `../<path>` destination, ignoring any `#fragment`
fn link_target(dest: &str) -> Option<NodeIdentifier> {
    let path = dest.strip_prefix(LINK_PREFIX)?;
    let path = path.split('#').next().unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    path.parse().ok()
}

fn first_line(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches('#').trim().to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
