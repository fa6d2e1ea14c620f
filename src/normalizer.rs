use crate::types::{NormalizedEntry, RawEntry};
use chrono::Utc;

/// Strip markup and normalize an entry's body, and resolve its publish
/// timestamp. Feeds frequently omit or malform dates, so a missing
/// timestamp defaults to the current processing time; that default is
/// policy, not an error.
pub fn normalize(entry: RawEntry) -> NormalizedEntry {
    let cleaned_body = strip_markup(&entry.body);
    let published_at = entry.published_at.unwrap_or_else(Utc::now);

    NormalizedEntry {
        title: entry.title.trim().to_string(),
        cleaned_body,
        url: entry.url,
        source_endpoint: entry.source_endpoint,
        published_at,
    }
}

/// Remove all tags, decode common HTML entities, and collapse runs of
/// whitespace to single spaces. Output never contains raw markup
/// delimiters.
pub fn strip_markup(body: &str) -> String {
    let mut text = String::with_capacity(body.len());
    let mut in_tag = false;

    for c in body.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                if in_tag {
                    in_tag = false;
                    // Tag boundaries separate words in rendered text.
                    text.push(' ');
                }
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
