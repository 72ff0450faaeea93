//! Turns HTML pages into plain text that keeps their links.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Elements that never carry page content.
const SKIPPED_ELEMENTS: [&str; 6] =
    ["script", "style", "nav", "footer", "header", "aside"];

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static SKIPPED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    SKIPPED_ELEMENTS
        .iter()
        .map(|name| {
            Regex::new(&format!(r"(?is)<{name}\b[^>]*>.*?</{name}\s*>"))
                .unwrap()
        })
        .collect()
});

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')[^>]*>"#,
        r"(.*?)</a\s*>",
    ))
    .unwrap()
});

static BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)</?(?:p|div|li|br|h[1-6]|tr|ul|ol|table|section|article|main",
        r"|blockquote|pre)\b[^>]*>",
    ))
    .unwrap()
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap()
});

static SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Extracts the readable text of an HTML document.
///
/// Non-content elements are dropped, block elements become line breaks and
/// links are kept inline as `[text](href)`. Blank lines are removed.
pub fn html_to_text(html: &str) -> String {
    let mut text = COMMENT.replace_all(html, "").into_owned();
    for skipped in SKIPPED.iter() {
        text = skipped.replace_all(&text, "").into_owned();
    }
    let text = LINK.replace_all(&text, |caps: &Captures| {
        let href = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map_or("", |m| m.as_str());
        let label = collapse(&TAG.replace_all(&caps[3], " "));
        format!("[{label}]({href})")
    });
    let text = BLOCK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    let text = decode_entities(&text);

    text.lines()
        .map(collapse)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapses runs of whitespace into single spaces and trims the ends.
fn collapse(text: &str) -> String {
    SPACES.replace_all(text.trim(), " ").trim().to_owned()
}

/// Replaces named and numeric character references.
pub(super) fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => {
                    let code = match entity.strip_prefix('#') {
                        Some(hex) if hex.starts_with(['x', 'X']) => {
                            u32::from_str_radix(&hex[1..], 16).ok()
                        }
                        Some(dec) => dec.parse().ok(),
                        None => None,
                    };
                    code.and_then(char::from_u32)
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_owned(),
            }
        })
        .into_owned()
}
