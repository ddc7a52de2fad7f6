//! Detection and removal of presentation markup leaked into card text.
//!
//! Card fields scraped from exported decks tend to carry whole `<style>`
//! blocks, CSS rules copied from card templates, and stray tags. Stripping
//! runs to a fixed point: decoding `&lt;b&gt;` can expose a new tag, which
//! the next round removes.

use std::sync::LazyLock;

use regex_lite::Regex;

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?(?:</style\s*>|$)").unwrap());
static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?(?:</script\s*>|$)").unwrap());
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?(?:-->|$)").unwrap());
static CSS_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\.[a-zA-Z][\w-]*\s*)+\{[^}]*\}").unwrap());
static FONT_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)font-family\s*:[^;}\n]*;?").unwrap());
static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*/?\s*(?:br|p|div|li|ul|ol|tr|td|h[1-6])\b[^>]*>").unwrap()
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[a-zA-Z/!][^>]*>").unwrap());
// `&lt;b&gt;` left behind by double-escaping exporters
static ENCODED_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)&lt;\s*/?\s*[a-z][a-z0-9]*\b[^&]*&gt;").unwrap());
static PRIORITY_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:HIGH|MEDIUM|LOW)\s+Priority\b:?\s*").unwrap());
static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(?:([0-9]{1,7})|[xX]([0-9a-fA-F]{1,6}));").unwrap());

/// Whether `text` contains style/script blocks, tags, comments, or CSS rules.
pub fn has_markup(text: &str) -> bool {
    STYLE_BLOCK.is_match(text)
        || SCRIPT_BLOCK.is_match(text)
        || COMMENT.is_match(text)
        || TAG.is_match(text)
        || ENCODED_TAG.is_match(text)
        || CSS_RULE.is_match(text)
        || FONT_DECL.is_match(text)
}

/// Remove all markup, decode entities, and collapse whitespace.
///
/// The result never satisfies [`has_markup`], and stripping it again
/// returns it unchanged.
pub fn strip_markup(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let text = STYLE_BLOCK.replace_all(text, " ");
    let text = SCRIPT_BLOCK.replace_all(&text, " ");
    let text = COMMENT.replace_all(&text, " ");
    let text = CSS_RULE.replace_all(&text, " ");
    let text = FONT_DECL.replace_all(&text, " ");
    let text = BLOCK_TAG.replace_all(&text, " ");
    let text = TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = PRIORITY_LABEL.replace_all(&text, "");
    collapse_whitespace(&text)
}

/// Decode the named entities Anki emits plus numeric character references.
pub fn decode_entities(text: &str) -> String {
    let text = NUMERIC_ENTITY.replace_all(text, |caps: &regex_lite::Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(dec), _) => dec.as_str().parse::<u32>().ok(),
            (_, Some(hex)) => u32::from_str_radix(hex.as_str(), 16).ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Collapse whitespace runs to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
