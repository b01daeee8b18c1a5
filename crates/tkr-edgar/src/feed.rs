//! Filing-feed titles -> [`FeedSignal`]s.
//!
//! Titles look like `"10-K - Apple Inc. [AAPL]"` or
//! `"8-K - Foo Corp (FOO) (Filer)"`. The form type is everything before the
//! first `" - "`; the symbol hint is the first bracketed token that is not a
//! role marker or a numeric filer id. Titles without a usable hint yield
//! nothing.

use tkr_registry::FeedSignal;

const ROLE_MARKERS: &[&str] = &["FILER", "SUBJECT", "REPORTING", "ISSUER"];

pub fn parse_title(title: &str) -> Option<FeedSignal> {
    let (form, rest) = title.trim().split_once(" - ")?;
    let form_type = form.trim();
    if form_type.is_empty() {
        return None;
    }
    let symbol = bracketed(rest).into_iter().find_map(symbol_hint)?;
    Some(FeedSignal {
        form_type: form_type.to_string(),
        symbol_hint: symbol,
    })
}

/// One title per line; blank and unusable lines are dropped.
pub fn parse_titles(text: &str) -> Vec<FeedSignal> {
    text.lines().filter_map(parse_title).collect()
}

fn bracketed(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(start) = rest.find(|c| c == '[' || c == '(') {
        let close = if rest[start..].starts_with('[') { ']' } else { ')' };
        let inner = &rest[start + 1..];
        let Some(end) = inner.find(close) else {
            break;
        };
        out.push(&inner[..end]);
        rest = &inner[end + 1..];
    }
    out
}

fn symbol_hint(token: &str) -> Option<String> {
    let t = token.trim().to_uppercase();
    if t.is_empty() || t.len() > 10 {
        return None;
    }
    if ROLE_MARKERS.contains(&t.as_str()) || t.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    t.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        .then_some(t)
}
