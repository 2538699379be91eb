use crate::types::KeywordItem;
use regex::Regex;
use tracing::warn;

/// The single significant wildcard marker inside a keyword.
pub const WILDCARD: char = '*';

/// Result of evaluating one item's text against a view's combined keyword
/// sets. `matched_whitelist` holds every whitelist term that matched, for
/// later highlighting by the caller.
#[derive(Debug, Clone, Default)]
pub struct KeywordVerdict {
    pub passes: bool,
    pub matched_whitelist: Vec<String>,
}

/// Does `content` match a single keyword item, honoring its case, wildcard,
/// and whole-word options?
pub fn matches(content: &str, keyword: &KeywordItem) -> bool {
    let (content, term) = if keyword.case_sensitive {
        (content.to_string(), keyword.text.clone())
    } else {
        (content.to_lowercase(), keyword.text.to_lowercase())
    };

    if term.contains(WILDCARD) {
        if keyword.whole_word {
            // The pattern applies to individual tokens, not the whole text.
            tokens(&content).any(|token| wildcard_matches(token, &term))
        } else {
            wildcard_matches(&content, &term)
        }
    } else if keyword.whole_word {
        word_boundary_match(&content, &term)
    } else {
        content.contains(&term)
    }
}

/// Match `text` against a pattern containing a `*` wildcard. Only the first
/// marker is significant: the pattern splits into a prefix and a suffix, both
/// treated literally. An empty prefix and suffix match anything; otherwise
/// the text must start with the prefix, end with the suffix, and be long
/// enough that the two do not overlap.
pub fn wildcard_matches(text: &str, pattern: &str) -> bool {
    let (prefix, suffix) = match pattern.split_once(WILDCARD) {
        Some(parts) => parts,
        None => return text == pattern,
    };
    if prefix.is_empty() && suffix.is_empty() {
        return true;
    }
    text.starts_with(prefix)
        && text.ends_with(suffix)
        && text.len() >= prefix.len() + suffix.len()
}

fn word_boundary_match(content: &str, term: &str) -> bool {
    match Regex::new(&format!(r"\b{}\b", regex::escape(term))) {
        Ok(re) => re.is_match(content),
        Err(e) => {
            warn!("unusable whole-word pattern {:?}: {}", term, e);
            false
        }
    }
}

fn tokens(content: &str) -> impl Iterator<Item = &str> {
    content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
}

/// Evaluate combined whitelist and blacklist keyword sets against one item's
/// text. Whitelist passes vacuously when the set is empty, otherwise at least
/// one term must match; every matching whitelist term is recorded. Any
/// blacklist match excludes the item regardless of whitelist outcome — the
/// whitelist contributes matched-term metadata, never an override.
pub fn evaluate(
    content: &str,
    whitelist: &[KeywordItem],
    blacklist: &[KeywordItem],
) -> KeywordVerdict {
    let matched_whitelist: Vec<String> = whitelist
        .iter()
        .filter(|keyword| matches(content, keyword))
        .map(|keyword| keyword.text.clone())
        .collect();

    let whitelist_ok = whitelist.is_empty() || !matched_whitelist.is_empty();
    let blacklist_hit = blacklist.iter().any(|keyword| matches(content, keyword));

    KeywordVerdict {
        passes: whitelist_ok && !blacklist_hit,
        matched_whitelist,
    }
}
