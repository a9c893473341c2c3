//! Authority-name normalization
//!
//! NACO-style normalization of heading strings into comparison keys:
//! - compatibility decomposition and accent folding
//! - lower-casing
//! - punctuation to separators, keeping digit runs intact
//! - the first comma of a heading is significant and kept
//! - separator collapsing and trimming
//!
//! All functions are total: `None` in gives `None` out.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Separator used by [`normalize_key`]
pub const KEY_SEPARATOR: char = '_';

/// Normalize an authority name for comparison.
///
/// # Examples
///
/// ```
/// use bibgraph_reconcile::normalize::normalize;
///
/// assert_eq!(
///     normalize(Some("Twain, Mark, 1835-1910.")).as_deref(),
///     Some("twain, mark 1835 1910")
/// );
/// assert_eq!(normalize(None), None);
/// ```
pub fn normalize(raw: Option<&str>) -> Option<String> {
    raw.map(normalize_str)
}

/// Compact key form: normalized tokens joined with `_`, comma dropped.
///
/// Returns `None` for absent input and for names with no alphanumeric
/// content, so that such names never form a cluster.
pub fn normalize_key(raw: Option<&str>) -> Option<String> {
    let (tokens, _) = tokenize(raw?);
    if tokens.is_empty() {
        return None;
    }
    Some(tokens.join(&KEY_SEPARATOR.to_string()))
}

/// Normalized tokens of a name
pub fn tokens(raw: &str) -> Vec<String> {
    tokenize(raw).0
}

/// Tokens that look like years (three or four digits)
pub fn year_tokens(raw: &str) -> Vec<String> {
    tokens(raw)
        .into_iter()
        .filter(|t| is_year(t))
        .collect()
}

/// Tokens with year tokens removed
pub fn name_tokens(raw: &str) -> Vec<String> {
    tokens(raw).into_iter().filter(|t| !is_year(t)).collect()
}

fn is_year(token: &str) -> bool {
    (3..=4).contains(&token.len()) && token.chars().all(|c| c.is_ascii_digit())
}

fn normalize_str(raw: &str) -> String {
    let (tokens, comma_after) = tokenize(raw);
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(token);
        if comma_after == Some(i) {
            out.push(',');
        }
    }
    out
}

/// Splits a raw name into folded tokens.
///
/// Also returns the index of the token followed by the significant comma,
/// if the heading has one with tokens on both sides.
fn tokenize(raw: &str) -> (Vec<String>, Option<usize>) {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut comma_after: Option<usize> = None;
    let mut comma_pending = false;

    for c in fold(raw).chars() {
        if c.is_alphanumeric() {
            if comma_pending {
                comma_after = Some(tokens.len() - 1);
                comma_pending = false;
            }
            current.push(c);
            continue;
        }

        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if c == ',' && comma_after.is_none() && !tokens.is_empty() {
            comma_pending = true;
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    (tokens, comma_after)
}

/// Accent-folds and lower-cases, dropping apostrophes
fn fold(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.nfkd().filter(|c| !is_combining_mark(*c)) {
        for lower in c.to_lowercase() {
            match lower {
                '\'' | '\u{2019}' | '\u{2bc}' => {}
                'ø' => out.push('o'),
                'æ' => out.push_str("ae"),
                'œ' => out.push_str("oe"),
                'ß' => out.push_str("ss"),
                'ł' => out.push('l'),
                'đ' | 'ð' => out.push('d'),
                'þ' => out.push_str("th"),
                'ı' => out.push('i'),
                other => out.push(other),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_punctuation_and_case() {
        let expected = Some("twain, mark 1835 1910".to_string());
        assert_eq!(normalize(Some("Twain, Mark, 1835-1910")), expected);
        assert_eq!(normalize(Some("Twain, Mark, 1835-1910.")), expected);
        assert_eq!(normalize(Some("TWAIN, MARK, 1835-1910")), expected);
    }

    #[test]
    fn test_parenthetical_flattened() {
        let n = normalize(Some("Gordon, Burgess L. (Burgess Lee), 1892-")).unwrap();
        assert_eq!(n, "gordon, burgess l burgess lee 1892");
        assert!(!n.contains('('));
        assert!(!n.contains(')'));
    }

    #[test]
    fn test_null_propagation() {
        assert_eq!(normalize(None), None);
        assert_eq!(normalize_key(None), None);
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Twain, Mark, 1835-1910.",
            "Gordon, Burgess L. (Burgess Lee), 1892-",
            "  ,leading comma",
            "trailing comma,",
            "Brontë, Charlotte, 1816-1855",
            "Øster, Æsa",
            "O'Brien, Flann",
            "United States. Congress. House",
            "İstanbul",
            "Ｆｕｌｌｗｉｄｔｈ",
            "___",
            "",
        ];
        for s in samples {
            let once = normalize(Some(s));
            let twice = normalize(once.as_deref());
            assert_eq!(once, twice, "not idempotent for {:?}", s);
        }
        assert_eq!(normalize(normalize(None).as_deref()), None);
    }

    #[test]
    fn test_diacritics_removed() {
        assert_eq!(
            normalize(Some("Brontë, Charlotte")).as_deref(),
            Some("bronte, charlotte")
        );
        assert_eq!(
            normalize(Some("Dvořák, Antonín, 1841-1904")).as_deref(),
            Some("dvorak, antonin 1841 1904")
        );
        assert_eq!(normalize(Some("Øster, Æsa")).as_deref(), Some("oster, aesa"));
    }

    #[test]
    fn test_separators_collapse() {
        assert_eq!(
            normalize(Some("  Smith ,  John -- 1900 -  ")).as_deref(),
            Some("smith, john 1900")
        );
        assert_eq!(normalize(Some("snake_case_name")).as_deref(), Some("snake case name"));
        assert_eq!(normalize(Some("O'Brien")).as_deref(), Some("obrien"));
    }

    #[test]
    fn test_only_first_comma_kept() {
        assert_eq!(
            normalize(Some("a, b, c, d")).as_deref(),
            Some("a, b c d")
        );
        assert_eq!(normalize(Some(", a b")).as_deref(), Some("a b"));
        assert_eq!(normalize(Some("a b,")).as_deref(), Some("a b"));
    }

    #[test]
    fn test_key_form() {
        let a = normalize_key(Some("Twain, Mark, 1835-1910"));
        let b = normalize_key(Some("twain, mark, 1835-1910."));
        assert_eq!(a.as_deref(), Some("twain_mark_1835_1910"));
        assert_eq!(a, b);
        assert_eq!(normalize_key(Some("...")), None);
    }

    #[test]
    fn test_year_tokens() {
        assert_eq!(year_tokens("Twain, Mark, 1835-1910"), vec!["1835", "1910"]);
        assert_eq!(name_tokens("Twain, Mark, 1835-1910"), vec!["twain", "mark"]);
        assert!(year_tokens("Louis XIV, King of France").is_empty());
    }
}
