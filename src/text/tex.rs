//! TeX math normalization
//!
//! Every math span, whatever delimiter it was written with, is rewritten to
//! `[imath]…[/imath]` so downstream indexers see one markup.

use regex::Regex;
use std::sync::LazyLock;

const OPEN: &str = "[imath]";
const CLOSE: &str = "[/imath]";

static DISPLAY_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\\[(.+?)\\\]").expect("hardcoded regex pattern is valid"));

static INLINE_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\\((.+?)\\\)").expect("hardcoded regex pattern is valid"));

/// Applies the normalization passes in their fixed order
#[derive(Debug, Clone, Copy, Default)]
pub struct TexNormalizer {
    /// Rewrite the forum-specific `\minus{}`-style macros first
    pub canonical_macros: bool,
}

impl TexNormalizer {
    pub fn new(canonical_macros: bool) -> Self {
        Self { canonical_macros }
    }

    /// Canonical macros, then display math, then inline math, then dollars
    pub fn normalize(&self, text: &str) -> String {
        let text = if self.canonical_macros {
            convert_canonical_tex(text)
        } else {
            text.to_string()
        };
        let text = replace_display_tex(&text);
        let text = replace_inline_tex(&text);
        replace_dollar_tex(&text)
    }
}

/// Rewrites the non-standard macros some forums store in post sources
pub fn convert_canonical_tex(text: &str) -> String {
    text.replace("\\minus{}", "-")
        .replace("\\plus{}", "+")
        .replace("\\equal{}", "=")
        .replace("\\/", "/")
}

/// Rewrites `$$…$$` and `\[…\]`
pub fn replace_display_tex(text: &str) -> String {
    let text = replace_dollar_pairs(text, "$$");
    DISPLAY_BRACKETS
        .replace_all(&text, format!("{}$1{}", OPEN, CLOSE).as_str())
        .into_owned()
}

/// Rewrites `\(…\)`
pub fn replace_inline_tex(text: &str) -> String {
    INLINE_PARENS
        .replace_all(text, format!("{}$1{}", OPEN, CLOSE).as_str())
        .into_owned()
}

/// Rewrites single-dollar `$…$` spans
pub fn replace_dollar_tex(text: &str) -> String {
    replace_dollar_pairs(text, "$")
}

/// Replaces `delim … delim` pairs, honoring backslash escapes
///
/// `\$` is never a delimiter. An opening delimiter without a partner is left
/// as literal text. For the single-dollar pass a `$$` run is not split.
fn replace_dollar_pairs(text: &str, delim: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = find_delimiter(rest, delim) {
        let body_start = start + delim.len();
        match find_delimiter(&rest[body_start..], delim) {
            Some(len) if len > 0 => {
                out.push_str(&rest[..start]);
                out.push_str(OPEN);
                out.push_str(&rest[body_start..body_start + len]);
                out.push_str(CLOSE);
                rest = &rest[body_start + len + delim.len()..];
            }
            _ => {
                out.push_str(&rest[..body_start]);
                rest = &rest[body_start..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Byte offset of the next unescaped delimiter
fn find_delimiter(text: &str, delim: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' if text[i..].starts_with(delim) => {
                // a lone `$` must not match half of a `$$`
                let run = bytes[i..].iter().take_while(|b| **b == b'$').count();
                if delim.len() == 1 && run > 1 {
                    i += run;
                    continue;
                }
                return Some(i);
            }
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dollar_spans() {
        assert_eq!(
            replace_dollar_tex("let $x=1$ and $y$."),
            "let [imath]x=1[/imath] and [imath]y[/imath]."
        );
    }

    #[test]
    fn test_escaped_dollar_is_not_a_delimiter() {
        assert_eq!(replace_dollar_tex(r"costs \$5 and $x$"), r"costs \$5 and [imath]x[/imath]");
    }

    #[test]
    fn test_unmatched_dollar_is_left_alone() {
        assert_eq!(replace_dollar_tex("price $5"), "price $5");
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(
            replace_display_tex(r"a $$x^2$$ b \[y\] c"),
            "a [imath]x^2[/imath] b [imath]y[/imath] c"
        );
    }

    #[test]
    fn test_inline_parens() {
        assert_eq!(replace_inline_tex(r"see \(a+b\)"), "see [imath]a+b[/imath]");
    }

    #[test]
    fn test_canonical_macros() {
        assert_eq!(convert_canonical_tex(r"a\minus{}b\equal{}c\plus{}d\/e"), "a-b=c+d/e");
    }

    #[test]
    fn test_full_order() {
        let normalizer = TexNormalizer::new(true);
        assert_eq!(
            normalizer.normalize(r"$$a\minus{}b$$ then $c$ and \(d\)"),
            "[imath]a-b[/imath] then [imath]c[/imath] and [imath]d[/imath]"
        );
    }

    #[test]
    fn test_single_pass_does_not_split_double_dollars() {
        assert_eq!(replace_dollar_tex("$$"), "$$");
    }
}
