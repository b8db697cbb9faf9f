#![forbid(unsafe_code)]

//! Character escaping for canonical output.
//!
//! The replacement set depends on where the characters land: text
//! content, an attribute value, or processing instruction data each
//! escape a different subset. Strings that need no replacement are
//! returned borrowed.

use std::borrow::Cow;

#[derive(Clone, Copy)]
enum Context {
    Text,
    Attribute,
    Pi,
}

fn entity(ch: char, ctx: Context) -> Option<&'static str> {
    Some(match (ch, ctx) {
        ('&', Context::Text | Context::Attribute) => "&amp;",
        ('<', Context::Text | Context::Attribute) => "&lt;",
        ('>', Context::Text) => "&gt;",
        ('"', Context::Attribute) => "&quot;",
        ('\t', Context::Attribute) => "&#x9;",
        ('\n', Context::Attribute) => "&#xA;",
        ('\r', _) => "&#xD;",
        _ => return None,
    })
}

fn escape(s: &str, ctx: Context) -> Cow<'_, str> {
    if !s.chars().any(|ch| entity(ch, ctx).is_some()) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match entity(ch, ctx) {
            Some(replacement) => out.push_str(replacement),
            None => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Escape text node content.
pub fn text(s: &str) -> Cow<'_, str> {
    escape(s, Context::Text)
}

/// Escape an attribute value.
pub fn attr(s: &str) -> Cow<'_, str> {
    escape(s, Context::Attribute)
}

/// Escape processing instruction data.
pub fn pi(s: &str) -> Cow<'_, str> {
    escape(s, Context::Pi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_escapes_markup_and_cr() {
        assert!(matches!(text("hello"), Cow::Borrowed(_)));
        assert_eq!(text("a&b<c>d"), "a&amp;b&lt;c&gt;d");
        assert_eq!(text("line\rend"), "line&#xD;end");
        assert_eq!(text("tab\tstays"), "tab\tstays");
    }

    #[test]
    fn test_attr_escapes_quotes_and_whitespace() {
        assert!(matches!(attr("hello"), Cow::Borrowed(_)));
        assert_eq!(attr("a&b\"c"), "a&amp;b&quot;c");
        assert_eq!(attr("a\tb\nc\rd"), "a&#x9;b&#xA;c&#xD;d");
        assert_eq!(attr("no > change"), "no > change");
    }

    #[test]
    fn test_pi_escapes_only_cr() {
        assert_eq!(pi("a<b>&\"\r"), "a<b>&\"&#xD;");
    }
}
