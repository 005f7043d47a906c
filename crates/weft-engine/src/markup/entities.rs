//! Named HTML entity support for the XML reader.
//!
//! Template authors write HTML, so `&nbsp;` and friends show up in
//! templates. The XML reader only knows the five predefined entities, so
//! text references are decoded here and attribute values are rewritten to
//! numeric references before unescaping.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Named entity reference (`&name;`).
static NAMED_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&([a-zA-Z][a-zA-Z0-9]*);").expect("invalid entity regex"));

/// Rewrite named HTML entities as numeric references.
///
/// XML's predefined entities and unknown names are left untouched.
pub(crate) fn normalize_entities(src: &str) -> Cow<'_, str> {
    NAMED_ENTITY.replace_all(src, |caps: &regex::Captures| {
        let name = &caps[1];
        html_entity(name).map_or_else(|| caps[0].to_owned(), |c| format!("&#{};", u32::from(c)))
    })
}

/// Decode an entity reference body (`amp`, `#38`, `#x26`).
///
/// Returns the original `&name;` text when the reference is unknown.
pub(crate) fn decode_reference(entity: &str) -> String {
    let decoded = match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        s => {
            let code = if let Some(hex) = s.strip_prefix("#x").or_else(|| s.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()
            } else {
                s.strip_prefix('#').and_then(|dec| dec.parse::<u32>().ok())
            };
            code.and_then(char::from_u32).or_else(|| html_entity(s))
        }
    };
    decoded.map_or_else(|| format!("&{entity};"), String::from)
}

fn html_entity(name: &str) -> Option<char> {
    Some(match name {
        "nbsp" => '\u{00a0}',
        "ensp" => '\u{2002}',
        "emsp" => '\u{2003}',
        "thinsp" => '\u{2009}',
        "shy" => '\u{00ad}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "hellip" => '\u{2026}',
        "bull" => '\u{2022}',
        "middot" => '\u{00b7}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "laquo" => '\u{00ab}',
        "raquo" => '\u{00bb}',
        "larr" => '\u{2190}',
        "uarr" => '\u{2191}',
        "rarr" => '\u{2192}',
        "darr" => '\u{2193}',
        "times" => '\u{00d7}',
        "divide" => '\u{00f7}',
        "plusmn" => '\u{00b1}',
        "le" => '\u{2264}',
        "ge" => '\u{2265}',
        "ne" => '\u{2260}',
        "deg" => '\u{00b0}',
        "copy" => '\u{00a9}',
        "reg" => '\u{00ae}',
        "trade" => '\u{2122}',
        "euro" => '\u{20ac}',
        "pound" => '\u{00a3}',
        "yen" => '\u{00a5}',
        "cent" => '\u{00a2}',
        "sect" => '\u{00a7}',
        "para" => '\u{00b6}',
        "check" => '\u{2713}',
        "cross" => '\u{2717}',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_entity_becomes_numeric() {
        assert_eq!(normalize_entities("a&nbsp;b"), "a&#160;b");
        assert_eq!(normalize_entities("&mdash;"), "&#8212;");
    }

    #[test]
    fn test_xml_entities_untouched() {
        assert_eq!(normalize_entities("&amp;&lt;&gt;"), "&amp;&lt;&gt;");
    }

    #[test]
    fn test_unknown_entity_untouched() {
        assert_eq!(normalize_entities("&bogus;"), "&bogus;");
    }

    #[test]
    fn test_decode_reference() {
        assert_eq!(decode_reference("amp"), "&");
        assert_eq!(decode_reference("#60"), "<");
        assert_eq!(decode_reference("#x3E"), ">");
        assert_eq!(decode_reference("#160"), "\u{00a0}");
        assert_eq!(decode_reference("nbsp"), "\u{00a0}");
        assert_eq!(decode_reference("mdash"), "\u{2014}");
        assert_eq!(decode_reference("bogus"), "&bogus;");
    }
}
