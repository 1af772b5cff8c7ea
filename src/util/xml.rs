//! Small helpers over `quick-xml` shared by the XML readers.

use quick_xml::events::BytesStart;

/// Read an attribute as an unescaped string.
///
/// Returns `Ok(None)` if the attribute is absent and `Err` if it is
/// malformed.
pub fn attr(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, quick_xml::Error> {
    match element.try_get_attribute(name)? {
        Some(attribute) => Ok(Some(attribute.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Read an attribute, matching its name case-insensitively.
pub fn attr_ignore_case(
    element: &BytesStart<'_>,
    name: &str,
) -> Result<Option<String>, quick_xml::Error> {
    for attribute in element.attributes() {
        let attribute = attribute?;
        if attribute.key.as_ref().eq_ignore_ascii_case(name.as_bytes()) {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// The element's local name (namespace prefix stripped) as a string.
pub fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// The element's full name, prefix included.
pub fn qualified_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

/// Parse a boolean the way NuGet writes them (`True`, `false`, ...).
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Encode a string into a valid XML element name.
///
/// Characters that cannot appear in a name are written as `_xHHHH_`. An
/// underscore is escaped only when the text after it would read as such an
/// escape (`_x` plus 4 or 8 hex digits and `_`). NuGet keys its credential
/// blocks by source names encoded this way.
pub fn encode_local_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len());

    for (i, &c) in chars.iter().enumerate() {
        let valid = if i == 0 {
            is_name_start_char(c)
        } else {
            is_name_char(c)
        };
        let looks_like_escape = c == '_' && is_escape_sequence(&chars[i + 1..]);

        if valid && !looks_like_escape && c != ':' {
            out.push(c);
        } else if (c as u32) > 0xFFFF {
            out.push_str(&format!("_x{:08X}_", c as u32));
        } else {
            out.push_str(&format!("_x{:04X}_", c as u32));
        }
    }

    out
}

/// Whether `rest` starts with `xHHHH_` or `xHHHHHHHH_`.
fn is_escape_sequence(rest: &[char]) -> bool {
    let hex_then_underscore = |digits: usize| {
        rest.len() > digits + 1
            && rest[0] == 'x'
            && rest[1..=digits].iter().all(|c| c.is_ascii_hexdigit())
            && rest[digits + 1] == '_'
    };
    hex_then_underscore(4) || hex_then_underscore(8)
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c) || c.is_ascii_digit() || c == '-' || c == '.' || c.is_numeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_plain_name() {
        assert_eq!(encode_local_name("MyFeed"), "MyFeed");
        assert_eq!(encode_local_name("my-feed.v2"), "my-feed.v2");
    }

    #[test]
    fn test_encode_space_and_leading_digit() {
        assert_eq!(encode_local_name("My Feed"), "My_x0020_Feed");
        assert_eq!(encode_local_name("1feed"), "_x0031_feed");
    }

    #[test]
    fn test_encode_escape_lookalike() {
        assert_eq!(encode_local_name("a_x0020_b"), "a_x005F_x0020_b");
        assert_eq!(encode_local_name("a_x0001F600_b"), "a_x005F_x0001F600_b");
    }

    #[test]
    fn test_encode_plain_underscore_x() {
        assert_eq!(encode_local_name("corp_xtra"), "corp_xtra");
        assert_eq!(encode_local_name("a_x12"), "a_x12");
        assert_eq!(encode_local_name("a_x12G4_"), "a_x12G4_");
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool(" false "), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
