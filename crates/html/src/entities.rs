//! Character references in attribute values, and escaping for markup that
//! the rewriter writes itself.
//!
//! Decoding covers a deliberately small subset:
//! - named: `&amp;`, `&lt;`, `&gt;`, `&quot;`, `&apos;`, `&nbsp;`;
//! - numeric, semicolon-terminated only: `&#123;` and `&#x1F4A9;`.
//!
//! Unknown names, missing semicolons, overlong digit runs and invalid scalar
//! values are left exactly as written.

const NAMED: [(&[u8], char); 6] = [
    (b"&amp;", '&'),
    (b"&lt;", '<'),
    (b"&gt;", '>'),
    (b"&quot;", '"'),
    (b"&apos;", '\''),
    (b"&nbsp;", '\u{00A0}'),
];

const MAX_HEX_DIGITS: usize = 6; // 0x10FFFF
const MAX_DEC_DIGITS: usize = 7; // 1114111

pub fn decode_entities(s: &str) -> String {
    let bytes = s.as_bytes();
    if memchr::memchr(b'&', bytes).is_none() {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut copy_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'&' {
            i += 1;
            continue;
        }
        out.push_str(&s[copy_start..i]);

        let consumed = decode_named(bytes, i, &mut out)
            .or_else(|| decode_numeric(s, i, &mut out))
            .unwrap_or_else(|| {
                out.push('&');
                1
            });
        i += consumed;
        copy_start = i;
    }
    out.push_str(&s[copy_start..]);
    out
}

fn decode_named(bytes: &[u8], at: usize, out: &mut String) -> Option<usize> {
    let rest = &bytes[at..];
    let (pat, ch) = NAMED.iter().find(|(pat, _)| rest.starts_with(pat))?;
    out.push(*ch);
    Some(pat.len())
}

/// Decodes `&#...;` at `at`; returns the bytes consumed (the reference is
/// copied verbatim when it does not decode to a scalar value).
fn decode_numeric(s: &str, at: usize, out: &mut String) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.get(at + 1) != Some(&b'#') {
        return None;
    }
    let hex = matches!(bytes.get(at + 2), Some(b'x' | b'X'));
    let digits_start = at + if hex { 3 } else { 2 };
    let max = if hex { MAX_HEX_DIGITS } else { MAX_DEC_DIGITS };

    let Some(end) = scan_digits(bytes, digits_start, max, hex) else {
        return Some(copy_malformed(s, at, out));
    };
    let digits = &s[digits_start..end];
    let radix = if hex { 16 } else { 10 };
    match u32::from_str_radix(digits, radix).ok().and_then(char::from_u32) {
        Some(ch) => out.push(ch),
        None => out.push_str(&s[at..=end]),
    }
    Some(end + 1 - at)
}

/// Index of the terminating `;` when `start..` is a bounded digit run.
fn scan_digits(bytes: &[u8], start: usize, max_digits: usize, hex: bool) -> Option<usize> {
    let mut j = start;
    while j < bytes.len() {
        let b = bytes[j];
        if b == b';' {
            return (j > start).then_some(j);
        }
        let ok = if hex {
            b.is_ascii_hexdigit()
        } else {
            b.is_ascii_digit()
        };
        if !ok || j - start == max_digits {
            return None;
        }
        j += 1;
    }
    None
}

/// Copies a malformed reference through, stopping before whitespace or the
/// next `&` so an adjacent reference still decodes.
fn copy_malformed(s: &str, at: usize, out: &mut String) -> usize {
    let bytes = s.as_bytes();
    let mut j = at + 1;
    while j < bytes.len() {
        match bytes[j] {
            b';' => {
                out.push_str(&s[at..=j]);
                return j + 1 - at;
            }
            b'&' => break,
            b if b.is_ascii_whitespace() => break,
            _ => j += 1,
        }
    }
    out.push_str(&s[at..j]);
    j - at
}

/// Escapes a value for a double-quoted attribute.
pub fn escape_attribute_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes text so it is inserted as characters, not markup.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_named_and_numeric() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&lt;tag&gt;"), "<tag>");
        assert_eq!(decode_entities("&quot;hi&apos;"), "\"hi'");
        assert_eq!(decode_entities("a&nbsp;b"), "a\u{00A0}b");
        assert_eq!(decode_entities("&#215;&#xD7;"), "××");
        assert_eq!(decode_entities("π &amp; σ"), "π & σ");
    }

    #[test]
    fn leaves_unknown_and_unterminated_references() {
        assert_eq!(decode_entities("?a=1&b=2"), "?a=1&b=2");
        assert_eq!(decode_entities("&notanentity;"), "&notanentity;");
        assert_eq!(decode_entities("&amp"), "&amp");
        assert_eq!(decode_entities("&#215 "), "&#215 ");
        assert_eq!(decode_entities("&#;"), "&#;");
        assert_eq!(decode_entities("&#x;"), "&#x;");
    }

    #[test]
    fn rejects_out_of_range_scalars() {
        assert_eq!(decode_entities("&#xD800;"), "&#xD800;");
        assert_eq!(decode_entities("&#x110000;"), "&#x110000;");
        assert_eq!(decode_entities("&#1114111;"), "\u{10FFFF}");
        assert_eq!(decode_entities("&#11141111;"), "&#11141111;");
    }

    #[test]
    fn malformed_reference_does_not_swallow_the_next() {
        assert_eq!(decode_entities("&#xZZ;&amp;"), "&#xZZ;&");
        assert_eq!(decode_entities("&#12&amp;"), "&#12&");
    }

    #[test]
    fn decoding_is_idempotent_on_adversarial_input() {
        for s in ["&", "&&", "&;", "&#xFFFFFFFF;", "&unknown;", "&#9999999;"] {
            let once = decode_entities(s);
            assert_eq!(decode_entities(&once), once);
        }
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_attribute_value("a \"b\" & c"), "a &quot;b&quot; &amp; c");
        assert_eq!(escape_attribute_value("<ok>"), "<ok>");
        assert_eq!(escape_text("1 < 2 & 3 > 2"), "1 &lt; 2 &amp; 3 &gt; 2");
    }
}
