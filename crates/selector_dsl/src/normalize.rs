/// Pads `>` and `,` with spaces so they tokenize on their own.
pub(crate) fn pad_combinators(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 8);
    for ch in body.chars() {
        match ch {
            '>' => out.push_str(" > "),
            ',' => out.push_str(" , "),
            _ => out.push(ch),
        }
    }
    out
}

/// Rewrites `main > sectionN` (any case, optional `>`) to `sectionN`; the
/// `section` alias already implies `main`.
pub(crate) fn collapse_main_section(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut copy_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if let Some((section_start, end)) = match_main_section(bytes, i) {
            out.push_str(&s[copy_start..i]);
            out.push_str(&s[section_start..end]);
            i = end;
            copy_start = end;
        } else {
            i += 1;
        }
    }
    out.push_str(&s[copy_start..]);
    out
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn starts_with_ignore_ascii_case_at(haystack: &[u8], start: usize, needle: &[u8]) -> bool {
    haystack.len() >= start + needle.len()
        && haystack[start..start + needle.len()].eq_ignore_ascii_case(needle)
}

fn match_main_section(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    if start > 0 && is_ident_byte(bytes[start - 1]) {
        return None;
    }
    if !starts_with_ignore_ascii_case_at(bytes, start, b"main") {
        return None;
    }
    let mut i = start + 4;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'>' {
        i += 1;
    }
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if !starts_with_ignore_ascii_case_at(bytes, i, b"section") {
        return None;
    }
    let section_start = i;
    i += "section".len();
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    Some((section_start, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding() {
        assert_eq!(pad_combinators("a>b,c"), "a > b , c");
    }

    #[test]
    fn collapses_main_prefix() {
        assert_eq!(collapse_main_section("main > section2 p"), "section2 p");
        assert_eq!(collapse_main_section("MAIN section"), "section");
        assert_eq!(collapse_main_section("main>Section10"), "Section10");
    }

    #[test]
    fn leaves_unrelated_text() {
        assert_eq!(collapse_main_section("main > div"), "main > div");
        assert_eq!(collapse_main_section("domain section3"), "domain section3");
    }
}
