//! Per-token DSL translation.
//!
//! A token that starts with a letter reads as `body [digits]`: the trailing
//! digit run is an index and is removed before anything else. The *head* of
//! the body (its text before the first `.`, `:`, `[` or `#`) picks a tag,
//! grid shorthand or alias; the rest of the body is kept after it. Any
//! other body is a class shorthand. Tokens that do not start with a letter
//! (combinators, `*`, `#id`, `.class`, `[attr]`, `:is(...)`) are already
//! structural and pass through.

/// Element names the DSL may use verbatim.
const TAGS: &[&str] = &[
    "html", "body", "header", "footer", "main", "div", "a", "p", "strong", "em", "picture",
    "source", "img", "h", "ul", "ol", "li",
];

const ALIASES: &[(&str, &str)] = &[
    ("section", "main > div"),
    ("primary-cta", "strong a"),
    ("secondary-cta", "em a"),
    ("action-area", "*:has(> em a, > strong a)"),
    ("any-marquee-section", "main > div:has([class*=\"marquee\"])"),
    ("any-marquee", "[class*=\"marquee\"]"),
    ("any-header", ":is(h1,h2,h3,h4,h5,h6)"),
];

pub(crate) fn translate_term(token: &str) -> String {
    if !token.as_bytes().first().is_some_and(u8::is_ascii_alphabetic) {
        return token.to_string();
    }

    let body = token.trim_end_matches(|c: char| c.is_ascii_digit());
    let index = &token[body.len()..];
    let head_end = body.find(['.', ':', '[', '#']).unwrap_or(body.len());
    let (head, rest) = body.split_at(head_end);
    let lower = head.to_ascii_lowercase();

    // `h1`..`h6` stay headings rather than the `h` tag at an index.
    if lower == "h" && rest.is_empty() && matches!(index, "1" | "2" | "3" | "4" | "5" | "6") {
        return format!("h{index}");
    }

    let structural = if TAGS.contains(&lower.as_str()) {
        Some(lower.as_str())
    } else if lower == "row" || lower == "col" {
        Some("> div")
    } else {
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == lower)
            .map(|(_, expansion)| *expansion)
    };
    if let Some(structural) = structural {
        return with_nth_child(&format!("{structural}{rest}"), index);
    }

    let class = format!(".{body}");
    if index.is_empty() {
        class
    } else {
        format!("{class}:nth-child({index} of {class})")
    }
}

fn with_nth_child(head: &str, index: &str) -> String {
    if index.is_empty() {
        head.to_string()
    } else {
        format!("{head}:nth-child({index})")
    }
}

#[cfg(test)]
mod tests {
    use super::translate_term;

    #[test]
    fn structural_tokens_pass_through() {
        for token in [">", ",", "*", ".hero", "#main", "[data-x]", ":is(h1,h2)", "42"] {
            assert_eq!(translate_term(token), token);
        }
    }

    #[test]
    fn tags_and_indices() {
        assert_eq!(translate_term("div"), "div");
        assert_eq!(translate_term("DIV"), "div");
        assert_eq!(translate_term("li3"), "li:nth-child(3)");
        assert_eq!(translate_term("img:first-child"), "img:first-child");
        assert_eq!(translate_term("h2"), "h2");
        assert_eq!(translate_term("h9"), "h:nth-child(9)");
    }

    #[test]
    fn grid_shorthand() {
        assert_eq!(translate_term("row2"), "> div:nth-child(2)");
        assert_eq!(translate_term("col"), "> div");
    }

    #[test]
    fn aliases_expand() {
        assert_eq!(translate_term("section2"), "main > div:nth-child(2)");
        assert_eq!(translate_term("primary-cta"), "strong a");
        assert_eq!(translate_term("secondary-cta"), "em a");
        assert_eq!(translate_term("any-marquee"), "[class*=\"marquee\"]");
        assert_eq!(translate_term("any-header"), ":is(h1,h2,h3,h4,h5,h6)");
    }

    #[test]
    fn class_fallback() {
        assert_eq!(translate_term("my-class"), ".my-class");
        assert_eq!(translate_term("my-class3"), ".my-class:nth-child(3 of .my-class)");
        assert_eq!(translate_term("hero.dark"), ".hero.dark");
    }

    #[test]
    fn index_is_the_trailing_digit_run() {
        assert_eq!(translate_term("my_class3"), ".my_class:nth-child(3 of .my_class)");
        assert_eq!(
            translate_term("hero.dark2"),
            ".hero.dark:nth-child(2 of .hero.dark)"
        );
        assert_eq!(
            translate_term("promo-v2b3"),
            ".promo-v2b:nth-child(3 of .promo-v2b)"
        );
        assert_eq!(translate_term("promo-v2b"), ".promo-v2b");
    }

    #[test]
    fn head_keeps_its_qualifiers() {
        assert_eq!(translate_term("div.hero2"), "div.hero:nth-child(2)");
        assert_eq!(translate_term("a[href]"), "a[href]");
        assert_eq!(translate_term("section2.dark"), ".section2.dark");
        assert_eq!(translate_term("section.dark3"), "main > div.dark:nth-child(3)");
        assert_eq!(translate_term("li:nth-child(2)"), "li:nth-child(2)");
    }
}
