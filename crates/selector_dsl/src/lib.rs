//! Translation of the author-facing selector shorthand into structural
//! selectors the rewriter can match.
//!
//! `translate` is total: unknown words fall back to class selectors and
//! nothing in the input can make it fail.

mod modifiers;
mod normalize;
mod term;

use core_types::Action;

use crate::modifiers::split_modifiers;
use crate::normalize::{collapse_main_section, pad_combinators};
use crate::term::translate_term;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TranslatedSelector {
    pub css_selector: String,
    /// `#_` flags, lower-cased, in source order. Carried but not interpreted.
    pub modifiers: Vec<String>,
    /// Target attribute, only for `UpdateAttribute` and only when non-empty.
    pub attribute_name: Option<String>,
}

/// Translates a DSL selector. For `UpdateAttribute` the last token names the
/// attribute and is removed from the selector.
pub fn translate(dsl: &str, action: &Action) -> TranslatedSelector {
    translate_with(dsl, *action == Action::UpdateAttribute)
}

/// Translates a DSL selector without attribute extraction, whatever the action.
pub fn translate_selector(dsl: &str) -> TranslatedSelector {
    translate_with(dsl, false)
}

fn translate_with(dsl: &str, extract_attribute: bool) -> TranslatedSelector {
    let (body, modifiers) = split_modifiers(dsl);
    let structural = collapse_main_section(&pad_combinators(body));
    let mut tokens: Vec<&str> = structural.split_whitespace().collect();

    let attribute_name = if extract_attribute {
        pop_attribute(&mut tokens)
    } else {
        None
    };

    let css_selector = tokens
        .iter()
        .map(|token| translate_term(token))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    TranslatedSelector {
        css_selector,
        modifiers,
        attribute_name,
    }
}

/// `foo.attr` keeps `foo` as a token and names `attr`; a dotless last token
/// is the attribute on its own (a stray leading `.` is ignored).
///
/// The attribute comes off the DSL token before translation, not off the
/// translated selector: a lone `primary-cta` names attribute `primary-cta`
/// and leaves no selector, rather than `strong` with attribute `a`.
fn pop_attribute<'a>(tokens: &mut Vec<&'a str>) -> Option<String> {
    let last = tokens.pop()?;
    let attribute = match last.rsplit_once('.') {
        Some((head, attr)) => {
            if !head.is_empty() {
                tokens.push(head);
            }
            attr
        }
        None => last,
    };
    (!attribute.is_empty()).then(|| attribute.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_translations() {
        assert_eq!(
            translate("section2", &Action::Replace).css_selector,
            "main > div:nth-child(2)"
        );
        assert_eq!(translate("primary-cta", &Action::Remove).css_selector, "strong a");
        assert_eq!(
            translate("my-class3", &Action::Replace).css_selector,
            ".my-class:nth-child(3 of .my-class)"
        );
        assert_eq!(translate("div", &Action::Remove).css_selector, "div");
    }

    #[test]
    fn attribute_from_dotted_token() {
        let t = translate("foo.attrName", &Action::UpdateAttribute);
        assert_eq!(t.attribute_name.as_deref(), Some("attrName"));
        assert_eq!(t.css_selector, ".foo");
    }

    #[test]
    fn attribute_from_separate_token() {
        let t = translate("section2 img .src", &Action::UpdateAttribute);
        assert_eq!(t.attribute_name.as_deref(), Some("src"));
        assert_eq!(t.css_selector, "main > div:nth-child(2) img");

        let t = translate("hero img.alt", &Action::UpdateAttribute);
        assert_eq!(t.attribute_name.as_deref(), Some("alt"));
        assert_eq!(t.css_selector, ".hero img");
    }

    #[test]
    fn attribute_is_taken_before_translation() {
        let t = translate("primary-cta", &Action::UpdateAttribute);
        assert_eq!(t.attribute_name.as_deref(), Some("primary-cta"));
        assert_eq!(t.css_selector, "");

        let t = translate("section2 primary-cta href", &Action::UpdateAttribute);
        assert_eq!(t.attribute_name.as_deref(), Some("href"));
        assert_eq!(t.css_selector, "main > div:nth-child(2) strong a");
    }

    #[test]
    fn attribute_missing_is_none() {
        let t = translate("hero.", &Action::UpdateAttribute);
        assert_eq!(t.attribute_name, None);
        assert_eq!(t.css_selector, ".hero");

        let t = translate("   ", &Action::UpdateAttribute);
        assert_eq!(t.attribute_name, None);
        assert_eq!(t.css_selector, "");
    }

    #[test]
    fn other_actions_keep_the_last_token() {
        let t = translate("hero cta", &Action::Replace);
        assert_eq!(t.attribute_name, None);
        assert_eq!(t.css_selector, ".hero .cta");

        let t = translate_selector("hero cta");
        assert_eq!(t.css_selector, ".hero .cta");
    }

    #[test]
    fn combinators_and_lists() {
        let t = translate("main>section3 row2, any-marquee", &Action::Replace);
        assert_eq!(
            t.css_selector,
            "main > div:nth-child(3) > div:nth-child(2) , [class*=\"marquee\"]"
        );
        let t = translate("header>ul>li2", &Action::Remove);
        assert_eq!(t.css_selector, "header > ul > li:nth-child(2)");
    }

    #[test]
    fn modifiers_are_split_off() {
        let t = translate("section1 primary-cta #_mobile_desktop", &Action::Remove);
        assert_eq!(t.css_selector, "main > div:nth-child(1) strong a");
        assert_eq!(t.modifiers, ["mobile", "desktop"]);
    }
}
