//! Turns normalized decisions plus fetched fragment markup into resolved
//! commands: commands first, in input order, then fragments.

use core_types::{Action, Command, FragmentContent, ProcessedData, ResolvedCommand};
use selector_dsl::{TranslatedSelector, translate, translate_selector};
use serde_json::{Map, Value};

const LOG_TARGET: &str = "runtime_pers.build";

pub fn build(data: &ProcessedData, fragments: &FragmentContent) -> Vec<ResolvedCommand> {
    let mut resolved = Vec::with_capacity(data.commands.len() + data.fragments.len());

    for command in &data.commands {
        build_command(command, &mut resolved);
    }

    for fragment in &data.fragments {
        let Some(html) = fragments.get(&fragment.selector) else {
            log::debug!(
                target: LOG_TARGET,
                "no content for fragment {}; dropped",
                fragment.selector
            );
            continue;
        };
        resolved.push(ResolvedCommand {
            action: Action::Fragment,
            css_selector: anchor_selector(&fragment.selector),
            content: html.clone(),
            attribute_name: None,
            fragment_path: Some(fragment.selector.clone()),
        });
    }
    resolved
}

/// Selector for the link that marks where a fragment goes.
pub fn anchor_selector(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for ch in path.chars() {
        if matches!(ch, '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    format!("a[href$=\"{escaped}\"]")
}

fn build_command(command: &Command, out: &mut Vec<ResolvedCommand>) {
    match command.action {
        Action::Remove | Action::Replace => {
            let translated = translate(&command.selector, &command.action);
            if !usable(&translated, command) {
                return;
            }
            out.push(ResolvedCommand {
                action: command.action.clone(),
                css_selector: translated.css_selector,
                content: command.content.clone(),
                attribute_name: None,
                fragment_path: None,
            });
        }
        Action::UpdateAttribute => match legacy_attributes(&command.content) {
            Some(entries) => {
                let translated = translate_selector(&command.selector);
                if !usable(&translated, command) {
                    return;
                }
                for (name, value) in entries {
                    out.push(ResolvedCommand {
                        action: Action::UpdateAttribute,
                        css_selector: translated.css_selector.clone(),
                        content: value,
                        attribute_name: Some(name),
                        fragment_path: None,
                    });
                }
            }
            None => {
                let translated = translate(&command.selector, &command.action);
                if !usable(&translated, command) {
                    return;
                }
                let Some(attribute_name) = translated.attribute_name else {
                    log::debug!(
                        target: LOG_TARGET,
                        "no attribute name in {:?}; dropped",
                        command.selector
                    );
                    return;
                };
                out.push(ResolvedCommand {
                    action: Action::UpdateAttribute,
                    css_selector: translated.css_selector,
                    content: command.content.clone(),
                    attribute_name: Some(attribute_name),
                    fragment_path: None,
                });
            }
        },
        Action::Fragment | Action::Other(_) => {
            log::debug!(
                target: LOG_TARGET,
                "action {} is not a command; dropped",
                command.action
            );
        }
    }
}

fn usable(translated: &TranslatedSelector, command: &Command) -> bool {
    if !translated.modifiers.is_empty() {
        log::debug!(
            target: LOG_TARGET,
            "{:?} carries modifiers {:?}",
            command.selector,
            translated.modifiers
        );
    }
    if translated.css_selector.is_empty() {
        log::debug!(
            target: LOG_TARGET,
            "{:?} translated to an empty selector; dropped",
            command.selector
        );
        return false;
    }
    true
}

/// `{"attr": value, ...}` content: one entry per attribute, `null` skipped.
fn legacy_attributes(content: &str) -> Option<Vec<(String, String)>> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(content) else {
        return None;
    };
    Some(stringify_entries(map))
}

fn stringify_entries(map: Map<String, Value>) -> Vec<(String, String)> {
    map.into_iter()
        .filter_map(|(name, value)| {
            let value = match value {
                Value::Null => return None,
                Value::String(s) => s,
                other => other.to_string(),
            };
            Some((name, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{Fragment, SelectorKind};

    fn command(action: Action, selector: &str, content: &str) -> Command {
        Command {
            action,
            selector: selector.to_string(),
            content: content.to_string(),
            selector_kind: SelectorKind::Other,
            manifest_id: None,
            activity_id: None,
        }
    }

    fn fragment(selector: &str) -> Fragment {
        Fragment {
            selector: selector.to_string(),
            source_path: format!("{selector}-b"),
            action: Action::Replace,
            manifest_id: None,
            activity_id: None,
        }
    }

    #[test]
    fn commands_translate_and_fragments_follow() {
        let data = ProcessedData {
            fragments: vec![fragment("/fragments/promo"), fragment("/fragments/absent")],
            commands: vec![
                command(Action::Replace, "section2", "<p>x</p>"),
                command(Action::Remove, "primary-cta", ""),
            ],
        };
        let mut content = FragmentContent::new();
        content.insert("/fragments/promo".to_string(), "<b>promo</b>".to_string());

        let out = build(&data, &content);
        assert_eq!(out.len(), 3, "got: {out:?}");
        assert_eq!(out[0].css_selector, "main > div:nth-child(2)");
        assert_eq!(out[0].content, "<p>x</p>");
        assert_eq!(out[1].action, Action::Remove);
        assert_eq!(out[1].css_selector, "strong a");
        assert_eq!(out[2].action, Action::Fragment);
        assert_eq!(out[2].css_selector, "a[href$=\"/fragments/promo\"]");
        assert_eq!(out[2].content, "<b>promo</b>");
        assert_eq!(out[2].fragment_path.as_deref(), Some("/fragments/promo"));
        assert_eq!(out[0].fragment_path, None);
    }

    #[test]
    fn structural_attribute_form() {
        let data = ProcessedData {
            fragments: Vec::new(),
            commands: vec![
                command(Action::UpdateAttribute, "foo.attrName", "v"),
                command(Action::UpdateAttribute, "", "v"),
            ],
        };
        let out = build(&data, &FragmentContent::new());
        assert_eq!(out.len(), 1, "got: {out:?}");
        assert_eq!(out[0].css_selector, ".foo");
        assert_eq!(out[0].attribute_name.as_deref(), Some("attrName"));
        assert_eq!(out[0].content, "v");
    }

    #[test]
    fn legacy_attribute_object_expands_in_order() {
        let data = ProcessedData {
            fragments: Vec::new(),
            commands: vec![command(
                Action::UpdateAttribute,
                "my-link",
                r#"{"href": "/sale", "data-n": 3, "hidden": true, "title": null}"#,
            )],
        };
        let out = build(&data, &FragmentContent::new());
        let attrs: Vec<_> = out
            .iter()
            .map(|c| (c.attribute_name.as_deref().unwrap(), c.content.as_str()))
            .collect();
        assert_eq!(attrs, [("href", "/sale"), ("data-n", "3"), ("hidden", "true")]);
        assert!(out.iter().all(|c| c.css_selector == ".my-link"));
    }

    #[test]
    fn anchor_selectors_escape_quotes() {
        assert_eq!(anchor_selector("/a\"b"), "a[href$=\"/a\\\"b\"]");
        assert!(html::SelectorList::parse(&anchor_selector("/a\"b")).is_ok());
    }

    #[test]
    fn other_actions_are_dropped() {
        let data = ProcessedData {
            fragments: Vec::new(),
            commands: vec![command(Action::Other("append".into()), "div", "x")],
        };
        assert!(build(&data, &FragmentContent::new()).is_empty());
    }
}
