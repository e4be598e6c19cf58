use crate::entities::{decode_entities, escape_attribute_value, escape_text};
use crate::lexer::Attribute;

/// How inserted content is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    /// Inserted verbatim as markup.
    Html,
    /// Escaped and inserted as characters.
    Text,
}

impl ContentType {
    fn render(self, content: &str) -> String {
        match self {
            ContentType::Html => content.to_string(),
            ContentType::Text => escape_text(content),
        }
    }
}

/// Callback run when an element matching its selector starts.
pub trait ElementHandler {
    fn element(&mut self, el: &mut Element<'_>);
}

impl<F> ElementHandler for F
where
    F: FnMut(&mut Element<'_>),
{
    fn element(&mut self, el: &mut Element<'_>) {
        (self)(el)
    }
}

/// Callback run for every comment outside dropped content.
pub trait CommentHandler {
    fn comment(&mut self, comment: &mut Comment<'_>);
}

impl<F> CommentHandler for F
where
    F: FnMut(&mut Comment<'_>),
{
    fn comment(&mut self, comment: &mut Comment<'_>) {
        (self)(comment)
    }
}

/// A comment as seen by [`CommentHandler`]s. The comment itself is always
/// kept; handlers can only add content after it.
#[derive(Debug)]
pub struct Comment<'a> {
    text: &'a str,
    after: String,
}

impl<'a> Comment<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Comment {
            text,
            after: String::new(),
        }
    }

    /// Text between `<!--` and `-->`, untrimmed.
    pub fn text(&self) -> &str {
        self.text
    }

    /// Inserts content right after the comment. Calls accumulate in order.
    pub fn after(&mut self, content: &str, content_type: ContentType) {
        self.after.push_str(&content_type.render(content));
    }

    pub(crate) fn into_after(self) -> String {
        self.after
    }
}

/// Mutable view of a start tag, handed to [`ElementHandler`]s.
///
/// Edits made here are applied when the last handler for the element has
/// run. Several handlers see each other's edits in registration order.
#[derive(Debug)]
pub struct Element<'a> {
    name: &'a str,
    attrs: &'a mut Vec<Attribute>,
    attrs_modified: bool,
    removed: bool,
    inner_content: Option<String>,
    appended: String,
}

impl<'a> Element<'a> {
    pub(crate) fn new(name: &'a str, attrs: &'a mut Vec<Attribute>) -> Self {
        Element {
            name,
            attrs,
            attrs_modified: false,
            removed: false,
            inner_content: None,
            appended: String::new(),
        }
    }

    /// ASCII-lowercased tag name.
    pub fn tag_name(&self) -> &str {
        self.name
    }

    /// Decoded value of the first attribute called `name`; valueless
    /// attributes read as the empty string.
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        let attr = self.find(name)?;
        Some(attr.value.as_deref().map(decode_entities).unwrap_or_default())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Sets or overwrites an attribute; `value` is escaped for you.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        let escaped = escape_attribute_value(value);
        let lower = name.to_ascii_lowercase();
        match self.attrs.iter_mut().find(|a| a.name == lower) {
            Some(attr) => {
                attr.value = Some(escaped);
                attr.quote = Some(b'"');
            }
            None => self.attrs.push(Attribute {
                name: lower,
                raw_name: name.to_string(),
                value: Some(escaped),
                quote: Some(b'"'),
            }),
        }
        self.attrs_modified = true;
    }

    pub fn remove_attribute(&mut self, name: &str) {
        let lower = name.to_ascii_lowercase();
        let before = self.attrs.len();
        self.attrs.retain(|a| a.name != lower);
        self.attrs_modified |= self.attrs.len() != before;
    }

    /// Replaces the element's children. The last call wins.
    pub fn set_inner_content(&mut self, content: &str, content_type: ContentType) {
        self.inner_content = Some(content_type.render(content));
    }

    /// Inserts content after the existing children, before the end tag.
    pub fn append(&mut self, content: &str, content_type: ContentType) {
        self.appended.push_str(&content_type.render(content));
    }

    /// Drops the element and everything inside it.
    pub fn remove(&mut self) {
        self.removed = true;
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    fn find(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn into_edits(self) -> ElementEdits {
        ElementEdits {
            attrs_modified: self.attrs_modified,
            removed: self.removed,
            inner_content: self.inner_content,
            appended: self.appended,
        }
    }
}

/// What the handlers asked for, detached from the borrowed tag.
pub(crate) struct ElementEdits {
    pub attrs_modified: bool,
    pub removed: bool,
    pub inner_content: Option<String>,
    pub appended: String,
}

/// Writes a start tag back out from its (possibly edited) attributes.
pub(crate) fn serialize_start_tag(
    name: &str,
    attrs: &[Attribute],
    self_closing: bool,
    out: &mut Vec<u8>,
) {
    out.push(b'<');
    out.extend_from_slice(name.as_bytes());
    for attr in attrs {
        out.push(b' ');
        out.extend_from_slice(attr.raw_name.as_bytes());
        let Some(value) = &attr.value else {
            continue;
        };
        out.push(b'=');
        match attr.quote {
            Some(q) => {
                out.push(q);
                out.extend_from_slice(value.as_bytes());
                out.push(q);
            }
            None => out.extend_from_slice(value.as_bytes()),
        }
    }
    if self_closing {
        out.extend_from_slice(b" /");
    }
    out.push(b'>');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(name: &str, value: Option<&str>, quote: Option<u8>) -> Attribute {
        Attribute {
            name: name.to_ascii_lowercase(),
            raw_name: name.to_string(),
            value: value.map(str::to_string),
            quote,
        }
    }

    #[test]
    fn attribute_access_decodes_and_set_escapes() {
        let mut attrs = vec![
            attr("Href", Some("/a?x=1&amp;y=2"), Some(b'\'')),
            attr("hidden", None, None),
        ];
        let mut el = Element::new("a", &mut attrs);
        assert_eq!(el.get_attribute("href").as_deref(), Some("/a?x=1&y=2"));
        assert_eq!(el.get_attribute("HIDDEN").as_deref(), Some(""));
        assert!(!el.has_attribute("title"));

        el.set_attribute("title", "say \"hi\"");
        el.set_attribute("HREF", "/b");
        el.remove_attribute("hidden");
        let edits = el.into_edits();
        assert!(edits.attrs_modified);

        let mut out = Vec::new();
        serialize_start_tag("a", &attrs, false, &mut out);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<a Href=\"/b\" title=\"say &quot;hi&quot;\">"
        );
    }

    #[test]
    fn content_edits() {
        let mut attrs = Vec::new();
        let mut el = Element::new("div", &mut attrs);
        el.set_inner_content("<b>first</b>", ContentType::Html);
        el.set_inner_content("a < b", ContentType::Text);
        el.append("<i>tail</i>", ContentType::Html);
        assert!(!el.is_removed());
        let edits = el.into_edits();
        assert_eq!(edits.inner_content.as_deref(), Some("a &lt; b"));
        assert_eq!(edits.appended, "<i>tail</i>");
        assert!(!edits.attrs_modified);
    }

    #[test]
    fn comment_insertions_accumulate() {
        let mut comment = Comment::new(" fragment /x start ");
        assert_eq!(comment.text(), " fragment /x start ");
        comment.after("<b>1</b>", ContentType::Html);
        comment.after("2 < 3", ContentType::Text);
        assert_eq!(comment.into_after(), "<b>1</b>2 &lt; 3");
    }

    #[test]
    fn removing_a_missing_attribute_is_not_an_edit() {
        let mut attrs = vec![attr("id", Some("x"), Some(b'"'))];
        let mut el = Element::new("p", &mut attrs);
        el.remove_attribute("class");
        assert!(!el.into_edits().attrs_modified);
    }
}
