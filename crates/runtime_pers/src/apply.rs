//! Streaming application of resolved commands to a page.

use std::cell::Cell;
use std::fmt;
use std::io::{self, Read, Write};

use core_types::{Action, ResolvedCommand};
use html::{
    Comment, CommentHandler, ContentType, Element, ElementHandler, HtmlRewriter, SelectorList,
};

use crate::config::{DEFAULT_READ_CHUNK_SIZE, ProvenanceConfig};

const LOG_TARGET: &str = "runtime_pers.apply";

#[derive(Debug)]
pub enum ApplyError {
    Io(io::Error),
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyError::Io(err) => write!(f, "rewrite stream failed: {err}"),
        }
    }
}

impl std::error::Error for ApplyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplyError::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for ApplyError {
    fn from(err: io::Error) -> Self {
        ApplyError::Io(err)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Commands whose selector was registered with the rewriter.
    pub registered: usize,
    /// Commands skipped because their selector cannot be streamed.
    pub skipped: usize,
    /// Handler invocations across the page.
    pub matched: usize,
    /// Whether `<head>` received the provenance markers.
    pub provenance_added: bool,
}

struct RemoveElement<'a> {
    hits: &'a Cell<usize>,
}

impl ElementHandler for RemoveElement<'_> {
    fn element(&mut self, el: &mut Element<'_>) {
        self.hits.set(self.hits.get() + 1);
        el.remove();
    }
}

/// Also used for fragments: the anchor's children become the fetched markup.
struct ReplaceContent<'a> {
    content: &'a str,
    hits: &'a Cell<usize>,
}

impl ElementHandler for ReplaceContent<'_> {
    fn element(&mut self, el: &mut Element<'_>) {
        self.hits.set(self.hits.get() + 1);
        el.set_inner_content(self.content, ContentType::Html);
    }
}

struct SetAttribute<'a> {
    name: &'a str,
    value: &'a str,
    hits: &'a Cell<usize>,
}

impl ElementHandler for SetAttribute<'_> {
    fn element(&mut self, el: &mut Element<'_>) {
        self.hits.set(self.hits.get() + 1);
        el.set_attribute(self.name, self.value);
    }
}

/// Places fragment markup after its `<!-- fragment {path} start -->` marker.
struct InsertAfterMarker<'a> {
    marker: String,
    content: &'a str,
    hits: &'a Cell<usize>,
}

impl CommentHandler for InsertAfterMarker<'_> {
    fn comment(&mut self, comment: &mut Comment<'_>) {
        if comment.text().trim() != self.marker {
            return;
        }
        self.hits.set(self.hits.get() + 1);
        comment.after(self.content, ContentType::Html);
    }
}

/// Trimmed comment text marking where the fragment for `path` starts.
pub fn fragment_marker(path: &str) -> String {
    format!("fragment {path} start")
}

struct HeadProvenance<'a> {
    markup: String,
    done: &'a Cell<bool>,
}

impl ElementHandler for HeadProvenance<'_> {
    fn element(&mut self, el: &mut Element<'_>) {
        if self.done.replace(true) {
            return;
        }
        el.append(&self.markup, ContentType::Html);
    }
}

fn command_handler<'a>(
    command: &'a ResolvedCommand,
    hits: &'a Cell<usize>,
) -> Option<Box<dyn ElementHandler + 'a>> {
    match &command.action {
        Action::Remove => Some(Box::new(RemoveElement { hits })),
        Action::Replace | Action::Fragment => Some(Box::new(ReplaceContent {
            content: &command.content,
            hits,
        })),
        Action::UpdateAttribute => {
            let name = command.attribute_name.as_deref().filter(|n| !n.is_empty())?;
            Some(Box::new(SetAttribute {
                name,
                value: &command.content,
                hits,
            }))
        }
        Action::Other(_) => None,
    }
}

/// Rewrites `page` into `out`, reading `DEFAULT_READ_CHUNK_SIZE` bytes at a time.
pub fn apply(
    page: impl Read,
    commands: &[ResolvedCommand],
    provenance: &ProvenanceConfig,
    out: impl Write,
) -> Result<ApplyStats, ApplyError> {
    apply_chunked(page, commands, provenance, DEFAULT_READ_CHUNK_SIZE, out)
}

pub fn apply_chunked(
    mut page: impl Read,
    commands: &[ResolvedCommand],
    provenance: &ProvenanceConfig,
    chunk_size: usize,
    out: impl Write,
) -> Result<ApplyStats, ApplyError> {
    let hits = Cell::new(0usize);
    let head_done = Cell::new(false);
    let mut stats = ApplyStats::default();

    let mut handlers: Vec<(SelectorList, Box<dyn ElementHandler + '_>)> =
        Vec::with_capacity(commands.len() + 1);
    if let Ok(head) = SelectorList::parse("head") {
        handlers.push((
            head,
            Box::new(HeadProvenance {
                markup: format!("{}{}", provenance.meta, provenance.script),
                done: &head_done,
            }),
        ));
    }

    let mut comment_handlers: Vec<Box<dyn CommentHandler + '_>> = Vec::new();
    for command in commands {
        if let (Action::Fragment, Some(path)) = (&command.action, &command.fragment_path) {
            comment_handlers.push(Box::new(InsertAfterMarker {
                marker: fragment_marker(path),
                content: &command.content,
                hits: &hits,
            }));
        }
        let selector = match SelectorList::parse(&command.css_selector) {
            Ok(selector) => selector,
            Err(err) => {
                log::warn!(target: LOG_TARGET, "skipping {} command: {err}", command.action);
                stats.skipped += 1;
                continue;
            }
        };
        let Some(handler) = command_handler(command, &hits) else {
            log::debug!(
                target: LOG_TARGET,
                "no handler for {} on {:?}",
                command.action,
                command.css_selector
            );
            stats.skipped += 1;
            continue;
        };
        handlers.push((selector, handler));
        stats.registered += 1;
    }

    let mut rewriter = HtmlRewriter::with_comment_handlers(handlers, comment_handlers, out);
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = match page.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        rewriter.write(&buf[..n])?;
    }
    rewriter.end()?;

    stats.matched = hits.get();
    stats.provenance_added = head_done.get();
    log::debug!(target: LOG_TARGET, "apply stats: {stats:?}");
    Ok(stats)
}

/// In-memory [`apply`].
pub fn apply_str(
    page: &str,
    commands: &[ResolvedCommand],
    provenance: &ProvenanceConfig,
) -> Result<(String, ApplyStats), ApplyError> {
    let mut out = Vec::with_capacity(page.len());
    let stats = apply(page.as_bytes(), commands, provenance, &mut out)?;
    let text = String::from_utf8(out)
        .map_err(|err| ApplyError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))?;
    Ok((text, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(action: Action, css: &str, content: &str, attr: Option<&str>) -> ResolvedCommand {
        ResolvedCommand {
            action,
            css_selector: css.to_string(),
            content: content.to_string(),
            attribute_name: attr.map(str::to_string),
            fragment_path: None,
        }
    }

    const MARKERS: &str = "<meta name=\"edge-personalized\" content=\"true\" />\
<script>window.edgePersonalizationApplied = true;</script>";

    #[test]
    fn head_gets_markers_once_without_commands() {
        let page = "<html><head><title>t</title></head><body><head></head></body></html>";
        let (out, stats) = apply_str(page, &[], &ProvenanceConfig::default()).unwrap();
        assert_eq!(out.matches("edge-personalized").count(), 1, "got: {out}");
        assert!(out.contains(&format!("<title>t</title>{MARKERS}</head>")), "got: {out}");
        assert!(stats.provenance_added);
        assert_eq!(stats.matched, 0);
    }

    #[test]
    fn every_action_kind() {
        let page = "<head></head><body><div class=\"my-banner\"><h2>Old</h2></div>\
<strong><a href=\"/buy\">Buy</a></strong><em><a href=\"/more\">More</a></em>\
<p><a href=\"https://x.test/fragments/promo\">promo</a></p></body>";
        let commands = [
            cmd(Action::Replace, ".my-banner", "<p>Hi</p>", None),
            cmd(Action::Remove, "em a", "", None),
            cmd(Action::UpdateAttribute, "strong a", "/sale", Some("href")),
            cmd(Action::Fragment, "a[href$=\"/fragments/promo\"]", "<b>P</b>", None),
        ];
        let (out, stats) = apply_str(page, &commands, &ProvenanceConfig::default()).unwrap();
        assert_eq!(
            out,
            format!(
                "<head>{MARKERS}</head><body><div class=\"my-banner\"><p>Hi</p></div>\
<strong><a href=\"/sale\">Buy</a></strong><em></em>\
<p><a href=\"https://x.test/fragments/promo\"><b>P</b></a></p></body>"
            )
        );
        assert_eq!(stats.registered, 4);
        assert_eq!(stats.matched, 4);
    }

    #[test]
    fn fragments_land_after_comment_markers() {
        let page = "<head></head><main><!-- fragment /fragments/promo start -->\
<p>default</p><!-- fragment /fragments/promo end --><!-- fragment /other start --></main>";
        let mut fragment = cmd(Action::Fragment, "a[href$=\"/fragments/promo\"]", "<b>P</b>", None);
        fragment.fragment_path = Some("/fragments/promo".to_string());
        let (out, stats) = apply_str(page, &[fragment], &ProvenanceConfig::default()).unwrap();
        assert_eq!(
            out,
            format!(
                "<head>{MARKERS}</head><main><!-- fragment /fragments/promo start --><b>P</b>\
<p>default</p><!-- fragment /fragments/promo end --><!-- fragment /other start --></main>"
            )
        );
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.registered, 1);
    }

    #[test]
    fn unstreamable_selectors_are_skipped() {
        let page = "<main><div><em><a>x</a></em></div></main>";
        let commands = [
            cmd(Action::Remove, "*:has(> em a, > strong a)", "", None),
            cmd(Action::Replace, "em a", "y", None),
        ];
        let (out, stats) = apply_str(page, &commands, &ProvenanceConfig::default()).unwrap();
        assert_eq!(out, "<main><div><em><a>y</a></em></div></main>");
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.registered, 1);
        assert!(!stats.provenance_added);
    }

    #[test]
    fn attribute_commands_without_a_name_are_skipped() {
        let commands = [cmd(Action::UpdateAttribute, "a", "x", None)];
        let (out, stats) = apply_str("<a>x</a>", &commands, &ProvenanceConfig::default()).unwrap();
        assert_eq!(out, "<a>x</a>");
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn tiny_read_chunks_give_the_same_page() {
        let page = "<!doctype html><html><head><title>T</title></head><body>\
<div class=\"hero\"><h1>Hi</h1></div></body></html>";
        let commands = [cmd(Action::Replace, ".hero h1", "Hello", None)];
        let provenance = ProvenanceConfig::default();
        let (whole, _) = apply_str(page, &commands, &provenance).unwrap();
        for chunk_size in [1, 2, 5, 9] {
            let mut out = Vec::new();
            apply_chunked(page.as_bytes(), &commands, &provenance, chunk_size, &mut out).unwrap();
            assert_eq!(String::from_utf8(out).unwrap(), whole, "chunk size {chunk_size}");
        }
    }
}
