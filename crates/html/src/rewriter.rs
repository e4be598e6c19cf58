//! Single-pass streaming rewriter.
//!
//! Markup is lexed incrementally and written to the sink as soon as each
//! token is complete. Handlers run when a matching start tag is seen; their
//! edits are applied to that tag and, for content changes, to everything up
//! to the matching end tag. Nothing but the open-element stack is retained.

use std::io::{self, Write};

use css::{MatchElement, PositionFilter, SelectorList};

use crate::element::{Comment, CommentHandler, Element, ElementHandler, serialize_start_tag};
use crate::entities::decode_entities;
use crate::lexer::{Lexer, StartTag, TokenKind, is_rawtext_element};
use crate::tree::{implied_ends, is_head_content, is_void_element};

const LOG_TARGET: &str = "html.rewriter";

struct Registration<'h> {
    selector: SelectorList,
    handler: Box<dyn ElementHandler + 'h>,
}

/// Element and filtered-element counts for the children seen so far.
#[derive(Default)]
struct Counters {
    elements: usize,
    filtered: Vec<usize>,
}

struct Frame {
    name: String,
    /// Original attributes, decoded, for matching.
    attrs: Vec<(String, String)>,
    sibling_index: usize,
    filtered: Vec<Option<usize>>,
    children: Counters,
    removed: bool,
    appended: String,
}

impl Frame {
    fn new(tag: &StartTag) -> Self {
        Frame {
            name: tag.name.clone(),
            attrs: tag
                .attrs
                .iter()
                .map(|a| {
                    let value = a.value.as_deref().map(decode_entities).unwrap_or_default();
                    (a.name.clone(), value)
                })
                .collect(),
            sibling_index: 0,
            filtered: Vec::new(),
            children: Counters::default(),
            removed: false,
            appended: String::new(),
        }
    }
}

impl MatchElement for Frame {
    fn local_name(&self) -> &str {
        &self.name
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn sibling_index(&self) -> usize {
        self.sibling_index
    }

    fn filtered_index(&self, slot: usize) -> Option<usize> {
        self.filtered.get(slot).copied().flatten()
    }
}

/// Counts `frame` among its parent's children.
fn assign_positions(counters: &mut Counters, filters: &[PositionFilter], frame: &mut Frame) {
    counters.elements += 1;
    frame.sibling_index = counters.elements;

    counters.filtered.resize(filters.len(), 0);
    frame.filtered = filters
        .iter()
        .map(|filter| {
            if !filter.matches(&*frame) {
                return None;
            }
            let count = &mut counters.filtered[filter.slot()];
            *count += 1;
            Some(*count)
        })
        .collect();
}

pub struct HtmlRewriter<'h, W: Write> {
    lexer: Lexer,
    handlers: Vec<Registration<'h>>,
    comment_handlers: Vec<Box<dyn CommentHandler + 'h>>,
    filters: Vec<PositionFilter>,
    stack: Vec<Frame>,
    root: Counters,
    /// Stack index of the element whose content is being dropped.
    suppressed_at: Option<usize>,
    out: W,
    scratch: Vec<u8>,
}

impl<'h, W: Write> HtmlRewriter<'h, W> {
    /// Handlers run in the order given when several match one element.
    pub fn new(handlers: Vec<(SelectorList, Box<dyn ElementHandler + 'h>)>, out: W) -> Self {
        Self::with_comment_handlers(handlers, Vec::new(), out)
    }

    /// Like [`HtmlRewriter::new`], also running `comment_handlers` in order on
    /// every comment.
    pub fn with_comment_handlers(
        handlers: Vec<(SelectorList, Box<dyn ElementHandler + 'h>)>,
        comment_handlers: Vec<Box<dyn CommentHandler + 'h>>,
        out: W,
    ) -> Self {
        let mut filters = Vec::new();
        let handlers = handlers
            .into_iter()
            .map(|(mut selector, handler)| {
                selector.bind_position_filters(&mut filters);
                Registration { selector, handler }
            })
            .collect();
        HtmlRewriter {
            lexer: Lexer::default(),
            handlers,
            comment_handlers,
            filters,
            stack: Vec::new(),
            root: Counters::default(),
            suppressed_at: None,
            out,
            scratch: Vec::new(),
        }
    }

    pub fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.lexer.feed(chunk);
        self.drain(false)
    }

    /// Flushes buffered input, closes every open element and returns the sink.
    pub fn end(mut self) -> io::Result<W> {
        log::trace!(
            target: LOG_TARGET,
            "end: {} bytes pending, {} open elements",
            self.lexer.pending(),
            self.stack.len()
        );
        self.drain(true)?;
        while !self.stack.is_empty() {
            self.pop_frame(None)?;
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn drain(&mut self, eof: bool) -> io::Result<()> {
        while let Some(token) = self.lexer.next_token(eof) {
            match token.kind {
                TokenKind::StartTag(tag) => self.start_tag(tag, &token.raw)?,
                TokenKind::EndTag { name } => self.end_tag(&name, &token.raw)?,
                TokenKind::Comment => self.comment(&token.raw)?,
                TokenKind::Text | TokenKind::Declaration => self.emit(&token.raw)?,
            }
        }
        Ok(())
    }

    fn emit(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.suppressed_at.is_none() {
            self.out.write_all(bytes)?;
        }
        Ok(())
    }

    fn comment(&mut self, raw: &[u8]) -> io::Result<()> {
        if self.suppressed_at.is_some() {
            return Ok(());
        }
        self.out.write_all(raw)?;
        if self.comment_handlers.is_empty() {
            return Ok(());
        }
        // `<!-->` and `<!--->` are complete comments with no text.
        let body = raw
            .get(4..raw.len().saturating_sub(3))
            .unwrap_or_default();
        let text = String::from_utf8_lossy(body);
        let mut comment = Comment::new(&text);
        for handler in &mut self.comment_handlers {
            handler.comment(&mut comment);
        }
        self.out.write_all(comment.into_after().as_bytes())
    }

    fn start_tag(&mut self, mut tag: StartTag, raw: &[u8]) -> io::Result<()> {
        self.close_implied(&tag.name)?;

        let mut frame = Frame::new(&tag);
        let counters = match self.stack.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.root,
        };
        assign_positions(counters, &self.filters, &mut frame);
        self.stack.push(frame);
        let top = self.stack.len() - 1;

        // `<script/>` and friends still open a raw-text element.
        let closes_now = is_void_element(&tag.name)
            || (tag.self_closing && !is_rawtext_element(&tag.name));

        if self.suppressed_at.is_some() {
            if closes_now {
                self.stack.pop();
            }
            return Ok(());
        }

        let mut element = Element::new(&tag.name, &mut tag.attrs);
        let mut matched = 0usize;
        for registration in &mut self.handlers {
            if registration.selector.matches(&self.stack) {
                registration.handler.element(&mut element);
                matched += 1;
            }
        }
        let edits = element.into_edits();
        if matched > 0 {
            log::trace!(target: LOG_TARGET, "<{}> matched {matched} handlers", tag.name);
        }

        if edits.removed {
            if closes_now {
                self.stack.pop();
            } else {
                self.stack[top].removed = true;
                self.suppressed_at = Some(top);
            }
            return Ok(());
        }

        if edits.attrs_modified {
            self.scratch.clear();
            serialize_start_tag(&tag.name, &tag.attrs, tag.self_closing, &mut self.scratch);
            self.out.write_all(&self.scratch)?;
        } else {
            self.out.write_all(raw)?;
        }

        if let Some(inner) = &edits.inner_content {
            self.out.write_all(inner.as_bytes())?;
            if !closes_now {
                self.suppressed_at = Some(top);
            }
        }

        if closes_now {
            self.out.write_all(edits.appended.as_bytes())?;
            self.stack.pop();
        } else {
            self.stack[top].appended = edits.appended;
        }
        Ok(())
    }

    fn close_implied(&mut self, name: &str) -> io::Result<()> {
        if name == "body" || !is_head_content(name) {
            if let Some(head) = self.stack.iter().rposition(|f| f.name == "head") {
                self.pop_to(head)?;
            }
        }
        for end in implied_ends(name) {
            let open = self.stack.iter().map(|f| f.name.as_str()).enumerate();
            if let Some(index) = end.find(open) {
                log::trace!(
                    target: LOG_TARGET,
                    "<{name}> implies </{}>",
                    self.stack[index].name
                );
                self.pop_to(index)?;
            }
        }
        Ok(())
    }

    fn end_tag(&mut self, name: &str, raw: &[u8]) -> io::Result<()> {
        let Some(index) = self.stack.iter().rposition(|f| f.name == name) else {
            return self.emit(raw);
        };
        while self.stack.len() > index + 1 {
            self.pop_frame(None)?;
        }
        self.pop_frame(Some(raw))
    }

    /// Pops frames down to and including `index` without end tags in the source.
    fn pop_to(&mut self, index: usize) -> io::Result<()> {
        while self.stack.len() > index {
            self.pop_frame(None)?;
        }
        Ok(())
    }

    fn pop_frame(&mut self, end_tag: Option<&[u8]>) -> io::Result<()> {
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };
        match self.suppressed_at {
            Some(at) if at == self.stack.len() => self.suppressed_at = None,
            Some(_) => return Ok(()),
            None => {}
        }
        if frame.removed {
            return Ok(());
        }
        self.out.write_all(frame.appended.as_bytes())?;
        if let Some(raw) = end_tag {
            self.out.write_all(raw)?;
        }
        Ok(())
    }
}

/// Rewrites a complete document in memory.
pub fn rewrite_str<'h>(
    html: &str,
    handlers: Vec<(SelectorList, Box<dyn ElementHandler + 'h>)>,
) -> io::Result<String> {
    let mut rewriter = HtmlRewriter::new(handlers, Vec::new());
    rewriter.write(html.as_bytes())?;
    let out = rewriter.end()?;
    String::from_utf8(out).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}
