//! Incremental markup lexer.
//!
//! Input arrives in arbitrary chunks; the lexer keeps only the bytes of the
//! token it has not finished yet. Every token carries its exact source bytes
//! so untouched markup can be written back unchanged.
//!
//! Known limitations (intentional):
//! - No HTML5 parse-error recovery beyond what a rewriter needs: a `<` that
//!   does not start a tag, comment or declaration is plain text.
//! - Raw-text elements (`script`, `style`, `textarea`, `title`) end at the
//!   first `</name` followed by whitespace, `/` or `>`.

use memchr::{memchr, memmem};

const COMMENT_OPEN: &[u8] = b"<!--";
const COMMENT_CLOSE: &[u8] = b"-->";

const RAWTEXT_ELEMENTS: [&str; 4] = ["script", "style", "textarea", "title"];

pub(crate) fn is_rawtext_element(name: &str) -> bool {
    RAWTEXT_ELEMENTS.contains(&name)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Attribute {
    /// ASCII-lowercased.
    pub name: String,
    /// As written; used when the tag is serialized again.
    pub raw_name: String,
    /// Undecoded value text, without quotes.
    pub value: Option<String>,
    pub quote: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct StartTag {
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub self_closing: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Text,
    Comment,
    /// `<!DOCTYPE ...>`, `<?...>` and other markup declarations.
    Declaration,
    StartTag(StartTag),
    EndTag { name: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub raw: Vec<u8>,
}

#[derive(Default)]
pub(crate) struct Lexer {
    buf: Vec<u8>,
    pos: usize,
    /// Open raw-text element; its close tag is the only markup recognised.
    rawtext: Option<&'static str>,
}

enum Scan {
    /// Token ends at this offset.
    Complete(usize, TokenKind),
    NeedMore,
}

impl Lexer {
    pub(crate) fn feed(&mut self, chunk: &[u8]) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes received but not yet returned as tokens.
    pub(crate) fn pending(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Next complete token. With `eof`, incomplete trailing input is returned
    /// as text instead of waiting for more.
    pub(crate) fn next_token(&mut self, eof: bool) -> Option<Token> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let scan = match self.rawtext {
            Some(name) => self.scan_rawtext(name, eof),
            None => self.scan_markup(eof),
        };
        let (end, kind) = match scan {
            Scan::Complete(end, kind) => (end, kind),
            Scan::NeedMore if eof => (self.buf.len(), TokenKind::Text),
            Scan::NeedMore => return None,
        };

        match &kind {
            TokenKind::StartTag(tag) => {
                self.rawtext = RAWTEXT_ELEMENTS.iter().copied().find(|n| *n == tag.name);
            }
            TokenKind::EndTag { .. } => self.rawtext = None,
            _ => {}
        }

        let raw = self.buf[self.pos..end].to_vec();
        self.pos = end;
        log::trace!(target: "html.lexer", "token {kind:?} ({} bytes)", raw.len());
        Some(Token { kind, raw })
    }

    fn scan_rawtext(&self, name: &str, eof: bool) -> Scan {
        let hay = &self.buf[self.pos..];
        if let Some(rel) = find_close_tag(hay, name.as_bytes()) {
            if rel > 0 {
                return Scan::Complete(self.pos + rel, TokenKind::Text);
            }
            return self.scan_end_tag();
        }
        if eof {
            return Scan::Complete(self.buf.len(), TokenKind::Text);
        }
        // Hold back enough bytes to recognise a close tag split across chunks.
        let keep = name.len() + 3;
        if hay.len() > keep {
            return Scan::Complete(self.buf.len() - keep, TokenKind::Text);
        }
        Scan::NeedMore
    }

    fn scan_markup(&self, eof: bool) -> Scan {
        let hay = &self.buf[self.pos..];
        if hay[0] != b'<' {
            let end = memchr(b'<', hay).unwrap_or(hay.len());
            return Scan::Complete(self.pos + end, TokenKind::Text);
        }

        let Some(&next) = hay.get(1) else {
            return if eof {
                Scan::Complete(self.pos + 1, TokenKind::Text)
            } else {
                Scan::NeedMore
            };
        };
        match next {
            b'!' => {
                if hay.len() < COMMENT_OPEN.len() && COMMENT_OPEN.starts_with(hay) {
                    return Scan::NeedMore;
                }
                if hay.starts_with(COMMENT_OPEN) {
                    return match memmem::find(&hay[2..], COMMENT_CLOSE) {
                        Some(rel) => Scan::Complete(
                            self.pos + 2 + rel + COMMENT_CLOSE.len(),
                            TokenKind::Comment,
                        ),
                        None => Scan::NeedMore,
                    };
                }
                self.scan_declaration()
            }
            b'?' => self.scan_declaration(),
            b'/' => match hay.get(2) {
                None => Scan::NeedMore,
                Some(b) if b.is_ascii_alphabetic() => self.scan_end_tag(),
                Some(_) => self.scan_declaration(),
            },
            b if b.is_ascii_alphabetic() => self.scan_start_tag(),
            _ => Scan::Complete(self.pos + 1, TokenKind::Text),
        }
    }

    fn scan_declaration(&self) -> Scan {
        match memchr(b'>', &self.buf[self.pos..]) {
            Some(rel) => Scan::Complete(self.pos + rel + 1, TokenKind::Declaration),
            None => Scan::NeedMore,
        }
    }

    fn scan_end_tag(&self) -> Scan {
        let hay = &self.buf[self.pos..];
        let Some(close) = memchr(b'>', hay) else {
            return Scan::NeedMore;
        };
        let name_end = hay[2..close]
            .iter()
            .position(|b| b.is_ascii_whitespace() || *b == b'/')
            .map_or(close, |p| p + 2);
        let name = String::from_utf8_lossy(&hay[2..name_end]).to_ascii_lowercase();
        Scan::Complete(self.pos + close + 1, TokenKind::EndTag { name })
    }

    fn scan_start_tag(&self) -> Scan {
        let hay = &self.buf[self.pos..];
        match parse_start_tag(hay) {
            Some((len, tag)) => Scan::Complete(self.pos + len, TokenKind::StartTag(tag)),
            None => Scan::NeedMore,
        }
    }
}

fn is_tag_name_end(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'/' || b == b'>'
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Parses `<name attrs... >` at the start of `bytes`. `None` means the tag
/// is not complete yet.
fn parse_start_tag(bytes: &[u8]) -> Option<(usize, StartTag)> {
    let mut i = 1;
    while i < bytes.len() && !is_tag_name_end(bytes[i]) {
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }
    let name = String::from_utf8_lossy(&bytes[1..i]).to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut self_closing = false;
    loop {
        i = skip_whitespace(bytes, i);
        match bytes.get(i)? {
            b'>' => {
                return Some((
                    i + 1,
                    StartTag {
                        name,
                        attrs,
                        self_closing,
                    },
                ));
            }
            b'/' => {
                self_closing = bytes.get(i + 1)? == &b'>';
                i += 1;
                continue;
            }
            _ => {}
        }
        self_closing = false;

        let name_start = i;
        i += 1;
        while i < bytes.len() && !is_tag_name_end(bytes[i]) && bytes[i] != b'=' {
            i += 1;
        }
        let raw_name = String::from_utf8_lossy(&bytes[name_start..i]).into_owned();

        let after_name = skip_whitespace(bytes, i);
        if after_name >= bytes.len() {
            return None;
        }
        let (value, quote) = if bytes[after_name] == b'=' {
            let value_start = skip_whitespace(bytes, after_name + 1);
            let first = *bytes.get(value_start)?;
            if first == b'"' || first == b'\'' {
                let rel = memchr(first, &bytes[value_start + 1..])?;
                let value = &bytes[value_start + 1..value_start + 1 + rel];
                i = value_start + rel + 2;
                (Some(String::from_utf8_lossy(value).into_owned()), Some(first))
            } else {
                let mut end = value_start;
                while end < bytes.len() && !bytes[end].is_ascii_whitespace() && bytes[end] != b'>'
                {
                    end += 1;
                }
                if end >= bytes.len() {
                    return None;
                }
                i = end;
                (
                    Some(String::from_utf8_lossy(&bytes[value_start..end]).into_owned()),
                    None,
                )
            }
        } else {
            (None, None)
        };

        attrs.push(Attribute {
            name: raw_name.to_ascii_lowercase(),
            raw_name,
            value,
            quote,
        });
    }
}

/// Offset of `</name` followed by a tag-name terminator.
fn find_close_tag(hay: &[u8], name: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < hay.len() {
        let rel = memchr(b'<', &hay[i..])?;
        i += rel;
        let name_start = i + 2;
        let after = name_start + name.len();
        if hay.get(i + 1) == Some(&b'/')
            && hay.len() > after
            && hay[name_start..after].eq_ignore_ascii_case(name)
            && is_tag_name_end(hay[after])
        {
            return Some(i);
        }
        i += 1;
    }
    None
}
