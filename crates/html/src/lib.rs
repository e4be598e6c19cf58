//! Streaming HTML rewriting.
//!
//! [`HtmlRewriter`] consumes a document chunk by chunk and writes it back
//! out unchanged except where a registered [`ElementHandler`] asked for an
//! edit. Handlers are bound to CSS selectors from the `css` crate and see each
//! matching element as soon as its start tag has been read;
//! [`CommentHandler`]s see every comment.

#[cfg(test)]
mod chunker;
mod element;
mod entities;
mod lexer;
mod rewriter;
mod tree;

pub use css::{SelectorError, SelectorList};
pub use element::{Comment, CommentHandler, ContentType, Element, ElementHandler};
pub use entities::{decode_entities, escape_attribute_value, escape_text};
pub use rewriter::{HtmlRewriter, rewrite_str};
