pub mod matching;
pub mod syntax;

// Re-exports so other crates can just use `css::...` nicely.
pub use matching::MatchElement;
pub use syntax::{PositionFilter, SelectorError, SelectorList};
