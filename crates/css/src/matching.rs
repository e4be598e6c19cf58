use crate::syntax::{
    AttrCondition, AttrOp, Combinator, ComplexSelector, Compound, Nth, PositionFilter, Pseudo,
    SelectorList,
};

/// What the matcher needs to know about an open element.
///
/// Everything here must be known once the start tag has been read, which is
/// what makes matching possible in a single forward pass.
pub trait MatchElement {
    /// ASCII-lowercased tag name.
    fn local_name(&self) -> &str;
    /// Attribute value by ASCII-lowercased name.
    fn attribute(&self, name: &str) -> Option<&str>;
    /// 1-based position among element siblings.
    fn sibling_index(&self) -> usize;
    /// 1-based position among siblings matching the filter bound to `slot`,
    /// `None` when this element does not match that filter.
    fn filtered_index(&self, slot: usize) -> Option<usize>;

    fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }
}

impl SelectorList {
    /// Whether the last element of `path` (root first) matches.
    pub fn matches<E: MatchElement>(&self, path: &[E]) -> bool {
        if path.is_empty() {
            return false;
        }
        self.alternatives
            .iter()
            .any(|complex| matches_complex(complex, path))
    }
}

impl PositionFilter {
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Whether `element` counts towards this filter's sibling positions.
    pub fn matches<E: MatchElement>(&self, element: &E) -> bool {
        self.alternatives
            .iter()
            .any(|compound| matches_simple(compound, element))
    }
}

fn matches_complex<E: MatchElement>(complex: &ComplexSelector, path: &[E]) -> bool {
    let last = complex.parts.len() - 1;
    match_part(complex, last, path, path.len() - 1)
}

/// Right-to-left with backtracking: descendant combinators try every
/// ancestor, not just the nearest match.
fn match_part<E: MatchElement>(
    complex: &ComplexSelector,
    part: usize,
    path: &[E],
    at: usize,
) -> bool {
    let current = &complex.parts[part];
    if !matches_compound(&current.compound, path, at) {
        return false;
    }
    if part == 0 {
        return true;
    }
    match current.combinator.unwrap_or(Combinator::Descendant) {
        Combinator::Child => at > 0 && match_part(complex, part - 1, path, at - 1),
        Combinator::Descendant => (0..at)
            .rev()
            .any(|ancestor| match_part(complex, part - 1, path, ancestor)),
    }
}

fn matches_compound<E: MatchElement>(compound: &Compound, path: &[E], at: usize) -> bool {
    let element = &path[at];
    if !matches_simple(compound, element) {
        return false;
    }
    compound.pseudos.iter().all(|pseudo| match pseudo {
        Pseudo::FirstChild => element.sibling_index() == 1,
        Pseudo::NthChild(nth) => nth_matches(*nth, element.sibling_index()),
        Pseudo::NthChildOf(nth, filter) => element
            .filtered_index(filter.slot)
            .is_some_and(|pos| nth_matches(*nth, pos)),
        Pseudo::Is(list) => list.matches(&path[..=at]),
        Pseudo::Not(list) => !list.matches(&path[..=at]),
    })
}

/// Type, id, class and attribute checks; pseudo-classes are left to the caller.
fn matches_simple<E: MatchElement>(compound: &Compound, element: &E) -> bool {
    if let Some(tag) = &compound.tag {
        if element.local_name() != tag {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if element.attribute("id") != Some(id.as_str()) {
            return false;
        }
    }
    if !compound.classes.iter().all(|c| element.has_class(c)) {
        return false;
    }
    compound
        .attrs
        .iter()
        .all(|cond| attr_matches(cond, element.attribute(&cond.name)))
}

fn attr_matches(cond: &AttrCondition, actual: Option<&str>) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    let (actual, wanted) = match &cond.op {
        AttrOp::Exists => return true,
        AttrOp::Eq(v)
        | AttrOp::Includes(v)
        | AttrOp::DashMatch(v)
        | AttrOp::StartsWith(v)
        | AttrOp::EndsWith(v)
        | AttrOp::Contains(v) => fold(actual, v, cond.ignore_case),
    };
    let (actual, wanted) = (actual.as_str(), wanted.as_str());
    match &cond.op {
        AttrOp::Exists => true,
        AttrOp::Eq(_) => actual == wanted,
        AttrOp::Includes(_) => {
            !wanted.is_empty() && actual.split_ascii_whitespace().any(|w| w == wanted)
        }
        AttrOp::DashMatch(_) => {
            actual == wanted
                || actual
                    .strip_prefix(wanted)
                    .is_some_and(|rest| rest.starts_with('-'))
        }
        AttrOp::StartsWith(_) => !wanted.is_empty() && actual.starts_with(wanted),
        AttrOp::EndsWith(_) => !wanted.is_empty() && actual.ends_with(wanted),
        AttrOp::Contains(_) => !wanted.is_empty() && actual.contains(wanted),
    }
}

fn fold(actual: &str, wanted: &str, ignore_case: bool) -> (String, String) {
    if ignore_case {
        (actual.to_ascii_lowercase(), wanted.to_ascii_lowercase())
    } else {
        (actual.to_string(), wanted.to_string())
    }
}

fn nth_matches(nth: Nth, position: usize) -> bool {
    let pos = position as i64;
    match nth {
        Nth::Exact(n) => position == n,
        Nth::Odd => pos % 2 == 1,
        Nth::Even => pos % 2 == 0,
        Nth::AnPlusB(a, b) => {
            if a == 0 {
                return pos == b;
            }
            let diff = pos - b;
            diff % a == 0 && diff / a >= 0
        }
    }
}
