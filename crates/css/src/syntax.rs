//! Selector parsing for the streaming matcher.
//!
//! Only selectors that can be decided when an element's start tag is seen
//! are accepted: anything that needs later siblings or descendants (`:has()`,
//! `:last-child`, sibling combinators) is rejected up front.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// Valid CSS the streaming matcher cannot evaluate.
    Unsupported { selector: String, reason: &'static str },
    Invalid { selector: String, reason: &'static str },
}

impl SelectorError {
    fn unsupported(selector: &str, reason: &'static str) -> Self {
        SelectorError::Unsupported {
            selector: selector.to_string(),
            reason,
        }
    }

    fn invalid(selector: &str, reason: &'static str) -> Self {
        SelectorError::Invalid {
            selector: selector.to_string(),
            reason,
        }
    }
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorError::Unsupported { selector, reason } => {
                write!(f, "unsupported selector {selector:?}: {reason}")
            }
            SelectorError::Invalid { selector, reason } => {
                write!(f, "invalid selector {selector:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for SelectorError {}

/// Comma-separated alternatives; matches when any alternative does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    pub(crate) alternatives: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ComplexSelector {
    pub(crate) parts: Vec<SelectorPart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) compound: Compound,
    /// Relation to the previous part; `None` on the first part.
    pub(crate) combinator: Option<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Compound {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<AttrCondition>,
    pub(crate) pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttrOp {
    Exists,
    Eq(String),
    Includes(String),
    DashMatch(String),
    StartsWith(String),
    EndsWith(String),
    Contains(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttrCondition {
    pub(crate) name: String,
    pub(crate) op: AttrOp,
    pub(crate) ignore_case: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pseudo {
    FirstChild,
    NthChild(Nth),
    NthChildOf(Nth, PositionFilter),
    Is(SelectorList),
    Not(SelectorList),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Nth {
    Exact(usize),
    Odd,
    Even,
    AnPlusB(i64, i64),
}

/// The `of S` list of `:nth-child(An+B of S)`.
///
/// Positions among matching siblings are counted by whoever drives the
/// matcher; `slot` tells it which counter belongs to this filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionFilter {
    pub(crate) slot: usize,
    pub(crate) alternatives: Vec<Compound>,
}

impl SelectorList {
    pub fn parse(selector: &str) -> Result<SelectorList, SelectorError> {
        let groups = split_selector_groups(selector)?;
        let mut alternatives = Vec::with_capacity(groups.len());
        for group in groups {
            alternatives.push(parse_selector_chain(group, selector)?);
        }
        Ok(SelectorList { alternatives })
    }

    /// Gives every `of S` filter in this list a fresh counter slot and
    /// appends a copy of it to `registry`, whose index is the slot.
    pub fn bind_position_filters(&mut self, registry: &mut Vec<PositionFilter>) {
        for complex in &mut self.alternatives {
            for part in &mut complex.parts {
                bind_compound(&mut part.compound, registry);
            }
        }
    }
}

fn bind_compound(compound: &mut Compound, registry: &mut Vec<PositionFilter>) {
    for pseudo in &mut compound.pseudos {
        match pseudo {
            Pseudo::NthChildOf(_, filter) => {
                filter.slot = registry.len();
                registry.push(filter.clone());
            }
            Pseudo::Is(list) | Pseudo::Not(list) => list.bind_position_filters(registry),
            Pseudo::FirstChild | Pseudo::NthChild(_) => {}
        }
    }
}

fn split_selector_groups(selector: &str) -> Result<Vec<&str>, SelectorError> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut start = 0;

    let bytes = selector.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'(' | b'[' => depth += 1,
            b')' | b']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SelectorError::invalid(selector, "unbalanced brackets"))?;
            }
            b',' if depth == 0 => {
                groups.push(non_empty_group(&selector[start..i], selector)?);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if depth != 0 || quote.is_some() {
        return Err(SelectorError::invalid(selector, "unbalanced brackets"));
    }
    groups.push(non_empty_group(&selector[start..], selector)?);
    Ok(groups)
}

fn non_empty_group<'a>(group: &'a str, selector: &str) -> Result<&'a str, SelectorError> {
    let trimmed = group.trim();
    if trimmed.is_empty() {
        return Err(SelectorError::invalid(selector, "empty selector"));
    }
    Ok(trimmed)
}

fn tokenize_selector<'a>(chain: &'a str, selector: &str) -> Result<Vec<&'a str>, SelectorError> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut start: Option<usize> = None;

    let bytes = chain.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        let top_level = depth == 0;
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if top_level && (b.is_ascii_whitespace() || matches!(b, b'>' | b'+' | b'~')) {
            if let Some(s) = start.take() {
                tokens.push(&chain[s..i]);
            }
            match b {
                b'>' => tokens.push(">"),
                b'+' | b'~' => {
                    return Err(SelectorError::unsupported(
                        selector,
                        "sibling combinators need earlier siblings",
                    ));
                }
                _ => {}
            }
        } else if start.is_none() {
            start = Some(i);
        }
        i += 1;
    }
    if let Some(s) = start {
        tokens.push(&chain[s..]);
    }
    Ok(tokens)
}

fn parse_selector_chain(chain: &str, selector: &str) -> Result<ComplexSelector, SelectorError> {
    let mut parts: Vec<SelectorPart> = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in tokenize_selector(chain, selector)? {
        if token == ">" {
            if pending.is_some() || parts.is_empty() {
                return Err(SelectorError::unsupported(
                    selector,
                    "combinator without a left-hand compound",
                ));
            }
            pending = Some(Combinator::Child);
            continue;
        }
        let compound = parse_compound(token, selector)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(SelectorPart {
            compound,
            combinator,
        });
    }

    if parts.is_empty() || pending.is_some() {
        return Err(SelectorError::invalid(selector, "dangling combinator"));
    }
    Ok(ComplexSelector { parts })
}

fn parse_compound(part: &str, selector: &str) -> Result<Compound, SelectorError> {
    let bytes = part.as_bytes();
    let mut compound = Compound::default();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'*' if i == 0 => {
                compound.universal = true;
                i += 1;
            }
            b'#' => {
                let (id, next) = parse_ident(part, i + 1)
                    .ok_or_else(|| SelectorError::invalid(selector, "empty id"))?;
                compound.id = Some(id);
                i = next;
            }
            b'.' => {
                let (class, next) = parse_ident(part, i + 1)
                    .ok_or_else(|| SelectorError::invalid(selector, "empty class"))?;
                compound.classes.push(class);
                i = next;
            }
            b'[' => {
                let (cond, next) = parse_attr_condition(part, i, selector)?;
                compound.attrs.push(cond);
                i = next;
            }
            b':' => {
                let (pseudo, next) = parse_pseudo(part, i, selector)?;
                compound.pseudos.push(pseudo);
                i = next;
            }
            _ if i == 0 => {
                let (tag, next) = parse_ident(part, 0)
                    .ok_or_else(|| SelectorError::invalid(selector, "unexpected character"))?;
                compound.tag = Some(tag.to_ascii_lowercase());
                i = next;
            }
            _ => return Err(SelectorError::invalid(selector, "unexpected character")),
        }
    }
    Ok(compound)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b >= 0x80
}

/// Reads an identifier at `start`, resolving `\` escapes.
fn parse_ident(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    let mut out = String::new();
    let mut i = start;
    let mut copy_start = start;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && i + 1 < bytes.len() {
            out.push_str(&src[copy_start..i]);
            let ch = src[i + 1..].chars().next()?;
            out.push(ch);
            i += 1 + ch.len_utf8();
            copy_start = i;
            continue;
        }
        if !is_ident_byte(b) {
            break;
        }
        i += 1;
    }
    out.push_str(&src[copy_start..i]);
    if out.is_empty() {
        return None;
    }
    Some((out, i))
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn parse_attr_condition(
    src: &str,
    open: usize,
    selector: &str,
) -> Result<(AttrCondition, usize), SelectorError> {
    let bad = || SelectorError::invalid(selector, "malformed attribute selector");
    let bytes = src.as_bytes();

    let mut i = skip_whitespace(bytes, open + 1);
    let name_start = i;
    while i < bytes.len() && (is_ident_byte(bytes[i]) || bytes[i] == b':') {
        i += 1;
    }
    if name_start == i {
        return Err(bad());
    }
    let name = src[name_start..i].to_ascii_lowercase();
    i = skip_whitespace(bytes, i);

    if bytes.get(i) == Some(&b']') {
        return Ok((
            AttrCondition {
                name,
                op: AttrOp::Exists,
                ignore_case: false,
            },
            i + 1,
        ));
    }

    let (kind, next) = match (bytes.get(i), bytes.get(i + 1)) {
        (Some(b'='), _) => (b'=', i + 1),
        (Some(op @ (b'~' | b'|' | b'^' | b'$' | b'*')), Some(b'=')) => (*op, i + 2),
        _ => return Err(bad()),
    };
    i = skip_whitespace(bytes, next);

    let (value, next) = parse_attr_value(src, i).ok_or_else(bad)?;
    i = skip_whitespace(bytes, next);

    let mut ignore_case = false;
    if matches!(bytes.get(i), Some(b'i' | b'I' | b's' | b'S')) {
        ignore_case = bytes[i].eq_ignore_ascii_case(&b'i');
        i = skip_whitespace(bytes, i + 1);
    }
    if bytes.get(i) != Some(&b']') {
        return Err(bad());
    }

    let op = match kind {
        b'=' => AttrOp::Eq(value),
        b'~' => AttrOp::Includes(value),
        b'|' => AttrOp::DashMatch(value),
        b'^' => AttrOp::StartsWith(value),
        b'$' => AttrOp::EndsWith(value),
        _ => AttrOp::Contains(value),
    };
    Ok((
        AttrCondition {
            name,
            op,
            ignore_case,
        },
        i + 1,
    ))
}

fn parse_attr_value(src: &str, start: usize) -> Option<(String, usize)> {
    let bytes = src.as_bytes();
    let quote = *bytes.get(start)?;
    if quote != b'"' && quote != b'\'' {
        return parse_ident(src, start);
    }

    let mut out = String::new();
    let mut i = start + 1;
    let mut copy_start = i;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() => {
                out.push_str(&src[copy_start..i]);
                let ch = src[i + 1..].chars().next()?;
                out.push(ch);
                i += 1 + ch.len_utf8();
                copy_start = i;
            }
            b if b == quote => {
                out.push_str(&src[copy_start..i]);
                return Some((out, i + 1));
            }
            _ => i += 1,
        }
    }
    None
}

/// Index of the `)` closing a group whose `(` precedes `body`.
fn find_matching_paren(body: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (idx, b) in body.bytes().enumerate() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'\'' | b'"' => quote = Some(b),
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_pseudo(part: &str, start: usize, selector: &str) -> Result<(Pseudo, usize), SelectorError> {
    let bytes = part.as_bytes();
    if bytes.get(start + 1) == Some(&b':') {
        return Err(SelectorError::unsupported(selector, "pseudo-elements"));
    }
    let (name, after_name) = parse_ident(part, start + 1)
        .ok_or_else(|| SelectorError::invalid(selector, "empty pseudo-class"))?;
    let name = name.to_ascii_lowercase();

    let (arg, next) = if bytes.get(after_name) == Some(&b'(') {
        let body = &part[after_name + 1..];
        let close = find_matching_paren(body)
            .ok_or_else(|| SelectorError::invalid(selector, "unclosed pseudo-class argument"))?;
        (Some(body[..close].trim()), after_name + 1 + close + 1)
    } else {
        (None, after_name)
    };

    let pseudo = match (name.as_str(), arg) {
        ("first-child", None) => Pseudo::FirstChild,
        ("nth-child", Some(arg)) => parse_nth_child_argument(arg, selector)?,
        ("is" | "where" | "matches", Some(arg)) => Pseudo::Is(SelectorList::parse(arg)?),
        ("not", Some(arg)) => Pseudo::Not(SelectorList::parse(arg)?),
        ("has", _) => {
            return Err(SelectorError::unsupported(
                selector,
                ":has() depends on descendants",
            ));
        }
        (
            "last-child" | "only-child" | "nth-last-child" | "last-of-type" | "only-of-type"
            | "nth-last-of-type" | "empty",
            _,
        ) => {
            return Err(SelectorError::unsupported(
                selector,
                "pseudo-class depends on content after the start tag",
            ));
        }
        _ => return Err(SelectorError::unsupported(selector, "unknown pseudo-class")),
    };
    Ok((pseudo, next))
}

fn parse_nth_child_argument(arg: &str, selector: &str) -> Result<Pseudo, SelectorError> {
    let bad = || SelectorError::invalid(selector, "malformed :nth-child() argument");

    let Some((expr, filter)) = split_of_clause(arg) else {
        return Ok(Pseudo::NthChild(parse_nth(arg).ok_or_else(bad)?));
    };
    let nth = parse_nth(expr).ok_or_else(bad)?;

    let mut alternatives = Vec::new();
    for group in split_selector_groups(filter)? {
        let compound = parse_compound(group, selector)?;
        if !compound.pseudos.is_empty() {
            return Err(SelectorError::unsupported(
                selector,
                "pseudo-classes inside an `of` filter",
            ));
        }
        alternatives.push(compound);
    }
    Ok(Pseudo::NthChildOf(
        nth,
        PositionFilter {
            slot: 0,
            alternatives,
        },
    ))
}

/// Splits `An+B of S` at the first whitespace-delimited `of`.
fn split_of_clause(arg: &str) -> Option<(&str, &str)> {
    let bytes = arg.as_bytes();
    let mut i = 1;
    while i + 3 < bytes.len() {
        if bytes[i - 1].is_ascii_whitespace()
            && bytes[i..i + 2].eq_ignore_ascii_case(b"of")
            && bytes[i + 2].is_ascii_whitespace()
        {
            return Some((arg[..i].trim(), arg[i + 2..].trim()));
        }
        i += 1;
    }
    None
}

pub(crate) fn parse_nth(raw: &str) -> Option<Nth> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();

    match compact.as_str() {
        "" => None,
        "odd" => Some(Nth::Odd),
        "even" => Some(Nth::Even),
        expr if expr.contains('n') => parse_nth_expression(expr),
        expr => {
            let value = expr.strip_prefix('+').unwrap_or(expr).parse::<usize>().ok()?;
            (value > 0).then_some(Nth::Exact(value))
        }
    }
}

fn parse_nth_expression(expr: &str) -> Option<Nth> {
    if expr.matches('n').count() != 1 {
        return None;
    }
    let (a_part, rest) = expr.split_at(expr.find('n')?);
    let b_part = &rest[1..];

    let a = match a_part {
        "" | "+" => 1,
        "-" => -1,
        _ => a_part.parse::<i64>().ok()?,
    };
    if b_part.is_empty() {
        return Some(Nth::AnPlusB(a, 0));
    }
    let b = match b_part.as_bytes()[0] {
        b'+' => b_part[1..].parse::<i64>().ok()?,
        b'-' => -b_part[1..].parse::<i64>().ok()?,
        _ => return None,
    };
    Some(Nth::AnPlusB(a, b))
}
