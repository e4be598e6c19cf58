//! Just enough of the HTML tree-construction rules to keep an accurate stack
//! of open elements while streaming: void elements and implied end tags.

pub(crate) fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Elements that may appear inside `<head>`; anything else implies `</head>`.
pub(crate) fn is_head_content(name: &str) -> bool {
    matches!(
        name,
        "base"
            | "basefont"
            | "bgsound"
            | "link"
            | "meta"
            | "noframes"
            | "noscript"
            | "script"
            | "style"
            | "template"
            | "title"
    )
}

/// Start tags that close an open `<p>` in button scope.
pub(crate) fn closes_paragraph(name: &str) -> bool {
    matches!(
        name,
        "address"
            | "article"
            | "aside"
            | "blockquote"
            | "center"
            | "dd"
            | "details"
            | "dialog"
            | "dir"
            | "div"
            | "dl"
            | "dt"
            | "fieldset"
            | "figcaption"
            | "figure"
            | "footer"
            | "form"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "header"
            | "hgroup"
            | "hr"
            | "li"
            | "listing"
            | "main"
            | "menu"
            | "nav"
            | "ol"
            | "p"
            | "pre"
            | "section"
            | "summary"
            | "table"
            | "ul"
            | "xmp"
    )
}

fn is_scope_boundary(name: &str) -> bool {
    matches!(
        name,
        "applet"
            | "button"
            | "caption"
            | "html"
            | "marquee"
            | "object"
            | "table"
            | "td"
            | "template"
            | "th"
    )
}

/// An element the new start tag implicitly ends, searched from the top of
/// the stack.
pub(crate) struct ImpliedEnd {
    pub targets: &'static [&'static str],
    /// Search stops here (in addition to the scope boundaries).
    pub stop_at: &'static [&'static str],
}

impl ImpliedEnd {
    pub(crate) fn find<'a, I>(&self, open: I) -> Option<usize>
    where
        I: DoubleEndedIterator<Item = (usize, &'a str)>,
    {
        for (index, name) in open.rev() {
            if self.targets.contains(&name) {
                return Some(index);
            }
            if self.stop_at.contains(&name) || is_scope_boundary(name) {
                return None;
            }
        }
        None
    }
}

const PARAGRAPH: ImpliedEnd = ImpliedEnd {
    targets: &["p"],
    stop_at: &[],
};

/// Implied end tags for `name`, in the order they apply.
pub(crate) fn implied_ends(name: &str) -> Vec<ImpliedEnd> {
    let mut ends = Vec::new();
    match name {
        "li" => ends.push(ImpliedEnd {
            targets: &["li"],
            stop_at: &["ul", "ol"],
        }),
        "dt" | "dd" => ends.push(ImpliedEnd {
            targets: &["dt", "dd"],
            stop_at: &["dl"],
        }),
        "option" | "optgroup" => ends.push(ImpliedEnd {
            targets: &["option"],
            stop_at: &["select", "datalist", "optgroup"],
        }),
        "tr" => ends.push(ImpliedEnd {
            targets: &["tr"],
            stop_at: &["thead", "tbody", "tfoot"],
        }),
        "td" | "th" => ends.push(ImpliedEnd {
            targets: &["td", "th"],
            stop_at: &["tr"],
        }),
        "thead" | "tbody" | "tfoot" => ends.push(ImpliedEnd {
            targets: &["thead", "tbody", "tfoot"],
            stop_at: &[],
        }),
        _ => {}
    }
    if name == "optgroup" {
        ends.push(ImpliedEnd {
            targets: &["optgroup"],
            stop_at: &["select", "datalist"],
        });
    }
    if closes_paragraph(name) {
        ends.push(PARAGRAPH);
    }
    ends
}
