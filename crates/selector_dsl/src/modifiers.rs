/// Splits `dsl` into its selector body and the `#_` modifier flags.
///
/// A flag group starts at whitespace followed by `#_`; inside a group the
/// pieces are separated by `_` or `#_`. Pieces are trimmed and lower-cased,
/// empty pieces are dropped.
pub(crate) fn split_modifiers(dsl: &str) -> (&str, Vec<String>) {
    let groups = split_flag_groups(dsl);
    let Some((body, rest)) = groups.split_first() else {
        return (dsl, Vec::new());
    };

    let mut modifiers = Vec::new();
    for group in rest {
        for piece in group.replace("#_", "_").split('_') {
            let piece = piece.trim();
            if !piece.is_empty() {
                modifiers.push(piece.to_ascii_lowercase());
            }
        }
    }
    (body, modifiers)
}

fn split_flag_groups(dsl: &str) -> Vec<&str> {
    let bytes = dsl.as_bytes();
    let mut groups = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let ws_start = i;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes[i..].starts_with(b"#_") {
            groups.push(&dsl[start..ws_start]);
            i += 2;
            start = i;
        }
    }
    groups.push(&dsl[start..]);
    groups
}
