//! Comment sanitization before a `post_comment`/spec part reaches the
//! tracker.

/// Strip `[gap N]`/`[Gap N]` bracketed markers from `content`, returning
/// the cleaned text and how many markers were removed.
///
/// The model sometimes echoes internal gap references inline (`"...see
/// [gap 7] for context"`); those aren't meaningful to a human reader and
/// are stripped rather than posted verbatim.
pub fn strip_gap_markers(content: &str) -> (String, usize) {
    let mut out = String::with_capacity(content.len());
    let mut stripped = 0usize;
    let mut rest = content;

    while let Some(open) = rest.find('[') {
        let (before, after_open) = rest.split_at(open);
        let after_open = &after_open[1..];
        match after_open.find(']') {
            Some(close) if is_gap_marker(&after_open[..close]) => {
                out.push_str(before);
                stripped += 1;
                rest = &after_open[close + 1..];
            }
            _ => {
                out.push_str(before);
                out.push('[');
                rest = after_open;
            }
        }
    }
    out.push_str(rest);
    (out, stripped)
}

fn is_gap_marker(inner: &str) -> bool {
    let trimmed = inner.trim();
    let digits = trimmed
        .strip_prefix("gap ")
        .or_else(|| trimmed.strip_prefix("Gap "))
        .or_else(|| trimmed.strip_prefix("GAP "));
    match digits {
        Some(d) => !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}
