//! Splits an oversized spec into provider-sized parts.

const BOUNDARY_PREFERENCE: [&str; 4] = ["\n---\n", "\n## ", "\n\n", "\n"];
const RESERVED_FOR_HEADER: usize = 500;

/// Split `spec` into parts no longer than `limit`, each headed by a
/// `## Implementation Spec (Part i of N)` line. Returns a single part,
/// unheaded, if `spec` already fits.
///
/// Splits prefer (in order) a `\n---\n` section break, a `\n## ` heading,
/// a blank line, then any newline, falling back to a hard cut at the
/// budget boundary if none appear. Each split chunk is kept within
/// `limit - 500` characters so the added header never pushes a part over
/// `limit`.
pub fn split_for_provider(spec: &str, limit: usize) -> Vec<String> {
    if spec.chars().count() <= limit {
        return vec![spec.to_string()];
    }

    let budget = limit.saturating_sub(RESERVED_FOR_HEADER).max(1);
    let mut chunks = Vec::new();
    let mut remaining = spec;

    while char_count(remaining) > budget {
        let cut = find_cut(remaining, budget);
        let cut = if cut == 0 { byte_index_at_char(remaining, budget) } else { cut };
        chunks.push(remaining[..cut].to_string());
        remaining = &remaining[cut..];
    }
    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }

    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "## Implementation Spec (Part {} of {})\n\n{}",
                i + 1,
                total,
                chunk
            )
        })
        .collect()
}

fn char_count(s: &str) -> usize {
    s.chars().count()
}

fn byte_index_at_char(s: &str, chars: usize) -> usize {
    s.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Find the best boundary within the first `budget` characters of `text`,
/// returning a byte offset to cut at (after the boundary). `0` means no
/// boundary was found.
fn find_cut(text: &str, budget: usize) -> usize {
    let window_end = byte_index_at_char(text, budget);
    let window = &text[..window_end];
    for boundary in BOUNDARY_PREFERENCE {
        if let Some(pos) = window.rfind(boundary) {
            return pos + boundary.len();
        }
    }
    0
}
