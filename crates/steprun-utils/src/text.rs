//! Text helpers for relaying runner output

/// Prefix every line of `text` with `prefix`.
///
/// A trailing newline stays a bare trailing newline rather than producing a
/// dangling prefix.
#[must_use]
pub fn add_prefix_to_each_line(text: &str, prefix: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let last = lines.len() - 1;

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == last && line.is_empty() {
                String::new()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
