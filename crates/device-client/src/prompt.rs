//! Output scanning helpers for interactive shells.

/// Whether the buffered output ends in a CLI prompt.
///
/// The last non-empty line, with trailing whitespace removed, must end in one
/// of the platform's prompt terminators.
#[must_use]
pub fn ends_with_prompt(buffer: &str, terminators: &[char]) -> bool {
    buffer
        .lines()
        .rev()
        .map(str::trim_end)
        .find(|line| !line.is_empty())
        .is_some_and(|line| line.ends_with(terminators))
}

/// Whether every non-whitespace character of `needle` appears in `haystack`
/// in order.
///
/// Terminals wrap and redraw long input, inserting control sequences and line
/// breaks between echoed characters, so an exact substring match is too strict.
#[must_use]
pub fn fuzzy_contains(haystack: &str, needle: &str) -> bool {
    let mut remaining = haystack.chars();
    needle
        .chars()
        .filter(|c| !c.is_whitespace())
        .all(|wanted| remaining.any(|c| c == wanted))
}

/// First line the device flagged as an error.
#[must_use]
pub fn error_line(output: &str) -> Option<&str> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("Error") || line.starts_with("MINOR:") || line.starts_with("MAJOR:"))
}
