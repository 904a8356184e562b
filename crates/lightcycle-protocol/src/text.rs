//! Printable-text rules shared by usernames, passwords and chat.

/// Returns `true` for characters in the printable ASCII range (`' '..='~'`).
pub fn is_printable(c: char) -> bool {
    (' '..='~').contains(&c)
}

/// Checks that `s` is at least `min_len` characters long, printable ASCII
/// only, and free of the field separator.
pub fn is_valid_text(s: &str, min_len: usize) -> bool {
    s.chars().count() >= min_len && s.chars().all(|c| is_printable(c) && c != '|')
}

/// Drops every character that could not travel inside a field.
pub fn escape_text(s: &str) -> String {
    s.chars().filter(|c| is_printable(*c) && *c != '|').collect()
}
