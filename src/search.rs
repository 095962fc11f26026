/// Case-fold a string for substring matching.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
}

/// Trimmed, case-folded search term, or `None` when the query is blank
/// (which means "no filter").
pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(normalize(trimmed))
    }
}

/// Phone numbers are digits, so they are matched as typed.
pub fn phone_term(query: &str) -> &str {
    query.trim()
}
