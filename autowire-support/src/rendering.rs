//! Text rendering utilities for human-friendly diagnostics.
//!
//! Helpers to format resolution chains, union type sets,
//! and "did you mean?" suggestions in error output.

/// Renders a resolution chain as a readable string.
///
/// # Examples
/// ```
/// use autowire_support::rendering::render_chain;
///
/// let chain = vec!["UserService", "UserRepo", "Database", "UserService"];
/// assert_eq!(render_chain(&chain), "UserService → UserRepo → Database → UserService");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Renders a set of declared types the way they are written in a signature.
///
/// ```
/// use autowire_support::rendering::render_types;
///
/// assert_eq!(render_types(&["Logger", "null"]), "Logger|null");
///
/// let none: [&str; 0] = [];
/// assert_eq!(render_types(&none), "mixed");
/// ```
pub fn render_types(types: &[impl AsRef<str>]) -> String {
    if types.is_empty() {
        return "mixed".to_string();
    }
    types
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join("|")
}

/// Returns the last path segment of an identifier.
///
/// Both `::` and `\` are treated as namespace separators, so ids
/// borrowed from other ecosystems shorten the same way.
///
/// ```
/// use autowire_support::rendering::short_name;
///
/// assert_eq!(short_name("app::services::UserService"), "UserService");
/// assert_eq!(short_name("App\\Services\\Mailer"), "Mailer");
/// assert_eq!(short_name("Logger"), "Logger");
/// ```
pub fn short_name(id: &str) -> &str {
    let after_colons = id.rsplit("::").next().unwrap_or(id);
    after_colons.rsplit('\\').next().unwrap_or(after_colons)
}

/// Edit distance between two strings (insert, delete, substitute).
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}

/// Suggests registered identifiers close to the requested one.
///
/// Candidates sharing a case-insensitive substring with the request rank
/// first; the rest are kept when their short names are within an edit
/// distance of a third of the requested length (at least 1).
pub fn suggest_similar(
    requested: &str,
    available: &[impl AsRef<str>],
    max_suggestions: usize,
) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let requested_short = short_name(requested).to_lowercase();
    let tolerance = (requested_short.chars().count() / 3).max(1);

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| *name != requested)
        .filter_map(|name| {
            let name_lower = name.to_lowercase();
            if name_lower.contains(&requested_lower) || requested_lower.contains(&name_lower) {
                return Some((name, 0));
            }

            let distance = edit_distance(&short_name(name).to_lowercase(), &requested_short);
            (distance <= tolerance).then_some((name, distance))
        })
        .collect();

    scored.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}
