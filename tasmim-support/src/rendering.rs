//! Text rendering utilities for human-friendly error messages.
//!
//! Provides helpers to format type lineages and "did you mean?"
//! suggestions in error output and log fields.

/// Renders a lineage of type names as a readable string.
///
/// # Examples
/// ```
/// use tasmim_support::rendering::render_chain;
///
/// let chain = vec!["Child", "Parent", "Base"];
/// assert_eq!(render_chain(&chain), "Child → Parent → Base");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Returns the last segment of a qualified type name.
///
/// Both `::` and `\` are treated as namespace separators.
///
/// ```
/// use tasmim_support::rendering::short_name;
///
/// assert_eq!(short_name("app::services::Mailer"), "Mailer");
/// assert_eq!(short_name("App\\Services\\Mailer"), "Mailer");
/// assert_eq!(short_name("Mailer"), "Mailer");
/// ```
pub fn short_name(full_name: &str) -> &str {
    let after_colons = full_name.rsplit("::").next().unwrap_or(full_name);
    after_colons.rsplit('\\').next().unwrap_or(after_colons)
}

/// Generates "did you mean?" suggestions from a set of known names.
///
/// Candidates are scored by substring containment first, then by the
/// length of the common prefix of their short names. At most
/// `max_suggestions` names are returned, best match first.
pub fn suggest_similar(
    requested: &str,
    available: &[&str],
    max_suggestions: usize,
) -> Vec<String> {
    let requested_lower = requested.to_lowercase();
    let requested_short = short_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter_map(|&name| {
            if name == requested {
                return None;
            }

            let name_lower = name.to_lowercase();
            let name_short = short_name(name).to_lowercase();

            if name_lower.contains(&requested_lower) || requested_lower.contains(&name_lower) {
                return Some((name, 100));
            }

            if name_short.contains(&requested_short) || requested_short.contains(&name_short) {
                return Some((name, 80));
            }

            let common = name_short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            if common >= 3 {
                return Some((name, common * 10));
            }

            None
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_simple_chain() {
        let chain = vec!["A", "B", "C"];
        assert_eq!(render_chain(&chain), "A → B → C");
    }

    #[test]
    fn render_empty_chain() {
        let chain: Vec<&str> = vec![];
        assert_eq!(render_chain(&chain), "");
    }

    #[test]
    fn render_owned_strings() {
        let chain = vec![String::from("Child"), String::from("Parent")];
        assert_eq!(render_chain(&chain), "Child → Parent");
    }

    #[test]
    fn short_name_without_namespace() {
        assert_eq!(short_name("Mailer"), "Mailer");
    }

    #[test]
    fn short_name_mixed_separators() {
        assert_eq!(short_name("vendor::App\\Mailer"), "Mailer");
    }

    #[test]
    fn suggest_typo() {
        let available = vec!["app::UserService", "app::UserRepository", "app::Logger"];
        let suggestions = suggest_similar("UserServise", &available, 3);
        assert!(!suggestions.is_empty());
        assert_eq!(suggestions[0], "app::UserService");
    }

    #[test]
    fn suggest_skips_exact_name() {
        let available = vec!["mailer", "mailer.transport"];
        let suggestions = suggest_similar("mailer", &available, 3);
        assert_eq!(suggestions, vec!["mailer.transport".to_string()]);
    }

    #[test]
    fn suggest_no_match() {
        let available = vec!["app::Database"];
        assert!(suggest_similar("XyzAbcDef", &available, 3).is_empty());
    }

    #[test]
    fn suggest_respects_limit() {
        let available = vec!["db.main", "db.replica", "db.cache"];
        assert_eq!(suggest_similar("db", &available, 2).len(), 2);
    }
}
