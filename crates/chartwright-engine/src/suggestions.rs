//! Fuzzy matching suggestions for template errors
//!
//! Uses Levenshtein distance to point at the name the author probably meant
//! when a function, variable or template name is unknown.

use crate::functions;

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Suggestion result with confidence scoring
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggested correction
    pub text: String,
    /// Levenshtein distance (lower = better match)
    pub distance: usize,
    pub category: SuggestionCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionCategory {
    Variable,
    Function,
    Template,
}

/// Calculate Levenshtein distance between two strings
pub fn levenshtein(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Find closest matches from a list of candidates
///
/// Ties keep the order of `candidates`.
pub fn find_closest_matches(
    input: &str,
    candidates: &[&str],
    max_results: usize,
    category: SuggestionCategory,
) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = levenshtein(input, candidate);
            if distance <= MAX_SUGGESTION_DISTANCE && distance > 0 {
                Some(Suggestion {
                    text: candidate.to_string(),
                    distance,
                    category,
                })
            } else {
                None
            }
        })
        .collect();

    // Sort by distance (best matches first)
    suggestions.sort_by_key(|s| s.distance);
    suggestions.truncate(max_results);
    suggestions
}

fn did_you_mean(matches: &[Suggestion]) -> Option<String> {
    if matches.is_empty() {
        return None;
    }
    let names: Vec<String> = matches.iter().map(|s| format!("`{}`", s.text)).collect();
    Some(format!("Did you mean {}?", names.join(" or ")))
}

/// Suggest a registered function for an unknown identifier
pub fn suggest_unknown_function(func_name: &str) -> Option<String> {
    let names = functions::names();
    did_you_mean(&find_closest_matches(
        func_name,
        &names,
        1,
        SuggestionCategory::Function,
    ))
}

/// Suggest an in-scope variable for an undefined one
pub fn suggest_undefined_variable(variable: &str, in_scope: &[String]) -> Option<String> {
    let mut candidates: Vec<&str> = in_scope.iter().map(String::as_str).collect();
    candidates.sort_unstable();
    candidates.dedup();
    did_you_mean(&find_closest_matches(
        variable,
        &candidates,
        2,
        SuggestionCategory::Variable,
    ))
}

/// Suggest a registered template for a name that did not resolve
///
/// `available` should be sorted so that ties are deterministic.
pub fn suggest_template_name(name: &str, available: &[&str]) -> Option<String> {
    did_you_mean(&find_closest_matches(
        name,
        available,
        3,
        SuggestionCategory::Template,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein("nindnet", "nindent"), 2);
        assert_eq!(levenshtein("toYml", "toYaml"), 1);
        assert_eq!(levenshtein("b64enc", "b64enc"), 0);
    }

    #[test]
    fn test_find_closest_matches_orders_by_distance() {
        let matches = find_closest_matches(
            "uper",
            &["lower", "upper", "title"],
            3,
            SuggestionCategory::Function,
        );
        assert_eq!(matches[0].text, "upper");
        assert_eq!(matches[0].distance, 1);
    }

    #[test]
    fn test_suggest_unknown_function() {
        assert_eq!(
            suggest_unknown_function("nindnet").as_deref(),
            Some("Did you mean `nindent`?")
        );
        assert_eq!(suggest_unknown_function("zzzzzzzzzzzz"), None);
    }

    #[test]
    fn test_suggest_undefined_variable() {
        let scope = vec!["$".to_string(), "$name".to_string(), "$name".to_string()];
        assert_eq!(
            suggest_undefined_variable("$nmae", &scope).as_deref(),
            Some("Did you mean `$name`?")
        );
    }

    #[test]
    fn test_suggest_template_name() {
        let available = ["web.fullname", "web.labels", "web.name"];
        let hint = suggest_template_name("web.fulname", &available).unwrap();
        assert!(hint.starts_with("Did you mean `web.fullname`"));
    }
}
