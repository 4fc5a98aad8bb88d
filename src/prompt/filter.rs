//! Suggestion filtering
//!
//! Always recomputed from the full suggestion list, never from the
//! previously narrowed one.

use glob::{MatchOptions, Pattern};

/// Most suggestions shown at once
pub const MAX_DISPLAYED: usize = 20;

/// How typed text is matched against suggestions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOptions {
    /// Match as the glob `*text*` instead of prefix/substring
    pub glob: bool,
    pub case_sensitive: bool,
    /// Anchor non-glob matches at the start of the suggestion
    pub match_from_beginning: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            glob: false,
            case_sensitive: false,
            match_from_beginning: true,
        }
    }
}

/// Filter `suggestions` by `query`, keeping their original order and at
/// most [`MAX_DISPLAYED`] entries.
pub fn filter_suggestions(suggestions: &[String], query: &str, options: FilterOptions) -> Vec<String> {
    if options.glob {
        return glob_filter(suggestions, query, options.case_sensitive);
    }

    let fold = |s: &str| {
        if options.case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    };
    let needle = fold(query);

    suggestions
        .iter()
        .filter(|candidate| {
            let hay = fold(candidate);
            if options.match_from_beginning {
                hay.starts_with(&needle)
            } else {
                hay.contains(&needle)
            }
        })
        .take(MAX_DISPLAYED)
        .cloned()
        .collect()
}

fn glob_filter(suggestions: &[String], query: &str, case_sensitive: bool) -> Vec<String> {
    if query.is_empty() {
        return suggestions.iter().take(MAX_DISPLAYED).cloned().collect();
    }

    // Typed text may contain glob syntax on purpose; only fall back to a
    // literal match when it does not form a valid pattern.
    let pattern = Pattern::new(&format!("*{query}*"))
        .or_else(|_| Pattern::new(&format!("*{}*", Pattern::escape(query))));
    let Ok(pattern) = pattern else {
        return Vec::new();
    };

    let options = MatchOptions {
        case_sensitive,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    suggestions
        .iter()
        .filter(|candidate| pattern.matches_with(candidate, options))
        .take(MAX_DISPLAYED)
        .cloned()
        .collect()
}
