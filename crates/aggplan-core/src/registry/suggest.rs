///
/// Nearest-match suggestions for unknown type tags.
///
/// A candidate is kept when its normalized edit similarity
/// `1 - distance / max_len` is above one half. Candidates are ranked by
/// similarity, then by name.
///

pub(crate) fn suggest<'a>(
    unknown: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let unknown_len = unknown.chars().count();
    let mut scored: Vec<(usize, usize, &str)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let distance = levenshtein(unknown, candidate);
            let max_len = unknown_len.max(candidate.chars().count());

            // similarity > 0.5  <=>  2 * distance < max_len
            (2 * distance < max_len).then_some((distance, max_len, candidate))
        })
        .collect();

    scored.sort_by(|(d1, m1, a), (d2, m2, b)| {
        // lower distance/max_len first, compared without floats
        (d1 * m2).cmp(&(d2 * m1)).then_with(|| a.cmp(b))
    });

    scored
        .into_iter()
        .map(|(_, _, candidate)| candidate.to_string())
        .collect()
}

/// Render the " did you mean ..." suffix used in unknown-type messages.
pub(crate) fn render_suggestions(suggestions: &[String]) -> String {
    match suggestions {
        [] => String::new(),
        [only] => format!(" did you mean [{only}]?"),
        many => format!(" did you mean any of [{}]?", many.join(", ")),
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, a_char) in a.chars().enumerate() {
        current[0] = i + 1;

        for (j, b_char) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(a_char != *b_char);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }

        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::{levenshtein, render_suggestions, suggest};

    #[test]
    fn levenshtein_counts_single_edits() {
        assert_eq!(levenshtein("terms", "terms"), 0);
        assert_eq!(levenshtein("term", "terms"), 1);
        assert_eq!(levenshtein("tems", "terms"), 1);
        assert_eq!(levenshtein("", "avg"), 3);
    }

    #[test]
    fn suggest_ranks_closest_candidates_first() {
        let candidates = ["max", "max_bucket", "min", "sum"];
        let suggestions = suggest("mx", candidates);

        assert_eq!(suggestions, vec!["max".to_string()]);
    }

    #[test]
    fn suggest_returns_nothing_for_distant_names() {
        let suggestions = suggest("completely_unrelated", ["avg", "terms"]);

        assert!(suggestions.is_empty(), "unexpected: {suggestions:?}");
    }

    #[test]
    fn render_suggestions_matches_message_shapes() {
        assert_eq!(render_suggestions(&[]), "");
        assert_eq!(
            render_suggestions(&["terms".to_string()]),
            " did you mean [terms]?"
        );
        assert_eq!(
            render_suggestions(&["max".to_string(), "min".to_string()]),
            " did you mean any of [max, min]?"
        );
    }
}
