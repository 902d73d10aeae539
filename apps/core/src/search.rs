use crate::model::{normalize_for_search, Candidate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Case-insensitive substring containment, input order preserved.
    Direct,
    /// Subsequence fuzzy scoring, best matches first.
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub mode: SearchMode,
    /// Relevance still selects which candidates appear, but the
    /// surviving subset is shown in original input order.
    pub preserve_order: bool,
    /// Maximum number of returned matches; 0 means unlimited.
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Fuzzy,
            preserve_order: false,
            limit: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub matches: Vec<Candidate>,
    /// Pre-limit match count, for UI counters. Independent of
    /// `matches.len()` once the limit kicks in.
    pub match_count: usize,
}

impl SearchOutcome {
    fn empty() -> Self {
        Self {
            matches: Vec::new(),
            match_count: 0,
        }
    }
}

/// Pure ranking pass over the candidate set. Identical inputs always
/// produce identical outputs; malformed or empty input degrades to an
/// empty result set rather than an error.
pub fn search(candidates: &[Candidate], query: &str, options: SearchOptions) -> SearchOutcome {
    if candidates.is_empty() {
        return SearchOutcome::empty();
    }

    if query.is_empty() {
        return SearchOutcome {
            match_count: candidates.len(),
            matches: truncate(candidates.to_vec(), options.limit),
        };
    }

    let normalized_query = normalize_for_search(query);
    match options.mode {
        SearchMode::Direct => direct_search(candidates, &normalized_query, options.limit),
        SearchMode::Fuzzy => fuzzy_search(candidates, &normalized_query, options),
    }
}

fn direct_search(candidates: &[Candidate], normalized_query: &str, limit: usize) -> SearchOutcome {
    let matches: Vec<Candidate> = candidates
        .iter()
        .filter(|candidate| candidate.normalized_title().contains(normalized_query))
        .cloned()
        .collect();

    SearchOutcome {
        match_count: matches.len(),
        matches: truncate(matches, limit),
    }
}

fn fuzzy_search(candidates: &[Candidate], normalized_query: &str, options: SearchOptions) -> SearchOutcome {
    let mut scored: Vec<(i64, usize)> = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            fuzzy_score(candidate.normalized_title(), normalized_query)
                .map(|score| (score, index))
        })
        .collect();

    // Deterministic ordering: score first, original index breaks ties.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    // Plausibility filter: once anything scored positive, non-positive
    // scores are noise. A fully zero-score set is kept whole so results
    // never vanish purely due to scoring noise.
    if scored.first().is_some_and(|(score, _)| *score > 0) {
        scored.retain(|(score, _)| *score > 0);
    }

    let match_count = scored.len();
    let mut selected: Vec<usize> = truncate(scored, options.limit)
        .into_iter()
        .map(|(_, index)| index)
        .collect();

    if options.preserve_order {
        selected.sort_unstable();
    }

    SearchOutcome {
        matches: selected
            .into_iter()
            .map(|index| candidates[index].clone())
            .collect(),
        match_count,
    }
}

fn truncate<T>(mut values: Vec<T>, limit: usize) -> Vec<T> {
    if limit > 0 && values.len() > limit {
        values.truncate(limit);
    }
    values
}

/// Score a normalized title against a normalized query. `None` means
/// the query is not even a subsequence of the title; among matches,
/// substring hits outrank plain subsequence hits and heavy gap
/// penalties may push a subsequence score to zero or below.
fn fuzzy_score(normalized_title: &str, query: &str) -> Option<i64> {
    if normalized_title.is_empty() || query.is_empty() {
        return None;
    }

    if let Some(position) = normalized_title.find(query) {
        let prefix_bonus = if position == 0 { 400 } else { 0 };
        let compact_bonus = (query.len() as i64) * 40;
        let position_penalty = position as i64;
        let length_penalty = (normalized_title.len() as i64 - query.len() as i64).abs();
        return Some(10_000 + prefix_bonus + compact_bonus - position_penalty - length_penalty);
    }

    let positions = subsequence_positions(normalized_title, query)?;
    let start_penalty = positions[0] as i64;
    let gap_penalty: i64 = positions
        .windows(2)
        .map(|pair| pair[1].saturating_sub(pair[0] + 1) as i64)
        .sum();
    let length_penalty = (normalized_title.len() as i64 - query.len() as i64).max(0);

    Some(5_000 + (query.len() as i64) * 30 - gap_penalty * 6 - start_penalty - length_penalty)
}

fn subsequence_positions(haystack: &str, needle: &str) -> Option<Vec<usize>> {
    let mut positions = Vec::with_capacity(needle.chars().count());
    let mut next_start = 0;

    for needle_char in needle.chars() {
        let mut found = None;
        for (offset, hay_char) in haystack[next_start..].char_indices() {
            if hay_char == needle_char {
                let absolute = next_start + offset;
                found = Some(absolute);
                next_start = absolute + hay_char.len_utf8();
                break;
            }
        }

        let position = found?;
        positions.push(position);
    }

    Some(positions)
}

#[cfg(test)]
mod tests {
    use super::{fuzzy_score, search, SearchMode, SearchOptions, SearchOutcome};
    use crate::model::Candidate;

    fn candidates(titles: &[&str]) -> Vec<Candidate> {
        titles.iter().map(|title| Candidate::new(title)).collect()
    }

    fn titles(outcome: &SearchOutcome) -> Vec<&str> {
        outcome
            .matches
            .iter()
            .map(|candidate| candidate.computed_title())
            .collect()
    }

    #[test]
    fn empty_query_is_identity() {
        let items = candidates(&["b", "a", "c"]);
        let outcome = search(&items, "", SearchOptions::default());
        assert_eq!(titles(&outcome), vec!["b", "a", "c"]);
        assert_eq!(outcome.match_count, 3);
    }

    #[test]
    fn direct_mode_keeps_input_order() {
        let items = candidates(&["Banana", "Cabbage", "apricot", "kiwi"]);
        let outcome = search(
            &items,
            "A",
            SearchOptions {
                mode: SearchMode::Direct,
                ..SearchOptions::default()
            },
        );
        assert_eq!(titles(&outcome), vec!["Banana", "Cabbage", "apricot"]);
    }

    #[test]
    fn fuzzy_prefix_match_wins() {
        let items = candidates(&["pineapple", "apple", "grape"]);
        let outcome = search(&items, "ap", SearchOptions::default());
        assert_eq!(titles(&outcome)[0], "apple");
    }

    #[test]
    fn equal_scores_break_ties_by_input_position() {
        let items = candidates(&["abc one", "abc one", "zzz"]);
        let first = search(&items, "abc", SearchOptions::default());
        let second = search(&items, "abc", SearchOptions::default());
        assert_eq!(first, second);
    }

    #[test]
    fn plausibility_filter_drops_zero_scores_when_real_matches_exist() {
        let items = candidates(&["apple", "xyz"]);
        let outcome = search(&items, "ap", SearchOptions::default());
        assert_eq!(titles(&outcome), vec!["apple"]);
        assert_eq!(outcome.match_count, 1);
    }

    #[test]
    fn query_without_subsequence_match_yields_empty_set() {
        let items = candidates(&["apple", "banana", "cherry"]);
        let outcome = search(&items, "zzz", SearchOptions::default());
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.match_count, 0);
    }

    #[test]
    fn non_positive_scores_survive_when_nothing_scores_positive() {
        // A single wildly-gapped subsequence match scores below zero;
        // with no positive match to compare against it must be kept.
        let stretched = format!("a{}b", "x".repeat(900));
        let items = candidates(&[stretched.as_str()]);
        let outcome = search(&items, "ab", SearchOptions::default());
        assert_eq!(outcome.matches.len(), 1);
    }

    #[test]
    fn limit_truncates_but_match_count_does_not() {
        let items = candidates(&["note 1", "note 2", "note 3", "note 4"]);
        let outcome = search(
            &items,
            "note",
            SearchOptions {
                limit: 2,
                ..SearchOptions::default()
            },
        );
        assert_eq!(outcome.matches.len(), 2);
        assert_eq!(outcome.match_count, 4);
    }

    #[test]
    fn preserve_order_reorders_selected_subset() {
        let items = candidates(&["za note", "note", "unrelated"]);
        let outcome = search(
            &items,
            "note",
            SearchOptions {
                preserve_order: true,
                ..SearchOptions::default()
            },
        );
        assert_eq!(titles(&outcome), vec!["za note", "note"]);
    }

    #[test]
    fn subsequence_hit_scores_above_zero_and_below_substring() {
        let subsequence = fuzzy_score("frobnicate", "fbc").expect("subsequence should match");
        let substring = fuzzy_score("frobnicate", "frob").expect("substring should match");
        assert!(subsequence > 0);
        assert!(substring > subsequence);
        assert_eq!(fuzzy_score("frobnicate", "zzz"), None);
    }
}
