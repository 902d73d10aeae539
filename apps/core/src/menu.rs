use std::collections::HashSet;

use crate::model::Candidate;
use crate::search::{self, SearchOptions, SearchOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuError {
    /// Construction with zero candidates. Callers are expected to feed
    /// a single "Loading" placeholder instead of an empty set.
    EmptyCandidateSet,
}

impl std::fmt::Display for MenuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCandidateSet => write!(f, "candidate set is empty"),
        }
    }
}

impl std::error::Error for MenuError {}

/// Live menu aggregate for one generation: candidate items, the query,
/// the filtered subset and the selection cursor. `search` is the only
/// path by which `filtered` and the selection change; every caller
/// (keystroke handling, item updates) funnels through it.
#[derive(Debug)]
pub struct MenuState {
    items: Vec<Candidate>,
    query: String,
    filtered: Vec<Candidate>,
    selected: Option<usize>,
    match_count: usize,
    options: SearchOptions,
}

impl MenuState {
    pub fn new(
        candidates: Vec<Candidate>,
        initial_query: &str,
        options: SearchOptions,
    ) -> Result<Self, MenuError> {
        if candidates.is_empty() {
            return Err(MenuError::EmptyCandidateSet);
        }

        let mut state = Self {
            items: dedupe_by_title(candidates),
            query: String::new(),
            filtered: Vec::new(),
            selected: None,
            match_count: 0,
            options,
        };
        state.search(initial_query);
        Ok(state)
    }

    /// Re-runs the engine against the live item set, resets the
    /// selection to the top match (or clears it), and refreshes the
    /// pre-limit match counter.
    pub fn search(&mut self, query: &str) -> &[Candidate] {
        let SearchOutcome {
            matches,
            match_count,
        } = search::search(&self.items, query, self.options);

        self.query = query.to_string();
        self.filtered = matches;
        self.match_count = match_count;
        self.selected = if self.filtered.is_empty() { None } else { Some(0) };
        &self.filtered
    }

    /// Replaces the item set (first occurrence wins on duplicate
    /// computed titles) and re-runs the current query so `filtered`
    /// stays consistent.
    pub fn replace_items(&mut self, new_items: Vec<Candidate>) {
        self.items = dedupe_by_title(new_items);
        let query = self.query.clone();
        self.search(&query);
    }

    /// Moves the cursor by `delta`, wrapping around both ends of the
    /// filtered set.
    pub fn move_selection(&mut self, delta: i64) {
        let len = self.filtered.len();
        if len == 0 {
            self.selected = None;
            return;
        }

        let current = self.selected.unwrap_or(0) as i64;
        let next = (current + delta).rem_euclid(len as i64);
        self.selected = Some(next as usize);
    }

    /// 1-based numeric jump; out-of-range ordinals are a no-op.
    pub fn select_by_ordinal(&mut self, ordinal: usize) {
        if ordinal == 0 || ordinal > self.filtered.len() {
            return;
        }
        self.selected = Some(ordinal - 1);
    }

    pub fn items(&self) -> &[Candidate] {
        &self.items
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filtered(&self) -> &[Candidate] {
        &self.filtered
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_candidate(&self) -> Option<&Candidate> {
        self.selected.and_then(|index| self.filtered.get(index))
    }

    pub fn match_count(&self) -> usize {
        self.match_count
    }
}

fn dedupe_by_title(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.computed_title().to_string()))
        .collect()
}
