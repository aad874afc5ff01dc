// Diagnosis search over the code catalog
// Comma-separated input is searched term by term

use crate::catalog::{CatalogStore, CodeMatch};
use crate::error::{Result, ValidationError};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashSet;

/// Text shown in place of results when a term matches nothing
pub const NO_MATCH_MESSAGE: &str = "No matching diagnosis found.";

/// One entry in a term's result list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Found(CodeMatch),
    /// Sentinel: the term matched no catalog entry
    NoMatch,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Found(_))
    }

    /// (diagnosis, code) view; the sentinel has an empty code
    pub fn as_pair(&self) -> (&str, &str) {
        match self {
            MatchResult::Found(m) => (&m.diagnosis, &m.code),
            MatchResult::NoMatch => (NO_MATCH_MESSAGE, ""),
        }
    }
}

impl Serialize for MatchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let (diagnosis, code) = self.as_pair();
        CodeMatch::new(diagnosis, code).serialize(serializer)
    }
}

/// Ordered term -> results mapping.
///
/// Terms keep the position of their first appearance; searching the same
/// term again replaces its results in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    terms: Vec<(String, Vec<MatchResult>)>,
}

impl SearchResults {
    pub fn insert(&mut self, term: String, results: Vec<MatchResult>) {
        match self.terms.iter_mut().find(|(t, _)| *t == term) {
            Some((_, existing)) => *existing = results,
            None => self.terms.push((term, results)),
        }
    }

    pub fn get(&self, term: &str) -> Option<&[MatchResult]> {
        self.terms
            .iter()
            .find(|(t, _)| t == term)
            .map(|(_, results)| results.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[MatchResult])> {
        self.terms.iter().map(|(t, r)| (t.as_str(), r.as_slice()))
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|(t, _)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl Serialize for SearchResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.terms.len()))?;
        for (term, results) in &self.terms {
            map.serialize_entry(term, results)?;
        }
        map.end()
    }
}

/// Split raw input into lowercase search terms. Empty pieces between
/// commas are kept as the empty term, which matches every diagnosis.
pub fn split_terms(raw_input: &str) -> Vec<String> {
    raw_input
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .collect()
}

pub struct QueryService<'a> {
    catalog: CatalogStore<'a>,
}

impl<'a> QueryService<'a> {
    pub fn new(catalog: CatalogStore<'a>) -> Self {
        Self { catalog }
    }

    /// Search the catalog for every comma-separated term in `raw_input`.
    ///
    /// Blank input is a validation error. Each term gets its own entry;
    /// a term with no hits gets the single `MatchResult::NoMatch` sentinel.
    /// Storage failures come back as `IcdError::Storage`, never as no-match.
    pub fn search(&self, raw_input: &str) -> Result<SearchResults> {
        let raw_input = raw_input.trim();
        if raw_input.is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }

        let mut results = SearchResults::default();
        for term in split_terms(raw_input) {
            let matches = self.catalog.find_by_diagnosis_substring(&term).map_err(|e| {
                tracing::error!(error = %e, term = %term, "error during ICD search");
                e
            })?;

            let mut seen = HashSet::new();
            let mut deduped: Vec<MatchResult> = matches
                .into_iter()
                .filter(|m| seen.insert(m.clone()))
                .map(MatchResult::Found)
                .collect();

            if deduped.is_empty() {
                deduped.push(MatchResult::NoMatch);
            }

            tracing::debug!(term = %term, hits = deduped.len(), "search term resolved");
            results.insert(term, deduped);
        }

        Ok(results)
    }
}
