//! Fuzzy best-match selection between two lists of strings

use crate::error::ReconcileError;
use serde::Serialize;
use std::collections::HashMap;

/// Similarity in `[0, 1]` between two names; `1.0` only for identical strings.
///
/// Jaro-Winkler rewards a shared prefix, which suits folder names that are
/// abbreviations of sheet names ("Acme" vs "Acme Corp").
pub fn ratio(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(a, b)
}

/// Best match found for one source string
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StringMatch {
    pub source: String,
    /// `None` when no target shares a single character with the source
    pub target: Option<String>,
    pub score: f64,
}

/// Result of one matching call, in source order
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchTable {
    entries: Vec<StringMatch>,
}

impl MatchTable {
    pub fn get(&self, source: &str) -> Option<&StringMatch> {
        self.entries.iter().find(|m| m.source == source)
    }

    /// Matched target for a source, if any
    pub fn target_for(&self, source: &str) -> Option<&str> {
        self.get(source).and_then(|m| m.target.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &StringMatch> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn upsert(&mut self, entry: StringMatch) {
        match self.entries.iter_mut().find(|m| m.source == entry.source) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    fn remove(&mut self, source: &str) {
        self.entries.retain(|m| m.source != source);
    }
}

/// Match every source against every target and keep the best-scoring target.
///
/// Ties keep the first target in list order. With `exclusive_targets` each
/// target is claimed by at most one source: a later source with a strictly
/// higher score steals the target and the previous claimant loses its entry,
/// while a later source with an equal or lower score gets no entry. This is a
/// greedy, order-dependent assignment, not a maximum-weight matching.
pub fn match_lists<S: AsRef<str>, T: AsRef<str>>(
    sources: &[S],
    targets: &[T],
    exclusive_targets: bool,
) -> Result<MatchTable, ReconcileError> {
    if sources.is_empty() {
        return Err(ReconcileError::EmptyInput("source"));
    }
    if targets.is_empty() {
        return Err(ReconcileError::EmptyInput("target"));
    }

    let mut table = MatchTable::default();
    // target -> (claiming source, score)
    let mut claims: HashMap<String, (String, f64)> = HashMap::new();

    for source in sources {
        let source = source.as_ref();
        let (target, score) = best_target(source, targets);

        let entry = StringMatch {
            source: source.to_string(),
            target: target.map(str::to_string),
            score,
        };

        let Some(target) = target.filter(|_| exclusive_targets) else {
            log::debug!("Matched '{}' to {:?} with a score of {:.3}", source, target, score);
            table.upsert(entry);
            continue;
        };

        match claims.get(target) {
            Some((previous, previous_score)) if score > *previous_score => {
                log::debug!(
                    "'{}' takes '{}' from '{}' ({:.3} > {:.3})",
                    source,
                    target,
                    previous,
                    score,
                    previous_score
                );
                table.remove(previous);
            }
            Some((previous, previous_score)) => {
                log::debug!(
                    "'{}' keeps '{}' ({:.3}); '{}' scored {:.3}",
                    previous,
                    target,
                    previous_score,
                    source,
                    score
                );
                continue;
            }
            None => {
                log::debug!("Matched '{}' to '{}' with a score of {:.3}", source, target, score);
            }
        }

        claims.insert(target.to_string(), (source.to_string(), score));
        table.upsert(entry);
    }

    Ok(table)
}

fn best_target<'t, T: AsRef<str>>(source: &str, targets: &'t [T]) -> (Option<&'t str>, f64) {
    let mut best = None;
    let mut best_score = 0.0;

    for target in targets {
        let score = ratio(source, target.as_ref());
        if score > best_score {
            best_score = score;
            best = Some(target.as_ref());
        }
    }

    (best, best_score)
}
