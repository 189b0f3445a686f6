use crate::catalog::{AppId, Catalog};
use crate::model::{ApplicationEntry, IdentityKey};
use nucleo_matcher::chars;
use std::collections::HashMap;

pub const DEFAULT_THRESHOLD: u8 = 70;
pub const SUGGESTION_THRESHOLD: u8 = 50;
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// One ranked hit for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate<'a> {
    pub id: AppId,
    pub entry: &'a ApplicationEntry,
    /// Candidate string that produced the score.
    pub matched: String,
    pub score: u8,
}

pub struct FuzzyMatcher {
    max_results: usize,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESULTS)
    }
}

impl FuzzyMatcher {
    pub fn new(max_results: usize) -> Self {
        Self { max_results }
    }

    /// Ranks catalog entries against `query`. Each entry scores the best
    /// similarity of any of its display name, name or keywords; entries below
    /// `threshold` are dropped, one hit is kept per identity key, and ties keep
    /// catalog order.
    pub fn resolve<'a>(&self, catalog: &'a Catalog, query: &str, threshold: u8) -> Vec<MatchCandidate<'a>> {
        let query = fold(query.trim());
        if query.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<MatchCandidate<'a>> = Vec::new();
        let mut by_key: HashMap<IdentityKey, usize> = HashMap::new();

        for (id, entry) in catalog.iter() {
            let Some((matched, score)) = best_candidate(&query, entry) else { continue };
            if score < threshold {
                continue;
            }
            let hit = MatchCandidate { id, entry, matched, score };
            match by_key.get(&entry.identity()) {
                Some(&pos) if hits[pos].score < score => hits[pos] = hit,
                Some(_) => {}
                None => {
                    by_key.insert(entry.identity(), hits.len());
                    hits.push(hit);
                }
            }
        }

        // Stable, so equal scores stay in catalog order.
        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(self.max_results);
        hits
    }
}

fn best_candidate(query: &[char], entry: &ApplicationEntry) -> Option<(String, u8)> {
    std::iter::once(&entry.display_name)
        .chain(std::iter::once(&entry.name))
        .chain(entry.keywords.iter())
        .map(|candidate| (candidate, similarity(query, &fold(candidate))))
        // max_by_key keeps the last maximum; reverse so the first one wins.
        .rev()
        .max_by_key(|(_, score)| *score)
        .map(|(candidate, score)| (candidate.clone(), score))
}

/// Lowercases and strips diacritics so "Café" and "cafe" compare equal.
fn fold(s: &str) -> Vec<char> {
    s.chars().map(|c| chars::normalize(chars::to_lower_case(c))).collect()
}

/// Best of the three measures, 0–100.
pub fn similarity(a: &[char], b: &[char]) -> u8 {
    ratio(a, b).max(partial_ratio(a, b)).max(token_sort_ratio(a, b))
}

/// Longest common subsequence length.
fn lcs(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            row[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                row[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

fn scaled(common: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((200 * common + total / 2) / total) as u8
}

/// Whole-string similarity: 2·LCS / (|a| + |b|), as a percentage.
pub fn ratio(a: &[char], b: &[char]) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    scaled(lcs(a, b), a.len() + b.len())
}

/// Best ratio of the shorter string against any equally long window of the
/// longer one.
pub fn partial_ratio(a: &[char], b: &[char]) -> u8 {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0;
    }
    let mut best = 0;
    for window in long.windows(short.len()) {
        best = best.max(lcs(short, window));
        if best == short.len() {
            break;
        }
    }
    scaled(best, 2 * short.len())
}

/// Ratio after sorting the alphanumeric tokens of both strings, so word
/// order does not matter.
pub fn token_sort_ratio(a: &[char], b: &[char]) -> u8 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &[char]) -> Vec<char> {
    let cleaned: String = s
        .iter()
        .map(|&c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ").chars().collect()
}
