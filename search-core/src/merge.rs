//! Reciprocal rank fusion and deduplication of per-strategy result sets.

use crate::config::RrfConfig;
use crate::identity::ResultKey;
use crate::model::SearchResult;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// One strategy's already-ranked output, in the order that strategy
/// considers most relevant first.
pub struct SourceResults {
    pub source: String,
    pub weight: f64,
    pub results: Vec<SearchResult>,
}

impl SourceResults {
    pub fn new(source: impl Into<String>, results: Vec<SearchResult>) -> Self {
        Self { source: source.into(), weight: 1.0, results }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

struct Accumulated {
    representative: SearchResult,
    representative_score: f64,
    rrf_score: f64,
    sources: Vec<String>,
}

/// Fuses multiple per-strategy result lists into a single ranked list.
///
/// Per result, the RRF contribution is `weight / (k + rank + 1)` where
/// `rank` is the zero-based position within that source's list. Results
/// sharing a `(entity_id, record_id)` key across sources have their
/// contributions summed; the representative copy kept is whichever had the
/// highest original per-strategy score, ties broken by first-seen order.
/// Final ordering is RRF score descending, stable on ties.
pub fn fuse_rrf(sources: Vec<SourceResults>, config: &RrfConfig) -> Vec<SearchResult> {
    let mut accumulator: BTreeMap<ResultKey, Accumulated> = BTreeMap::new();
    let mut insertion_order: Vec<ResultKey> = Vec::new();

    for source in sources {
        for (rank, result) in source.results.into_iter().enumerate() {
            let key = result.key();
            let contribution = source.weight / (config.k + rank as f64 + 1.0);

            match accumulator.get_mut(&key) {
                Some(entry) => {
                    entry.rrf_score += contribution;
                    entry.sources.push(source.source.clone());
                    if result.score > entry.representative_score {
                        entry.representative_score = result.score;
                        entry.representative = result;
                    }
                }
                None => {
                    insertion_order.push(key.clone());
                    accumulator.insert(
                        key,
                        Accumulated {
                            representative_score: result.score,
                            sources: vec![source.source.clone()],
                            rrf_score: contribution,
                            representative: result,
                        },
                    );
                }
            }
        }
    }

    let mut fused: Vec<(usize, SearchResult)> = insertion_order
        .into_iter()
        .enumerate()
        .filter_map(|(order, key)| accumulator.remove(&key).map(|acc| (order, acc)))
        .map(|(order, acc)| {
            let mut result = acc.representative;
            result.metadata.insert("_sources".to_string(), json!(acc.sources));
            result.metadata.insert("_rrfScore".to_string(), json!(acc.rrf_score));
            result.score = acc.rrf_score;
            (order, result)
        })
        .collect();

    fused.sort_by(|(order_a, a), (order_b, b)| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(order_a.cmp(order_b)));

    let mut out: Vec<SearchResult> = fused.into_iter().map(|(_, result)| result).collect();
    if let Some(min_score) = config.min_score {
        out.retain(|result| rrf_score(result) >= min_score);
    }
    out
}

fn rrf_score(result: &SearchResult) -> f64 {
    result.metadata.get("_rrfScore").and_then(Value::as_f64).unwrap_or(result.score)
}

/// Cheap same-key deduplication without RRF weighting: keeps the result
/// with the highest original score per `(entity_id, record_id)`.
pub fn dedupe_by_key(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut best: BTreeMap<ResultKey, SearchResult> = BTreeMap::new();
    let mut order: Vec<ResultKey> = Vec::new();
    for result in results {
        let key = result.key();
        match best.get(&key) {
            Some(existing) if existing.score >= result.score => {}
            _ => {
                if !best.contains_key(&key) {
                    order.push(key.clone());
                }
                best.insert(key, result);
            }
        }
    }
    order.into_iter().filter_map(|key| best.remove(&key)).collect()
}

/// Min-max normalizes scores into `[0, 1]`. Provided for callers that build
/// custom pipelines; the default orchestrator pipeline never applies it.
pub fn normalize_min_max(results: &mut [SearchResult]) {
    if results.is_empty() {
        return;
    }
    let min = results.iter().map(|r| r.score).fold(f64::INFINITY, f64::min);
    let max = results.iter().map(|r| r.score).fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range <= f64::EPSILON {
        for result in results.iter_mut() {
            result.score = 1.0;
        }
        return;
    }
    for result in results.iter_mut() {
        result.score = (result.score - min) / range;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{EntityId, RecordId};

    fn result(entity: &str, record: &str, source: &str, score: f64) -> SearchResult {
        SearchResult {
            entity_id: EntityId::new(entity),
            record_id: RecordId::new(record),
            score,
            source: source.to_string(),
            presenter: None,
            url: None,
            links: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn dedup_math_matches_the_expected_rrf_sum() {
        let fulltext = SourceResults::new("fulltext", vec![result("crm:contact", "1", "fulltext", 0.9)]);
        let vector = SourceResults::new("vector", vec![result("crm:contact", "2", "vector", 0.5), result("crm:contact", "1", "vector", 0.8)]);
        let fused = fuse_rrf(vec![fulltext, vector], &RrfConfig::default());

        let top = fused.iter().find(|r| r.record_id == RecordId::new("1")).unwrap();
        let expected = 1.0 / 61.0 + 1.0 / 63.0;
        assert!((top.score - expected).abs() < 1e-12);
        let sources = top.metadata.get("_sources").unwrap().as_array().unwrap();
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn fusion_is_commutative_over_source_order() {
        let a = SourceResults::new("fulltext", vec![result("e", "1", "fulltext", 1.0)]);
        let b = SourceResults::new("vector", vec![result("e", "2", "vector", 1.0)]);
        let forward = fuse_rrf(vec![SourceResults::new(a.source.clone(), vec![result("e", "1", "fulltext", 1.0)]), SourceResults::new(b.source.clone(), vec![result("e", "2", "vector", 1.0)])], &RrfConfig::default());
        let backward = fuse_rrf(vec![SourceResults::new(b.source, vec![result("e", "2", "vector", 1.0)]), SourceResults::new(a.source, vec![result("e", "1", "fulltext", 1.0)])], &RrfConfig::default());

        let forward_keys: Vec<_> = forward.iter().map(|r| r.record_id.clone()).collect();
        let backward_keys: Vec<_> = backward.iter().map(|r| r.record_id.clone()).collect();
        assert_eq!(forward_keys, backward_keys);
    }

    #[test]
    fn within_source_rank_order_is_preserved() {
        let results = vec![result("e", "1", "fulltext", 0.5), result("e", "2", "fulltext", 0.9)];
        let fused = fuse_rrf(vec![SourceResults::new("fulltext", results)], &RrfConfig::default());
        assert_eq!(fused[0].record_id, RecordId::new("1"));
        assert_eq!(fused[1].record_id, RecordId::new("2"));
    }

    #[test]
    fn dedupe_by_key_keeps_highest_score() {
        let results = vec![result("e", "1", "fulltext", 0.2), result("e", "1", "vector", 0.9)];
        let deduped = dedupe_by_key(results);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].score, 0.9);
    }
}
