//! Category-diversity re-ranking.
//!
//! After the hybrid sort, each item's score is penalized by
//! `diversity_weight × (number of already-selected items sharing its
//! category)`, walking the list in ranked order, and the list is then
//! re-sorted by penalized score with ties keeping their original order.
//! With weight 0 the ranking is unchanged; raising the weight can only push
//! same-category runs apart, never concentrate them.

use crate::types::RecommendationResult;

/// A scored candidate plus the category the penalty keys on.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub result: RecommendationResult,
    pub category: String,
}

/// Re-rank `ranked` (already sorted by score, descending) applying the
/// category penalty. Returns the adjusted results with their penalized
/// scores.
pub fn rerank(ranked: Vec<ScoredCandidate>, diversity_weight: f64) -> Vec<RecommendationResult> {
    let weight = diversity_weight.max(0.0);
    if weight == 0.0 {
        return ranked.into_iter().map(|c| c.result).collect();
    }

    let mut seen: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    let mut penalized: Vec<RecommendationResult> = Vec::with_capacity(ranked.len());
    for candidate in &ranked {
        let count = seen.entry(candidate.category.as_str()).or_insert(0);
        let mut result = candidate.result.clone();
        result.score -= weight * *count as f64;
        *count += 1;
        penalized.push(result);
    }

    // Stable sort: equal penalized scores keep their original rank order.
    penalized.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    penalized
}

/// Number of items in `results` whose category (looked up via `category_of`)
/// matches the most common category — used by tests to check concentration.
pub fn max_category_count<'a>(
    results: &[RecommendationResult],
    category_of: impl Fn(&str) -> &'a str,
) -> usize {
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for r in results {
        *counts.entry(category_of(&r.item_id)).or_insert(0) += 1;
    }
    counts.values().copied().max().unwrap_or(0)
}
