use crate::vectorizer::{DocumentMatrix, SparseVector};
use std::cmp::Ordering;

/// Score every row of `matrix` against `query` and return at most `k`
/// `(row, score)` pairs with strictly positive score, best first.
///
/// Rows are L2-normalized and so is a transformed query, so the dot product
/// is the cosine similarity. Equal scores keep corpus order.
pub fn top_k(query: &SparseVector, matrix: &DocumentMatrix, k: usize) -> Vec<(usize, f64)> {
    if k == 0 || matrix.is_empty() || query.is_zero() {
        return Vec::new();
    }
    let mut scored: Vec<(usize, f64)> = matrix
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| (i, query.dot(row)))
        .filter(|(_, score)| *score > 0.0)
        .collect();
    if scored.is_empty() {
        return scored;
    }

    let by_score = |a: &(usize, f64), b: &(usize, f64)| {
        b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0))
    };
    if scored.len() > k {
        scored.select_nth_unstable_by(k - 1, by_score);
        scored.truncate(k);
    }
    scored.sort_unstable_by(by_score);
    scored
}
