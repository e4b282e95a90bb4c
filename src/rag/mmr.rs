//! 最大边际相关性（MMR）重排
//!
//! 先选与查询最相似的候选，之后每轮选 `λ·sim(q, d) − (1−λ)·max sim(d, 已选)` 最大者。
//! λ = 1 只看相关性，λ = 0 只看多样性。

use crate::rag::store::cosine_similarity;

/// 返回被选中候选的下标（按选择顺序），长度为 min(k, candidates.len())
pub fn maximal_marginal_relevance<E: AsRef<[f32]>>(
    query: &[f32],
    candidates: &[E],
    k: usize,
    lambda_mult: f32,
) -> Vec<usize> {
    let limit = k.min(candidates.len());
    if limit == 0 {
        return Vec::new();
    }

    let to_query: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query, c.as_ref()))
        .collect();

    let mut selected = Vec::with_capacity(limit);
    // 每个候选与已选集合的最大相似度，随选择增量更新
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];

    while selected.len() < limit {
        let mut best: Option<(usize, f32)> = None;
        for (i, &relevance) in to_query.iter().enumerate() {
            if selected.contains(&i) {
                continue;
            }
            let score = if selected.is_empty() {
                relevance
            } else {
                lambda_mult * relevance - (1.0 - lambda_mult) * redundancy[i]
            };
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        let Some((picked, _)) = best else { break };
        selected.push(picked);
        let picked_emb = candidates[picked].as_ref();
        for (i, c) in candidates.iter().enumerate() {
            let sim = cosine_similarity(c.as_ref(), picked_emb);
            if sim > redundancy[i] {
                redundancy[i] = sim;
            }
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_pick_is_most_relevant() {
        let q = [1.0, 0.0];
        let cands = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]];
        assert_eq!(maximal_marginal_relevance(&q, &cands, 1, 0.3)[0], 1);
    }

    #[test]
    fn test_low_lambda_prefers_diverse_candidate() {
        let q = [1.0, 0.0, 0.0];
        let cands = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.99, 0.01, 0.0], // 与第一个几乎重复
            vec![0.5, 0.0, 0.5],
        ];
        assert_eq!(maximal_marginal_relevance(&q, &cands, 2, 0.3), vec![0, 2]);
        // λ = 1 时退化为按相关性排序
        assert_eq!(maximal_marginal_relevance(&q, &cands, 2, 1.0), vec![0, 1]);
    }

    #[test]
    fn test_k_larger_than_candidates_and_empty() {
        let q = [1.0, 0.0];
        let cands = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let picked = maximal_marginal_relevance(&q, &cands, 5, 0.5);
        assert_eq!(picked.len(), 2);
        let none: Vec<Vec<f32>> = vec![];
        assert!(maximal_marginal_relevance(&q, &none, 5, 0.5).is_empty());
    }
}
