//! Threshold clustering over pairwise cosine similarity.

use nd_core::{Error, GroupingMode, Result};
use serde::Serialize;

use super::vectorizer::FeatureVector;

/// Absorbs rounding so that identical vectors still reach a threshold of 1.0.
const SIMILARITY_EPSILON: f64 = 1e-9;

/// Article indices of one group, ascending. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    members: Vec<usize>,
}

impl Cluster {
    pub(crate) fn from_members(mut members: Vec<usize>) -> Self {
        members.sort_unstable();
        members.dedup();
        debug_assert!(!members.is_empty());
        Self { members }
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn smallest(&self) -> usize {
        self.members[0]
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.binary_search(&index).is_ok()
    }
}

/// Cosine similarity in [0, 1] for the non-negative weights the vectorizer
/// produces. Zero or mismatched vectors are similar to nothing.
pub fn cosine_similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    let (a, b) = (a.as_slice(), b.as_slice());
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x = f64::from(x);
        let y = f64::from(y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(0.0, 1.0)
}

/// Symmetric n×n similarities, computed once per batch.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    n: usize,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    pub fn compute(vectors: &[FeatureVector]) -> Self {
        let n = vectors.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            values[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let sim = cosine_similarity(&vectors[i], &vectors[j]);
                values[i * n + j] = sim;
                values[j * n + i] = sim;
            }
        }
        Self { n, values }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    fn similar(&self, i: usize, j: usize, threshold: f64) -> bool {
        i == j || self.get(i, j) + SIMILARITY_EPSILON >= threshold
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityGrouper {
    mode: GroupingMode,
}

impl SimilarityGrouper {
    pub fn new(mode: GroupingMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> GroupingMode {
        self.mode
    }

    /// Partition the batch into clusters, ordered by their smallest member.
    pub fn group(&self, vectors: &[FeatureVector], threshold: f64) -> Result<Vec<Cluster>> {
        validate_threshold(threshold)?;
        Ok(self.group_matrix(&SimilarityMatrix::compute(vectors), threshold))
    }

    pub(crate) fn group_matrix(&self, matrix: &SimilarityMatrix, threshold: f64) -> Vec<Cluster> {
        let mut clusters = match self.mode {
            GroupingMode::Transitive => connected_components(matrix, threshold),
            GroupingMode::Clique => greedy_cliques(matrix, threshold),
        };
        clusters.sort_by_key(Cluster::smallest);
        clusters
    }
}

pub fn validate_threshold(threshold: f64) -> Result<()> {
    if threshold > 0.0 && threshold <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidThreshold(threshold))
    }
}

fn connected_components(matrix: &SimilarityMatrix, threshold: f64) -> Vec<Cluster> {
    let n = matrix.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if matrix.similar(i, j, threshold) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    // keep the smaller index as root
                    parent[ri.max(rj)] = ri.min(rj);
                }
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        let root = find(&mut parent, i);
        groups[root].push(i);
    }
    groups
        .into_iter()
        .filter(|g| !g.is_empty())
        .map(Cluster::from_members)
        .collect()
}

/// Seeds in index order; a candidate joins only when it is similar to every
/// member already in the group.
fn greedy_cliques(matrix: &SimilarityMatrix, threshold: f64) -> Vec<Cluster> {
    let n = matrix.len();
    let mut assigned = vec![false; n];
    let mut clusters = Vec::new();

    for seed in 0..n {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let mut members = vec![seed];
        for candidate in (seed + 1)..n {
            if !assigned[candidate] && members.iter().all(|&m| matrix.similar(m, candidate, threshold)) {
                assigned[candidate] = true;
                members.push(candidate);
            }
        }
        clusters.push(Cluster::from_members(members));
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f32]) -> FeatureVector {
        FeatureVector::new(values.to_vec())
    }

    fn members(clusters: &[Cluster]) -> Vec<Vec<usize>> {
        clusters.iter().map(|c| c.members().to_vec()).collect()
    }

    #[test]
    fn test_cosine_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&v(&[0.0, 0.0]), &v(&[0.0, 0.0])), 0.0);
        assert_eq!(cosine_similarity(&v(&[1.0, 0.0]), &v(&[0.0, 0.0])), 0.0);
        assert_eq!(cosine_similarity(&v(&[]), &v(&[])), 0.0);
        assert!((cosine_similarity(&v(&[0.6, 0.8]), &v(&[0.6, 0.8])) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let grouper = SimilarityGrouper::default();
        assert!(grouper.group(&[], 0.0).is_err());
        assert!(grouper.group(&[], -0.5).is_err());
        assert!(grouper.group(&[], 1.5).is_err());
        assert!(grouper.group(&[], f64::NAN).is_err());
        assert!(grouper.group(&[], 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_transitive_chain_merges() {
        // a~b and b~c above 0.7, a~c below
        let a = v(&[1.0, 0.0, 0.0]);
        let b = v(&[0.8, 0.6, 0.0]);
        let c = v(&[0.28, 0.96, 0.0]);
        assert!(cosine_similarity(&a, &c) < 0.7);

        let vectors = vec![a, b, c, v(&[0.0, 0.0, 1.0])];
        let clusters = SimilarityGrouper::new(GroupingMode::Transitive).group(&vectors, 0.7).unwrap();
        assert_eq!(members(&clusters), vec![vec![0, 1, 2], vec![3]]);

        let clusters = SimilarityGrouper::new(GroupingMode::Clique).group(&vectors, 0.7).unwrap();
        assert_eq!(members(&clusters), vec![vec![0, 1], vec![2], vec![3]]);
    }

    #[test]
    fn test_clusters_ordered_by_smallest_member() {
        let vectors = vec![
            v(&[0.0, 1.0]),
            v(&[1.0, 0.0]),
            v(&[0.0, 1.0]),
            v(&[1.0, 0.0]),
        ];
        let clusters = SimilarityGrouper::default().group(&vectors, 0.9).unwrap();
        assert_eq!(members(&clusters), vec![vec![0, 2], vec![1, 3]]);
        assert!(clusters[1].contains(3));
        assert!(!clusters[1].contains(2));
    }

    #[test]
    fn test_zero_vectors_stay_apart() {
        let vectors = vec![v(&[0.0, 0.0]), v(&[0.0, 0.0]), v(&[0.0, 0.0])];
        let clusters = SimilarityGrouper::default().group(&vectors, 0.1).unwrap();
        assert_eq!(clusters.len(), 3);
    }

    #[test]
    fn test_identical_vectors_meet_threshold_one() {
        let vectors = vec![v(&[0.3, 0.4, 0.5]), v(&[0.3, 0.4, 0.5])];
        let clusters = SimilarityGrouper::default().group(&vectors, 1.0).unwrap();
        assert_eq!(members(&clusters), vec![vec![0, 1]]);
    }
}
