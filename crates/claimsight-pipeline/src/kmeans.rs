//! Seeded k-means over raw embedding vectors.
//!
//! Lloyd's algorithm with k-means++ initialization. Every source of
//! randomness flows from the configured seed, so a run over the same input
//! produces the same partition.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Parameters for one clustering call.
#[derive(Debug, Clone)]
pub struct KMeansParams {
    /// Number of clusters.
    pub k: usize,
    /// Base seed; restart `r` uses `seed + r`.
    pub seed: u64,
    /// Independent restarts; the lowest-inertia run wins.
    pub restarts: usize,
    /// Iteration cap per restart.
    pub max_iterations: usize,
}

/// Partition `vectors` into `params.k` groups.
///
/// Returns one cluster label in `0..k` per input vector, in input order.
/// Requires `0 < k <= vectors.len()`; callers uphold this via the k
/// selection rule.
pub fn cluster(vectors: &[Vec<f32>], params: &KMeansParams) -> Vec<usize> {
    debug_assert!(params.k > 0 && params.k <= vectors.len());

    let mut best_assignments = Vec::new();
    let mut best_inertia = f64::INFINITY;

    for restart in 0..params.restarts.max(1) {
        let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(restart as u64));
        let (assignments, inertia) = run_once(vectors, params, &mut rng);
        if inertia < best_inertia {
            best_inertia = inertia;
            best_assignments = assignments;
        }
    }

    debug!(
        k = params.k,
        n = vectors.len(),
        inertia = best_inertia,
        "k-means complete"
    );
    best_assignments
}

fn run_once(vectors: &[Vec<f32>], params: &KMeansParams, rng: &mut StdRng) -> (Vec<usize>, f64) {
    let mut centroids = plus_plus_init(vectors, params.k, rng);
    let mut assignments = vec![0usize; vectors.len()];

    for _ in 0..params.max_iterations {
        let mut changed = false;
        for (i, vector) in vectors.iter().enumerate() {
            let nearest = nearest_centroid(vector, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        centroids = recompute_centroids(vectors, &assignments, params.k, &centroids);
        fix_empty_clusters(vectors, &mut assignments, &mut centroids);

        if !changed {
            break;
        }
    }

    let inertia = vectors
        .iter()
        .zip(&assignments)
        .map(|(v, &c)| distance_squared(v, &centroids[c]) as f64)
        .sum();

    (assignments, inertia)
}

/// k-means++ seeding: first centroid uniform, the rest sampled with
/// probability proportional to squared distance from the nearest chosen
/// centroid.
fn plus_plus_init(vectors: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let n = vectors.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(vectors[rng.random_range(0..n)].clone());

    let mut min_distances = vec![f32::MAX; n];

    while centroids.len() < k {
        let last = centroids.last().unwrap_or(&vectors[0]);
        for (i, vector) in vectors.iter().enumerate() {
            let dist = distance_squared(vector, last);
            if dist < min_distances[i] {
                min_distances[i] = dist;
            }
        }

        let total: f32 = min_distances.iter().sum();
        let next = if total <= 0.0 {
            // Every point coincides with a centroid; any pick is as good.
            rng.random_range(0..n)
        } else {
            let mut target = rng.random::<f32>() * total;
            let mut chosen = n - 1;
            for (i, dist) in min_distances.iter().enumerate() {
                target -= dist;
                if target <= 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        centroids.push(vectors[next].clone());
    }

    centroids
}

fn nearest_centroid(vector: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::MAX;
    for (j, centroid) in centroids.iter().enumerate() {
        let dist = distance_squared(vector, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = j;
        }
    }
    best
}

fn recompute_centroids(
    vectors: &[Vec<f32>],
    assignments: &[usize],
    k: usize,
    previous: &[Vec<f32>],
) -> Vec<Vec<f32>> {
    let dim = vectors[0].len();
    let mut sums = vec![vec![0.0f32; dim]; k];
    let mut counts = vec![0usize; k];

    for (vector, &label) in vectors.iter().zip(assignments) {
        counts[label] += 1;
        for (d, value) in vector.iter().enumerate() {
            sums[label][d] += value;
        }
    }

    sums.into_iter()
        .zip(counts)
        .enumerate()
        .map(|(j, (mut sum, count))| {
            if count == 0 {
                // Empty cluster keeps its previous centroid until repaired.
                return previous[j].clone();
            }
            for value in sum.iter_mut() {
                *value /= count as f32;
            }
            sum
        })
        .collect()
}

/// Re-seat empty clusters on the point farthest from its current centroid,
/// so every label in `0..k` stays populated.
fn fix_empty_clusters(vectors: &[Vec<f32>], assignments: &mut [usize], centroids: &mut [Vec<f32>]) {
    let k = centroids.len();
    loop {
        let mut counts = vec![0usize; k];
        for &label in assignments.iter() {
            counts[label] += 1;
        }

        let Some(empty) = counts.iter().position(|&c| c == 0) else {
            break;
        };

        let farthest = vectors
            .iter()
            .enumerate()
            .filter(|(i, _)| counts[assignments[*i]] > 1)
            .max_by(|(i, v), (j, w)| {
                let a = distance_squared(v, &centroids[assignments[*i]]);
                let b = distance_squared(w, &centroids[assignments[*j]]);
                a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i);

        match farthest {
            Some(i) => {
                assignments[i] = empty;
                centroids[empty] = vectors[i].clone();
            }
            None => break,
        }
    }
}

fn distance_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
