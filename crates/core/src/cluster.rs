use crate::config::SummarizationOptions;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

const TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub centroids: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    pub inertia: f64,
}

fn squared_distance(vector: &[f32], centroid: &[f64]) -> f64 {
    vector
        .iter()
        .zip(centroid)
        .map(|(value, center)| {
            let delta = *value as f64 - center;
            delta * delta
        })
        .sum()
}

fn nearest_centroid(vector: &[f32], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (label, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(vector, centroid);
        if distance < best.1 {
            best = (label, distance);
        }
    }
    best
}

fn seed_centroids(vectors: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let to_f64 = |vector: &Vec<f32>| vector.iter().map(|value| *value as f64).collect::<Vec<_>>();
    let mut centroids = vec![to_f64(&vectors[rng.gen_range(0..vectors.len())])];

    while centroids.len() < k {
        let weights: Vec<f64> = vectors
            .iter()
            .map(|vector| nearest_centroid(vector, &centroids).1)
            .collect();
        let total: f64 = weights.iter().sum();

        let pick = if total <= 0.0 {
            rng.gen_range(0..vectors.len())
        } else {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = vectors.len() - 1;
            for (index, weight) in weights.iter().enumerate() {
                if target < *weight {
                    chosen = index;
                    break;
                }
                target -= weight;
            }
            chosen
        };
        centroids.push(to_f64(&vectors[pick]));
    }

    centroids
}

fn lloyd(vectors: &[Vec<f32>], mut centroids: Vec<Vec<f64>>, max_iterations: usize) -> KMeansFit {
    let dimensions = centroids.first().map(Vec::len).unwrap_or_default();
    let mut labels = vec![usize::MAX; vectors.len()];

    for _ in 0..max_iterations.max(1) {
        let mut changed = false;
        for (slot, vector) in labels.iter_mut().zip(vectors) {
            let (label, _) = nearest_centroid(vector, &centroids);
            if *slot != label {
                *slot = label;
                changed = true;
            }
        }

        let mut sums = vec![vec![0f64; dimensions]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for (label, vector) in labels.iter().zip(vectors) {
            counts[*label] += 1;
            for (sum, value) in sums[*label].iter_mut().zip(vector) {
                *sum += *value as f64;
            }
        }

        let mut shift = 0f64;
        for (label, centroid) in centroids.iter_mut().enumerate() {
            // An empty cluster keeps its previous center.
            if counts[label] == 0 {
                continue;
            }
            for (center, sum) in centroid.iter_mut().zip(&sums[label]) {
                let updated = sum / counts[label] as f64;
                shift += (updated - *center).powi(2);
                *center = updated;
            }
        }

        if !changed || shift <= TOLERANCE {
            break;
        }
    }

    let mut inertia = 0f64;
    for (slot, vector) in labels.iter_mut().zip(vectors) {
        let (label, distance) = nearest_centroid(vector, &centroids);
        *slot = label;
        inertia += distance;
    }

    KMeansFit {
        centroids,
        labels,
        inertia,
    }
}

pub fn kmeans(vectors: &[Vec<f32>], k: usize, options: &SummarizationOptions) -> KMeansFit {
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut best: Option<KMeansFit> = None;

    for run in 0..options.n_init.max(1) {
        let seeds = seed_centroids(vectors, k, &mut rng);
        let fit = lloyd(vectors, seeds, options.max_iterations);
        debug!(run, inertia = fit.inertia, "k-means fit");
        if best.as_ref().map_or(true, |current| fit.inertia < current.inertia) {
            best = Some(fit);
        }
    }

    best.unwrap_or(KMeansFit {
        centroids: Vec::new(),
        labels: Vec::new(),
        inertia: 0.0,
    })
}

/// Picks one chunk id per cluster: the member closest to its centroid.
/// With fewer vectors than clusters every id is selected.
pub fn select_representatives(vectors: &[Vec<f32>], options: &SummarizationOptions) -> Vec<usize> {
    let k = options.clusters;
    if vectors.len() < k || k == 0 {
        return (0..vectors.len()).collect();
    }

    let fit = kmeans(vectors, k, options);
    let mut selected = Vec::with_capacity(k);

    for (label, centroid) in fit.centroids.iter().enumerate() {
        let closest = fit
            .labels
            .iter()
            .enumerate()
            .filter(|(_, assigned)| **assigned == label)
            .map(|(id, _)| (id, squared_distance(&vectors[id], centroid)))
            .min_by(|left, right| left.1.total_cmp(&right.1).then(left.0.cmp(&right.0)));

        if let Some((id, _)) = closest {
            selected.push(id);
        }
    }

    selected.sort_unstable();
    selected.dedup();
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(clusters: usize) -> SummarizationOptions {
        SummarizationOptions {
            clusters,
            ..SummarizationOptions::default()
        }
    }

    #[test]
    fn short_input_selects_every_chunk() {
        let vectors = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.5, 0.5]];
        assert_eq!(select_representatives(&vectors, &options(10)), vec![0, 1, 2]);
        assert!(select_representatives(&[], &options(3)).is_empty());
    }

    #[test]
    fn one_representative_per_separated_group() {
        let vectors = vec![
            vec![0.0, 0.0],
            vec![0.05, 0.0],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
            vec![10.0, 10.1],
        ];
        let selected = select_representatives(&vectors, &options(2));

        assert_eq!(selected.len(), 2);
        assert!(selected[0] <= 1);
        assert!((2..=4).contains(&selected[1]));
    }

    #[test]
    fn representative_is_closest_member_of_its_cluster() {
        let vectors = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![50.0, 50.0],
            vec![51.0, 50.0],
            vec![52.0, 50.0],
        ];
        let config = options(2);
        let fit = kmeans(&vectors, 2, &config);
        let selected = select_representatives(&vectors, &config);

        assert_eq!(selected, vec![1, 4]);
        for id in selected {
            let label = fit.labels[id];
            let own = squared_distance(&vectors[id], &fit.centroids[label]);
            for (other, assigned) in fit.labels.iter().enumerate() {
                if *assigned == label {
                    assert!(own <= squared_distance(&vectors[other], &fit.centroids[label]));
                }
            }
        }
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let vectors: Vec<Vec<f32>> = (0..30)
            .map(|index| vec![(index % 7) as f32, (index % 5) as f32])
            .collect();
        let config = options(4);
        assert_eq!(kmeans(&vectors, 4, &config), kmeans(&vectors, 4, &config));
    }

    #[test]
    fn output_is_sorted_distinct_and_bounded() {
        let vectors: Vec<Vec<f32>> = (0..20).map(|index| vec![index as f32, 0.0]).collect();
        let selected = select_representatives(&vectors, &options(5));
        assert!(selected.len() <= 5);
        assert!(selected.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
