use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate `n` random vectors of dimension `dims` with uniform f32 values in [-1, 1].
pub fn random_embeddings(n: usize, dims: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

/// `prefix_0`, `prefix_1`, ... `prefix_{n-1}`.
pub fn ids(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}_{i}")).collect()
}

pub fn strings(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

/// Three 2-d points with a known nearest-neighbor order from `[1, 0]`:
/// A is closest, then C, then B.
pub fn abc() -> (Vec<Vec<f32>>, Vec<String>) {
    (
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.8, 0.2]],
        strings(&["A", "B", "C"]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_embeddings() {
        let vecs = random_embeddings(10, 16, 7);
        assert_eq!(vecs.len(), 10);
        assert_eq!(vecs[0].len(), 16);
        assert!(vecs.iter().flatten().all(|x| (-1.0..=1.0).contains(x)));
        assert_eq!(vecs, random_embeddings(10, 16, 7));
    }

    #[test]
    fn test_ids() {
        let ids = ids("s", 3);
        assert_eq!(ids, vec!["s_0", "s_1", "s_2"]);
    }
}
