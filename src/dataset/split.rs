//! Stratified index sampling
//!
//! Deterministic, class-balanced carving of index pools. Each split draw
//! preserves the class ratios of whatever remains in the pools, using
//! largest-remainder quota assignment so counts come out exact.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::utils::error::{BeanLeafError, Result};

/// Per-class quotas for drawing `take` items from pools of the given
/// sizes, proportional with largest-remainder rounding. Ties go to the
/// lower class index.
pub fn class_quotas(pool_sizes: &[usize], take: usize) -> Vec<usize> {
    let total: usize = pool_sizes.iter().sum();
    if total == 0 || take == 0 {
        return vec![0; pool_sizes.len()];
    }

    let mut quotas: Vec<usize> = Vec::with_capacity(pool_sizes.len());
    let mut remainders: Vec<(usize, f64)> = Vec::with_capacity(pool_sizes.len());

    for (class, &size) in pool_sizes.iter().enumerate() {
        let exact = take as f64 * size as f64 / total as f64;
        let floor = exact.floor() as usize;
        quotas.push(floor);
        remainders.push((class, exact - floor as f64));
    }

    let assigned: usize = quotas.iter().sum();
    let mut leftover = take.saturating_sub(assigned);

    remainders.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    for (class, _) in remainders {
        if leftover == 0 {
            break;
        }
        if quotas[class] < pool_sizes[class] {
            quotas[class] += 1;
            leftover -= 1;
        }
    }

    quotas
}

/// Draw `take` indices from per-class pools, class-proportionally.
///
/// Pools are consumed from the front; the caller shuffles them up front
/// so consumption order is random but reproducible. The drawn indices
/// come back shuffled as one sequence.
pub fn stratified_take(
    pools: &mut [Vec<usize>],
    take: usize,
    split_name: &str,
    class_names: &[&str],
    rng: &mut ChaCha8Rng,
) -> Result<Vec<usize>> {
    let total: usize = pools.iter().map(|p| p.len()).sum();
    if take > total {
        return Err(BeanLeafError::InsufficientData(format!(
            "{} split needs {} examples but only {} remain",
            split_name, take, total
        )));
    }

    let pool_sizes: Vec<usize> = pools.iter().map(|p| p.len()).collect();
    let quotas = class_quotas(&pool_sizes, take);

    for (class, (&quota, pool)) in quotas.iter().zip(pools.iter()).enumerate() {
        if quota > pool.len() {
            let name = class_names.get(class).copied().unwrap_or("?");
            return Err(BeanLeafError::InsufficientData(format!(
                "{} split needs {} examples of class '{}', only {} remain",
                split_name,
                quota,
                name,
                pool.len()
            )));
        }
    }

    let mut drawn = Vec::with_capacity(take);
    for (pool, quota) in pools.iter_mut().zip(quotas) {
        drawn.extend(pool.drain(..quota));
    }
    drawn.shuffle(rng);

    Ok(drawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn pools(sizes: &[usize]) -> Vec<Vec<usize>> {
        let mut next = 0;
        sizes
            .iter()
            .map(|&n| {
                let pool: Vec<usize> = (next..next + n).collect();
                next += n;
                pool
            })
            .collect()
    }

    #[test]
    fn test_quotas_sum_to_take() {
        let quotas = class_quotas(&[16, 16, 16], 32);
        assert_eq!(quotas.iter().sum::<usize>(), 32);
        // Balanced pools give balanced quotas
        assert!(quotas.iter().all(|&q| q == 10 || q == 11));
    }

    #[test]
    fn test_quotas_proportional_for_imbalanced_pools() {
        let quotas = class_quotas(&[100, 50, 50], 40);
        assert_eq!(quotas.iter().sum::<usize>(), 40);
        assert_eq!(quotas[0], 20);
        assert_eq!(quotas[1], 10);
        assert_eq!(quotas[2], 10);
    }

    #[test]
    fn test_take_is_exact_and_disjoint() {
        let mut p = pools(&[16, 16, 16]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let names = ["a", "b", "c"];

        let train = stratified_take(&mut p, 32, "train", &names, &mut rng).unwrap();
        let val = stratified_take(&mut p, 8, "val", &names, &mut rng).unwrap();

        assert_eq!(train.len(), 32);
        assert_eq!(val.len(), 8);
        for idx in &val {
            assert!(!train.contains(idx));
        }
        let remaining: usize = p.iter().map(|pl| pl.len()).sum();
        assert_eq!(remaining, 8);
    }

    #[test]
    fn test_take_too_large_is_an_error() {
        let mut p = pools(&[4, 4, 4]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let names = ["a", "b", "c"];

        let result = stratified_take(&mut p, 13, "train", &names, &mut rng);
        assert!(matches!(result, Err(BeanLeafError::InsufficientData(_))));
        // Pools are untouched on failure
        assert_eq!(p.iter().map(|pl| pl.len()).sum::<usize>(), 12);
    }

    #[test]
    fn test_same_seed_same_draw() {
        let names = ["a", "b", "c"];

        let mut p1 = pools(&[20, 20, 20]);
        let mut rng1 = ChaCha8Rng::seed_from_u64(7);
        let d1 = stratified_take(&mut p1, 30, "train", &names, &mut rng1).unwrap();

        let mut p2 = pools(&[20, 20, 20]);
        let mut rng2 = ChaCha8Rng::seed_from_u64(7);
        let d2 = stratified_take(&mut p2, 30, "train", &names, &mut rng2).unwrap();

        assert_eq!(d1, d2);
    }
}
