//! Load Balancing Selector logic

use std::collections::HashSet;

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use crate::domain::backend::BackendId;
use crate::domain::registry::WeightedPool;
use crate::error::RoutingError;

/// Draws one backend, with probability proportional to weight, among the
/// pool members whose id is healthy.
///
/// An unhealthy backend's weight is simply absent from the draw; it is not
/// redistributed.
pub fn pick<R: Rng + ?Sized>(
    healthy_ids: &HashSet<BackendId>,
    pool: &WeightedPool,
    rng: &mut R,
) -> Result<BackendId, RoutingError> {
    let (candidates, weights): (Vec<&BackendId>, Vec<u64>) = pool
        .members()
        .filter(|(id, _)| healthy_ids.contains(*id))
        .map(|(id, weight)| (id, u64::from(weight)))
        .unzip();

    if candidates.is_empty() {
        return Err(RoutingError::NoHealthyBackend);
    }

    // Weights are at least 1 and summed as u64, so this only fails on an empty set.
    let dist = WeightedIndex::new(&weights).map_err(|_| RoutingError::NoHealthyBackend)?;
    Ok(candidates[dist.sample(rng)].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backend::Backend;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool(entries: &[(&str, u32)]) -> WeightedPool {
        let backends: Vec<_> = entries
            .iter()
            .map(|(url, w)| Backend::new(BackendId::from(*url), *w))
            .collect();
        WeightedPool::from_backends(&backends)
    }

    #[test]
    fn test_empty_intersection_fails() {
        let pool = pool(&[("http://a/", 1)]);
        let mut rng = StdRng::seed_from_u64(1);
        let healthy = HashSet::from([BackendId::from("http://elsewhere/")]);
        assert_eq!(pick(&healthy, &pool, &mut rng), Err(RoutingError::NoHealthyBackend));
        assert_eq!(
            pick(&HashSet::new(), &pool, &mut rng),
            Err(RoutingError::NoHealthyBackend)
        );
    }

    #[test]
    fn test_unhealthy_backend_never_picked() {
        let pool = pool(&[("http://a/", 10), ("http://b/", 1)]);
        let healthy = HashSet::from([BackendId::from("http://b/")]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert_eq!(pick(&healthy, &pool, &mut rng).unwrap().as_str(), "http://b/");
        }
    }

    #[test]
    fn test_huge_weights_pick_quickly() {
        let pool = pool(&[("http://a/", u32::MAX), ("http://b/", 1), ("http://c/", u32::MAX)]);
        let mut rng = StdRng::seed_from_u64(9);

        let only_b = HashSet::from([BackendId::from("http://b/")]);
        assert_eq!(pick(&only_b, &pool, &mut rng).unwrap().as_str(), "http://b/");

        let healthy: HashSet<_> = pool.members().map(|(id, _)| id.clone()).collect();
        for _ in 0..1_000 {
            let id = pick(&healthy, &pool, &mut rng).unwrap();
            assert_ne!(id.as_str(), "http://b/");
        }
    }

    #[test]
    fn test_same_seed_same_choices() {
        let pool = pool(&[("http://a/", 1), ("http://b/", 2), ("http://c/", 3)]);
        let healthy: HashSet<_> = pool.members().map(|(id, _)| id.clone()).collect();
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..32)
                .map(|_| pick(&healthy, &pool, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(42), draw(42));
    }
}
