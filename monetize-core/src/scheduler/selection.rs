//! Destination selection policies.

use indexmap::IndexMap;
use monetize_sdk::objects::Destination;
use rand::Rng;

/// Destinations with their relative selection weights.
///
/// Iteration follows insertion order, which makes a weighted draw
/// reproducible for a given random value. Weights need not sum to 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightMap {
    weights: IndexMap<Destination, f64>,
}

impl WeightMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a weight. Negative and non-finite weights count as zero.
    pub fn insert(&mut self, destination: impl Into<Destination>, weight: f64) {
        let weight = if weight.is_finite() && weight > 0.0 {
            weight
        } else {
            0.0
        };
        self.weights.insert(destination.into(), weight);
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Destination, f64)> {
        self.weights.iter().map(|(destination, weight)| (destination, *weight))
    }
}

impl<D: Into<Destination>> FromIterator<(D, f64)> for WeightMap {
    fn from_iter<I: IntoIterator<Item = (D, f64)>>(iter: I) -> Self {
        let mut map = WeightMap::new();
        for (destination, weight) in iter {
            map.insert(destination, weight);
        }
        map
    }
}

/// Input to a one-shot pick.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidates {
    /// Picked uniformly.
    Sequence(Vec<Destination>),
    /// Picked by weight.
    Weighted(WeightMap),
}

impl From<Vec<Destination>> for Candidates {
    fn from(value: Vec<Destination>) -> Self {
        Candidates::Sequence(value)
    }
}

impl From<WeightMap> for Candidates {
    fn from(value: WeightMap) -> Self {
        Candidates::Weighted(value)
    }
}

/// Weighted pick for a draw in `[0, 1)`.
///
/// Scales the draw to `[0, total)`, walks the map in insertion order
/// subtracting each weight, and returns the first destination at which the
/// remainder reaches zero or below.
pub fn pick_weighted(weights: &WeightMap, draw: f64) -> Option<&Destination> {
    let mut choice = draw * weights.total_weight();
    for (destination, weight) in weights.iter() {
        choice -= weight;
        if choice <= 0.0 {
            return Some(destination);
        }
    }
    None
}

pub fn draw_weighted<'a, R: Rng + ?Sized>(
    weights: &'a WeightMap,
    rng: &mut R,
) -> Option<&'a Destination> {
    if weights.is_empty() {
        return None;
    }
    pick_weighted(weights, rng.random::<f64>())
}

pub fn draw_uniform<'a, R: Rng + ?Sized>(
    destinations: &'a [Destination],
    rng: &mut R,
) -> Option<&'a Destination> {
    if destinations.is_empty() {
        return None;
    }
    destinations.get(rng.random_range(0..destinations.len()))
}

/// Cursor over an ordered sequence, wrapping after the last element.
#[derive(Debug, Clone)]
pub struct SequentialCursor {
    destinations: Vec<Destination>,
    position: usize,
}

impl SequentialCursor {
    /// Starts on the first destination.
    pub fn new(destinations: Vec<Destination>) -> Self {
        Self {
            destinations,
            position: 0,
        }
    }

    pub fn current(&self) -> Option<&Destination> {
        self.destinations.get(self.position)
    }

    /// Move to the next destination and return it.
    pub fn advance(&mut self) -> Option<&Destination> {
        if self.destinations.is_empty() {
            return None;
        }
        self.position = (self.position + 1) % self.destinations.len();
        self.current()
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    fn weights() -> WeightMap {
        [("$alice.example", 0.7), ("$bob.example", 0.05), ("$connie.example", 0.25)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_pick_weighted_walks_in_insertion_order() {
        let weights = weights();
        assert_eq!(pick_weighted(&weights, 0.0).unwrap().as_str(), "$alice.example");
        assert_eq!(pick_weighted(&weights, 0.69).unwrap().as_str(), "$alice.example");
        assert_eq!(pick_weighted(&weights, 0.72).unwrap().as_str(), "$bob.example");
        assert_eq!(pick_weighted(&weights, 0.9).unwrap().as_str(), "$connie.example");
    }

    #[test]
    fn test_empty_map_picks_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(draw_weighted(&WeightMap::new(), &mut rng), None);
        assert_eq!(draw_uniform(&[], &mut rng), None);
    }

    #[test]
    fn test_invalid_weights_count_as_zero() {
        let mut map = WeightMap::new();
        map.insert("$a", -3.0);
        map.insert("$b", f64::NAN);
        map.insert("$c", 2.0);
        assert_eq!(map.total_weight(), 2.0);
        assert_eq!(pick_weighted(&map, 0.5).unwrap().as_str(), "$c");
    }

    #[test]
    fn test_seeded_draws_are_reproducible() {
        let weights = weights();
        let first: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..32)
                .map(|_| draw_weighted(&weights, &mut rng).cloned())
                .collect()
        };
        let second: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..32)
                .map(|_| draw_weighted(&weights, &mut rng).cloned())
                .collect()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn test_weighted_frequencies_follow_weights() {
        let weights = weights();
        let mut rng = StdRng::seed_from_u64(7);
        let mut picked: HashMap<String, usize> = HashMap::new();
        for _ in 0..10_000 {
            let destination = draw_weighted(&weights, &mut rng).unwrap();
            *picked.entry(destination.to_string()).or_default() += 1;
        }

        let alice = picked["$alice.example"];
        let bob = picked.get("$bob.example").copied().unwrap_or(0);
        let connie = picked["$connie.example"];
        assert!(alice > connie, "alice={alice} connie={connie}");
        assert!(connie > bob, "connie={connie} bob={bob}");
    }

    #[test]
    fn test_uniform_draw_stays_in_range() {
        let destinations: Vec<Destination> = ["$wallet", "$wallet2", "$wallet3"]
            .into_iter()
            .map(Destination::from)
            .collect();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let picked = draw_uniform(&destinations, &mut rng).unwrap();
            assert!(destinations.contains(picked));
        }
    }

    #[test]
    fn test_cursor_wraps_around() {
        let mut cursor = SequentialCursor::new(vec!["$a".into(), "$b".into(), "$c".into()]);
        assert_eq!(cursor.current().unwrap().as_str(), "$a");
        let visited: Vec<String> = (0..4)
            .map(|_| cursor.advance().unwrap().to_string())
            .collect();
        assert_eq!(visited, vec!["$b", "$c", "$a", "$b"]);
    }
}
