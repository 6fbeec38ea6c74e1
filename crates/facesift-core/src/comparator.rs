use crate::types::Embedding;

/// Boolean same-identity oracle over a pair of embeddings.
///
/// Pure and stateless; the clustering engine treats its verdict as ground
/// truth and does no ranking or confidence scoring on top of it.
pub trait Comparator {
    fn matches(&self, known: &Embedding, candidate: &Embedding) -> bool;
}

/// Euclidean-distance comparator: same identity iff the distance between
/// the two embeddings is within a fixed tolerance.
pub struct DistanceComparator {
    tolerance: f32,
}

impl DistanceComparator {
    pub const DEFAULT_TOLERANCE: f32 = 0.6;

    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }
}

impl Default for DistanceComparator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TOLERANCE)
    }
}

impl Comparator for DistanceComparator {
    fn matches(&self, known: &Embedding, candidate: &Embedding) -> bool {
        known.euclidean_distance(candidate) <= self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_tolerance_matches() {
        let cmp = DistanceComparator::new(0.6);
        let a = Embedding::new(vec![0.0]);
        let b = Embedding::new(vec![0.5]);
        assert!(cmp.matches(&a, &b));
    }

    #[test]
    fn test_beyond_tolerance_rejected() {
        let cmp = DistanceComparator::new(0.6);
        let a = Embedding::new(vec![0.0]);
        let b = Embedding::new(vec![0.7]);
        assert!(!cmp.matches(&a, &b));
    }

    #[test]
    fn test_exactly_at_tolerance_matches() {
        let cmp = DistanceComparator::new(0.5);
        let a = Embedding::new(vec![0.0]);
        let b = Embedding::new(vec![0.5]);
        assert!(cmp.matches(&a, &b));
    }

    #[test]
    fn test_symmetric() {
        let cmp = DistanceComparator::default();
        let a = Embedding::new(vec![0.1, 0.2]);
        let b = Embedding::new(vec![0.3, 0.4]);
        assert_eq!(cmp.matches(&a, &b), cmp.matches(&b, &a));
    }
}
