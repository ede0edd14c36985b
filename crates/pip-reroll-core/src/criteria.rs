//! Stop condition evaluation.
//!
//! A run stops once enough pips reach the minimum rank, optionally also
//! requiring a number of top-rank (SS) pips. Evaluation is a pure function of
//! the detection set and the criteria.

use serde::{Deserialize, Serialize};

use crate::detection::DetectedObject;
use crate::rank::Rank;

/// User-defined quality/quantity condition that ends a reroll run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopCriteria {
    /// Lowest rank that counts towards `minimum_count`
    pub minimum_rank: Rank,
    /// Objects at or above `minimum_rank` needed to stop
    pub minimum_count: usize,
    /// SS-rank objects needed to stop, `0` disables the requirement
    #[serde(default)]
    pub minimum_ss_count: usize,
}

impl Default for StopCriteria {
    fn default() -> Self {
        Self {
            minimum_rank: Rank::A,
            minimum_count: 3,
            minimum_ss_count: 0,
        }
    }
}

impl StopCriteria {
    pub fn new(minimum_rank: Rank, minimum_count: usize, minimum_ss_count: usize) -> Self {
        Self {
            minimum_rank,
            minimum_count,
            minimum_ss_count,
        }
    }

    /// Whether `objects` satisfy these criteria. See [`evaluate`].
    pub fn is_met_by(&self, objects: &[DetectedObject]) -> bool {
        evaluate(objects, self)
    }

    /// Short human summary, e.g. `Min A x3, SS: 1`.
    pub fn describe(&self) -> String {
        let mut text = format!("Min {} x{}", self.minimum_rank, self.minimum_count);
        if self.minimum_ss_count > 0 {
            text.push_str(&format!(", SS: {}", self.minimum_ss_count));
        }
        text
    }
}

/// Decide whether a detection set should stop the run.
///
/// An empty detection set never stops, whatever the criteria say.
pub fn evaluate(objects: &[DetectedObject], criteria: &StopCriteria) -> bool {
    if objects.is_empty() {
        return false;
    }

    let filtered = objects
        .iter()
        .filter(|object| object.rank >= criteria.minimum_rank)
        .count();

    if criteria.minimum_ss_count > 0 {
        let ss_count = objects
            .iter()
            .filter(|object| object.rank == Rank::HIGHEST)
            .count();
        filtered >= criteria.minimum_count && ss_count >= criteria.minimum_ss_count
    } else {
        filtered >= criteria.minimum_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objects(ranks: &[Rank]) -> Vec<DetectedObject> {
        ranks
            .iter()
            .enumerate()
            .map(|(i, rank)| DetectedObject::at(*rank, i as u32 * 10, 0))
            .collect()
    }

    #[test]
    fn test_count_threshold_met() {
        let criteria = StopCriteria::new(Rank::A, 3, 0);
        let detected = objects(&[Rank::A, Rank::A, Rank::A, Rank::F]);
        assert!(evaluate(&detected, &criteria));
    }

    #[test]
    fn test_ss_requirement_unmet() {
        let criteria = StopCriteria::new(Rank::A, 3, 1);
        let detected = objects(&[Rank::A, Rank::A, Rank::A, Rank::F]);
        assert!(!evaluate(&detected, &criteria));
    }

    #[test]
    fn test_ss_requirement_met() {
        let criteria = StopCriteria::new(Rank::A, 3, 1);
        let detected = objects(&[Rank::A, Rank::Ss, Rank::S, Rank::F]);
        assert!(evaluate(&detected, &criteria));
    }

    #[test]
    fn test_higher_ranks_count_towards_minimum() {
        let criteria = StopCriteria::new(Rank::B, 2, 0);
        assert!(evaluate(&objects(&[Rank::S, Rank::Ss]), &criteria));
        assert!(!evaluate(&objects(&[Rank::C, Rank::Ss]), &criteria));
    }

    #[test]
    fn test_empty_never_stops() {
        assert!(!evaluate(&[], &StopCriteria::new(Rank::F, 0, 0)));
        assert!(!evaluate(&[], &StopCriteria::default()));
    }

    #[test]
    fn test_lower_rank_never_satisfies_higher_minimum() {
        for (i, low) in Rank::ALL.iter().enumerate() {
            for high in &Rank::ALL[i + 1..] {
                let criteria = StopCriteria::new(*high, 3, 0);
                let detected = objects(&[*low, *low, *low]);
                assert!(
                    !evaluate(&detected, &criteria),
                    "{} pips satisfied minimum {}",
                    low,
                    high
                );
            }
        }
    }

    #[test]
    fn test_evaluate_is_pure() {
        let criteria = StopCriteria::new(Rank::A, 3, 0);
        let detected = objects(&[Rank::A, Rank::S, Rank::Ss]);
        let before = detected.clone();

        let first = evaluate(&detected, &criteria);
        let second = evaluate(&detected, &criteria);

        assert_eq!(first, second);
        assert_eq!(criteria.is_met_by(&detected), first);
        assert_eq!(detected, before);
    }

    #[test]
    fn test_describe() {
        assert_eq!(StopCriteria::new(Rank::A, 3, 0).describe(), "Min A x3");
        assert_eq!(StopCriteria::new(Rank::S, 2, 1).describe(), "Min S x2, SS: 1");
    }
}
