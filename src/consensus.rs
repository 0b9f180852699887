//! Robust estimate of the dominant translation between two aligned point sets.
//!
//! Displacements are first voted into eight compass directions. When one
//! direction holds a clear majority, a small random subset of its members is
//! scored against the whole bucket by magnitude agreement and the best
//! supported member becomes the estimate.

use log::debug;
use rand::Rng;
use serde::Serialize;

use crate::error::MotionError;
use crate::my_types::*;

/// Screen coordinates: a negative `dy` moves up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
    Down,
    Up,
    Left,
    Right,
}

impl Direction {
    /// Vote order, earlier entries win ties.
    pub const ALL: [Direction; 8] = [
        Direction::UpLeft,
        Direction::UpRight,
        Direction::DownLeft,
        Direction::DownRight,
        Direction::Down,
        Direction::Up,
        Direction::Left,
        Direction::Right,
    ];

    /// Returns None for a zero displacement.
    pub fn classify(dx: f64, dy: f64) -> Option<Direction> {
        use std::cmp::Ordering::*;
        let vertical = dy.partial_cmp(&0.).unwrap_or(Equal);
        let horizontal = dx.partial_cmp(&0.).unwrap_or(Equal);
        match (vertical, horizontal) {
            (Less, Less) => Some(Direction::UpLeft),
            (Less, Greater) => Some(Direction::UpRight),
            (Greater, Less) => Some(Direction::DownLeft),
            (Greater, Greater) => Some(Direction::DownRight),
            (Less, Equal) => Some(Direction::Up),
            (Greater, Equal) => Some(Direction::Down),
            (Equal, Less) => Some(Direction::Left),
            (Equal, Greater) => Some(Direction::Right),
            (Equal, Equal) => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplacementSample {
    pub magnitude: f64,
    pub dx: f64,
    pub dy: f64,
}

impl DisplacementSample {
    pub fn between(old: &Vector2d, new: &Vector2d) -> Self {
        let d = new - old;
        Self {
            magnitude: d.norm(),
            dx: d.x,
            dy: d.y,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        Direction::classify(self.dx, self.dy)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MotionEstimate {
    pub dx: f64,
    pub dy: f64,
}

impl MotionEstimate {
    pub fn is_zero(&self) -> bool {
        self.dx == 0. && self.dy == 0.
    }
}

impl From<DisplacementSample> for MotionEstimate {
    fn from(sample: DisplacementSample) -> Self {
        Self {
            dx: sample.dx,
            dy: sample.dy,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConsensusParams {
    /// share of non-zero samples the winning direction must hold
    pub confidence_target: f64,
    /// below this many members the direction is not trusted
    pub min_members: usize,
    /// candidates drawn for the magnitude search
    pub sample_count: usize,
    /// magnitude tolerance for counting an inlier
    pub inlier_threshold: f64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            confidence_target: 0.60,
            min_members: 50,
            sample_count: 6,
            inlier_threshold: 2.,
        }
    }
}

/// Per-direction tally of the displacement samples.
#[derive(Debug, Default)]
pub struct BucketTally {
    counts: [usize; 8],
    members: [Vec<DisplacementSample>; 8],
}

impl BucketTally {
    pub fn from_points(
        old_points: &[Vector2d],
        new_points: &[Vector2d],
    ) -> Result<Self, MotionError> {
        if old_points.len() != new_points.len() {
            return Err(MotionError::LengthMismatch {
                old: old_points.len(),
                new: new_points.len(),
            });
        }

        let mut tally = BucketTally::default();
        for (p0, p1) in old_points.iter().zip(new_points) {
            let sample = DisplacementSample::between(p0, p1);
            if let Some(direction) = sample.direction() {
                tally.counts[direction.index()] += 1;
                tally.members[direction.index()].push(sample);
            }
        }
        Ok(tally)
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.counts[direction.index()]
    }

    /// Number of samples that fell into any bucket.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Largest bucket, first in vote order on ties. None when nothing moved.
    pub fn leader(&self) -> Option<Direction> {
        let mut best: Option<Direction> = None;
        for direction in Direction::ALL {
            let count = self.count(direction);
            if count > best.map_or(0, |b| self.count(b)) {
                best = Some(direction);
            }
        }
        best
    }

    fn into_members(mut self, direction: Direction) -> Vec<DisplacementSample> {
        std::mem::take(&mut self.members[direction.index()])
    }
}

/// Result of the direction vote.
#[derive(Clone, Debug)]
pub struct Vote {
    pub direction: Direction,
    pub confidence: f64,
    pub members: Vec<DisplacementSample>,
}

/// Find the direction shared by at least `confidence_target` of the moving
/// points. Returns None when no direction is confident enough.
pub fn vote(
    old_points: &[Vector2d],
    new_points: &[Vector2d],
    params: &ConsensusParams,
) -> Result<Option<Vote>, MotionError> {
    let tally = BucketTally::from_points(old_points, new_points)?;
    let total = tally.total();
    let leader = match tally.leader() {
        Some(leader) => leader,
        None => return Ok(None),
    };

    let confidence = if total > 0 {
        tally.count(leader) as f64 / total as f64
    } else {
        0.
    };
    if confidence < params.confidence_target {
        debug!(
            "no dominant direction, best {:?} with {:.2} of {} samples",
            leader, confidence, total
        );
        return Ok(None);
    }

    Ok(Some(Vote {
        direction: leader,
        confidence,
        members: tally.into_members(leader),
    }))
}

/// Score `min(sample_count, members.len())` distinct random members by the
/// number of members whose magnitude lies within `inlier_threshold` of theirs
/// and return the best one. The first candidate wins ties.
pub fn sample_consensus<R: Rng + ?Sized>(
    members: &[DisplacementSample],
    params: &ConsensusParams,
    rng: &mut R,
) -> Result<DisplacementSample, MotionError> {
    if members.is_empty() {
        return Err(MotionError::EmptyPopulation);
    }

    let sample_count = params.sample_count.min(members.len()).max(1);
    let mut candidates: Vec<usize> = Vec::with_capacity(sample_count);
    while candidates.len() < sample_count {
        let index = rng.gen_range(0..members.len());
        if !candidates.contains(&index) {
            candidates.push(index);
        }
    }

    let mut best_model = candidates[0];
    let mut max_inliers = 0;
    for &index in &candidates {
        let magnitude = members[index].magnitude;
        let inliers = members
            .iter()
            .filter(|m| (magnitude - m.magnitude).abs() < params.inlier_threshold)
            .count();
        if inliers > max_inliers {
            max_inliers = inliers;
            best_model = index;
        }
    }

    debug!(
        "consensus candidate {} supported by {}/{} members",
        best_model,
        max_inliers,
        members.len()
    );
    Ok(members[best_model])
}

/// Estimate the dominant displacement between two index-aligned point sets.
///
/// Returns a zero estimate when no direction wins the vote or when the
/// winning direction has fewer than `min_members` samples.
pub fn estimate<R: Rng + ?Sized>(
    old_points: &[Vector2d],
    new_points: &[Vector2d],
    params: &ConsensusParams,
    rng: &mut R,
) -> Result<MotionEstimate, MotionError> {
    let vote = match vote(old_points, new_points, params)? {
        Some(vote) => vote,
        None => return Ok(MotionEstimate::default()),
    };
    if vote.members.len() < params.min_members {
        debug!(
            "direction {:?} has only {} members",
            vote.direction,
            vote.members.len()
        );
        return Ok(MotionEstimate::default());
    }

    let best = sample_consensus(&vote.members, params, rng)?;
    Ok(best.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(0)
    }

    /// old points on a line, new points displaced by the given offsets
    fn displaced(offsets: &[(f64, f64)]) -> (Vec<Vector2d>, Vec<Vector2d>) {
        let old: Vec<Vector2d> = (0..offsets.len())
            .map(|i| Vector2d::new(10. * i as f64, 100.))
            .collect();
        let new = old
            .iter()
            .zip(offsets)
            .map(|(p, (dx, dy))| p + Vector2d::new(*dx, *dy))
            .collect();
        (old, new)
    }

    #[test]
    fn test_classify() {
        assert_eq!(Direction::classify(0., 0.), None);
        assert_eq!(Direction::classify(-1., -1.), Some(Direction::UpLeft));
        assert_eq!(Direction::classify(1., -1.), Some(Direction::UpRight));
        assert_eq!(Direction::classify(-1., 1.), Some(Direction::DownLeft));
        assert_eq!(Direction::classify(1., 1.), Some(Direction::DownRight));
        assert_eq!(Direction::classify(0., -0.5), Some(Direction::Up));
        assert_eq!(Direction::classify(0., 2.), Some(Direction::Down));
        assert_eq!(Direction::classify(-3., 0.), Some(Direction::Left));
        assert_eq!(Direction::classify(0.1, 0.), Some(Direction::Right));
    }

    #[test]
    fn test_sample() {
        let s = DisplacementSample::between(&Vector2d::new(1., 1.), &Vector2d::new(4., 5.));
        assert_eq!(s.dx, 3.);
        assert_eq!(s.dy, 4.);
        assert!((s.magnitude - 5.).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch() {
        let old = vec![Vector2d::zeros(); 3];
        let new = vec![Vector2d::zeros(); 2];
        assert_eq!(
            estimate(&old, &new, &ConsensusParams::default(), &mut rng()),
            Err(MotionError::LengthMismatch { old: 3, new: 2 })
        );
        assert!(vote(&new, &old, &ConsensusParams::default()).is_err());
    }

    #[test]
    fn test_no_motion() {
        let (old, new) = displaced(&[(0., 0.); 80]);
        let tally = BucketTally::from_points(&old, &new).unwrap();
        assert_eq!(tally.total(), 0);
        assert_eq!(tally.leader(), None);
        assert!(vote(&old, &new, &ConsensusParams::default())
            .unwrap()
            .is_none());
        let estimate = estimate(&old, &new, &ConsensusParams::default(), &mut rng()).unwrap();
        assert_eq!(estimate, MotionEstimate::default());
    }

    #[test]
    fn test_empty_sets() {
        let estimate = estimate(&[], &[], &ConsensusParams::default(), &mut rng()).unwrap();
        assert!(estimate.is_zero());
    }

    #[test]
    fn test_low_confidence() {
        // 59 right, 41 down: 0.59 < 0.60
        let mut offsets = vec![(3., 0.); 59];
        offsets.extend(vec![(0., 3.); 41]);
        let (old, new) = displaced(&offsets);
        assert!(vote(&old, &new, &ConsensusParams::default())
            .unwrap()
            .is_none());
        let estimate = estimate(&old, &new, &ConsensusParams::default(), &mut rng()).unwrap();
        assert!(estimate.is_zero());
    }

    #[test]
    fn test_zero_samples_do_not_dilute_vote() {
        // 60 right and 40 still points: confidence is 60/60
        let mut offsets = vec![(3., 0.); 60];
        offsets.extend(vec![(0., 0.); 40]);
        let (old, new) = displaced(&offsets);
        let vote = vote(&old, &new, &ConsensusParams::default())
            .unwrap()
            .unwrap();
        assert_eq!(vote.direction, Direction::Right);
        assert_eq!(vote.confidence, 1.);
        assert_eq!(vote.members.len(), 60);
    }

    #[test]
    fn test_confidence_boundary_is_inclusive() {
        // 60 up, 40 left: exactly 0.60
        let mut offsets = vec![(0., -2.); 60];
        offsets.extend(vec![(-2., 0.); 40]);
        let (old, new) = displaced(&offsets);
        let vote = vote(&old, &new, &ConsensusParams::default())
            .unwrap()
            .unwrap();
        assert_eq!(vote.direction, Direction::Up);
    }

    #[test]
    fn test_too_few_members() {
        // all 49 agree, but 49 < 50
        let (old, new) = displaced(&[(5., 5.); 49]);
        let vote = vote(&old, &new, &ConsensusParams::default())
            .unwrap()
            .unwrap();
        assert_eq!(vote.direction, Direction::DownRight);
        let estimate = estimate(&old, &new, &ConsensusParams::default(), &mut rng()).unwrap();
        assert!(estimate.is_zero());
    }

    #[test]
    fn test_tie_goes_to_earlier_direction() {
        let mut offsets = vec![(2., 0.); 3];
        offsets.extend(vec![(-2., -2.); 3]);
        let (old, new) = displaced(&offsets);
        let tally = BucketTally::from_points(&old, &new).unwrap();
        assert_eq!(tally.count(Direction::Right), 3);
        assert_eq!(tally.count(Direction::UpLeft), 3);
        assert_eq!(tally.leader(), Some(Direction::UpLeft));

        let params = ConsensusParams {
            confidence_target: 0.5,
            ..Default::default()
        };
        let vote = vote(&old, &new, &params).unwrap().unwrap();
        assert_eq!(vote.direction, Direction::UpLeft);
        assert_eq!(vote.members.len(), 3);
    }

    #[test]
    fn test_consistent_motion() {
        let (old, new) = displaced(&[(5., 5.); 60]);
        let estimate = estimate(&old, &new, &ConsensusParams::default(), &mut rng()).unwrap();
        assert_eq!(estimate, MotionEstimate { dx: 5., dy: 5. });
    }

    #[test]
    fn test_magnitude_outliers_rejected() {
        let mut offsets = vec![(5., 0.); 55];
        offsets.extend(vec![(60., 0.); 5]);
        let (old, new) = displaced(&offsets);
        // six distinct candidates out of five outliers always include an inlier
        for seed in 0..20 {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let estimate = estimate(&old, &new, &ConsensusParams::default(), &mut rng).unwrap();
            assert_eq!(estimate, MotionEstimate { dx: 5., dy: 0. });
        }
    }

    #[test]
    fn test_direction_outliers_rejected() {
        // 70 points moving up-left with small jitter, 20 lost points scattered
        let mut offsets: Vec<(f64, f64)> = (0..70)
            .map(|i| (-4. - 0.01 * (i % 5) as f64, -3. + 0.01 * (i % 3) as f64))
            .collect();
        offsets.extend((0..20).map(|i| (30. + i as f64, 12.)));
        let (old, new) = displaced(&offsets);
        let estimate = estimate(&old, &new, &ConsensusParams::default(), &mut rng()).unwrap();
        assert!(estimate.dx < -3.9 && estimate.dx > -4.1);
        assert!(estimate.dy > -3.1 && estimate.dy < -2.9);
    }

    #[test]
    fn test_fixed_seed_is_deterministic() {
        let offsets: Vec<(f64, f64)> = (0..80).map(|i| (1. + (i % 7) as f64, 0.)).collect();
        let (old, new) = displaced(&offsets);
        let params = ConsensusParams::default();
        let a = estimate(&old, &new, &params, &mut Xoshiro256PlusPlus::seed_from_u64(7)).unwrap();
        let b = estimate(&old, &new, &params, &mut Xoshiro256PlusPlus::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_count_capped_by_population() {
        let members = vec![
            DisplacementSample {
                magnitude: 1.,
                dx: 1.,
                dy: 0.,
            },
            DisplacementSample {
                magnitude: 1.5,
                dx: 1.5,
                dy: 0.,
            },
        ];
        let best = sample_consensus(&members, &ConsensusParams::default(), &mut rng()).unwrap();
        assert!(members.contains(&best));
        assert_eq!(
            sample_consensus(&[], &ConsensusParams::default(), &mut rng()),
            Err(MotionError::EmptyPopulation)
        );
    }

    #[test]
    fn test_first_candidate_wins_ties() {
        // every member agrees with every other, so the first draw is kept
        let members: Vec<DisplacementSample> = (0..10)
            .map(|i| DisplacementSample {
                magnitude: 3. + 0.01 * i as f64,
                dx: 3. + 0.01 * i as f64,
                dy: 0.,
            })
            .collect();
        let params = ConsensusParams::default();
        let mut draw = rng();
        let first = draw.gen_range(0..members.len());
        let best = sample_consensus(&members, &params, &mut rng()).unwrap();
        assert_eq!(best, members[first]);
    }
}
