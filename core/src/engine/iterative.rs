//! Per-participant bisection solver: solves the same rank/rating equation
//! as `convolution::ConvolutionEngine`, one participant at a time, over a
//! `[0, MAX_RATING_SCALED]` search bracket.

use super::{compute_delta_coefficients, expected_win_rate, RatingEngine};

const MAX_RATING_SCALED: f64 = 4000.0;
const PRECISION: f64 = 0.01;
const MAX_ITERATIONS: u32 = 25;

/// `expected_rank(candidate) = sum(expected_win_rate(opponent, candidate) for
/// all opponents) + 0.5`.
fn expected_rank_for(all_ratings: &[f64], candidate_rating: f64) -> f64 {
    all_ratings
        .iter()
        .map(|&opponent| expected_win_rate(opponent, candidate_rating))
        .sum::<f64>()
        + 0.5
}

/// Same `mean_rank` target the convolution engine bisects against:
/// `sqrt(expected_rank(own_rating) * rank)`, anchored to the participant's
/// own current rating rather than an arbitrary fixed point.
fn mean_rank(all_ratings: &[f64], own_rating: f64, rank: f64) -> f64 {
    (expected_rank_for(all_ratings, own_rating).max(0.0) * rank).sqrt()
}

/// Solves for the rating `x` at which `expected_rank_for(x) + 0.5 ==
/// mean_rank`, via bisection over `[0, MAX_RATING_SCALED]`.
fn solve_expected_rating(all_ratings: &[f64], own_rating: f64, rank: f64) -> f64 {
    let target = mean_rank(all_ratings, own_rating, rank);

    let mut lo = 0.0_f64;
    let mut hi = MAX_RATING_SCALED;
    let mut iterations = 0;

    while hi - lo > PRECISION && iterations < MAX_ITERATIONS {
        let mid = (lo + hi) / 2.0;
        let equation_left = expected_rank_for(all_ratings, mid) + 0.5;

        // equation_left is decreasing in the candidate rating: a stronger
        // rating beats more of the field, so its expected rank drops.
        if equation_left > target {
            // mid is still too weak a rating; search the stronger half.
            lo = mid;
        } else {
            hi = mid;
        }
        iterations += 1;
    }

    (lo + hi) / 2.0
}

pub struct IterativeEngine;

impl RatingEngine for IterativeEngine {
    fn elo_delta(&self, ranks: &[i32], ratings: &[f64], attended_counts: &[i32]) -> Vec<f64> {
        let coefficients = compute_delta_coefficients(attended_counts);
        ranks
            .iter()
            .zip(ratings.iter())
            .zip(coefficients.iter())
            .map(|((&rank, &rating), &coefficient)| {
                let expected = solve_expected_rating(ratings, rating, rank as f64);
                (expected - rating) * coefficient
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_rank_gains_rating() {
        let ratings = vec![1500.0, 1500.0, 1500.0, 1500.0];
        let ranks = vec![1, 2, 3, 4];
        let ks = vec![10, 10, 10, 10];
        let deltas = IterativeEngine.elo_delta(&ranks, &ratings, &ks);
        assert!(deltas[0] > 0.0, "rank 1 should gain rating: {:?}", deltas);
        assert!(deltas[3] < 0.0, "last rank should lose rating: {:?}", deltas);
    }

    #[test]
    fn equal_ratings_equal_rank_is_a_wash() {
        let ratings = vec![1500.0; 3];
        let ranks = vec![1, 2, 3];
        let ks = vec![5, 5, 5];
        let deltas = IterativeEngine.elo_delta(&ranks, &ratings, &ks);
        assert!(deltas[0] >= deltas[1]);
        assert!(deltas[1] >= deltas[2]);
    }
}
