//! Two interchangeable rating engines over the same underlying model: a
//! per-participant bisection (`iterative`) and a batch FFT-convolution
//! (`convolution`). Both implement [`RatingEngine`] and are expected to
//! agree within a point on real contest data — see the golden-dataset test
//! in `convolution`.

pub mod convolution;
pub mod iterative;

/// Damping applied to a participant's own rating pull as the field's rank
/// distance grows: memoized prefix sum of `(5/7)^k`.
fn pre_sum_sigma(k: u32) -> f64 {
    (1..=k).fold(1.0, |acc, i| acc + (5.0_f64 / 7.0).powi(i as i32))
}

/// `k <= 100` uses the exact damping curve; beyond that it flattens to the
/// asymptotic `2/9`, matching the discontinuity the original model has at
/// k=100/101.
pub fn delta_adjustment_coefficient(k: u32) -> f64 {
    if k <= 100 {
        1.0 / (1.0 + pre_sum_sigma(k))
    } else {
        2.0 / 9.0
    }
}

/// Probability that `rating` beats `opponent_rating` under the standard
/// logistic Elo curve (400-point scale).
pub fn expected_win_rate(opponent_rating: f64, rating: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent_rating - rating) / 400.0))
}

/// `ks[i]` is the number of prior contests attended by participant `i`;
/// shared by both engines' final delta multiply.
pub fn compute_delta_coefficients(ks: &[i32]) -> Vec<f64> {
    ks.iter()
        .map(|&k| delta_adjustment_coefficient(k.max(0) as u32))
        .collect()
}

/// A strategy for turning a contest's (rank, rating, attempts) triples into
/// rating deltas. `iterative::IterativeEngine` and
/// `convolution::ConvolutionEngine` are the two implementations.
pub trait RatingEngine {
    /// `ranks[i]`, `ratings[i]`, `attended_counts[i]` describe participant
    /// `i`; returns the rating delta for each, in the same order.
    fn elo_delta(&self, ranks: &[i32], ratings: &[f64], attended_counts: &[i32]) -> Vec<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damping_matches_known_endpoints() {
        assert!((delta_adjustment_coefficient(0) - 0.5).abs() < 1e-9);
        // (5/7)^k is already negligible by k=100, so the exact and asymptotic
        // formulas agree to many decimal places right at the boundary.
        assert!((delta_adjustment_coefficient(100) - 2.0 / 9.0).abs() < 1e-9);
        assert!((delta_adjustment_coefficient(101) - 2.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn expected_win_rate_is_half_at_equal_rating() {
        assert!((expected_win_rate(1500.0, 1500.0) - 0.5).abs() < 1e-9);
    }
}
