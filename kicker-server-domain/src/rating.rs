//! ELO rating updates applied when a match is confirmed.

pub const K_FACTOR: f64 = 32.0;

pub const BASE_RATING: i32 = 1200;

/// Computes the post-match ratings for the winning and losing side.
///
/// The delta is truncated toward zero, not rounded; this matches the
/// historical rating fixtures. Results are clamped at zero.
pub fn compute_updated_ratings(winner_rating: i32, loser_rating: i32) -> (i32, i32) {
    let expected_winner =
        1.0 / (1.0 + 10f64.powf(f64::from(loser_rating - winner_rating) / 400.0));
    let expected_loser =
        1.0 / (1.0 + 10f64.powf(f64::from(winner_rating - loser_rating) / 400.0));

    let new_winner_rating = winner_rating + (K_FACTOR * (1.0 - expected_winner)) as i32;
    let new_loser_rating = loser_rating + (K_FACTOR * (0.0 - expected_loser)) as i32;

    (new_winner_rating.max(0), new_loser_rating.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ratings_swing_sixteen_points() {
        assert_eq!(compute_updated_ratings(1200, 1200), (1216, 1184));
        assert_eq!(compute_updated_ratings(800, 800), (816, 784));
    }

    #[test]
    fn expected_win_moves_little() {
        // Winner expected score ~0.909, so the winner gains trunc(32 * 0.091) = 2
        // and the loser drops by the same truncated amount.
        assert_eq!(compute_updated_ratings(1400, 1000), (1402, 998));
    }

    #[test]
    fn upset_win_moves_a_lot() {
        assert_eq!(compute_updated_ratings(1000, 1400), (1029, 1371));
    }

    #[test]
    fn loser_rating_is_clamped_at_zero() {
        let (winner, loser) = compute_updated_ratings(0, 0);
        assert_eq!(winner, 16);
        assert_eq!(loser, 0);

        // Loser at 10 drops by trunc(11.95) = 11, which would go negative.
        assert_eq!(compute_updated_ratings(100, 10), (111, 0));
    }

    #[test]
    fn winner_never_loses_and_loser_never_gains() {
        for winner_rating in (0..3000).step_by(137) {
            for loser_rating in (0..3000).step_by(173) {
                let (new_winner, new_loser) =
                    compute_updated_ratings(winner_rating, loser_rating);
                assert!(new_winner >= winner_rating);
                assert!(new_loser <= loser_rating);
                assert!(new_winner >= 0);
                assert!(new_loser >= 0);
            }
        }
    }

    #[test]
    fn delta_is_truncated_toward_zero() {
        // 1216 vs 1200: winner expected ~0.523, raw delta 15.26 -> 15, not 16.
        assert_eq!(compute_updated_ratings(1216, 1200), (1231, 1185));
    }
}
