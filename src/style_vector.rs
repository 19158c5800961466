use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::warn;

use crate::errors::{Result, StyleEngineError};
use crate::feature_extractor::GameFeatureRow;
use crate::game_record::PlayerOutcome;

/// Games longer than this many plies count as long games
pub const LONG_GAME_PLIES: u32 = 80;
/// Default number of games below which a style vector is low confidence
pub const DEFAULT_MIN_GAMES: usize = 5;

/// One dimension of the style vector, in schema order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleFeature {
    AvgMoves,
    PctLongGames,
    AvgTrades,
    AvgQueenMove,
    PctCastledEarly,
    AvgChecks,
    PctSacrifices,
    WinRate,
    PctWins,
    PctDraws,
    PctLosses,
}

impl StyleFeature {
    pub const ALL: [StyleFeature; 11] = [
        StyleFeature::AvgMoves,
        StyleFeature::PctLongGames,
        StyleFeature::AvgTrades,
        StyleFeature::AvgQueenMove,
        StyleFeature::PctCastledEarly,
        StyleFeature::AvgChecks,
        StyleFeature::PctSacrifices,
        StyleFeature::WinRate,
        StyleFeature::PctWins,
        StyleFeature::PctDraws,
        StyleFeature::PctLosses,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StyleFeature::AvgMoves => "avg_moves",
            StyleFeature::PctLongGames => "pct_long_games",
            StyleFeature::AvgTrades => "avg_trades",
            StyleFeature::AvgQueenMove => "avg_queen_move",
            StyleFeature::PctCastledEarly => "pct_castled_early",
            StyleFeature::AvgChecks => "avg_checks",
            StyleFeature::PctSacrifices => "pct_sacrifices",
            StyleFeature::WinRate => "win_rate",
            StyleFeature::PctWins => "pct_wins",
            StyleFeature::PctDraws => "pct_draws",
            StyleFeature::PctLosses => "pct_losses",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }
}

pub const FEATURE_COUNT: usize = StyleFeature::ALL.len();

/// Fixed-length summary of one player's style.
///
/// A slot is `None` only when no game defined that feature; it is never
/// silently replaced by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleVector {
    values: Vec<Option<f64>>,
}

impl StyleVector {
    /// Build from raw slot values, rejecting the wrong dimensionality.
    pub fn new(values: Vec<Option<f64>>) -> Result<Self> {
        if values.len() != FEATURE_COUNT {
            return Err(StyleEngineError::Consistency {
                expected: FEATURE_COUNT,
                found: values.len(),
            });
        }
        Ok(Self { values })
    }

    /// Build from fully present values.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        Self::new(values.iter().copied().map(Some).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, feature: StyleFeature) -> Option<f64> {
        self.values[feature.index()]
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn check_dimensions(&self) -> Result<()> {
        if self.values.len() == FEATURE_COUNT {
            Ok(())
        } else {
            Err(StyleEngineError::Consistency {
                expected: FEATURE_COUNT,
                found: self.values.len(),
            })
        }
    }

    /// View keyed by feature name, serialized in schema order.
    pub fn named(&self) -> NamedStyle<'_> {
        NamedStyle(self)
    }
}

/// Serializes a [`StyleVector`] as `{ feature_name: value }` in schema order
#[derive(Debug, Clone, Copy)]
pub struct NamedStyle<'a>(&'a StyleVector);

impl Serialize for NamedStyle<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (feature, value) in StyleFeature::ALL.iter().zip(self.0.values.iter()) {
            map.serialize_entry(feature.name(), value)?;
        }
        map.end()
    }
}

/// Result of aggregating one player's games
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStyle {
    pub vector: StyleVector,
    pub games_used: usize,
    pub low_confidence: bool,
}

/// Exact integer tallies; every feature is one division at the end, so the
/// result does not depend on row order.
#[derive(Debug, Default)]
struct Tally {
    rows: u64,
    plies: u64,
    long_games: u64,
    trades: u64,
    queen_ply_sum: u64,
    queen_rows: u64,
    castled_early: u64,
    checks: u64,
    sacrifices: u64,
    half_points: u64,
    wins: u64,
    draws: u64,
    losses: u64,
}

impl Tally {
    fn add(&mut self, row: &GameFeatureRow) {
        self.rows += 1;
        self.plies += u64::from(row.ply_count);
        self.long_games += u64::from(row.ply_count > LONG_GAME_PLIES);
        self.trades += u64::from(row.trade_count);
        if let Some(ply) = row.first_queen_ply {
            self.queen_ply_sum += u64::from(ply);
            self.queen_rows += 1;
        }
        self.castled_early += u64::from(row.castled_early);
        self.checks += u64::from(row.check_count);
        self.sacrifices += u64::from(row.sacrifice);
        self.half_points += row.outcome.half_points();
        match row.outcome {
            PlayerOutcome::Win => self.wins += 1,
            PlayerOutcome::Draw => self.draws += 1,
            PlayerOutcome::Loss => self.losses += 1,
        }
    }

    fn ratio(numerator: u64, denominator: u64) -> Option<f64> {
        (denominator > 0).then(|| numerator as f64 / denominator as f64)
    }

    fn value(&self, feature: StyleFeature) -> Option<f64> {
        let n = self.rows;
        match feature {
            StyleFeature::AvgMoves => Self::ratio(self.plies, n),
            StyleFeature::PctLongGames => Self::ratio(self.long_games, n),
            StyleFeature::AvgTrades => Self::ratio(self.trades, n),
            StyleFeature::AvgQueenMove => Self::ratio(self.queen_ply_sum, self.queen_rows),
            StyleFeature::PctCastledEarly => Self::ratio(self.castled_early, n),
            StyleFeature::AvgChecks => Self::ratio(self.checks, n),
            StyleFeature::PctSacrifices => Self::ratio(self.sacrifices, n),
            StyleFeature::WinRate => Self::ratio(self.half_points, 2 * n),
            StyleFeature::PctWins => Self::ratio(self.wins, n),
            StyleFeature::PctDraws => Self::ratio(self.draws, n),
            StyleFeature::PctLosses => Self::ratio(self.losses, n),
        }
    }
}

/// Reduces a player's feature rows to a [`StyleVector`]
#[derive(Debug, Clone)]
pub struct StyleAggregator {
    min_games: usize,
}

impl Default for StyleAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_GAMES)
    }
}

impl StyleAggregator {
    pub fn new(min_games: usize) -> Self {
        Self { min_games }
    }

    pub fn min_games(&self) -> usize {
        self.min_games
    }

    /// Aggregate rows into one vector.
    ///
    /// Zero rows is an `InsufficientData` error; fewer than `min_games` rows
    /// still produces a vector, flagged low confidence.
    pub fn aggregate(&self, rows: &[GameFeatureRow]) -> Result<AggregatedStyle> {
        if rows.is_empty() {
            return Err(StyleEngineError::InsufficientData {
                needed: 1,
                found: 0,
            });
        }

        let mut tally = Tally::default();
        for row in rows {
            tally.add(row);
        }

        let values = StyleFeature::ALL.iter().map(|&f| tally.value(f)).collect();
        let low_confidence = rows.len() < self.min_games;
        if low_confidence {
            warn!(
                "Style vector built from {} games (minimum {}), marking low confidence",
                rows.len(),
                self.min_games
            );
        }

        Ok(AggregatedStyle {
            vector: StyleVector::new(values)?,
            games_used: rows.len(),
            low_confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(plies: u32, queen: Option<u32>, outcome: PlayerOutcome) -> GameFeatureRow {
        GameFeatureRow {
            ply_count: plies,
            trade_count: plies / 10,
            first_queen_ply: queen,
            castled_early: plies % 2 == 0,
            check_count: 2,
            sacrifice: plies > 90,
            outcome,
        }
    }

    #[test]
    fn test_schema_order_and_names() {
        assert_eq!(FEATURE_COUNT, 11);
        for (i, feature) in StyleFeature::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i);
            assert_eq!(StyleFeature::from_name(feature.name()), Some(*feature));
        }
    }

    #[test]
    fn test_means_and_proportions() {
        let rows = vec![
            row(40, Some(10), PlayerOutcome::Win),
            row(100, None, PlayerOutcome::Draw),
            row(61, Some(20), PlayerOutcome::Loss),
            row(90, None, PlayerOutcome::Win),
        ];
        let style = StyleAggregator::new(3).aggregate(&rows).unwrap();
        let v = &style.vector;

        assert_eq!(style.games_used, 4);
        assert!(!style.low_confidence);
        assert_eq!(v.len(), FEATURE_COUNT);
        assert_eq!(v.get(StyleFeature::AvgMoves), Some(72.75));
        assert_eq!(v.get(StyleFeature::PctLongGames), Some(0.5));
        // queen sentinel rows excluded from the denominator
        assert_eq!(v.get(StyleFeature::AvgQueenMove), Some(15.0));
        assert_eq!(v.get(StyleFeature::PctCastledEarly), Some(0.75));
        assert_eq!(v.get(StyleFeature::PctSacrifices), Some(0.25));
        assert_eq!(v.get(StyleFeature::WinRate), Some(0.625));
        assert_eq!(v.get(StyleFeature::PctWins), Some(0.5));
        assert_eq!(v.get(StyleFeature::PctDraws), Some(0.25));
        assert_eq!(v.get(StyleFeature::PctLosses), Some(0.25));
    }

    #[test]
    fn test_never_moved_queen_stays_absent() {
        let rows = vec![
            row(30, None, PlayerOutcome::Win),
            row(32, None, PlayerOutcome::Loss),
        ];
        let style = StyleAggregator::default().aggregate(&rows).unwrap();
        assert!(style.low_confidence);
        assert_eq!(style.vector.get(StyleFeature::AvgQueenMove), None);
        assert_eq!(style.vector.get(StyleFeature::AvgMoves), Some(31.0));
    }

    #[test]
    fn test_empty_rows_is_insufficient_data() {
        let err = StyleAggregator::default().aggregate(&[]).unwrap_err();
        assert!(matches!(
            err,
            StyleEngineError::InsufficientData { found: 0, .. }
        ));
    }

    #[test]
    fn test_order_independence() {
        let mut rows: Vec<GameFeatureRow> = (0..25)
            .map(|i| {
                let outcome = match i % 3 {
                    0 => PlayerOutcome::Win,
                    1 => PlayerOutcome::Draw,
                    _ => PlayerOutcome::Loss,
                };
                row(20 + i * 7, (i % 4 != 0).then_some(i + 3), outcome)
            })
            .collect();

        let aggregator = StyleAggregator::default();
        let forward = aggregator.aggregate(&rows).unwrap();
        rows.reverse();
        let backward = aggregator.aggregate(&rows).unwrap();
        rows.swap(3, 17);
        let shuffled = aggregator.aggregate(&rows).unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_dimension_check() {
        assert!(StyleVector::from_values(&[1.0; FEATURE_COUNT]).is_ok());
        let err = StyleVector::from_values(&[1.0; 4]).unwrap_err();
        assert!(matches!(
            err,
            StyleEngineError::Consistency {
                expected: FEATURE_COUNT,
                found: 4
            }
        ));
    }

    #[test]
    fn test_named_serialization_keeps_schema_order() {
        let mut values = vec![Some(1.0); FEATURE_COUNT];
        values[StyleFeature::AvgQueenMove.index()] = None;
        let vector = StyleVector::new(values).unwrap();
        let json = serde_json::to_string(&vector.named()).unwrap();

        assert!(json.starts_with("{\"avg_moves\":1.0,\"pct_long_games\":1.0"));
        assert!(json.contains("\"avg_queen_move\":null"));
        assert!(json.ends_with("\"pct_losses\":1.0}"));
    }
}
