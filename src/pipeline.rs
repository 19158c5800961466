//! End-to-end request handling: a player's games in, style vector, peers and
//! ranked openings out.

use serde::{Serialize, Serializer};
use std::sync::Arc;
use tracing::info;

use crate::config::{AggregationConfig, EngineConfig};
use crate::errors::{Result, StyleEngineError};
use crate::feature_extractor::extract_player_rows;
use crate::game_record::{GameRecord, Side, TimeControlClass};
use crate::opening_recommender::{OpeningRecommender, OpeningStat, Recommendations};
use crate::peer_matcher::{Peer, PeerMatcher};
use crate::pgn_parser::ParsedGames;
use crate::snapshot::{CorpusSnapshot, CorpusStore};
use crate::style_vector::{AggregatedStyle, StyleAggregator, StyleVector};

/// One recommended opening as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpeningSummary {
    pub opening_code: String,
    pub opening_name: String,
    pub games_played: u64,
    pub score_pct: f64,
}

impl From<&OpeningStat> for OpeningSummary {
    fn from(stat: &OpeningStat) -> Self {
        Self {
            opening_code: stat.opening_code.clone(),
            opening_name: stat.opening_name.clone(),
            games_played: stat.games_played,
            score_pct: stat.score_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideRecommendations {
    pub white: Vec<OpeningSummary>,
    pub black: Vec<OpeningSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub games_used: usize,
    pub skipped_games: usize,
    pub low_confidence_style: bool,
    pub low_confidence_white: bool,
    pub low_confidence_black: bool,
    pub archetype: usize,
}

/// Full answer to one recommendation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationResponse {
    #[serde(serialize_with = "serialize_named_style")]
    pub style_vector: StyleVector,
    pub peers: Vec<Peer>,
    pub recommendations: SideRecommendations,
    pub diagnostics: Diagnostics,
}

fn serialize_named_style<S: Serializer>(
    vector: &StyleVector,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    vector.named().serialize(serializer)
}

/// A player's aggregated style plus extraction counts
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerProfile {
    pub style: AggregatedStyle,
    pub skipped_games: usize,
    pub not_applicable: usize,
}

/// Build the query style for `player` from a mixed list of games.
///
/// With a time-control filter only games of that class are used. No usable
/// game at all is an `InsufficientData` error.
pub fn profile_player(
    games: &[GameRecord],
    player: &str,
    time_control: Option<TimeControlClass>,
    config: &AggregationConfig,
) -> Result<PlayerProfile> {
    let selected: Vec<&GameRecord> = games
        .iter()
        .filter(|g| time_control.map_or(true, |tc| g.time_control_class() == tc))
        .collect();

    let report = extract_player_rows(selected.iter().copied(), player);
    if report.rows.is_empty() {
        return Err(StyleEngineError::InsufficientData {
            needed: 1,
            found: 0,
        });
    }

    let style = StyleAggregator::new(config.min_games).aggregate(&report.rows)?;
    Ok(PlayerProfile {
        style,
        skipped_games: report.skipped,
        not_applicable: report.not_applicable,
    })
}

/// Serves requests against one corpus snapshot
pub struct StylePipeline {
    snapshot: Arc<CorpusSnapshot>,
    config: EngineConfig,
}

impl StylePipeline {
    pub fn new(snapshot: Arc<CorpusSnapshot>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { snapshot, config })
    }

    /// Pipeline over whatever the store currently serves.
    pub fn from_store(store: &CorpusStore, config: EngineConfig) -> Result<Self> {
        Self::new(store.current()?, config)
    }

    pub fn snapshot(&self) -> &CorpusSnapshot {
        &self.snapshot
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run(
        &self,
        games: &[GameRecord],
        player: &str,
        time_control: Option<TimeControlClass>,
    ) -> Result<RecommendationResponse> {
        self.run_with_skipped(games, 0, player, time_control)
    }

    /// Like [`run`](Self::run), with games the loader already dropped added
    /// to `diagnostics.skipped_games`.
    pub fn run_parsed(
        &self,
        parsed: &ParsedGames,
        player: &str,
        time_control: Option<TimeControlClass>,
    ) -> Result<RecommendationResponse> {
        self.run_with_skipped(&parsed.games, parsed.skipped, player, time_control)
    }

    fn run_with_skipped(
        &self,
        games: &[GameRecord],
        load_skipped: usize,
        player: &str,
        time_control: Option<TimeControlClass>,
    ) -> Result<RecommendationResponse> {
        let profile = profile_player(games, player, time_control, &self.config.aggregation)?;

        let point = self.snapshot.normalize(&profile.style.vector)?;
        let archetype = self.snapshot.model().assign(point.view());

        let peers = PeerMatcher::new(&self.snapshot).find_peers_normalized(
            point.view(),
            self.config.matching.k,
            self.config.matching.strategy,
        )?;

        let recommender =
            OpeningRecommender::new(self.snapshot.corpus(), self.config.recommend.clone())
                .with_time_control(time_control);
        let white = recommender.recommend(&peers, Side::White);
        let black = recommender.recommend(&peers, Side::Black);

        info!(
            "Recommendations for {}: {} games used, {} peers, archetype {}",
            player,
            profile.style.games_used,
            peers.len(),
            archetype
        );

        Ok(RecommendationResponse {
            diagnostics: Diagnostics {
                games_used: profile.style.games_used,
                skipped_games: profile.skipped_games + load_skipped,
                low_confidence_style: profile.style.low_confidence,
                low_confidence_white: white.low_confidence,
                low_confidence_black: black.low_confidence,
                archetype,
            },
            style_vector: profile.style.vector,
            peers,
            recommendations: SideRecommendations {
                white: summaries(&white),
                black: summaries(&black),
            },
        })
    }
}

fn summaries(recs: &Recommendations) -> Vec<OpeningSummary> {
    recs.openings.iter().map(OpeningSummary::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_record::GameResult;

    fn game(white: &str, black: &str, tc: &str) -> GameRecord {
        GameRecord::new(white, black, GameResult::WhiteWins)
            .with_moves(["e2e4", "e7e5", "d1h5", "b8c6", "f1c4", "g8f6", "h5f7"])
            .with_time_control(tc)
    }

    #[test]
    fn test_profile_counts_only_players_games() {
        let games = vec![
            game("me", "x", "180+0"),
            game("y", "ME", "180+0"),
            game("y", "z", "180+0"),
        ];
        let profile = profile_player(&games, "me", None, &AggregationConfig::default()).unwrap();
        assert_eq!(profile.style.games_used, 2);
        assert!(profile.style.low_confidence);
        assert_eq!(profile.skipped_games, 0);
    }

    #[test]
    fn test_time_control_filter_can_empty_the_request() {
        let games = vec![game("me", "x", "180+0")];
        let err = profile_player(
            &games,
            "me",
            Some(TimeControlClass::Classical),
            &AggregationConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StyleEngineError::InsufficientData { found: 0, .. }));
    }

    #[test]
    fn test_overflowing_time_control_tag_is_filtered_not_fatal() {
        let games = vec![
            game("me", "x", "1+500000000000000000"),
            game("me", "y", "180+0"),
        ];
        let profile = profile_player(
            &games,
            "me",
            Some(TimeControlClass::Blitz),
            &AggregationConfig::default(),
        )
        .unwrap();
        assert_eq!(profile.style.games_used, 1);
    }

    #[test]
    fn test_pipeline_requires_built_store() {
        let store = CorpusStore::new();
        assert!(matches!(
            StylePipeline::from_store(&store, EngineConfig::default()),
            Err(StyleEngineError::NotInitialized)
        ));
    }
}
