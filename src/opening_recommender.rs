use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::RecommendConfig;
use crate::game_record::{PlayerOutcome, Side, TimeControlClass};
use crate::peer_matcher::Peer;
use crate::reference_corpus::ReferenceCorpus;

/// Peer results for one opening code on one side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningStat {
    pub opening_code: String,
    pub opening_name: String,
    pub games_played: u64,
    pub wins: u64,
    pub draws: u64,
    pub losses: u64,
    /// `(wins + 0.5 * draws) / games_played`
    pub score_pct: f64,
    /// Ranking key, `score_pct * ln(1 + games_played)`
    pub weight: f64,
}

/// Ranked openings for one side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub openings: Vec<OpeningStat>,
    /// Set when no code reached the minimum sample size
    pub low_confidence: bool,
}

#[derive(Default)]
struct CodeTally {
    wins: u64,
    draws: u64,
    losses: u64,
    names: BTreeMap<String, u64>,
}

impl CodeTally {
    fn record(&mut self, outcome: PlayerOutcome, name: Option<&str>) {
        match outcome {
            PlayerOutcome::Win => self.wins += 1,
            PlayerOutcome::Draw => self.draws += 1,
            PlayerOutcome::Loss => self.losses += 1,
        }
        if let Some(name) = name {
            *self.names.entry(name.to_string()).or_insert(0) += 1;
        }
    }

    fn games(&self) -> u64 {
        self.wins + self.draws + self.losses
    }

    /// Most frequent name, lexicographically smallest on ties.
    fn name(&self) -> String {
        let mut best: Option<(&String, u64)> = None;
        for (name, &count) in &self.names {
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((name, count));
            }
        }
        best.map(|(name, _)| name.clone()).unwrap_or_default()
    }

    fn into_stat(self, code: String) -> OpeningStat {
        let games_played = self.games();
        // half points keep the ratio exact
        let score_pct = (2 * self.wins + self.draws) as f64 / (2 * games_played) as f64;
        OpeningStat {
            opening_name: self.name(),
            opening_code: code,
            games_played,
            wins: self.wins,
            draws: self.draws,
            losses: self.losses,
            score_pct,
            weight: score_pct * (games_played as f64).ln_1p(),
        }
    }
}

/// Ranks openings by how well stylistic peers scored with them
pub struct OpeningRecommender<'a> {
    corpus: &'a ReferenceCorpus,
    config: RecommendConfig,
    time_control: Option<TimeControlClass>,
}

impl<'a> OpeningRecommender<'a> {
    pub fn new(corpus: &'a ReferenceCorpus, config: RecommendConfig) -> Self {
        Self {
            corpus,
            config,
            time_control: None,
        }
    }

    /// Only count peer games of this speed class.
    pub fn with_time_control(mut self, time_control: Option<TimeControlClass>) -> Self {
        self.time_control = time_control;
        self
    }

    /// Aggregate every opening the peers played as `side`.
    pub fn opening_stats(&self, peers: &[Peer], side: Side) -> Vec<OpeningStat> {
        let mut tallies: BTreeMap<&str, CodeTally> = BTreeMap::new();

        for peer in peers {
            let Some(player) = self.corpus.get(&peer.player_id) else {
                debug!("Peer {} is not in the reference corpus", peer.player_id);
                continue;
            };
            for outcome in player
                .outcomes
                .iter()
                .filter(|o| o.side == side)
                .filter(|o| self.time_control.map_or(true, |tc| o.time_control == tc))
            {
                tallies
                    .entry(outcome.eco.as_str())
                    .or_default()
                    .record(outcome.outcome, outcome.opening.as_deref());
            }
        }

        tallies
            .into_iter()
            .map(|(code, tally)| tally.into_stat(code.to_string()))
            .collect()
    }

    pub fn recommend(&self, peers: &[Peer], side: Side) -> Recommendations {
        let stats = self.opening_stats(peers, side);
        if stats.is_empty() {
            warn!("No peer openings recorded for {}", side);
            return Recommendations {
                openings: Vec::new(),
                low_confidence: true,
            };
        }

        let min_games = self.config.min_games as u64;
        let reliable: Vec<OpeningStat> = stats
            .iter()
            .filter(|s| s.games_played >= min_games)
            .cloned()
            .collect();

        let (mut openings, low_confidence) = if reliable.is_empty() {
            warn!(
                "No {} opening reached {} peer games, relaxing the filter",
                side, min_games
            );
            (stats, true)
        } else {
            (reliable, false)
        };

        openings.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| b.games_played.cmp(&a.games_played))
                .then_with(|| a.opening_code.cmp(&b.opening_code))
        });
        openings.truncate(self.config.top_n);

        Recommendations {
            openings,
            low_confidence,
        }
    }
}

/// Ranked openings for `side` using the given settings and no speed filter.
pub fn recommend(
    peers: &[Peer],
    corpus: &ReferenceCorpus,
    side: Side,
    config: &RecommendConfig,
) -> Recommendations {
    OpeningRecommender::new(corpus, config.clone()).recommend(peers, side)
}
