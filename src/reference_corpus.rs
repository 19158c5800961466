use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::errors::{Result, StyleEngineError};
use crate::feature_extractor::{extract, GameFeatureRow};
use crate::game_record::{GameRecord, GameResult, PlayerOutcome, Side, TimeControlClass};
use crate::style_vector::{StyleAggregator, StyleFeature, StyleVector, FEATURE_COUNT};

/// One reference game from one reference player's perspective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningOutcome {
    pub side: Side,
    pub eco: String,
    pub opening: Option<String>,
    pub outcome: PlayerOutcome,
    pub time_control: TimeControlClass,
}

/// A reference player's style and opening history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePlayer {
    pub id: String,
    pub style: StyleVector,
    pub games_used: usize,
    pub low_confidence: bool,
    pub archetype: Option<usize>,
    pub outcomes: Vec<OpeningOutcome>,
}

/// Reference players keyed and ordered by case-folded identifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCorpus {
    players: BTreeMap<String, ReferencePlayer>,
}

/// Grouping key for player names, which match case-insensitively.
pub(crate) fn player_key(id: &str) -> String {
    id.to_ascii_lowercase()
}

impl ReferenceCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build directly from finished players. Ids equal up to ASCII case are
    /// duplicates; the last one is kept.
    pub fn from_players<I: IntoIterator<Item = ReferencePlayer>>(players: I) -> Result<Self> {
        let mut corpus = Self::new();
        for player in players {
            player.style.check_dimensions()?;
            corpus.players.insert(player_key(&player.id), player);
        }
        Ok(corpus)
    }

    /// Combine a precomputed style table with the per-game reference table.
    ///
    /// Outcomes are attached for every table player who appears in `games`;
    /// games of players missing from the table are ignored.
    pub fn from_style_table(table: Vec<StyleTableRow>, games: &[GameRecord]) -> Result<Self> {
        let mut outcomes: HashMap<String, Vec<OpeningOutcome>> = HashMap::new();
        for game in games {
            for side in Side::BOTH {
                if let Some(outcome) = opening_outcome(game, side) {
                    outcomes
                        .entry(player_key(game.player(side)))
                        .or_default()
                        .push(outcome);
                }
            }
        }

        let players = table.into_iter().map(|row| ReferencePlayer {
            outcomes: outcomes.remove(&player_key(&row.player)).unwrap_or_default(),
            id: row.player,
            style: row.style,
            games_used: row.games_used,
            low_confidence: false,
            archetype: None,
        });
        Self::from_players(players)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Player whose id matches `id` ignoring ASCII case
    pub fn get(&self, id: &str) -> Option<&ReferencePlayer> {
        self.players.get(&player_key(id))
    }

    /// Players in identifier order
    pub fn players(&self) -> impl Iterator<Item = &ReferencePlayer> {
        self.players.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.players.values().map(|p| p.id.as_str())
    }

    /// Style vectors in identifier order
    pub fn style_vectors(&self) -> Vec<&StyleVector> {
        self.players.values().map(|p| &p.style).collect()
    }

    /// Copy with archetype labels applied in identifier order.
    pub(crate) fn with_archetypes(mut self, labels: &[usize]) -> Self {
        for (player, &label) in self.players.values_mut().zip(labels) {
            player.archetype = Some(label);
        }
        self
    }

    pub fn to_style_table(&self) -> Vec<StyleTableRow> {
        self.players
            .values()
            .map(|p| StyleTableRow {
                player: p.id.clone(),
                games_used: p.games_used,
                style: p.style.clone(),
            })
            .collect()
    }
}

/// Opening outcome of `game` for `side`, when the game has a code and a result.
pub fn opening_outcome(game: &GameRecord, side: Side) -> Option<OpeningOutcome> {
    let eco = game.opening_code()?;
    let outcome = game.result.outcome_for(side)?;
    Some(OpeningOutcome {
        side,
        eco: eco.to_string(),
        opening: game.opening.clone().filter(|name| !name.trim().is_empty()),
        outcome,
        time_control: game.time_control_class(),
    })
}

/// Summary of one corpus build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusBuildReport {
    pub players: usize,
    pub excluded_players: usize,
    pub games_used: usize,
    pub skipped_games: usize,
}

/// Builds a [`ReferenceCorpus`] from raw reference games
pub struct CorpusBuilder {
    aggregator: StyleAggregator,
    /// Players with fewer usable games are left out of the corpus
    min_games_per_player: usize,
    num_threads: usize,
    show_progress: bool,
}

impl Default for CorpusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusBuilder {
    pub fn new() -> Self {
        Self {
            aggregator: StyleAggregator::default(),
            min_games_per_player: 1,
            num_threads: num_cpus::get().min(16),
            show_progress: false,
        }
    }

    pub fn with_aggregator(mut self, aggregator: StyleAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_min_games_per_player(mut self, min_games: usize) -> Self {
        self.min_games_per_player = min_games.max(1);
        self
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads.max(1);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Extract, aggregate and collect outcomes for every player in `games`.
    ///
    /// Names equal up to ASCII case are one player, reported under the
    /// spelling seen first.
    pub fn build(&self, games: &[GameRecord]) -> Result<(ReferenceCorpus, CorpusBuildReport)> {
        let mut by_player: BTreeMap<String, (&str, Vec<(usize, Side)>)> = BTreeMap::new();
        for (index, game) in games.iter().enumerate() {
            for side in Side::BOTH {
                let id = game.player(side);
                if !id.is_empty() {
                    by_player
                        .entry(player_key(id))
                        .or_insert_with(|| (id, Vec::new()))
                        .1
                        .push((index, side));
                }
            }
        }

        info!(
            "Building reference corpus from {} games, {} players, {} threads",
            games.len(),
            by_player.len(),
            self.num_threads
        );

        let pb = if self.show_progress {
            ProgressBar::new(by_player.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} players ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()
            .map_err(|e| crate::config_error!("failed to build thread pool: {}", e))?;

        let entries: Vec<(&str, Vec<(usize, Side)>)> = by_player.into_values().collect();
        let built: Vec<PlayerBuild> = pool.install(|| {
            entries
                .par_iter()
                .map(|(id, appearances)| {
                    let result = self.build_player(id, appearances, games);
                    pb.inc(1);
                    result
                })
                .collect()
        });
        pb.finish_with_message("Reference corpus built");

        let mut report = CorpusBuildReport::default();
        let mut players = BTreeMap::new();
        for build in built {
            report.skipped_games += build.skipped;
            match build.player {
                Some(player) => {
                    report.games_used += player.games_used;
                    players.insert(player_key(&player.id), player);
                }
                None => report.excluded_players += 1,
            }
        }
        report.players = players.len();

        info!(
            "Reference corpus ready: {} players ({} excluded), {} games used, {} skipped",
            report.players, report.excluded_players, report.games_used, report.skipped_games
        );
        Ok((ReferenceCorpus { players }, report))
    }

    fn build_player(&self, id: &str, appearances: &[(usize, Side)], games: &[GameRecord]) -> PlayerBuild {
        let mut rows: Vec<GameFeatureRow> = Vec::with_capacity(appearances.len());
        let mut outcomes = Vec::new();
        let mut skipped = 0;

        for &(index, side) in appearances {
            let game = &games[index];
            match extract(game, side) {
                Ok(row) => {
                    rows.extend(row);
                    outcomes.extend(opening_outcome(game, side));
                }
                Err(err) => {
                    debug!("Reference player {}: skipping game {}: {}", id, index, err);
                    skipped += 1;
                }
            }
        }

        if rows.len() < self.min_games_per_player {
            debug!(
                "Excluding reference player {} ({} usable games, minimum {})",
                id,
                rows.len(),
                self.min_games_per_player
            );
            return PlayerBuild {
                player: None,
                skipped,
            };
        }

        let player = match self.aggregator.aggregate(&rows) {
            Ok(style) => Some(ReferencePlayer {
                id: id.to_string(),
                style: style.vector,
                games_used: style.games_used,
                low_confidence: style.low_confidence,
                archetype: None,
                outcomes,
            }),
            Err(err) => {
                warn!("Excluding reference player {}: {}", id, err);
                None
            }
        };
        PlayerBuild { player, skipped }
    }
}

struct PlayerBuild {
    player: Option<ReferencePlayer>,
    skipped: usize,
}

/// One row of the precomputed style vector table
#[derive(Debug, Clone, PartialEq)]
pub struct StyleTableRow {
    pub player: String,
    pub games_used: usize,
    pub style: StyleVector,
}

/// Write the style table as CSV: `player,games_used,<feature columns>`.
/// Absent features are written as empty cells.
pub fn write_style_vectors_csv<P: AsRef<Path>>(path: P, rows: &[StyleTableRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["player".to_string(), "games_used".to_string()];
    header.extend(StyleFeature::ALL.iter().map(|f| f.name().to_string()));
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![row.player.clone(), row.games_used.to_string()];
        record.extend(
            row.style
                .values()
                .iter()
                .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Read a style table written by [`write_style_vectors_csv`].
///
/// Columns are matched by feature name; a table missing any feature column is
/// a version skew and fails with a `Consistency` error.
pub fn read_style_vectors_csv<P: AsRef<Path>>(path: P) -> Result<Vec<StyleTableRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let player_col = position("player")
        .ok_or_else(|| crate::input_error!("style table has no 'player' column"))?;
    let games_col = position("games_used");
    let feature_cols: Vec<usize> = StyleFeature::ALL
        .iter()
        .filter_map(|f| position(f.name()))
        .collect();
    if feature_cols.len() != FEATURE_COUNT {
        return Err(StyleEngineError::Consistency {
            expected: FEATURE_COUNT,
            found: feature_cols.len(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let player = record.get(player_col).unwrap_or_default().trim().to_string();
        let games_used = match games_col.and_then(|c| record.get(c)).map(str::trim) {
            None | Some("") => 0,
            Some(cell) => cell.parse::<usize>().map_err(|_| {
                crate::input_error!("invalid games_used '{}' for player {}", cell, player)
            })?,
        };

        let mut values = Vec::with_capacity(FEATURE_COUNT);
        for &col in &feature_cols {
            let cell = record.get(col).unwrap_or_default().trim();
            if cell.is_empty() {
                values.push(None);
            } else {
                values.push(Some(cell.parse::<f64>().map_err(|_| {
                    crate::input_error!("invalid value '{}' for player {}", cell, player)
                })?));
            }
        }

        rows.push(StyleTableRow {
            player,
            games_used,
            style: StyleVector::new(values)?,
        });
    }

    Ok(rows)
}

/// Columnar per-game reference record
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GameCsvRow {
    white: String,
    black: String,
    result: String,
    eco: Option<String>,
    opening: Option<String>,
    time_control: Option<String>,
    played_at: Option<DateTime<Utc>>,
    /// Space-separated UCI moves
    moves: String,
}

impl From<&GameRecord> for GameCsvRow {
    fn from(game: &GameRecord) -> Self {
        Self {
            white: game.white.clone(),
            black: game.black.clone(),
            result: game.result.as_pgn().to_string(),
            eco: game.eco.clone(),
            opening: game.opening.clone(),
            time_control: game.time_control.clone(),
            played_at: game.played_at,
            moves: game.moves.join(" "),
        }
    }
}

impl From<GameCsvRow> for GameRecord {
    fn from(row: GameCsvRow) -> Self {
        GameRecord {
            white: row.white,
            black: row.black,
            result: GameResult::from_pgn(&row.result),
            eco: row.eco.filter(|s| !s.is_empty()),
            opening: row.opening.filter(|s| !s.is_empty()),
            moves: row.moves.split_whitespace().map(str::to_string).collect(),
            evals: Vec::new(),
            time_control: row.time_control.filter(|s| !s.is_empty()),
            played_at: row.played_at,
        }
    }
}

/// Load the per-game reference table. Rows that fail to deserialize are
/// skipped and counted.
pub fn load_games_csv<P: AsRef<Path>>(path: P) -> Result<(Vec<GameRecord>, usize)> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut games = Vec::new();
    let mut skipped = 0;

    for (line, row) in reader.deserialize::<GameCsvRow>().enumerate() {
        match row {
            Ok(row) => games.push(GameRecord::from(row)),
            Err(err) => {
                debug!("Skipping games table row {}: {}", line + 1, err);
                skipped += 1;
            }
        }
    }

    Ok((games, skipped))
}

pub fn write_games_csv<P: AsRef<Path>>(path: P, games: &[GameRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for game in games {
        writer.serialize(GameCsvRow::from(game))?;
    }
    writer.flush()?;
    Ok(())
}
