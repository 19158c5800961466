use chrono::Utc;
use rusqlite::{params, Connection, Result as SqlResult};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::errors::Result;
use crate::game_record::{PlayerOutcome, Side, TimeControlClass};
use crate::input_error;
use crate::reference_corpus::{OpeningOutcome, ReferenceCorpus, ReferencePlayer};
use crate::style_vector::StyleVector;

/// SQLite store for reference players and their opening outcomes
pub struct CorpusDatabase {
    conn: Connection,
}

impl CorpusDatabase {
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqlResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute("PRAGMA foreign_keys=ON", [])?;

        let db = CorpusDatabase { conn };
        db.create_tables()?;
        Ok(db)
    }

    pub fn in_memory() -> SqlResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys=ON", [])?;

        let db = CorpusDatabase { conn };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> SqlResult<()> {
        // One row per reference player; the style vector is stored as JSON so
        // absent features survive as nulls
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS reference_players (
                id TEXT PRIMARY KEY,
                style TEXT NOT NULL,
                games_used INTEGER NOT NULL,
                low_confidence INTEGER NOT NULL DEFAULT 0,
                archetype INTEGER,
                saved_at INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS opening_outcomes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id TEXT NOT NULL REFERENCES reference_players(id) ON DELETE CASCADE,
                side TEXT NOT NULL,
                eco TEXT NOT NULL,
                opening TEXT,
                outcome TEXT NOT NULL,
                time_control TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_opening_outcomes_player ON opening_outcomes(player_id)",
            [],
        )?;

        Ok(())
    }

    /// Replace the stored corpus with `corpus` in one transaction.
    pub fn save_corpus(&self, corpus: &ReferenceCorpus) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM opening_outcomes", [])?;
        tx.execute("DELETE FROM reference_players", [])?;

        let saved_at = Utc::now().timestamp();
        {
            let mut player_stmt = tx.prepare(
                "INSERT INTO reference_players (id, style, games_used, low_confidence, archetype, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            let mut outcome_stmt = tx.prepare(
                "INSERT INTO opening_outcomes (player_id, side, eco, opening, outcome, time_control)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for player in corpus.players() {
                let style = serde_json::to_string(player.style.values())?;
                player_stmt.execute(params![
                    player.id,
                    style,
                    player.games_used as i64,
                    player.low_confidence,
                    player.archetype.map(|a| a as i64),
                    saved_at
                ])?;

                for outcome in &player.outcomes {
                    outcome_stmt.execute(params![
                        player.id,
                        outcome.side.as_str(),
                        outcome.eco,
                        outcome.opening,
                        outcome_to_str(outcome.outcome),
                        outcome.time_control.as_str()
                    ])?;
                }
            }
        }

        tx.commit()?;
        info!("Saved {} reference players to database", corpus.len());
        Ok(corpus.len())
    }

    pub fn load_corpus(&self) -> Result<ReferenceCorpus> {
        let mut outcomes: HashMap<String, Vec<OpeningOutcome>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT player_id, side, eco, opening, outcome, time_control
                 FROM opening_outcomes ORDER BY id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?;

            for row in rows {
                let (player_id, side, eco, opening, outcome, time_control) = row?;
                outcomes.entry(player_id).or_default().push(OpeningOutcome {
                    side: side_from_str(&side)?,
                    eco,
                    opening,
                    outcome: outcome_from_str(&outcome)?,
                    time_control: time_control_from_str(&time_control),
                });
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, style, games_used, low_confidence, archetype
             FROM reference_players ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, Option<i64>>(4)?,
            ))
        })?;

        let mut players = Vec::new();
        for row in rows {
            let (id, style, games_used, low_confidence, archetype) = row?;
            let values: Vec<Option<f64>> = serde_json::from_str(&style)?;
            players.push(ReferencePlayer {
                outcomes: outcomes.remove(&id).unwrap_or_default(),
                id,
                style: StyleVector::new(values)?,
                games_used: games_used.max(0) as usize,
                low_confidence,
                archetype: archetype.map(|a| a as usize),
            });
        }

        ReferenceCorpus::from_players(players)
    }

    pub fn player_count(&self) -> SqlResult<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM reference_players", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn outcome_count(&self) -> SqlResult<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM opening_outcomes", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn outcome_to_str(outcome: PlayerOutcome) -> &'static str {
    match outcome {
        PlayerOutcome::Win => "win",
        PlayerOutcome::Draw => "draw",
        PlayerOutcome::Loss => "loss",
    }
}

fn outcome_from_str(value: &str) -> Result<PlayerOutcome> {
    match value {
        "win" => Ok(PlayerOutcome::Win),
        "draw" => Ok(PlayerOutcome::Draw),
        "loss" => Ok(PlayerOutcome::Loss),
        other => Err(input_error!("unknown stored outcome '{}'", other)),
    }
}

fn side_from_str(value: &str) -> Result<Side> {
    match value {
        "white" => Ok(Side::White),
        "black" => Ok(Side::Black),
        other => Err(input_error!("unknown stored side '{}'", other)),
    }
}

fn time_control_from_str(value: &str) -> TimeControlClass {
    value.parse().unwrap_or(TimeControlClass::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style_vector::FEATURE_COUNT;

    fn sample_corpus() -> ReferenceCorpus {
        let mut values = vec![Some(1.5); FEATURE_COUNT];
        values[3] = None;
        ReferenceCorpus::from_players(vec![
            ReferencePlayer {
                id: "alice".to_string(),
                style: StyleVector::new(values).unwrap(),
                games_used: 12,
                low_confidence: false,
                archetype: Some(3),
                outcomes: vec![
                    OpeningOutcome {
                        side: Side::White,
                        eco: "C72".to_string(),
                        opening: Some("Ruy Lopez".to_string()),
                        outcome: PlayerOutcome::Win,
                        time_control: TimeControlClass::Blitz,
                    },
                    OpeningOutcome {
                        side: Side::Black,
                        eco: "B90".to_string(),
                        opening: None,
                        outcome: PlayerOutcome::Draw,
                        time_control: TimeControlClass::Unknown,
                    },
                ],
            },
            ReferencePlayer {
                id: "bob".to_string(),
                style: StyleVector::from_values(&[0.25; FEATURE_COUNT]).unwrap(),
                games_used: 2,
                low_confidence: true,
                archetype: None,
                outcomes: Vec::new(),
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_database_creation() {
        let db = CorpusDatabase::in_memory().unwrap();
        assert_eq!(db.player_count().unwrap(), 0);
        assert_eq!(db.outcome_count().unwrap(), 0);
    }

    #[test]
    fn test_save_and_load_corpus() {
        let db = CorpusDatabase::in_memory().unwrap();
        let corpus = sample_corpus();

        assert_eq!(db.save_corpus(&corpus).unwrap(), 2);
        assert_eq!(db.outcome_count().unwrap(), 2);
        assert_eq!(db.load_corpus().unwrap(), corpus);
    }

    #[test]
    fn test_save_replaces_previous_corpus() {
        let db = CorpusDatabase::in_memory().unwrap();
        db.save_corpus(&sample_corpus()).unwrap();

        let smaller = ReferenceCorpus::from_players(
            sample_corpus().players().filter(|p| p.id == "bob").cloned(),
        )
        .unwrap();
        db.save_corpus(&smaller).unwrap();

        assert_eq!(db.player_count().unwrap(), 1);
        assert_eq!(db.outcome_count().unwrap(), 0);
    }
}
