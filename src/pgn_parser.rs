use chess::{Board, ChessMove};
use pgn_reader::{BufferedReader, RawComment, RawHeader, SanPlus, Skip, Visitor};
use tracing::debug;

use crate::errors::Result;
use crate::game_record::{parse_utc_timestamp, GameRecord, GameResult};

/// Evaluation recorded for forced mates, in pawns
const MATE_EVAL: f32 = 100.0;

/// Games parsed from a PGN stream plus the number rejected on the way
#[derive(Debug, Default)]
pub struct ParsedGames {
    pub games: Vec<GameRecord>,
    pub skipped: usize,
}

/// PGN game visitor converting SAN movetext into UCI `GameRecord`s
struct RecordBuilder {
    record: GameRecord,
    utc_date: Option<String>,
    utc_time: Option<String>,
    board: Board,
    error: Option<String>,
}

impl RecordBuilder {
    fn new() -> Self {
        Self {
            record: GameRecord::new("", "", GameResult::Unknown),
            utc_date: None,
            utc_time: None,
            board: Board::default(),
            error: None,
        }
    }
}

impl Visitor for RecordBuilder {
    type Result = std::result::Result<GameRecord, String>;

    fn begin_game(&mut self) {
        *self = RecordBuilder::new();
    }

    fn header(&mut self, key: &[u8], value: RawHeader<'_>) {
        let value = value.decode_utf8_lossy().trim().to_string();
        match key {
            b"White" => self.record.white = value,
            b"Black" => self.record.black = value,
            b"Result" => self.record.result = GameResult::from_pgn(&value),
            b"ECO" => self.record.eco = Some(value),
            b"Opening" => self.record.opening = Some(value),
            b"TimeControl" => self.record.time_control = Some(value),
            b"UTCDate" => self.utc_date = Some(value),
            b"UTCTime" => self.utc_time = Some(value),
            _ => {}
        }
    }

    fn san(&mut self, san_plus: SanPlus) {
        if self.error.is_some() {
            return;
        }

        let san = san_plus.san.to_string();
        match ChessMove::from_san(&self.board, &san) {
            Ok(chess_move) if self.board.legal(chess_move) => {
                self.board = self.board.make_move_new(chess_move);
                self.record.moves.push(chess_move.to_string());
                self.record.evals.push(None);
            }
            _ => {
                self.error = Some(format!(
                    "illegal or unparseable move '{}' at ply {}",
                    san,
                    self.record.moves.len() + 1
                ));
            }
        }
    }

    fn comment(&mut self, comment: RawComment<'_>) {
        if let Some(eval) = parse_eval_comment(&String::from_utf8_lossy(comment.as_bytes())) {
            if let Some(slot) = self.record.evals.last_mut() {
                *slot = Some(eval);
            }
        }
    }

    fn begin_variation(&mut self) -> Skip {
        Skip(true)
    }

    fn end_game(&mut self) -> Self::Result {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        if self.record.white.is_empty() || self.record.black.is_empty() {
            return Err("missing White or Black header".to_string());
        }

        let mut record = std::mem::replace(
            &mut self.record,
            GameRecord::new("", "", GameResult::Unknown),
        );
        if let Some(date) = self.utc_date.as_deref() {
            record.played_at = parse_utc_timestamp(date, self.utc_time.as_deref());
        }
        if !record.evals.iter().any(Option::is_some) {
            record.evals.clear();
        }
        Ok(record)
    }
}

/// Extract `[%eval x]` from a movetext comment (Lichess annotation format).
pub fn parse_eval_comment(comment: &str) -> Option<f32> {
    let start = comment.find("[%eval ")? + "[%eval ".len();
    let rest = &comment[start..];
    let end = rest.find(|c: char| c == ']' || c == ',' || c.is_whitespace())?;
    let token = &rest[..end];

    if let Some(mate) = token.strip_prefix('#') {
        let moves: i32 = mate.parse().ok()?;
        Some(if moves >= 0 { MATE_EVAL } else { -MATE_EVAL })
    } else {
        token.parse::<f32>().ok()
    }
}

/// Parse every game in a multi-game PGN string.
///
/// Games that fail to replay are skipped and counted rather than aborting the
/// whole stream.
pub fn parse_pgn(pgn_text: &str) -> Result<ParsedGames> {
    let mut reader = BufferedReader::new(std::io::Cursor::new(pgn_text.as_bytes()));
    let mut builder = RecordBuilder::new();
    let mut parsed = ParsedGames::default();

    while let Some(outcome) = reader.read_game(&mut builder)? {
        match outcome {
            Ok(record) => parsed.games.push(record),
            Err(reason) => {
                debug!("Skipping PGN game {}: {}", parsed.games.len() + parsed.skipped + 1, reason);
                parsed.skipped += 1;
            }
        }
    }

    Ok(parsed)
}

/// Parse a PGN file from disk.
pub fn parse_pgn_file<P: AsRef<std::path::Path>>(path: P) -> Result<ParsedGames> {
    let text = std::fs::read_to_string(path)?;
    parse_pgn(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_GAMES: &str = r#"[Event "Rated Blitz game"]
[White "alice"]
[Black "bob"]
[Result "1-0"]
[UTCDate "2025.05.01"]
[UTCTime "10:00:00"]
[ECO "C50"]
[Opening "Italian Game"]
[TimeControl "180+2"]

1. e4 { [%eval 0.2] } 1... e5 { [%eval 0.25] } 2. Nf3 Nc6 3. Bc4 Nf6 4. O-O 1-0

[Event "Rated Bullet game"]
[White "bob"]
[Black "alice"]
[Result "0-1"]
[TimeControl "60+0"]

1. d4 d5 2. c4 (2. Nf3 Nf6) 2... e6 0-1
"#;

    #[test]
    fn test_parse_headers_and_moves() {
        let parsed = parse_pgn(TWO_GAMES).unwrap();
        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.games.len(), 2);

        let first = &parsed.games[0];
        assert_eq!(first.white, "alice");
        assert_eq!(first.result, GameResult::WhiteWins);
        assert_eq!(first.eco.as_deref(), Some("C50"));
        assert_eq!(first.opening.as_deref(), Some("Italian Game"));
        assert_eq!(
            first.moves,
            vec!["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6", "e1g1"]
        );
        assert_eq!(first.evals.len(), 7);
        assert_eq!(first.evals[0], Some(0.2));
        assert_eq!(first.evals[2], None);
        assert!(first.played_at.is_some());
    }

    #[test]
    fn test_variations_are_skipped() {
        let parsed = parse_pgn(TWO_GAMES).unwrap();
        let second = &parsed.games[1];
        assert_eq!(second.moves, vec!["d2d4", "d7d5", "c2c4", "e7e6"]);
        assert!(second.evals.is_empty());
    }

    #[test]
    fn test_illegal_game_is_counted_not_fatal() {
        let pgn = r#"[White "a"]
[Black "b"]
[Result "1-0"]

1. e4 e5 2. Ke3 Nc6 1-0

[White "c"]
[Black "d"]
[Result "1/2-1/2"]

1. e4 e5 1/2-1/2
"#;
        let parsed = parse_pgn(pgn).unwrap();
        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.games.len(), 1);
        assert_eq!(parsed.games[0].white, "c");
    }

    #[test]
    fn test_eval_comment_parsing() {
        assert_eq!(parse_eval_comment("[%eval 1.25]"), Some(1.25));
        assert_eq!(parse_eval_comment(" [%eval -0.4] [%clk 0:03:00]"), Some(-0.4));
        assert_eq!(parse_eval_comment("[%eval #3]"), Some(MATE_EVAL));
        assert_eq!(parse_eval_comment("[%eval #-2]"), Some(-MATE_EVAL));
        assert_eq!(parse_eval_comment("good move"), None);
    }
}
