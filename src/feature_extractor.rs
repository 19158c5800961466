//! Per-game style metrics.
//!
//! Each game is replayed move by move on a [`chess::Board`] and reduced to a
//! [`GameFeatureRow`] from one player's perspective. Metrics that can be
//! undefined for a game (the queen never moving) are `Option`s so the
//! aggregator can leave them out of the denominator instead of averaging in a
//! placeholder.

use chess::{Board, ChessMove, Color, Piece, Square};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use crate::errors::Result;
use crate::game_record::{GameRecord, PlayerOutcome, Side};
use crate::input_error;

/// Games shorter than this are not applicable for style extraction
pub const MIN_PLIES: usize = 2;
/// Castling at or before this ply counts as early
pub const EARLY_CASTLE_PLY: u32 = 20;
/// A capture answered by the opponent within this many plies is a trade
pub const TRADE_WINDOW: u32 = 2;

/// Metrics for one game from one player's perspective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameFeatureRow {
    pub ply_count: u32,
    pub trade_count: u32,
    /// 1-based ply of the player's first queen move
    pub first_queen_ply: Option<u32>,
    pub castled_early: bool,
    pub check_count: u32,
    pub sacrifice: bool,
    pub outcome: PlayerOutcome,
}

impl GameFeatureRow {
    pub fn result_score(&self) -> f64 {
        self.outcome.score()
    }
}

/// What happened on one ply of a replayed game
#[derive(Debug, Clone, Copy)]
struct PlyEvent {
    ply: u32,
    mover: Color,
    piece: Piece,
    dest: Square,
    captured: Option<Piece>,
    gives_check: bool,
    castles: bool,
}

/// Material value used for sacrifice detection; the king is never captured.
fn piece_value(piece: Piece) -> u32 {
    match piece {
        Piece::Pawn => 1,
        Piece::Knight | Piece::Bishop => 3,
        Piece::Rook => 5,
        Piece::Queen => 9,
        Piece::King => 0,
    }
}

fn replay(record: &GameRecord) -> Result<Vec<PlyEvent>> {
    let mut board = Board::default();
    let mut events = Vec::with_capacity(record.moves.len());

    for (index, uci) in record.moves.iter().enumerate() {
        let ply = index as u32 + 1;
        let chess_move = ChessMove::from_str(uci.trim())
            .map_err(|_| input_error!("unparseable move '{}' at ply {}", uci, ply))?;
        if !board.legal(chess_move) {
            return Err(input_error!("illegal move '{}' at ply {}", uci, ply));
        }

        let source = chess_move.get_source();
        let dest = chess_move.get_dest();
        let mover = board.side_to_move();
        let piece = board
            .piece_on(source)
            .ok_or_else(|| input_error!("no piece on {} at ply {}", source, ply))?;

        let file_delta = (source.get_file().to_index() as i32 - dest.get_file().to_index() as i32).abs();
        let captured = match board.piece_on(dest) {
            Some(victim) => Some(victim),
            // en passant: a pawn changing file onto an empty square
            None if piece == Piece::Pawn && file_delta == 1 => Some(Piece::Pawn),
            None => None,
        };
        let castles = piece == Piece::King && file_delta == 2;

        board = board.make_move_new(chess_move);
        let gives_check = board.checkers().popcnt() > 0;

        events.push(PlyEvent {
            ply,
            mover,
            piece,
            dest,
            captured,
            gives_check,
            castles,
        });
    }

    Ok(events)
}

/// Count capture pairs where the opponent answers within [`TRADE_WINDOW`] plies.
fn count_trades(events: &[PlyEvent]) -> u32 {
    let captures: Vec<&PlyEvent> = events.iter().filter(|e| e.captured.is_some()).collect();
    let mut used = vec![false; captures.len()];
    let mut trades = 0;

    for i in 0..captures.len() {
        if used[i] {
            continue;
        }
        let first = captures[i];
        for j in (i + 1)..captures.len() {
            let answer = captures[j];
            if answer.ply - first.ply > TRADE_WINDOW {
                break;
            }
            if !used[j] && answer.mover != first.mover {
                used[i] = true;
                used[j] = true;
                trades += 1;
                break;
            }
        }
    }

    trades
}

/// A higher-value piece takes a lower-value one, is taken back on the same
/// square, and the player does not recapture.
fn detect_sacrifice(events: &[PlyEvent], color: Color) -> bool {
    events.iter().enumerate().any(|(i, event)| {
        let Some(victim) = event.captured else {
            return false;
        };
        if event.mover != color || piece_value(event.piece) <= piece_value(victim) {
            return false;
        }

        let answered = events
            .get(i + 1)
            .is_some_and(|reply| reply.captured.is_some() && reply.dest == event.dest);
        let recaptured = events
            .get(i + 2)
            .is_some_and(|follow| follow.captured.is_some() && follow.dest == event.dest);

        answered && !recaptured
    })
}

/// Reduce one game to a feature row for `side`.
///
/// Returns `Ok(None)` when the game is too short to say anything about style,
/// and an `Input` error when the record is malformed.
pub fn extract(record: &GameRecord, side: Side) -> Result<Option<GameFeatureRow>> {
    if record.ply_count() < MIN_PLIES {
        return Ok(None);
    }

    let outcome = record
        .result
        .outcome_for(side)
        .ok_or_else(|| input_error!("game {} vs {} has no result", record.white, record.black))?;

    let events = replay(record)?;
    let color = side.color();

    let mut first_queen_ply = None;
    let mut castled_early = false;
    let mut check_count = 0;

    for event in events.iter().filter(|e| e.mover == color) {
        if first_queen_ply.is_none() && event.piece == Piece::Queen {
            first_queen_ply = Some(event.ply);
        }
        if event.castles && event.ply <= EARLY_CASTLE_PLY {
            castled_early = true;
        }
        if event.gives_check {
            check_count += 1;
        }
    }

    Ok(Some(GameFeatureRow {
        ply_count: events.len() as u32,
        trade_count: count_trades(&events),
        first_queen_ply,
        castled_early,
        check_count,
        sacrifice: detect_sacrifice(&events, color),
        outcome,
    }))
}

/// Outcome of extracting features from a batch of games
#[derive(Debug, Default, Clone)]
pub struct ExtractionReport {
    pub rows: Vec<GameFeatureRow>,
    /// Malformed games that were skipped
    pub skipped: usize,
    /// Games too short to be applicable
    pub not_applicable: usize,
}

/// Extract one row per game in which `player` took part.
///
/// Malformed games are logged at debug level and counted in `skipped`.
pub fn extract_player_rows<'a, I>(games: I, player: &str) -> ExtractionReport
where
    I: IntoIterator<Item = &'a GameRecord>,
{
    let mut report = ExtractionReport::default();

    for game in games {
        let Some(side) = game.side_of(player) else {
            continue;
        };
        match extract(game, side) {
            Ok(Some(row)) => report.rows.push(row),
            Ok(None) => report.not_applicable += 1,
            Err(err) => {
                debug!("Skipping game for {}: {}", player, err);
                report.skipped += 1;
            }
        }
    }

    report
}
