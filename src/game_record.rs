use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::StyleEngineError;

/// Side of the board a player had in one game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::White, Side::Black];

    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn color(self) -> chess::Color {
        match self {
            Side::White => chess::Color::White,
            Side::Black => chess::Color::Black,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Game result from White's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    /// Unfinished or unrecorded (`*`)
    Unknown,
}

impl GameResult {
    /// Parse a PGN `Result` tag. Anything unrecognised maps to `Unknown`.
    pub fn from_pgn(tag: &str) -> Self {
        match tag.trim() {
            "1-0" => GameResult::WhiteWins,
            "0-1" => GameResult::BlackWins,
            "1/2-1/2" | "½-½" => GameResult::Draw,
            _ => GameResult::Unknown,
        }
    }

    pub fn as_pgn(self) -> &'static str {
        match self {
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
            GameResult::Unknown => "*",
        }
    }

    /// Outcome for the given side, `None` when the result is unknown.
    pub fn outcome_for(self, side: Side) -> Option<PlayerOutcome> {
        match (self, side) {
            (GameResult::Draw, _) => Some(PlayerOutcome::Draw),
            (GameResult::WhiteWins, Side::White) | (GameResult::BlackWins, Side::Black) => {
                Some(PlayerOutcome::Win)
            }
            (GameResult::WhiteWins, Side::Black) | (GameResult::BlackWins, Side::White) => {
                Some(PlayerOutcome::Loss)
            }
            (GameResult::Unknown, _) => None,
        }
    }
}

/// Result of one game from one player's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerOutcome {
    Win,
    Draw,
    Loss,
}

impl PlayerOutcome {
    pub fn score(self) -> f64 {
        match self {
            PlayerOutcome::Win => 1.0,
            PlayerOutcome::Draw => 0.5,
            PlayerOutcome::Loss => 0.0,
        }
    }

    /// Score in half points, used where sums must be exact.
    pub fn half_points(self) -> u64 {
        match self {
            PlayerOutcome::Win => 2,
            PlayerOutcome::Draw => 1,
            PlayerOutcome::Loss => 0,
        }
    }
}

/// Speed class of a game, derived from the `TimeControl` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeControlClass {
    Bullet,
    Blitz,
    Rapid,
    Classical,
    Correspondence,
    Unknown,
}

impl TimeControlClass {
    /// Classify a `base+increment` tag by estimated duration `base + 40 * increment`.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim();
        if tag == "-" {
            return TimeControlClass::Correspondence;
        }

        let mut parts = tag.splitn(2, '+');
        let base = parts.next().and_then(|b| b.parse::<u64>().ok());
        let increment = match parts.next() {
            Some(inc) => inc.parse::<u64>().ok(),
            None => Some(0),
        };

        match (base, increment) {
            (Some(base), Some(increment)) => {
                let estimated = increment.checked_mul(40).and_then(|x| x.checked_add(base));
                let Some(estimated) = estimated else {
                    return TimeControlClass::Classical;
                };
                if estimated < 180 {
                    TimeControlClass::Bullet
                } else if estimated < 480 {
                    TimeControlClass::Blitz
                } else if estimated < 1500 {
                    TimeControlClass::Rapid
                } else {
                    TimeControlClass::Classical
                }
            }
            _ => TimeControlClass::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeControlClass::Bullet => "bullet",
            TimeControlClass::Blitz => "blitz",
            TimeControlClass::Rapid => "rapid",
            TimeControlClass::Classical => "classical",
            TimeControlClass::Correspondence => "correspondence",
            TimeControlClass::Unknown => "unknown",
        }
    }
}

impl FromStr for TimeControlClass {
    type Err = StyleEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullet" => Ok(TimeControlClass::Bullet),
            "blitz" => Ok(TimeControlClass::Blitz),
            "rapid" => Ok(TimeControlClass::Rapid),
            "classical" => Ok(TimeControlClass::Classical),
            "correspondence" => Ok(TimeControlClass::Correspondence),
            other => Err(crate::config_error!("unknown time control class '{}'", other)),
        }
    }
}

impl fmt::Display for TimeControlClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One played game, already parsed from notation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub white: String,
    pub black: String,
    pub result: GameResult,
    pub eco: Option<String>,
    pub opening: Option<String>,
    /// Moves in UCI coordinate notation (`e2e4`, `e7e8q`, castling as `e1g1`)
    pub moves: Vec<String>,
    /// Engine evaluation in pawns after each ply, when the source annotated it
    pub evals: Vec<Option<f32>>,
    pub time_control: Option<String>,
    pub played_at: Option<DateTime<Utc>>,
}

impl GameRecord {
    pub fn new(white: impl Into<String>, black: impl Into<String>, result: GameResult) -> Self {
        Self {
            white: white.into(),
            black: black.into(),
            result,
            eco: None,
            opening: None,
            moves: Vec::new(),
            evals: Vec::new(),
            time_control: None,
            played_at: None,
        }
    }

    pub fn with_moves<I, S>(mut self, moves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.moves = moves.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_opening(mut self, eco: impl Into<String>, name: impl Into<String>) -> Self {
        self.eco = Some(eco.into());
        self.opening = Some(name.into());
        self
    }

    pub fn with_time_control(mut self, time_control: impl Into<String>) -> Self {
        self.time_control = Some(time_control.into());
        self
    }

    pub fn ply_count(&self) -> usize {
        self.moves.len()
    }

    pub fn time_control_class(&self) -> TimeControlClass {
        self.time_control
            .as_deref()
            .map(TimeControlClass::from_tag)
            .unwrap_or(TimeControlClass::Unknown)
    }

    /// Side played by `player`, matched case-insensitively.
    pub fn side_of(&self, player: &str) -> Option<Side> {
        if self.white.eq_ignore_ascii_case(player) {
            Some(Side::White)
        } else if self.black.eq_ignore_ascii_case(player) {
            Some(Side::Black)
        } else {
            None
        }
    }

    pub fn player(&self, side: Side) -> &str {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    /// ECO code usable for opening statistics, if the tag is meaningful.
    pub fn opening_code(&self) -> Option<&str> {
        self.eco
            .as_deref()
            .map(str::trim)
            .filter(|eco| !eco.is_empty() && *eco != "?")
    }
}

/// Combine PGN `UTCDate` (`2025.05.01`) and `UTCTime` (`12:30:00`) tags.
pub fn parse_utc_timestamp(date: &str, time: Option<&str>) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y.%m.%d").ok()?;
    let time = time
        .and_then(|t| NaiveTime::parse_from_str(t.trim(), "%H:%M:%S").ok())
        .unwrap_or(NaiveTime::MIN);
    Some(date.and_time(time).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_perspective() {
        assert_eq!(
            GameResult::WhiteWins.outcome_for(Side::White),
            Some(PlayerOutcome::Win)
        );
        assert_eq!(
            GameResult::WhiteWins.outcome_for(Side::Black),
            Some(PlayerOutcome::Loss)
        );
        assert_eq!(
            GameResult::Draw.outcome_for(Side::Black),
            Some(PlayerOutcome::Draw)
        );
        assert_eq!(GameResult::Unknown.outcome_for(Side::White), None);
        assert_eq!(GameResult::from_pgn("½-½"), GameResult::Draw);
        assert_eq!(GameResult::from_pgn("*"), GameResult::Unknown);
    }

    #[test]
    fn test_time_control_classes() {
        assert_eq!(TimeControlClass::from_tag("60+0"), TimeControlClass::Bullet);
        assert_eq!(TimeControlClass::from_tag("180+2"), TimeControlClass::Blitz);
        assert_eq!(TimeControlClass::from_tag("600+5"), TimeControlClass::Rapid);
        assert_eq!(TimeControlClass::from_tag("1800+20"), TimeControlClass::Classical);
        assert_eq!(TimeControlClass::from_tag("-"), TimeControlClass::Correspondence);
        assert_eq!(TimeControlClass::from_tag("abc"), TimeControlClass::Unknown);
        assert_eq!("Blitz".parse::<TimeControlClass>().unwrap(), TimeControlClass::Blitz);
        assert!("hyper".parse::<TimeControlClass>().is_err());
    }

    #[test]
    fn test_overflowing_time_control_is_classical() {
        assert_eq!(
            TimeControlClass::from_tag("1+500000000000000000"),
            TimeControlClass::Classical
        );
        assert_eq!(
            TimeControlClass::from_tag("18446744073709551615+1"),
            TimeControlClass::Classical
        );
        let game =
            GameRecord::new("a", "b", GameResult::Draw).with_time_control("1+500000000000000000");
        assert_eq!(game.time_control_class(), TimeControlClass::Classical);
    }

    #[test]
    fn test_side_lookup_is_case_insensitive() {
        let game = GameRecord::new("Magnus", "Hikaru", GameResult::Draw);
        assert_eq!(game.side_of("magnus"), Some(Side::White));
        assert_eq!(game.side_of("HIKARU"), Some(Side::Black));
        assert_eq!(game.side_of("someone"), None);
    }

    #[test]
    fn test_opening_code_filters_placeholders() {
        let game = GameRecord::new("a", "b", GameResult::Draw).with_opening("?", "Unknown");
        assert_eq!(game.opening_code(), None);
        let game = GameRecord::new("a", "b", GameResult::Draw).with_opening("C72", "Ruy Lopez");
        assert_eq!(game.opening_code(), Some("C72"));
    }

    #[test]
    fn test_parse_utc_timestamp() {
        let ts = parse_utc_timestamp("2025.05.01", Some("12:30:00")).unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-05-01T12:30:00+00:00");
        assert!(parse_utc_timestamp("2025.??.??", None).is_none());
    }
}
