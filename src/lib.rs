//! # Chess Style Engine
//!
//! Turns a player's game history into a fixed-length **style vector**, places
//! it among a reference corpus of strong players grouped into style
//! archetypes, finds the nearest stylistic peers and ranks openings by how
//! well those peers scored with them.
//!
//! ## Features
//!
//! - **♟️ Feature Extraction**: Per-game metrics from replayed moves (trades, checks, castling, sacrifices)
//! - **📐 Style Vectors**: Order-independent aggregation with explicit absent features
//! - **🧭 Archetypes**: Seeded, deterministic k-means over a standardized corpus
//! - **🔍 Peer Matching**: Exhaustive or archetype-probed nearest neighbours with stable tie-breaks
//! - **📖 Opening Recommendations**: Sample-size aware ranking of peer openings per side
//! - **💾 Persistence**: PGN and CSV input, JSON/binary snapshots, SQLite corpus storage
//!
//! ## Quick Start
//!
//! ```rust
//! use chess_style_engine::{
//!     ClusterConfig, CorpusSnapshot, PeerMatcher, ReferenceCorpus, ReferencePlayer,
//!     SearchStrategy, StyleVector, FEATURE_COUNT,
//! };
//!
//! let mut players = Vec::new();
//! for i in 0..4 {
//!     players.push(ReferencePlayer {
//!         id: format!("player{}", i),
//!         style: StyleVector::from_values(&[i as f64; FEATURE_COUNT])?,
//!         games_used: 10,
//!         low_confidence: false,
//!         archetype: None,
//!         outcomes: Vec::new(),
//!     });
//! }
//!
//! // Fit archetypes once, then serve queries from the frozen snapshot
//! let corpus = ReferenceCorpus::from_players(players)?;
//! let snapshot = CorpusSnapshot::build(corpus, &ClusterConfig::default().with_k_arch(2))?;
//!
//! let query = StyleVector::from_values(&[1.0; FEATURE_COUNT])?;
//! let peers = PeerMatcher::new(&snapshot).find_peers(&query, 3, SearchStrategy::Exhaustive)?;
//! assert_eq!(peers[0].player_id, "player1");
//! # Ok::<(), chess_style_engine::StyleEngineError>(())
//! ```

// Core modules
pub mod errors;
pub mod utils;

pub use errors::{Result, StyleEngineError};

pub mod archetype;
pub mod config;
pub mod feature_extractor;
pub mod game_record;
pub mod opening_recommender;
pub mod peer_matcher;
pub mod persistence;
pub mod pgn_parser;
pub mod pipeline;
pub mod reference_corpus;
pub mod snapshot;
pub mod style_vector;

pub use archetype::{ArchetypeModel, ArchetypeSummary, Normalizer};
pub use config::{
    AggregationConfig, ClusterConfig, EngineConfig, MatchingConfig, RecommendConfig,
    SearchStrategy,
};
pub use feature_extractor::{extract, extract_player_rows, ExtractionReport, GameFeatureRow};
pub use game_record::{GameRecord, GameResult, PlayerOutcome, Side, TimeControlClass};
pub use opening_recommender::{recommend, OpeningRecommender, OpeningStat, Recommendations};
pub use peer_matcher::{Peer, PeerMatcher};
pub use persistence::CorpusDatabase;
pub use pgn_parser::{parse_pgn, parse_pgn_file, ParsedGames};
pub use pipeline::{
    profile_player, Diagnostics, OpeningSummary, PlayerProfile, RecommendationResponse,
    SideRecommendations, StylePipeline,
};
pub use reference_corpus::{
    CorpusBuildReport, CorpusBuilder, OpeningOutcome, ReferenceCorpus, ReferencePlayer,
    StyleTableRow,
};
pub use snapshot::{CorpusSnapshot, CorpusStore, StoreState};
pub use style_vector::{
    AggregatedStyle, StyleAggregator, StyleFeature, StyleVector, FEATURE_COUNT,
};
