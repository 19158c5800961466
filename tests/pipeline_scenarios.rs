use chess_style_engine::{
    parse_pgn, recommend, ArchetypeModel, ClusterConfig, CorpusBuilder, CorpusSnapshot,
    CorpusStore, EngineConfig, GameRecord, GameResult, OpeningOutcome, Peer, PeerMatcher,
    PlayerOutcome, RecommendConfig, ReferenceCorpus, ReferencePlayer, SearchStrategy, Side,
    StyleEngineError, StyleFeature, StylePipeline, StyleVector, TimeControlClass, FEATURE_COUNT,
};

const ITALIAN: [&str; 10] = [
    "e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "f8c5", "e1g1", "g8f6", "d2d3", "e8g8",
];
const WAYWARD_QUEEN: [&str; 7] = ["e2e4", "e7e5", "d1h5", "b8c6", "f1c4", "g8f6", "h5f7"];

fn style(values: [f64; FEATURE_COUNT]) -> StyleVector {
    StyleVector::from_values(&values).unwrap()
}

fn spread(base: f64) -> StyleVector {
    let mut values = [0.0; FEATURE_COUNT];
    for (i, value) in values.iter_mut().enumerate() {
        *value = base * (1.0 + i as f64 * 0.1);
    }
    style(values)
}

fn reference(id: &str, style: StyleVector, outcomes: Vec<OpeningOutcome>) -> ReferencePlayer {
    ReferencePlayer {
        id: id.to_string(),
        style,
        games_used: 25,
        low_confidence: false,
        archetype: None,
        outcomes,
    }
}

fn outcome(side: Side, eco: &str, outcome: PlayerOutcome) -> OpeningOutcome {
    OpeningOutcome {
        side,
        eco: eco.to_string(),
        opening: Some(format!("Opening {}", eco)),
        outcome,
        time_control: TimeControlClass::Blitz,
    }
}

fn five_player_snapshot() -> CorpusSnapshot {
    let corpus = ReferenceCorpus::from_players(vec![
        reference("anand", spread(1.0), Vec::new()),
        reference("carlsen", spread(2.0), Vec::new()),
        reference("ding", spread(3.5), Vec::new()),
        reference("firouzja", spread(7.0), Vec::new()),
        reference("gukesh", spread(8.0), Vec::new()),
    ])
    .unwrap();
    CorpusSnapshot::build(corpus, &ClusterConfig::default().with_k_arch(2)).unwrap()
}

#[test]
fn test_identical_query_ranks_reference_player_first() {
    let snapshot = five_player_snapshot();
    let query = snapshot.corpus().get("ding").unwrap().style.clone();

    let peers = PeerMatcher::new(&snapshot)
        .find_peers(&query, 5, SearchStrategy::Exhaustive)
        .unwrap();

    assert_eq!(peers[0].player_id, "ding");
    assert_eq!(peers[0].distance, 0.0);
    assert!(peers[1..].iter().all(|p| p.distance > 0.0));
}

#[test]
fn test_fit_with_fewer_players_than_archetypes_fails() {
    let vectors: Vec<StyleVector> = (1..=4).map(|i| spread(i as f64)).collect();
    let refs: Vec<&StyleVector> = vectors.iter().collect();

    let err = ArchetypeModel::fit(&refs, &ClusterConfig::default().with_k_arch(5)).unwrap_err();
    assert!(matches!(err, StyleEngineError::Configuration(_)));
}

#[test]
fn test_snapshot_build_propagates_small_corpus_error() {
    let corpus = ReferenceCorpus::from_players(
        (1..=4).map(|i| reference(&format!("p{}", i), spread(i as f64), Vec::new())),
    )
    .unwrap();
    assert!(matches!(
        CorpusSnapshot::build(corpus, &ClusterConfig::default().with_k_arch(5)),
        Err(StyleEngineError::Configuration(_))
    ));
}

#[test]
fn test_c72_score_from_peer_outcomes() {
    let mut history = Vec::new();
    history.extend((0..6).map(|_| outcome(Side::White, "C72", PlayerOutcome::Win)));
    history.extend((0..2).map(|_| outcome(Side::White, "C72", PlayerOutcome::Draw)));
    history.extend((0..2).map(|_| outcome(Side::White, "C72", PlayerOutcome::Loss)));
    let corpus = ReferenceCorpus::from_players(vec![reference("peer", spread(1.0), history)]).unwrap();

    let peers = vec![Peer {
        player_id: "peer".to_string(),
        distance: 0.1,
        archetype: None,
    }];
    let recs = recommend(&peers, &corpus, Side::White, &RecommendConfig::default());

    assert_eq!(recs.openings.len(), 1);
    assert_eq!(recs.openings[0].opening_code, "C72");
    assert_eq!(recs.openings[0].games_played, 10);
    assert!((recs.openings[0].score_pct - 0.70).abs() < 1e-12);
}

#[test]
fn test_two_games_give_low_confidence_with_absent_features() {
    // as Black in the Italian the queen never moves
    let games: Vec<GameRecord> = (0..2)
        .map(|i| {
            GameRecord::new(format!("opp{}", i), "rookie", GameResult::Draw)
                .with_moves(ITALIAN)
                .with_opening("C50", "Italian Game")
        })
        .collect();

    let profile = chess_style_engine::profile_player(
        &games,
        "rookie",
        None,
        &EngineConfig::default().aggregation,
    )
    .unwrap();

    assert!(profile.style.low_confidence);
    assert_eq!(profile.style.games_used, 2);
    assert_eq!(profile.style.vector.len(), FEATURE_COUNT);
    assert_eq!(profile.style.vector.get(StyleFeature::AvgQueenMove), None);
    assert_eq!(profile.style.vector.get(StyleFeature::PctDraws), Some(1.0));
}

#[test]
fn test_more_peers_than_corpus_returns_all() {
    let snapshot = five_player_snapshot();
    let peers = PeerMatcher::new(&snapshot)
        .find_peers(&spread(4.0), 10, SearchStrategy::Exhaustive)
        .unwrap();
    assert_eq!(peers.len(), 5);

    let mut ids: Vec<&str> = peers.iter().map(|p| p.player_id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["anand", "carlsen", "ding", "firouzja", "gukesh"]);
}

#[test]
fn test_dimension_skew_is_never_padded() {
    let snapshot = five_player_snapshot();
    assert!(matches!(
        StyleVector::new(vec![Some(1.0); FEATURE_COUNT + 1]),
        Err(StyleEngineError::Consistency { .. })
    ));
    let short = ndarray::Array1::<f64>::zeros(FEATURE_COUNT + 2);
    assert!(matches!(
        PeerMatcher::new(&snapshot).find_peers_normalized(short.view(), 3, SearchStrategy::Exhaustive),
        Err(StyleEngineError::Consistency { .. })
    ));
}

fn reference_games() -> Vec<GameRecord> {
    let mut games = Vec::new();
    for (player, line, eco, name) in [
        ("attacker_a", &WAYWARD_QUEEN[..], "C20", "Wayward Queen Attack"),
        ("attacker_b", &WAYWARD_QUEEN[..], "C20", "Wayward Queen Attack"),
        ("positional_a", &ITALIAN[..], "C50", "Italian Game"),
        ("positional_b", &ITALIAN[..], "C50", "Italian Game"),
    ] {
        for g in 0..6 {
            let result = if g % 3 == 2 {
                GameResult::Draw
            } else {
                GameResult::WhiteWins
            };
            games.push(
                GameRecord::new(player, format!("{}_opp{}", player, g), result)
                    .with_moves(line.iter().copied())
                    .with_opening(eco, name)
                    .with_time_control("180+0"),
            );
        }
    }
    games
}

#[test]
fn test_end_to_end_pipeline_from_pgn() {
    let (corpus, report) = CorpusBuilder::new()
        .with_min_games_per_player(3)
        .with_threads(2)
        .build(&reference_games())
        .unwrap();
    assert_eq!(report.players, 4);

    let config = EngineConfig::default().with_k_arch(2).with_peers(2);
    let store = CorpusStore::new();
    store.publish(CorpusSnapshot::build(corpus, &config.cluster).unwrap());
    let pipeline = StylePipeline::from_store(&store, config).unwrap();

    let pgn = r#"
[Event "Casual"]
[White "newcomer"]
[Black "friend"]
[Result "1-0"]
[ECO "C50"]
[TimeControl "180+0"]

1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. O-O Nf6 5. d3 O-O 1-0

[Event "Casual"]
[White "newcomer"]
[Black "friend"]
[Result "1/2-1/2"]
[ECO "C50"]
[TimeControl "180+0"]

1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. O-O Nf6 5. d3 O-O 1/2-1/2

[Event "Casual"]
[White "friend"]
[Black "newcomer"]
[Result "*"]

1. e4 e5 *

[Event "Casual"]
[White "newcomer"]
[Black "friend"]
[Result "0-1"]
[ECO "C20"]

1. e4 e5 2. Ke3 Nc6 0-1
"#;
    let parsed = parse_pgn(pgn).unwrap();
    assert_eq!(parsed.games.len(), 3);
    assert_eq!(parsed.skipped, 1);

    let games_only = pipeline.run(&parsed.games, "newcomer", None).unwrap();
    assert_eq!(games_only.diagnostics.skipped_games, 1);

    let response = pipeline.run_parsed(&parsed, "newcomer", None).unwrap();

    let peer_ids: Vec<&str> = response.peers.iter().map(|p| p.player_id.as_str()).collect();
    assert_eq!(peer_ids, vec!["positional_a", "positional_b"]);
    assert_eq!(response.diagnostics.games_used, 2);
    // the unfinished game plus the one with an illegal king move
    assert_eq!(response.diagnostics.skipped_games, 2);
    assert!(response.diagnostics.low_confidence_style);

    let white = &response.recommendations.white;
    assert_eq!(white.len(), 1);
    assert_eq!(white[0].opening_code, "C50");
    assert_eq!(white[0].games_played, 12);
    assert!(response.recommendations.black.is_empty());
    assert!(response.diagnostics.low_confidence_black);

    let json = serde_json::to_value(&response).unwrap();
    assert!(json["style_vector"]["avg_moves"].is_number());
    assert!(json["style_vector"]["avg_queen_move"].is_null());
    assert_eq!(json["peers"][0]["player_id"], "positional_a");
    assert_eq!(json["recommendations"]["white"][0]["opening_code"], "C50");
    assert!(json["peers"][0].get("archetype").is_none());
}

#[test]
fn test_query_against_unbuilt_store_fails() {
    let store = CorpusStore::new();
    assert!(matches!(
        StylePipeline::from_store(&store, EngineConfig::default()),
        Err(StyleEngineError::NotInitialized)
    ));
}

#[test]
fn test_time_control_filter_with_no_matching_games() {
    let (corpus, _) = CorpusBuilder::new()
        .with_min_games_per_player(3)
        .build(&reference_games())
        .unwrap();
    let config = EngineConfig::default().with_k_arch(2);
    let snapshot = std::sync::Arc::new(CorpusSnapshot::build(corpus, &config.cluster).unwrap());
    let pipeline = StylePipeline::new(snapshot, config).unwrap();

    let games = reference_games();
    let err = pipeline
        .run(&games, "positional_a", Some(TimeControlClass::Classical))
        .unwrap_err();
    assert!(matches!(err, StyleEngineError::InsufficientData { .. }));

    let response = pipeline
        .run(&games, "positional_a", Some(TimeControlClass::Blitz))
        .unwrap();
    assert_eq!(response.peers[0].player_id, "positional_a");
    assert_eq!(response.peers[0].distance, 0.0);
}
