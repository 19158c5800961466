use chess_style_engine::{
    CorpusBuilder, CorpusSnapshot, CorpusStore, EngineConfig, GameRecord, GameResult, Side,
    StyleAggregator, StylePipeline,
};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;
use tracing::Level;

/// Short legal lines with distinct character, plus the opening they belong to
const LINES: [(&str, &str, &[&str]); 4] = [
    (
        "C20",
        "King's Pawn Game: Wayward Queen Attack",
        &["e2e4", "e7e5", "d1h5", "b8c6", "f1c4", "g8f6", "h5f7"],
    ),
    (
        "C50",
        "Italian Game",
        &[
            "e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "f8c5", "e1g1", "g8f6", "d2d3", "e8g8",
        ],
    ),
    (
        "D35",
        "Queen's Gambit Declined: Exchange Variation",
        &[
            "d2d4", "d7d5", "c2c4", "e7e6", "b1c3", "g8f6", "c4d5", "e6d5", "c1g5", "f8e7",
            "e2e3", "e8g8", "f1d3", "b8d7", "g1f3", "c7c6", "d1c2", "f8e8",
        ],
    ),
    (
        "C20",
        "King's Pawn Game",
        &["e2e4", "e7e5", "d1h5", "b8c6", "h5e5", "c6e5"],
    ),
];

const TIME_CONTROLS: [&str; 3] = ["60+0", "180+2", "600+5"];

#[derive(Parser)]
#[command(author, version, about = "End-to-end demonstration on a synthetic corpus", long_about = None)]
struct Args {
    /// Reference players to simulate
    #[arg(long, default_value = "40")]
    players: usize,

    /// Games per simulated player
    #[arg(long, default_value = "20")]
    games_per_player: usize,

    /// Number of archetypes
    #[arg(long, default_value = "4")]
    k_arch: usize,

    /// Seed for the simulated games
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    println!("♟️  Chess Style Engine - Demo");
    println!("=============================");
    println!();

    let mut rng = StdRng::seed_from_u64(args.seed);
    let start = Instant::now();

    println!("🎲 Simulating {} reference players...", args.players);
    let mut games = Vec::new();
    for p in 0..args.players {
        let favourite = p % LINES.len();
        let name = format!("elite_{:02}", p);
        games.extend(simulate_games(&mut rng, &name, favourite, args.games_per_player));
    }
    println!("✅ {} games generated", games.len());

    // one-off opponents fall below the minimum and stay out of the corpus
    let (corpus, report) = CorpusBuilder::new()
        .with_aggregator(StyleAggregator::default())
        .with_min_games_per_player(5)
        .build(&games)?;
    println!(
        "✅ Corpus: {} players, {} games used, {} excluded",
        report.players, report.games_used, report.excluded_players
    );

    let config = EngineConfig::default().with_k_arch(args.k_arch);
    let store = CorpusStore::new();
    store.publish(CorpusSnapshot::build(corpus, &config.cluster)?);

    let snapshot = store.current()?;
    println!();
    println!("🧭 Archetypes:");
    for summary in snapshot.model().summaries() {
        println!("  • Archetype {}: {} players", summary.index, summary.size);
    }

    println!();
    println!("👤 Simulating the query player (prefers the Italian Game)...");
    let user_games = simulate_games(&mut rng, "demo_user", 1, 12);

    let pipeline = StylePipeline::from_store(&store, config)?;
    let response = pipeline.run(&user_games, "demo_user", None)?;

    println!();
    println!("📐 Style vector:");
    println!("{}", serde_json::to_string_pretty(&response.style_vector.named())?);

    println!();
    println!("🤝 Nearest peers:");
    for peer in &response.peers {
        println!("  • {:<10} distance {:.3}", peer.player_id, peer.distance);
    }

    for (side, openings) in [
        ("White", &response.recommendations.white),
        ("Black", &response.recommendations.black),
    ] {
        println!();
        println!("📖 Recommended as {}:", side);
        for opening in openings {
            println!(
                "  • {} {} ({} games, {:.0}%)",
                opening.opening_code,
                opening.opening_name,
                opening.games_played,
                opening.score_pct * 100.0
            );
        }
    }

    println!();
    println!(
        "🎉 Done in {:.2}s (archetype {}, {} games used)",
        start.elapsed().as_secs_f64(),
        response.diagnostics.archetype,
        response.diagnostics.games_used
    );
    Ok(())
}

fn simulate_games(rng: &mut StdRng, player: &str, favourite: usize, count: usize) -> Vec<GameRecord> {
    (0..count)
        .map(|g| {
            let line = if rng.gen_bool(0.75) {
                favourite
            } else {
                rng.gen_range(0..LINES.len())
            };
            let (eco, name, moves) = LINES[line];

            let opponent = format!("{}_opponent_{}", player, g);
            let side = if rng.gen_bool(0.5) { Side::White } else { Side::Black };
            let (white, black) = match side {
                Side::White => (player.to_string(), opponent),
                Side::Black => (opponent, player.to_string()),
            };

            let roll: f64 = rng.gen();
            let result = if roll < 0.45 {
                GameResult::WhiteWins
            } else if roll < 0.75 {
                GameResult::BlackWins
            } else {
                GameResult::Draw
            };

            GameRecord::new(white, black, result)
                .with_moves(moves.iter().copied())
                .with_opening(eco, name)
                .with_time_control(TIME_CONTROLS[rng.gen_range(0..TIME_CONTROLS.len())])
        })
        .collect()
}
