use chess_style_engine::reference_corpus::{
    load_games_csv, read_style_vectors_csv, write_games_csv, write_style_vectors_csv,
};
use chess_style_engine::{
    parse_pgn_file, CorpusBuilder, CorpusDatabase, CorpusSnapshot, EngineConfig, GameRecord,
    ReferenceCorpus, StyleAggregator,
};
use clap::Parser;
use std::path::Path;
use std::time::Instant;
use tracing::Level;

#[derive(Parser)]
#[command(author, version, about = "Build a reference corpus snapshot from elite games", long_about = None)]
struct Args {
    /// Reference games: a PGN file, or a games table (.csv)
    #[arg(short, long)]
    input: String,

    /// Snapshot output path (.json for JSON, anything else for binary)
    #[arg(short, long, default_value = "corpus_snapshot.bin")]
    output: String,

    /// Precomputed style vector table; skips feature extraction when given
    #[arg(long)]
    style_table: Option<String>,

    /// Engine configuration JSON
    #[arg(short, long)]
    config: Option<String>,

    /// Override the number of archetypes
    #[arg(long)]
    k_arch: Option<usize>,

    /// Override the clustering seed
    #[arg(long)]
    seed: Option<u64>,

    /// Leave out reference players with fewer usable games
    #[arg(long, default_value = "1")]
    min_games_per_player: usize,

    /// Worker threads for feature extraction
    #[arg(long, default_value_t = num_cpus::get())]
    threads: usize,

    /// Also write the computed style vectors to this CSV
    #[arg(long)]
    export_styles: Option<String>,

    /// Also write the parsed games to this CSV
    #[arg(long)]
    export_games: Option<String>,

    /// Also store the corpus in this SQLite database
    #[arg(short, long)]
    database: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(k_arch) = args.k_arch {
        config.cluster.k_arch = k_arch;
    }
    if let Some(seed) = args.seed {
        config.cluster.seed = seed;
    }
    config.validate()?;

    println!("♟️  Chess Style Engine - Reference Corpus Builder");
    println!("=================================================");
    println!();
    println!("Configuration:");
    println!("  • Input: {}", args.input);
    println!("  • Output: {}", args.output);
    println!("  • Archetypes: {}", config.cluster.k_arch);
    println!("  • Seed: {}", config.cluster.seed);
    println!("  • Threads: {}", args.threads);
    println!();

    let start = Instant::now();
    let games = load_games(&args.input)?;

    let corpus = match &args.style_table {
        Some(path) => {
            println!("📋 Loading precomputed style vectors from {}", path);
            let table = read_style_vectors_csv(path)?;
            ReferenceCorpus::from_style_table(table, &games)?
        }
        None => {
            println!("🔬 Extracting features for reference players...");
            let (corpus, report) = CorpusBuilder::new()
                .with_aggregator(StyleAggregator::new(config.aggregation.min_games))
                .with_min_games_per_player(args.min_games_per_player)
                .with_threads(args.threads)
                .with_progress(true)
                .build(&games)?;
            println!(
                "✅ {} players ({} excluded), {} games used, {} skipped",
                report.players, report.excluded_players, report.games_used, report.skipped_games
            );
            corpus
        }
    };

    println!("🧭 Fitting {} archetypes...", config.cluster.k_arch);
    let snapshot = CorpusSnapshot::build(corpus, &config.cluster)?;
    let model = snapshot.model();
    println!(
        "✅ Fitted in {} iterations (converged: {})",
        model.iterations(),
        model.converged()
    );

    let mut summaries = model.summaries();
    summaries.sort_by(|a, b| b.size.cmp(&a.size).then(a.index.cmp(&b.index)));
    println!();
    println!("📊 Largest archetypes:");
    for summary in summaries.iter().take(5) {
        println!("  • Archetype {:>3}: {} players", summary.index, summary.size);
    }
    println!();

    snapshot.save(&args.output)?;
    println!("💾 Snapshot written to {}", args.output);

    if let Some(path) = &args.export_styles {
        write_style_vectors_csv(path, &snapshot.corpus().to_style_table())?;
        println!("💾 Style vectors written to {}", path);
    }
    if let Some(path) = &args.export_games {
        write_games_csv(path, &games)?;
        println!("💾 Games table written to {}", path);
    }
    if let Some(path) = &args.database {
        let db = CorpusDatabase::new(path)?;
        let saved = db.save_corpus(snapshot.corpus())?;
        println!("💾 {} players stored in {}", saved, path);
    }

    println!();
    println!(
        "🎉 Corpus of {} players ready in {:.2}s",
        snapshot.player_count(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn load_games(input: &str) -> Result<Vec<GameRecord>, Box<dyn std::error::Error>> {
    let is_csv = Path::new(input)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    println!("📚 Loading games from {}...", input);
    let (games, skipped) = if is_csv {
        load_games_csv(input)?
    } else {
        let parsed = parse_pgn_file(input)?;
        (parsed.games, parsed.skipped)
    };
    println!("✅ Loaded {} games ({} skipped)", games.len(), skipped);
    Ok(games)
}
