use chess_style_engine::reference_corpus::load_games_csv;
use chess_style_engine::{
    parse_pgn_file, CorpusSnapshot, CorpusStore, EngineConfig, ParsedGames, SearchStrategy,
    StylePipeline, TimeControlClass,
};
use clap::Parser;
use std::path::Path;
use tracing::{warn, Level};

#[derive(Parser)]
#[command(author, version, about = "Recommend openings from a player's stylistic peers", long_about = None)]
struct Args {
    /// The player's games: a PGN file, or a games table (.csv)
    #[arg(short, long)]
    games: String,

    /// Player identifier as it appears in the White/Black headers
    #[arg(short, long)]
    player: String,

    /// Corpus snapshot written by build_corpus
    #[arg(short, long, default_value = "corpus_snapshot.bin")]
    snapshot: String,

    /// Only use games of this speed (bullet, blitz, rapid, classical, correspondence)
    #[arg(short, long)]
    time_control: Option<String>,

    /// Engine configuration JSON
    #[arg(short, long)]
    config: Option<String>,

    /// Number of peers
    #[arg(short = 'k', long)]
    peers: Option<usize>,

    /// Openings returned per side
    #[arg(long)]
    top_n: Option<usize>,

    /// Search only the N nearest archetypes instead of the whole corpus
    #[arg(long)]
    probes: Option<usize>,

    /// Write the JSON response here instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(k) = args.peers {
        config = config.with_peers(k);
    }
    if let Some(top_n) = args.top_n {
        config = config.with_top_n(top_n);
    }
    if let Some(probes) = args.probes {
        config = config.with_strategy(SearchStrategy::Archetype { probes });
    }
    let time_control = args
        .time_control
        .as_deref()
        .map(str::parse::<TimeControlClass>)
        .transpose()?;

    let store = CorpusStore::new();
    store.publish(CorpusSnapshot::load(&args.snapshot)?);
    let pipeline = StylePipeline::from_store(&store, config)?;

    let parsed = if has_extension(&args.games, "csv") {
        let (games, skipped) = load_games_csv(&args.games)?;
        ParsedGames { games, skipped }
    } else {
        parse_pgn_file(&args.games)?
    };
    if parsed.skipped > 0 {
        warn!("{} unreadable games in {}", parsed.skipped, args.games);
    }

    let response = pipeline.run_parsed(&parsed, &args.player, time_control)?;
    let json = serde_json::to_string_pretty(&response)?;

    match &args.output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{}", json),
    }
    Ok(())
}

fn has_extension(path: &str, wanted: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}
