use multi_sport::data_processing::load_records;
use multi_sport::rating::{RatingEngine, TeamsByName, replay_history};
use multi_sport::summary::print_ratings;

/// Replays one division's season history and prints the rating board
fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 && args.len() != 4 {
        tracing::error!(
            "Usage: {} history_file regular_season_length [out_dir]",
            args[0]
        );
        return;
    }
    let records = load_records(&args[1]);
    let total_matches: usize = args[2].parse().expect("regular_season_length must be a number");
    let out_dir = args.get(3).cloned().unwrap_or_else(|| "output".to_string());

    let engine = RatingEngine::default();
    let mut teams = TeamsByName::new();
    replay_history(&engine, &mut teams, &records, total_matches, |_| 1500.);
    tracing::info!(
        "Rated {} matches across {} teams",
        records.len(),
        teams.len()
    );

    std::fs::create_dir_all(&out_dir).expect("Could not create directory");
    print_ratings(&teams, &out_dir);
}
