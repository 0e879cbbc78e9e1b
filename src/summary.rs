use crate::data_processing::write_slice_to_file;
use crate::forecast::Forecast;
use crate::rating::TeamsByName;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize)]
pub struct RatingRow {
    rank: Option<usize>,
    pub rating: i32,
    num_matches: usize,
    last_match_index: usize,
    pub team: String,
}

/// Builds the rating leaderboard, strongest first, ties broken by name.
pub fn make_rating_board(teams: &TeamsByName) -> Vec<RatingRow> {
    let mut rows: Vec<RatingRow> = teams
        .iter()
        .map(|(name, team)| {
            let team = team.borrow();
            RatingRow {
                rank: None,
                rating: team.rating.round() as i32,
                num_matches: team.event_history.len(),
                last_match_index: team
                    .event_history
                    .last()
                    .map_or(0, |event| event.match_index),
                team: name.clone(),
            }
        })
        .collect();
    rows.sort_unstable_by_key(|row| (-row.rating, row.team.clone()));
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = Some(i + 1);
    }
    rows
}

/// Prints the rating board and writes it to `dir/all_teams.csv`.
pub fn print_ratings(teams: &TeamsByName, dir: impl AsRef<Path>) {
    let rows = make_rating_board(teams);
    let mean = rows.iter().map(|row| row.rating as f64).sum::<f64>() / rows.len().max(1) as f64;
    tracing::info!("Mean rating = {:.1} over {} teams", mean, rows.len());
    for row in rows.iter().take(10) {
        tracing::info!(
            "{:3}. {:24} {:5} ({} matches)",
            row.rank.unwrap_or(0),
            row.team,
            row.rating,
            row.num_matches
        );
    }
    write_slice_to_file(&rows, dir.as_ref().join("all_teams.csv"));
}

// Flat fixture row for the CSV table; the full score distribution only
// fits the JSON output.
#[derive(Serialize)]
struct FixtureRow<'a> {
    match_index: usize,
    team_a: &'a str,
    team_b: &'a str,
    win_a_prob: f64,
    draw_prob: f64,
    win_b_prob: f64,
    expected_score_a: f64,
    expected_score_b: f64,
}

/// Prints the headline forecast and writes the team table, the flat
/// fixture table, and the full fixture breakdown (with distributions).
pub fn print_forecast(forecast: &Forecast, dir: impl AsRef<Path>) {
    let dir = dir.as_ref();
    tracing::info!("Forecast over {} simulated seasons", forecast.runs);
    let by_position = forecast
        .teams
        .iter()
        .sorted_by(|x, y| x.expected_position.total_cmp(&y.expected_position));
    for team in by_position {
        tracing::info!(
            "{:24} E[pos] {:5.2}  champion {:5.1}%  qualify {:5.1}%  relegate {:5.1}%",
            team.team,
            team.expected_position,
            100. * team.champion_prob,
            100. * team.qualification_prob,
            100. * team.relegation_prob
        );
    }

    write_slice_to_file(&forecast.teams, dir.join("team_forecast.csv"));
    let fixture_rows: Vec<FixtureRow> = forecast
        .fixtures
        .iter()
        .map(|fx| FixtureRow {
            match_index: fx.match_index,
            team_a: &fx.team_a,
            team_b: &fx.team_b,
            win_a_prob: fx.win_a_prob,
            draw_prob: fx.draw_prob,
            win_b_prob: fx.win_b_prob,
            expected_score_a: fx.expected_score_a,
            expected_score_b: fx.expected_score_b,
        })
        .collect();
    write_slice_to_file(&fixture_rows, dir.join("fixture_forecast.csv"));
    write_slice_to_file(&forecast.fixtures, dir.join("fixture_forecast.json"));
}
