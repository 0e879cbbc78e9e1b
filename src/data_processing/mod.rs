use chrono::NaiveDate;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::Path;

fn is_false(&flag: &bool) -> bool {
    !flag
}

/// Competition phase tag attached to a match by the ingestion collaborator.
/// Playoff and early-season effects are detected by schedule position, not
/// by this tag; only the third-place fixture needs an explicit marker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Regular,
    EarlySeason,
    ThirdPlace,
    Playoff,
}

/// One finished match, as handed to the core by the ingestion layer:
/// canonical team names, non-negative scores (set counts for set-based
/// sports), and a chronological position within the season.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchRecord {
    pub team_a: String,
    pub team_b: String,
    pub score_a: u32,
    pub score_b: u32,
    /// Position in the chronological season order, starting at 1.
    pub match_index: usize,
    #[serde(default)]
    pub phase: Phase,
    /// Walkovers and no-shows: still rated live, excluded from calibration.
    #[serde(default, skip_serializing_if = "is_false")]
    pub absence: bool,
    pub season_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl MatchRecord {
    pub fn is_draw(&self) -> bool {
        self.score_a == self.score_b
    }

    /// Winner score minus loser score; zero for draws.
    pub fn margin(&self) -> u32 {
        self.score_a.abs_diff(self.score_b)
    }
}

/// An unplayed fixture from the remaining schedule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fixture {
    pub team_a: String,
    pub team_b: String,
    pub match_index: usize,
    #[serde(default)]
    pub phase: Phase,
}

pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, &'static str> {
    let raw = std::fs::read_to_string(path.as_ref()).map_err(|_| "File reading error")?;
    serde_json::from_str(&raw).map_err(|_| "Deserialization error")
}

pub fn write_json<T: Serialize + ?Sized>(
    value: &T,
    path: impl AsRef<Path>,
) -> Result<(), &'static str> {
    let json = serde_json::to_string_pretty(&value).map_err(|_| "Serialization error")?;
    std::fs::write(path.as_ref(), json).map_err(|_| "File writing error")
}

fn write_csv<T: Serialize>(values: &[T], path: impl AsRef<Path>) -> Result<(), &'static str> {
    let file = std::fs::File::create(path.as_ref()).map_err(|_| "Output file not found")?;
    let mut writer = csv::Writer::from_writer(file);
    values
        .iter()
        .try_for_each(|val| writer.serialize(val))
        .map_err(|_| "Failed to serialize row")
}

/// Writes a slice of rows to either JSON or CSV, keyed by file extension.
pub fn write_slice_to_file<T: Serialize>(values: &[T], path: impl AsRef<Path>) {
    let path = path.as_ref();
    let write_res = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => write_json(values, path),
        Some("csv") => write_csv(values, path),
        _ => Err("Invalid or missing filename extension"),
    };
    match write_res {
        Ok(()) => tracing::info!("Successfully wrote to {:?}", path),
        Err(msg) => tracing::error!("WARNING: failed write to {:?} because {}", path, msg),
    };
}

/// Loads one division's season history, restored to chronological order.
pub fn load_records(path: impl AsRef<Path>) -> Vec<MatchRecord> {
    let path = path.as_ref();
    let mut records: Vec<MatchRecord> =
        read_json(path).unwrap_or_else(|msg| panic!("Bad match file {:?}: {}", path, msg));
    records.sort_by_key(|rec| rec.match_index);
    tracing::info!("Loaded {} matches from {:?}", records.len(), path);
    records
}

/// Loads the remaining schedule, restored to chronological order.
pub fn load_schedule(path: impl AsRef<Path>) -> Vec<Fixture> {
    let path = path.as_ref();
    let mut fixtures: Vec<Fixture> =
        read_json(path).unwrap_or_else(|msg| panic!("Bad schedule file {:?}: {}", path, msg));
    fixtures.sort_by_key(|fx| fx.match_index);
    tracing::info!("Loaded {} fixtures from {:?}", fixtures.len(), path);
    fixtures
}
