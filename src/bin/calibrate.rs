use multi_sport::calibrate::calibrate;
use multi_sport::data_processing::write_json;
use multi_sport::rating::{TeamsByName, replay_history};
use multi_sport::season_config::{ForecastConfig, SeasonPipeline};

/// Fits one division's scoring-distribution parameters and writes them out
fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 && args.len() != 3 {
        tracing::error!("Usage: {} config_file [params_out.json]", args[0]);
        return;
    }
    let pipeline = SeasonPipeline::from_config(ForecastConfig::from_file(&args[1]));
    let config = &pipeline.config;

    let mut teams = TeamsByName::new();
    let gaps = replay_history(
        &config.engine,
        &mut teams,
        &pipeline.history,
        config.total_matches,
        |_| config.rating_noob,
    );
    let params = calibrate(
        &pipeline.history,
        &gaps,
        config.sport.family,
        &config.limits,
    );
    tracing::info!(
        "{} / {} calibrated from {} matches: {:?}",
        config.sport.name,
        config.division,
        params.sample_matches,
        params
    );

    if let Some(out) = args.get(2) {
        write_json(&params, out).expect("Failed to write parameters");
        tracing::info!("Parameters written to {}", out);
    }
}
