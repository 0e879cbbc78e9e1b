use multi_sport::data_processing::write_json;
use multi_sport::season_config::{ForecastConfig, SeasonPipeline};
use multi_sport::summary::{print_forecast, print_ratings};

/// Runs the full pipeline: rating replay, calibration, Monte Carlo forecast
fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 && args.len() != 3 {
        tracing::error!("Usage: {} config_file [out_dir]", args[0]);
        return;
    }
    let pipeline = SeasonPipeline::from_config(ForecastConfig::from_file(&args[1]));
    let out_dir = args.get(2).cloned().unwrap_or_else(|| "output".to_string());

    let results = pipeline.eval();
    tracing::info!(
        "{} simulated seasons in {:.2} seconds",
        results.forecast.runs,
        results.secs_elapsed
    );

    std::fs::create_dir_all(&out_dir).expect("Could not create directory");
    print_ratings(&results.teams, &out_dir);
    print_forecast(&results.forecast, &out_dir);
    write_json(
        &results.params,
        std::path::Path::new(&out_dir).join("calibrated_params.json"),
    )
    .expect("Failed to write parameters");
}
