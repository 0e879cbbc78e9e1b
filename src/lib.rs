pub mod calibrate;
pub mod data_processing;
pub mod forecast;
pub mod models;
pub mod numerical;
pub mod rating;
pub mod season_config;
pub mod summary;
