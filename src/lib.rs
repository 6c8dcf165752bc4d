pub mod config;
pub mod constants;
pub mod error;
pub mod lstm;
pub mod pipeline;
pub mod util {
    pub mod file_utils;
    pub mod model_utils;
    pub mod pre_processor;
    pub mod results;
}

pub use config::ForecastConfig;
pub use error::{ForecastError, Result};
