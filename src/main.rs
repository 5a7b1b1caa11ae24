use std::path::Path;

use anyhow::Result;
use log::info;

use ferroloop::batch::{run_analysis, run_transform};
use ferroloop::config::{Config, DEFAULT_CONFIG_FILE};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load_or_default(Path::new(DEFAULT_CONFIG_FILE))?;

    if config.transform.enabled {
        run_transform(&config.transform)?;
    } else {
        info!("Raw-signal transform disabled");
    }

    if config.analysis.enabled {
        run_analysis(&config.analysis)?;
    } else {
        info!("Loop analysis disabled");
    }

    Ok(())
}
