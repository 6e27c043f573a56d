use std::path::PathBuf;

use anyhow::bail;
use tandem::config::{DEFAULT_CONFIG_PATH, load_config};
use tandem::scenario::{Scenario, replay};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let Some(scenario_path) = std::env::args().nth(1).map(PathBuf::from) else {
        bail!("usage: tandem <scenario.toml>");
    };

    let config = load_config(DEFAULT_CONFIG_PATH)?;
    let scenario = Scenario::load(&scenario_path)?;
    info!(
        scenario = %scenario_path.display(),
        steps = scenario.steps.len(),
        paths = scenario.paths.len(),
        "Replaying scenario"
    );

    match replay(&config, &scenario).await {
        Ok(report) => {
            let failed = report.plans.iter().filter(|plan| plan.is_err()).count();
            info!(plans = report.plans.len(), failed, "Scenario finished");
            Ok(())
        }
        Err(e) => {
            error!("Scenario replay failed: {:?}", e);
            Err(e)
        }
    }
}
