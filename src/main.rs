// External crates
use anyhow::{bail, Context, Result};
use std::env;
use tracing_subscriber::EnvFilter;

// Local modules
use order_forecast::config::ForecastConfig;
use order_forecast::pipeline;
use order_forecast::util::model_utils::{ForecastTarget, TargetMetric};
use order_forecast::util::results::ForecastPayload;

const USAGE: &str = "usage: order-forecast <command>

commands:
  view                     print daily order counts and earnings
  train <orders|earnings|all>
                           train and save the model for a metric
  predict <target>         forecast `orders`, `earnings` or `<metric>_<customer id>`
  predict-customers        forecast every customer in CUSTOMER_IDS and write RESULTS_FILE";

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        return Ok(());
    };

    let config = ForecastConfig::from_env().context("Failed to load configuration")?;

    match command.as_str() {
        "view" => {
            let daily = pipeline::view_daily(&config).context("Failed to build daily series")?;
            println!("{daily}");
        }
        "train" => {
            let which = args.get(1).map(String::as_str).unwrap_or("all");
            let metrics = if which == "all" {
                TargetMetric::ALL.to_vec()
            } else {
                vec![which.parse::<TargetMetric>()?]
            };

            for metric in metrics {
                let report = pipeline::train_metric(&config, metric)
                    .with_context(|| format!("Training error for {metric}"))?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        "predict" => {
            let Some(raw_target) = args.get(1) else {
                bail!("predict needs a target\n\n{USAGE}");
            };
            let target = ForecastTarget::parse(raw_target)?;
            let forecast = pipeline::forecast_target(&config, &target)
                .with_context(|| format!("Forecast error for {target}"))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&ForecastPayload::from(&forecast))?
            );
        }
        "predict-customers" => {
            let summaries =
                pipeline::forecast_customers(&config).context("Customer forecast error")?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        other => bail!("unknown command {other:?}\n\n{USAGE}"),
    }

    Ok(())
}
