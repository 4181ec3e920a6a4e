use anyhow::{bail, Context, Result};
use sharp_edge::config::Config;
use sharp_edge::engine::parlay::{optimize_per_sport, ParlayConstraints};
use sharp_edge::feed::replay::ReplayFeed;
use sharp_edge::pipeline::{parlay_pool, ranked_recommendations, EnginePipeline};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

struct Args {
    replay: PathBuf,
    config: PathBuf,
    seed: Option<u64>,
}

fn parse_args() -> Result<Args> {
    let mut replay = None;
    let mut config = PathBuf::from("config.toml");
    let mut seed = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = args.next().context("--config needs a path")?.into();
            }
            "--seed" => {
                let value = args.next().context("--seed needs a value")?;
                seed = Some(value.parse().with_context(|| format!("invalid seed '{value}'"))?);
            }
            _ if replay.is_none() => replay = Some(PathBuf::from(arg)),
            other => bail!("unexpected argument '{other}'"),
        }
    }

    let replay = replay.context("usage: sharp-edge <replay.jsonl> [--config path] [--seed n]")?;
    Ok(Args {
        replay,
        config,
        seed,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sharp_edge=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        tracing::info!(path = %args.config.display(), "config file not found, using defaults");
        Config::default()
    };

    let mut feed = ReplayFeed::open(&args.replay).await?;
    let mut pipeline = EnginePipeline::new(config);
    let reports = pipeline.run(&mut feed).await?;

    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
    }

    let recommendations = ranked_recommendations(&reports);
    let pool = parlay_pool(reports.iter().flat_map(|r| &r.analyses));
    let seed = args.seed.unwrap_or_else(rand::random);
    let parlay_config = pipeline.config().parlay.clone();
    let parlays =
        optimize_per_sport(pool, ParlayConstraints::default(), parlay_config, seed).await?;

    println!(
        "{}",
        serde_json::json!({
            "recommendations": recommendations,
            "parlays": parlays,
            "seed": seed,
        })
    );
    tracing::info!(
        batches = reports.len(),
        recommendations = recommendations.len(),
        sports = parlays.len(),
        "replay finished"
    );
    Ok(())
}
