//! relic-traits: inspect a trait config from the command line.
//!
//! Usage:
//!   relic-traits pool                         # pool summary as JSON
//!   relic-traits balance --draws 200000       # Monte-Carlo distribution report
//!   relic-traits roll --count 5 --reward      # sample assignments
//!   relic-traits watch                        # reload on every config change

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use relic_traits::balance::{self, SimConfig};
use relic_traits::config;
use relic_traits::engine::TraitEngine;
use relic_traits::hotreload::TraitReloader;
use relic_traits::logging::{init_tracing, LogLevel, TracingConfig};
use relic_traits::selector;

#[derive(Parser)]
#[command(name = "relic-traits", about = "Trait pool and balance tooling")]
struct Cli {
    /// Config file; created with defaults when missing
    #[arg(short, long, default_value = "config/relic_traits.json")]
    config: PathBuf,

    /// Extra trait packs (.ron or .json) registered after the config's traits
    #[arg(short, long = "pack")]
    packs: Vec<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the combination pool summary
    Pool,
    /// Simulate draws and report the resulting distribution
    Balance {
        #[arg(long, default_value_t = 100_000)]
        draws: u64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Draw sample assignments
    Roll {
        #[arg(long, default_value_t = 10)]
        count: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Use reward-context odds
        #[arg(long)]
        reward: bool,
    },
    /// Watch the config file and reload on change
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 500)]
        interval: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&TracingConfig::with_level(LogLevel::from_verbosity(cli.verbose)));

    let trait_config = config::load_or_create(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let mut engine = TraitEngine::new(trait_config)?;
    for pack in &cli.packs {
        let report = config::load_trait_pack(pack)
            .with_context(|| format!("failed to load trait pack {}", pack.display()))?;
        for (index, err) in &report.skipped {
            tracing::warn!(pack = %pack.display(), index, "skipped trait: {}", err);
        }
        engine.register_pack(report);
    }

    match cli.command {
        Command::Pool => {
            println!("{}", serde_json::to_string_pretty(&engine.pool().summary())?);
        }
        Command::Balance { draws, seed } => {
            let sim = SimConfig {
                draws,
                base_seed: seed,
                ..SimConfig::default()
            };
            let report = balance::simulate(&engine.pool(), &sim)?;
            println!("{}", report.to_json());
        }
        Command::Roll {
            count,
            seed,
            reward,
        } => {
            let pool = engine.pool();
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            for _ in 0..count {
                let assignment = selector::draw(&pool, &mut rng, reward)?;
                println!("{}", serde_json::to_string(assignment)?);
            }
        }
        Command::Watch { interval } => {
            let mut reloader = TraitReloader::watch(&cli.config)?;
            println!("{}", reloader.status().to_json());
            loop {
                if reloader.poll(&mut engine).is_some() {
                    println!("{}", reloader.status().to_json());
                }
                std::thread::sleep(Duration::from_millis(interval));
            }
        }
    }

    Ok(())
}
