//! Builds a residual block from a JSON file and runs it on random input.

use clap::Parser;
use log::info;
use rand::{rngs::StdRng, SeedableRng};
use resgraph::config::ResidualConfig;
use resgraph::tensor::Tensor;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs a residual block described in JSON", long_about = None)]
struct Args {
    /// Path to the block description
    #[arg(short, long)]
    config: PathBuf,

    /// Input shape, comma separated (e.g. 2,12)
    #[arg(short, long, value_delimiter = ',', required = true)]
    input_shape: Vec<usize>,

    /// Seed for parameters and input
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Print the slot graph in Graphviz DOT format
    #[arg(long)]
    dot: bool,

    /// Print the block layout
    #[arg(long)]
    describe: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ResidualConfig::from_path(&args.config)?;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let block = config.build(&mut rng)?;
    info!(
        "Loaded {} with {} module(s) and {} shortcut(s)",
        args.config.display(),
        block.num_modules(),
        block.shortcuts().len()
    );

    if args.describe {
        println!("{}", block);
    }
    if args.dot {
        println!("{}", block.to_dot());
    }

    let input = Tensor::random_uniform(&args.input_shape, -1.0, 1.0, &mut rng);
    let start = Instant::now();
    let output = block.forward(&input)?;
    info!("Forward pass took {:?}", start.elapsed());

    println!("input shape:  {:?}", input.shape());
    println!("output shape: {:?}", output.shape());
    println!("output mean:  {:.6}", output.mean());
    Ok(())
}
