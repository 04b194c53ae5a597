use std::path::PathBuf;

use alexnet_finetune::{config::Config, workflow};
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(about = "Fine-tune AlexNet on CIFAR-10 or evaluate a saved model")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Fine-tune the pretrained baseline, save it, then evaluate on the test split
    Train { epochs: usize },
    /// Evaluate a saved model on a folder of prefix-labelled images
    Test { model_path: PathBuf, data_dir: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::new("info"))
        .init();

    let cli = Cli::parse();
    let cfg = Config::default();
    match cli.mode {
        Mode::Train { epochs } => workflow::run_train(&cfg, epochs)?,
        Mode::Test {
            model_path,
            data_dir,
        } => workflow::run_test(&cfg, &model_path, &data_dir)?,
    };
    Ok(())
}
