//! orion-nfc - NAND flash controller sequencer tool
//!
//! Drives the orion-nfc command sequencer against an emulated NAND array.
//!
//! # Architecture
//!
//! Commands talk to a `NandController`, which plans each page, erase, ID,
//! status or reset request into controller chunks and runs them through the
//! register / FIFO / DMA seams. Here those seams are backed by
//! `orion-nfc-sim`; with `--image` the emulated array is loaded from (and,
//! after a modifying command, saved back to) a raw image file.

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use error::Result;
use orion_nfc_core::config::ControllerConfig;
use orion_nfc_core::transfer::TransferMode;
use orion_nfc_sim::SimNand;

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Resolve the controller configuration from the profile and flags
fn load_config(cli: &Cli) -> Result<ControllerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = ControllerConfig::from_toml_file(path)?;
            log::info!("Loaded controller profile from {:?}", path);
            config
        }
        None => ControllerConfig::default(),
    };

    if let Some(page_size) = cli.page_size {
        config.page_size = page_size;
    }
    if let Some(ecc) = cli.ecc {
        config.ecc = ecc;
    }
    if cli.dma {
        config.transfer = TransferMode::Dma;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    if let Commands::Geometry { all } = cli.command {
        return commands::info::cmd_geometry(&config, all);
    }

    let mut sim = SimNand::new(config);
    if let Some(image) = &cli.image {
        if image.exists() {
            sim.load_image(image)?;
        } else {
            log::info!("{:?} does not exist, starting with an erased array", image);
        }
    }
    let device = orion_nfc_sim::shared(sim);
    let mut nand = orion_nfc_sim::attach(&device);

    let result = match &cli.command {
        Commands::Geometry { .. } => Ok(()),
        Commands::Id => commands::info::cmd_id(&mut nand),
        Commands::Status => commands::info::cmd_status(&mut nand),
        Commands::Read { page, output, oob } => {
            commands::page::cmd_read(&mut nand, *page, output, *oob)
        }
        Commands::Write { page, input } => commands::page::cmd_write(&mut nand, *page, input),
        Commands::Erase { block } => commands::page::cmd_erase(&mut nand, *block),
        Commands::Markbad { block } => commands::page::cmd_markbad(&mut nand, *block),
        Commands::Dump {
            output,
            start,
            count,
            oob,
        } => commands::dump::cmd_dump(&mut nand, output, *start, *count, *oob),
    };

    // Keep whatever reached the array, even if the command failed half way
    if cli.command.modifies_array() {
        if let Some(image) = &cli.image {
            device.borrow().save_image(image)?;
            log::info!("Saved array to {:?}", image);
        }
    }

    result
}
