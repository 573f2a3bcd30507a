//! CLI argument parsing

use clap::{Parser, Subcommand};
use orion_nfc_core::config::{parse_number, parse_size};
use orion_nfc_core::geometry::EccMode;
use std::path::PathBuf;

/// Parse an ECC mode name
fn parse_ecc(s: &str) -> Result<EccMode, String> {
    EccMode::from_name(s).ok_or_else(|| {
        let names: Vec<&str> = EccMode::ALL.iter().map(|m| m.name()).collect();
        format!("unknown ECC mode '{}' [available: {}]", s, names.join(", "))
    })
}

#[derive(Parser)]
#[command(name = "orion-nfc")]
#[command(author, version, about = "NAND flash controller sequencer (emulated)", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Controller profile (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Page size, overrides the profile (e.g. 2048, "4KiB", 0x2000)
    #[arg(long, global = true, value_parser = parse_size)]
    pub page_size: Option<u32>,

    /// ECC mode, overrides the profile (none, hamming, bch4, bch8, bch12, bch16)
    #[arg(long, global = true, value_parser = parse_ecc)]
    pub ecc: Option<EccMode>,

    /// Move data by DMA instead of PIO
    #[arg(long, global = true)]
    pub dma: bool,

    /// Backing file for the emulated array (raw pages, data followed by spare)
    #[arg(long, global = true)]
    pub image: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the chunk geometry of the configured device
    Geometry {
        /// List every supported page size / ECC pair instead
        #[arg(long)]
        all: bool,
    },

    /// Read the device ID
    Id,

    /// Read the device status byte
    Status,

    /// Read one page to a file
    Read {
        /// Page number
        #[arg(short, long, value_parser = parse_number)]
        page: u32,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Append the spare area to the page data
        #[arg(long)]
        oob: bool,
    },

    /// Program one page from a file
    Write {
        /// Page number
        #[arg(short, long, value_parser = parse_number)]
        page: u32,

        /// Input file path (page data; anything past the page goes to the spare area)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Erase one block
    Erase {
        /// Block number
        #[arg(short, long, value_parser = parse_number)]
        block: u32,
    },

    /// Mark one block bad
    Markbad {
        /// Block number
        #[arg(short, long, value_parser = parse_number)]
        block: u32,
    },

    /// Read a range of pages to a file
    Dump {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// First page
        #[arg(long, value_parser = parse_number, default_value = "0")]
        start: u32,

        /// Number of pages (default: to the end of the device)
        #[arg(long, value_parser = parse_number)]
        count: Option<u32>,

        /// Include the spare area of every page
        #[arg(long)]
        oob: bool,
    },
}

impl Commands {
    /// Whether the command changes the array
    pub fn modifies_array(&self) -> bool {
        matches!(
            self,
            Commands::Write { .. } | Commands::Erase { .. } | Commands::Markbad { .. }
        )
    }
}
