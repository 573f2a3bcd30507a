//! Geometry, ID and status commands

use orion_nfc_core::config::ControllerConfig;
use orion_nfc_core::controller::NfcRegisters;
use orion_nfc_core::geometry::{self, PageGeometry};
use orion_nfc_core::nand::opcodes::{NAND_STATUS_FAIL, NAND_STATUS_READY, NAND_STATUS_WP};
use orion_nfc_core::nand::NandController;
use orion_nfc_core::plan::READ_ID_LEN;
use orion_nfc_core::transfer::TransferBackend;

use crate::error::Result;

/// Print the geometry of the configured device, or the whole table
pub fn cmd_geometry(config: &ControllerConfig, all: bool) -> Result<()> {
    if all {
        println!(
            "{:>6} {:>8} {:>5} {:>12} {:>12} {:>6} {:>7}",
            "Page", "ECC", "OOB", "Chunk", "Trailing", "Chunks", "Marker"
        );
        println!("{}", "-".repeat(64));
        for g in geometry::supported() {
            print_row(g);
        }
        return Ok(());
    }

    let g = config.geometry()?;
    println!("Device:");
    println!(
        "  Array:       {} blocks x {} pages ({} MiB)",
        config.block_count,
        config.pages_per_block,
        config.total_size() / (1024 * 1024)
    );
    println!("  Page:        {} + {} bytes", g.page_size, g.oob_size);
    println!("  ECC:         {} ({} bytes/chunk)", g.ecc, g.ecc_bytes);
    println!(
        "  Chunks:      {} x ({} + {})",
        g.chunk_count, g.chunk_size, g.chunk_spare
    );
    if g.has_trailing_chunk() {
        println!(
            "  Trailing:    {} + {}",
            g.last_chunk_size, g.last_chunk_spare
        );
    }
    println!("  BB marker:   staging offset {}", g.bad_block_byte_offset);
    for region in g.oob_free.regions() {
        println!(
            "  OOB free:    {} bytes at {}",
            region.length, region.offset
        );
    }
    println!("  Transfer:    {}", config.transfer);
    Ok(())
}

fn print_row(g: &PageGeometry) {
    let trailing = if g.has_trailing_chunk() {
        format!("{}+{}", g.last_chunk_size, g.last_chunk_spare)
    } else {
        "-".to_string()
    };
    println!(
        "{:>6} {:>8} {:>5} {:>12} {:>12} {:>6} {:>7}",
        g.page_size,
        g.ecc.name(),
        g.oob_size,
        format!("{}+{}", g.chunk_size, g.chunk_spare),
        trailing,
        g.data_chunks(),
        g.bad_block_byte_offset
    );
}

/// Print the device ID
pub fn cmd_id<R: NfcRegisters, T: TransferBackend>(nand: &mut NandController<R, T>) -> Result<()> {
    let mut id = [0u8; READ_ID_LEN as usize];
    nand.read_id(&mut id)?;
    let hex: Vec<String> = id.iter().map(|b| format!("{:02X}", b)).collect();
    println!("ID: {}", hex.join(" "));
    println!("  Manufacturer: 0x{:02X}", id[0]);
    println!("  Device:       0x{:02X}", id[1]);
    Ok(())
}

/// Print the device status byte
pub fn cmd_status<R: NfcRegisters, T: TransferBackend>(
    nand: &mut NandController<R, T>,
) -> Result<()> {
    let status = nand.read_status()?;
    println!("Status: 0x{:02X}", status);
    println!(
        "  Ready:           {}",
        status & NAND_STATUS_READY != 0
    );
    println!(
        "  Write protected: {}",
        status & NAND_STATUS_WP == 0
    );
    println!(
        "  Last op failed:  {}",
        status & NAND_STATUS_FAIL != 0
    );
    Ok(())
}
