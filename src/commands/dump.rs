//! Dump command implementation

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use orion_nfc_core::controller::NfcRegisters;
use orion_nfc_core::nand::NandController;
use orion_nfc_core::transfer::TransferBackend;
use orion_nfc_core::Error;

use crate::error::{CliError, Result};

/// Read a range of pages to a file
///
/// Pages with uncorrectable ECC errors are written raw and counted; any
/// other error stops the dump.
pub fn cmd_dump<R: NfcRegisters, T: TransferBackend>(
    nand: &mut NandController<R, T>,
    output: &Path,
    start: u32,
    count: Option<u32>,
    with_oob: bool,
) -> Result<()> {
    let total = nand.config().total_pages();
    if start >= total {
        return Err(CliError::OutOfRange {
            what: "page",
            value: start,
            limit: total,
        });
    }
    let count = count.unwrap_or(total - start).min(total - start);

    let geometry = nand.geometry()?;
    let page_size = geometry.page_size as usize;
    let mut page_buf = vec![0u8; page_size + geometry.oob_size as usize];
    let mut out = BufWriter::new(File::create(output)?);

    let pb = ProgressBar::new(count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages ({per_sec}, {eta})")?
            .progress_chars("#>-"),
    );

    let mut bad_pages = 0u32;
    for page in start..start + count {
        let (main, spare) = page_buf.split_at_mut(page_size);
        match nand.read_page(page, main, if with_oob { Some(spare) } else { None }) {
            Ok(()) => {}
            Err(Error::UncorrectableEcc) => {
                bad_pages += 1;
                pb.println(format!("page {}: uncorrectable ECC error", page));
            }
            Err(e) => {
                pb.abandon();
                return Err(e.into());
            }
        }

        let len = if with_oob { page_buf.len() } else { page_size };
        out.write_all(&page_buf[..len])?;
        pb.inc(1);
    }
    out.flush()?;
    pb.finish_with_message("Dump complete");

    let stats = nand.ecc_stats();
    println!("Dumped {} page(s) starting at {} to {:?}", count, start, output);
    println!(
        "ECC: {} corrected bit(s), {} uncorrectable page(s), {} blank page(s)",
        stats.corrected, bad_pages, stats.blank_pages
    );
    Ok(())
}
