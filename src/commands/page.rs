//! Single page and block commands

use std::fs;
use std::path::Path;

use orion_nfc_core::controller::NfcRegisters;
use orion_nfc_core::nand::NandController;
use orion_nfc_core::transfer::TransferBackend;
use orion_nfc_core::Error;

use crate::error::{CliError, Result};

fn check_page<R: NfcRegisters, T: TransferBackend>(
    nand: &NandController<R, T>,
    page: u32,
) -> Result<()> {
    let limit = nand.config().total_pages();
    if page >= limit {
        return Err(CliError::OutOfRange {
            what: "page",
            value: page,
            limit,
        });
    }
    Ok(())
}

fn check_block<R: NfcRegisters, T: TransferBackend>(
    nand: &NandController<R, T>,
    block: u32,
) -> Result<()> {
    let limit = nand.config().block_count;
    if block >= limit {
        return Err(CliError::OutOfRange {
            what: "block",
            value: block,
            limit,
        });
    }
    Ok(())
}

/// Read one page (and optionally its spare area) to a file
pub fn cmd_read<R: NfcRegisters, T: TransferBackend>(
    nand: &mut NandController<R, T>,
    page: u32,
    output: &Path,
    with_oob: bool,
) -> Result<()> {
    check_page(nand, page)?;
    let geometry = nand.geometry()?;
    let page_size = geometry.page_size as usize;
    let mut data = vec![0u8; page_size + geometry.oob_size as usize];

    let (main, spare) = data.split_at_mut(page_size);
    let result = nand.read_page(page, main, if with_oob { Some(spare) } else { None });
    match result {
        Ok(()) => {}
        Err(Error::UncorrectableEcc) => {
            log::warn!("page {} has uncorrectable ECC errors, writing raw data", page)
        }
        Err(e) => return Err(e.into()),
    }

    if !with_oob {
        data.truncate(page_size);
    }
    fs::write(output, &data)?;
    println!("Wrote {} bytes of page {} to {:?}", data.len(), page, output);
    result.map_err(CliError::from)
}

/// Program one page from a file
///
/// Bytes past the page size go to the spare area.
pub fn cmd_write<R: NfcRegisters, T: TransferBackend>(
    nand: &mut NandController<R, T>,
    page: u32,
    input: &Path,
) -> Result<()> {
    check_page(nand, page)?;
    let geometry = nand.geometry()?;
    let content = fs::read(input)?;
    let page_size = geometry.page_size as usize;

    let (data, oob) = if content.len() > page_size {
        let (data, oob) = content.split_at(page_size);
        (data, Some(oob))
    } else {
        (content.as_slice(), None)
    };
    nand.write_page(page, data, oob)?;

    println!(
        "Programmed page {} ({} data, {} spare bytes)",
        page,
        data.len(),
        oob.map_or(0, <[u8]>::len)
    );
    Ok(())
}

/// Erase one block
pub fn cmd_erase<R: NfcRegisters, T: TransferBackend>(
    nand: &mut NandController<R, T>,
    block: u32,
) -> Result<()> {
    check_block(nand, block)?;
    nand.erase_block(block)?;
    println!("Erased block {}", block);
    Ok(())
}

/// Mark one block bad
pub fn cmd_markbad<R: NfcRegisters, T: TransferBackend>(
    nand: &mut NandController<R, T>,
    block: u32,
) -> Result<()> {
    check_block(nand, block)?;
    let offset = block as u64 * nand.config().block_size();
    nand.block_markbad(offset)?;
    println!("Marked block {} bad", block);
    Ok(())
}
