//! Constant geometry table
//!
//! Rows are page sizes, columns are ECC modes in [`EccMode::ALL`] order.
//! `None` marks combinations the controller cannot run (Hamming only
//! exists for 512 B and 2 KiB pages, BCH needs at least 2 KiB pages).

use super::types::EccMode::{Bch12, Bch16, Bch4, Bch8, Hamming};
use super::types::{EccMode, PageGeometry};
use crate::plan::MAX_PLAN_CHUNKS;

/// Supported page sizes, in table row order
pub const PAGE_SIZES: [u32; 4] = [512, 2048, 4096, 8192];

/// Largest staging buffer any table entry needs (data + spare pool)
pub const MAX_STAGING_LEN: usize = max_staging_len();

const fn geo(
    page_size: u32,
    ecc: EccMode,
    chunk: (u32, u32, u32),
    last: (u32, u32),
    ecc_bytes: u32,
) -> Option<PageGeometry> {
    Some(PageGeometry::new(
        page_size, ecc, chunk.0, chunk.1, chunk.2, last.0, last.1, ecc_bytes,
    ))
}

/// (chunk_size, chunk_spare, chunk_count), (last_size, last_spare), ecc bytes
const GEOMETRY_ROWS: [[Option<PageGeometry>; 6]; 4] = [
    // 512 B
    [
        geo(512, EccMode::None, (512, 16, 1), (0, 0), 0),
        geo(512, Hamming, (512, 8, 1), (0, 0), 8),
        None,
        None,
        None,
        None,
    ],
    // 2 KiB
    [
        geo(2048, EccMode::None, (2048, 64, 1), (0, 0), 0),
        geo(2048, Hamming, (2048, 40, 1), (0, 0), 24),
        geo(2048, Bch4, (2048, 32, 1), (0, 0), 30),
        geo(2048, Bch8, (1024, 0, 2), (0, 32), 30),
        geo(2048, Bch12, (704, 0, 2), (640, 32), 20),
        geo(2048, Bch16, (512, 0, 4), (0, 32), 26),
    ],
    // 4 KiB
    [
        geo(4096, EccMode::None, (2048, 64, 2), (0, 0), 0),
        None,
        geo(4096, Bch4, (2048, 32, 2), (0, 0), 30),
        geo(4096, Bch8, (1024, 0, 4), (0, 64), 30),
        geo(4096, Bch12, (704, 0, 5), (576, 64), 20),
        geo(4096, Bch16, (512, 0, 8), (0, 64), 26),
    ],
    // 8 KiB
    [
        geo(8192, EccMode::None, (2048, 64, 4), (0, 0), 0),
        None,
        geo(8192, Bch4, (2048, 32, 4), (0, 0), 30),
        geo(8192, Bch8, (1024, 0, 8), (0, 64), 30),
        geo(8192, Bch12, (704, 0, 11), (448, 64), 20),
        geo(8192, Bch16, (512, 0, 16), (0, 64), 26),
    ],
];

/// Static copy so lookups can return `&'static` references
pub(crate) static GEOMETRY_TABLE: [[Option<PageGeometry>; 6]; 4] = GEOMETRY_ROWS;

/// Row index for a page size
pub(crate) const fn page_index(page_size: u32) -> Option<usize> {
    match page_size {
        512 => Some(0),
        2048 => Some(1),
        4096 => Some(2),
        8192 => Some(3),
        _ => None,
    }
}

const fn max_staging_len() -> usize {
    let mut max = 0;
    let mut row = 0;
    while row < GEOMETRY_ROWS.len() {
        let mut col = 0;
        while col < GEOMETRY_ROWS[row].len() {
            if let Some(g) = &GEOMETRY_ROWS[row][col] {
                if g.staging_len() as usize > max {
                    max = g.staging_len() as usize;
                }
            }
            col += 1;
        }
        row += 1;
    }
    max
}

/// Longest plan any table entry can produce: a write of the geometry with
/// the most data chunks, plus its two dispatch chunks.
pub(crate) const fn max_plan_len() -> usize {
    let mut max = 1;
    let mut row = 0;
    while row < GEOMETRY_ROWS.len() {
        let mut col = 0;
        while col < GEOMETRY_ROWS[row].len() {
            if let Some(g) = &GEOMETRY_ROWS[row][col] {
                let len = g.data_chunks() as usize + 2;
                if len > max {
                    max = len;
                }
            }
            col += 1;
        }
        row += 1;
    }
    max
}

const _: () = assert!(max_plan_len() <= MAX_PLAN_CHUNKS);
