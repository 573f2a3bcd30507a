//! Page geometry resolution
//!
//! Maps a (page size, ECC mode) pair to the immutable chunk decomposition
//! the controller uses for it. Lookups are pure; the table is built at
//! compile time.

mod table;
mod types;

pub use table::{MAX_STAGING_LEN, PAGE_SIZES};
pub use types::*;

use crate::error::{Error, Result};
use table::{page_index, GEOMETRY_TABLE};

/// Look up the geometry for a page size and ECC mode
///
/// Returns `Error::GeometryUnsupported` for pairs the controller cannot
/// run, including page sizes that are not in the table at all.
pub fn resolve(page_size: u32, ecc: EccMode) -> Result<&'static PageGeometry> {
    page_index(page_size)
        .and_then(|row| GEOMETRY_TABLE[row][ecc.index()].as_ref())
        .ok_or(Error::GeometryUnsupported { page_size, ecc })
}

/// Iterate over every defined geometry, in table order
pub fn supported() -> impl Iterator<Item = &'static PageGeometry> {
    GEOMETRY_TABLE.iter().flatten().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_sums_match_page() {
        let mut count = 0;
        for g in supported() {
            assert_eq!(
                g.chunk_size * g.chunk_count + g.last_chunk_size,
                g.page_size,
                "data sum for {} / {}",
                g.page_size,
                g.ecc
            );
            assert_eq!(
                g.chunk_spare * g.chunk_count + g.last_chunk_spare,
                g.oob_size,
                "spare sum for {} / {}",
                g.page_size,
                g.ecc
            );
            count += 1;
        }
        assert_eq!(count, 18);
    }

    #[test]
    fn test_2k_bch4() {
        let g = resolve(2048, EccMode::Bch4).unwrap();
        assert_eq!(g.chunk_size, 2048);
        assert_eq!(g.chunk_spare, 32);
        assert_eq!(g.chunk_count, 1);
        assert_eq!((g.last_chunk_size, g.last_chunk_spare), (0, 0));
        assert!(!g.has_trailing_chunk());
        assert_eq!(g.oob_size, 32);
        assert_eq!(g.bad_block_byte_offset, 2048);
    }

    #[test]
    fn test_8k_bch12() {
        let g = resolve(8192, EccMode::Bch12).unwrap();
        assert_eq!(g.chunk_size, 704);
        assert_eq!(g.chunk_count, 11);
        assert_eq!((g.last_chunk_size, g.last_chunk_spare), (448, 64));
        assert!(g.has_trailing_chunk());
        assert_eq!(g.data_chunks(), 12);

        // Factory marker lands inside the trailing chunk's data
        assert_eq!(g.bad_block_byte_offset, 11 * 704 + (8192 - 11 * 724));
    }

    #[test]
    fn test_unsupported_pairs() {
        assert_eq!(
            resolve(4096, EccMode::Hamming),
            Err(Error::GeometryUnsupported {
                page_size: 4096,
                ecc: EccMode::Hamming
            })
        );
        assert!(resolve(8192, EccMode::Hamming).is_err());
        assert!(resolve(512, EccMode::Bch4).is_err());
        assert!(resolve(1024, EccMode::None).is_err());
        assert!(resolve(512, EccMode::Hamming).is_ok());
    }

    #[test]
    fn test_small_page_marker() {
        let g = resolve(512, EccMode::Hamming).unwrap();
        assert_eq!(g.bb_scan.offset, 5);
        assert_eq!(g.bb_scan.pattern(), &[0xFF]);
        assert_eq!(g.bad_block_byte_offset, 512 + 5);
        let free = g.oob_free.regions();
        assert_eq!(free, &[OobRegion::new(0, 5), OobRegion::new(6, 2)]);
    }

    #[test]
    fn test_large_page_oob_free() {
        let g = resolve(4096, EccMode::Bch8).unwrap();
        assert_eq!(g.bb_scan.pattern(), &[0xFF, 0xFF]);
        assert_eq!(g.oob_free.regions(), &[OobRegion::new(2, 62)]);
        assert_eq!(g.bb_scan.scan_page(64), 63);
        assert!(!g.bb_scan.is_bad(&[0xFF, 0xFF, 0x00]));
        assert!(g.bb_scan.is_bad(&[0xFF, 0x00]));
        assert!(g.bb_scan.is_bad(&[0xFF]));
        assert_eq!(g.oob_free.total(), 62);
    }

    #[test]
    fn test_spare_only_trailing_chunk() {
        let g = resolve(4096, EccMode::Bch8).unwrap();
        assert!(g.has_trailing_chunk());
        let last = g.chunk_layout(g.chunk_count);
        assert_eq!(last.data_len, 0);
        assert_eq!(last.spare_len, 64);
        assert_eq!(last.spare_offset, 4096);
    }

    #[test]
    fn test_ecc_layout() {
        let layout = resolve(8192, EccMode::Bch16).unwrap().ecc_layout();
        assert_eq!(layout.strength, 16);
        assert_eq!(layout.step_size, 512);
        assert_eq!(layout.total_bytes, 26 * 17);
    }

    #[test]
    fn test_staging_len_covers_table() {
        for g in supported() {
            assert!(g.staging_len() as usize <= MAX_STAGING_LEN);
        }
        assert_eq!(MAX_STAGING_LEN, 8192 + 256);
    }

    #[test]
    fn test_mode_names() {
        for mode in EccMode::ALL {
            assert_eq!(EccMode::from_name(mode.name()), Some(mode));
        }
        assert_eq!(EccMode::from_name("BCH12"), Some(EccMode::Bch12));
        assert_eq!(EccMode::from_name("raw"), Some(EccMode::None));
        assert_eq!(EccMode::from_name("reed-solomon"), None);
    }
}
