//! Raw array images
//!
//! An image is every page of the array back to back, each page stored as
//! its data followed by its spare bytes. A short image covers the first
//! pages only; the rest of the array is erased.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::vec;

use orion_nfc_core::geometry::ERASED_BYTE;

use crate::array::SimNand;
use crate::SimError;

impl SimNand {
    /// Replace the array content with an image
    pub fn load_image_bytes(&mut self, image: &[u8]) -> Result<(), SimError> {
        let page_len = self.page_len();
        let capacity = self.config().total_pages() as u64 * page_len as u64;
        if image.len() % page_len != 0 || image.len() as u64 > capacity {
            return Err(SimError::ImageSize {
                len: image.len() as u64,
                page_len,
                capacity,
            });
        }

        self.erase_all();
        for (page, content) in image.chunks(page_len).enumerate() {
            self.store_page(page as u32, content.to_vec());
        }
        log::info!(
            "loaded {} page(s), {} programmed",
            image.len() / page_len,
            self.programmed_pages()
        );
        Ok(())
    }

    /// Load an image file into the array
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let mut image = std::vec::Vec::new();
        File::open(path)?.read_to_end(&mut image)?;
        self.load_image_bytes(&image)
    }

    /// Write the whole array to an image file
    pub fn save_image(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let mut out = BufWriter::new(File::create(path)?);
        let erased = vec![ERASED_BYTE; self.page_len()];
        for page in 0..self.config().total_pages() {
            match self.stored_page(page) {
                Some(content) => out.write_all(content)?,
                None => out.write_all(&erased)?,
            }
        }
        out.flush()?;
        Ok(())
    }
}
