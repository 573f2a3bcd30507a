//! Processor-driven transfers

use maybe_async::maybe_async;

use super::{segment_range, BusTransferError, TransferBackend};
use crate::controller::DataWindow;
use crate::plan::{Direction, ScatterSegment};

/// Copies chunk data word by word through the controller's data window
///
/// Words are little-endian. A segment whose length is not a multiple of
/// four moves its tail in one final word; on writes the unused bytes of
/// that word are padded with `0xFF`.
pub struct ProcessorDriven<W> {
    window: W,
}

impl<W: DataWindow> ProcessorDriven<W> {
    /// Create a PIO backend over a data window
    pub fn new(window: W) -> Self {
        Self { window }
    }

    /// Get a reference to the data window
    pub fn window(&self) -> &W {
        &self.window
    }

    fn read_into(&mut self, dst: &mut [u8]) {
        for word in dst.chunks_mut(4) {
            let bytes = self.window.read_word().to_le_bytes();
            word.copy_from_slice(&bytes[..word.len()]);
        }
    }

    fn write_from(&mut self, src: &[u8]) {
        for word in src.chunks(4) {
            let mut bytes = [0xFF; 4];
            bytes[..word.len()].copy_from_slice(word);
            self.window.write_word(u32::from_le_bytes(bytes));
        }
    }
}

#[maybe_async(AFIT)]
impl<W: DataWindow> TransferBackend for ProcessorDriven<W> {
    async fn submit(
        &mut self,
        segments: &[ScatterSegment],
        direction: Direction,
        buf: &mut [u8],
    ) -> Result<(), BusTransferError> {
        for segment in segments {
            let range = segment_range(segment, buf.len())?;
            match direction {
                Direction::FromDevice => self.read_into(&mut buf[range]),
                Direction::ToDevice => self.write_from(&buf[range]),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    /// FIFO that hands out a counting byte sequence and records writes
    struct CountingWindow {
        next: u8,
        written: Vec<u32>,
    }

    impl DataWindow for CountingWindow {
        fn read_word(&mut self) -> u32 {
            let mut bytes = [0u8; 4];
            for b in &mut bytes {
                *b = self.next;
                self.next = self.next.wrapping_add(1);
            }
            u32::from_le_bytes(bytes)
        }

        fn write_word(&mut self, word: u32) {
            self.written.push(word);
        }
    }

    #[test]
    fn test_read_honors_segment_order() {
        let mut pio = ProcessorDriven::new(CountingWindow {
            next: 0,
            written: Vec::new(),
        });
        let mut buf = [0u8; 16];
        let segments = [ScatterSegment::new(8, 4), ScatterSegment::new(0, 4)];
        pio.submit(&segments, Direction::FromDevice, &mut buf).unwrap();
        assert_eq!(&buf[8..12], &[0, 1, 2, 3]);
        assert_eq!(&buf[0..4], &[4, 5, 6, 7]);
        assert_eq!(&buf[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_write_pads_tail_word() {
        let mut pio = ProcessorDriven::new(CountingWindow {
            next: 0,
            written: Vec::new(),
        });
        let mut buf = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
        pio.submit(&[ScatterSegment::new(0, 6)], Direction::ToDevice, &mut buf)
            .unwrap();
        assert_eq!(pio.window().written, [0x4433_2211, 0xFFFF_6655]);
    }

    #[test]
    fn test_out_of_range_segment_fails() {
        let mut pio = ProcessorDriven::new(CountingWindow {
            next: 0,
            written: Vec::new(),
        });
        let mut buf = [0u8; 8];
        let result = pio.submit(&[ScatterSegment::new(4, 8)], Direction::FromDevice, &mut buf);
        assert_eq!(result, Err(BusTransferError));
    }
}
