//! Block-wise flash writing.

use log::{debug, info};

use crate::cancel::CancelToken;
use crate::chip::Chip;
use crate::error::Result;
use crate::image::Segment;
use crate::loader::{Loader, LoaderPort};
use crate::port::Port;
use crate::session::{Event, EventHook, emit};

/// Fixed transmission block size.
pub const FLASH_WRITE_SIZE: usize = 1024;

/// Flash sector granularity the erase span is aligned to.
pub const FLASH_SECTOR_SIZE: u32 = 4096;

/// Fill byte for the tail of the final block.
pub const PADDING_BYTE: u8 = 0xFF;

/// Round `value` up to the next multiple of `alignment`.
pub(crate) fn align_up(alignment: u32, value: u32) -> u32 {
    value + (alignment - value % alignment) % alignment
}

/// Stream one image in fixed-size blocks.
///
/// Every transmitted block has exactly `block_size` bytes; the tail of
/// the final one is [`PADDING_BYTE`] fill. Progress is reported whenever
/// `floor(100 * written / total)` crosses a 10 % boundary, each decile at
/// most once. Cancellation is polled before every block.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn write_segment<P: Port>(
    loader: &mut dyn Loader,
    io: &mut LoaderPort<P>,
    segment: &Segment<'_>,
    block_size: usize,
    chip: Chip,
    cancel: &CancelToken,
    events: &mut EventHook,
) -> Result<()> {
    debug_assert!(block_size > 0);

    let total = segment.len();
    let erase_end = align_up(FLASH_SECTOR_SIZE, segment.offset.wrapping_add(total as u32));
    info!(
        "Flash will be erased from {:#x} to {:#x}",
        segment.offset,
        erase_end.saturating_sub(1)
    );
    emit(
        events,
        Event::EraseRange {
            start: segment.offset,
            end: erase_end,
        },
    );

    loader.flash_start(io, segment.offset, total as u32, block_size as u32)?;

    let mut written = 0usize;
    let mut last_decile = 0usize;
    for chunk in segment.data.chunks(block_size) {
        cancel.check()?;

        if chunk.len() == block_size {
            loader.flash_write(io, chunk)?;
        } else {
            // Final short chunk, pad to the full block size
            let mut block = vec![PADDING_BYTE; block_size];
            block[..chunk.len()].copy_from_slice(chunk);
            loader.flash_write(io, &block)?;
        }
        written += chunk.len();

        let percent = 100 * written / total;
        if percent / 10 > last_decile {
            last_decile = percent / 10;
            let addr = segment.offset + written as u32;
            info!("Writing at {addr:#x}... ({percent} %)");
            emit(
                events,
                Event::WriteProgress {
                    addr,
                    percent: percent as u8,
                },
            );
        }
    }

    if chip.supports_verify() {
        loader.flash_verify(io)?;
        debug!("Flash verified");
    } else {
        info!("{chip} does not support flash verify");
        emit(events, Event::VerifySkipped { chip });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResetBeforeOperation;
    use crate::error::Error;
    use crate::testutil::{MockLoader, MockPort, collect_events};

    fn adapter() -> LoaderPort<MockPort> {
        LoaderPort::new(MockPort::new("A"), ResetBeforeOperation::NoReset, None)
    }

    fn write(
        loader: &mut MockLoader,
        data: &[u8],
        offset: u32,
        block_size: usize,
        chip: Chip,
    ) -> (Result<()>, Vec<Event>) {
        let mut io = adapter();
        let segment = Segment::new(offset, data);
        let (mut events, seen) = collect_events();
        let result = write_segment(
            loader,
            &mut io,
            &segment,
            block_size,
            chip,
            &CancelToken::new(),
            &mut events,
        );
        drop(events);
        let seen = seen.lock().unwrap().clone();
        (result, seen)
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(4096, 0x1000 + 10), 0x2000);
        assert_eq!(align_up(4096, 0x0), 0x0);
        assert_eq!(align_up(4096, 0x1001), 0x2000);
        assert_eq!(align_up(4096, 0x1000), 0x1000);
    }

    #[test]
    fn test_block_count_and_padding() {
        let data = vec![0xABu8; 2500];
        let mut loader = MockLoader::new(1);
        let (result, _) = write(&mut loader, &data, 0x1000, 1024, Chip::Esp32);
        result.unwrap();

        assert_eq!(loader.starts, vec![(0x1000, 2500, 1024)]);
        assert_eq!(loader.blocks.len(), 3); // ceil(2500 / 1024)
        for block in &loader.blocks {
            assert_eq!(block.len(), 1024);
        }
        // 2500 = 2 * 1024 + 452: first 452 bytes of the last block are
        // data, the rest is fill.
        assert!(loader.blocks[2][..452].iter().all(|&b| b == 0xAB));
        assert!(loader.blocks[2][452..].iter().all(|&b| b == PADDING_BYTE));
    }

    #[test]
    fn test_exact_multiple_needs_no_padding() {
        let data = vec![0x55u8; 2048];
        let mut loader = MockLoader::new(1);
        let (result, _) = write(&mut loader, &data, 0, 1024, Chip::Esp32);
        result.unwrap();

        assert_eq!(loader.blocks.len(), 2);
        assert!(loader.blocks.iter().flatten().all(|&b| b == 0x55));
    }

    #[test]
    fn test_empty_image_sends_no_blocks() {
        let mut loader = MockLoader::new(1);
        let (result, _) = write(&mut loader, &[], 0x1000, 1024, Chip::Esp32);
        result.unwrap();

        assert_eq!(loader.starts, vec![(0x1000, 0, 1024)]);
        assert!(loader.blocks.is_empty());
    }

    #[test]
    fn test_progress_deciles_each_reported_once() {
        let data = vec![0u8; 1000];
        let mut loader = MockLoader::new(1);
        let (result, events) = write(&mut loader, &data, 0, 100, Chip::Esp32);
        result.unwrap();

        let percents: Vec<u8> = events
            .iter()
            .filter_map(|event| match event {
                Event::WriteProgress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn test_progress_skips_deciles_on_coarse_blocks() {
        let data = vec![0u8; 1000];
        let mut loader = MockLoader::new(1);
        let (result, events) = write(&mut loader, &data, 0, 300, Chip::Esp32);
        result.unwrap();

        let percents: Vec<u8> = events
            .iter()
            .filter_map(|event| match event {
                Event::WriteProgress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![30, 60, 90, 100]);
    }

    #[test]
    fn test_erase_range_reported() {
        let data = vec![0u8; 10];
        let mut loader = MockLoader::new(1);
        let (result, events) = write(&mut loader, &data, 0x1000, 1024, Chip::Esp32);
        result.unwrap();

        assert!(events.contains(&Event::EraseRange {
            start: 0x1000,
            end: 0x2000,
        }));
    }

    #[test]
    fn test_cancel_between_blocks() {
        // The token is set while block 3 is transmitted; block 4 of the
        // 10-block image must never go out.
        let data = vec![0u8; 1000];
        let mut io = adapter();
        let segment = Segment::new(0, &data);
        let cancel = CancelToken::new();
        let mut loader = MockLoader::new(1);
        loader.cancel_after = Some((3, cancel.clone()));

        let result = write_segment(
            &mut loader,
            &mut io,
            &segment,
            100,
            Chip::Esp32,
            &cancel,
            &mut None,
        );

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(loader.blocks.len(), 3);
        assert_eq!(loader.verified, 0);
    }

    #[test]
    fn test_write_failure_aborts() {
        let data = vec![0u8; 1000];
        let mut loader = MockLoader::new(1);
        loader.fail_block_at = Some(2);
        let (result, _) = write(&mut loader, &data, 0, 100, Chip::Esp32);

        assert!(matches!(result, Err(Error::FlashWriteFailed(_))));
        assert_eq!(loader.blocks.len(), 2);
    }

    #[test]
    fn test_verify_runs_where_supported() {
        let mut loader = MockLoader::new(1);
        let (result, events) = write(&mut loader, &[1, 2, 3], 0, 1024, Chip::Esp32);
        result.unwrap();

        assert_eq!(loader.verified, 1);
        assert!(!events.iter().any(|e| matches!(e, Event::VerifySkipped { .. })));
    }

    #[test]
    fn test_verify_skipped_for_esp8266() {
        let mut loader = MockLoader::new(0);
        let (result, events) = write(&mut loader, &[1, 2, 3], 0, 1024, Chip::Esp8266);
        result.unwrap();

        assert_eq!(loader.verified, 0);
        assert!(events.contains(&Event::VerifySkipped {
            chip: Chip::Esp8266,
        }));
    }

    #[test]
    fn test_verify_mismatch_is_fatal() {
        let mut loader = MockLoader::new(1);
        loader.fail_verify = true;
        let (result, _) = write(&mut loader, &[1, 2, 3], 0, 1024, Chip::Esp32);

        assert!(matches!(result, Err(Error::VerifyMismatch)));
    }
}
