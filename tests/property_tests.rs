//! Property-based tests for size joining, path remapping and queue
//! reconciliation.
//!
//! These check that NZBGet's split 32-bit size words always recombine to the
//! same 64-bit value, that remapping moves any path under the remote root to
//! the same relative place under the local root, and that reconciled queue
//! items never report more remaining than total.

use std::path::{Path, PathBuf};

use fetchbridge::client::remap::{remap_path, remap_storage};
use fetchbridge::nzbget::{make_i64, reconcile_queue, NzbgetGlobalStatus, NzbgetQueueItem};
use fetchbridge::{DownloadClientItem, DownloadItemStatus};
use proptest::prelude::*;

/// Relative paths of one to four lowercase segments.
fn arb_relative() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z0-9][a-z0-9._-]{0,11}", 1..5)
}

fn arb_queue_item() -> impl Strategy<Value = NzbgetQueueItem> {
    (
        1i32..1000,
        (any::<u32>(), any::<u32>()),
        (any::<u32>(), any::<u32>()),
        (any::<u32>(), any::<u32>()),
        0i32..4,
    )
        .prop_map(|(id, (file_hi, file_lo), (remaining_hi, remaining_lo), (paused_hi, paused_lo), active)| {
            NzbgetQueueItem {
                nzb_id: id,
                nzb_name: format!("Series.Title.S01E{:02}", id % 100),
                category: "tv".into(),
                file_size_hi: file_hi,
                file_size_lo: file_lo,
                remaining_size_hi: remaining_hi,
                remaining_size_lo: remaining_lo,
                paused_size_hi: paused_hi,
                paused_size_lo: paused_lo,
                active_downloads: active,
                ..NzbgetQueueItem::default()
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn size_words_recombine(hi in any::<u32>(), lo in any::<u32>()) {
        let joined = make_i64(hi, lo);

        prop_assert_eq!(joined, (((hi as u64) << 32) | lo as u64) as i64);
        prop_assert_eq!(joined as u64 & 0xFFFF_FFFF, lo as u64);
        prop_assert_eq!((joined as u64 >> 32) as u32, hi);
    }

    #[test]
    fn size_words_without_high_bits_are_the_low_word(lo in any::<u32>()) {
        prop_assert_eq!(make_i64(0, lo), lo as i64);
    }

    #[test]
    fn remap_moves_relative_path(segments in arb_relative()) {
        let relative = segments.join("/");
        let remote = format!("/downloads/tv/{}", relative);

        let remapped = remap_path(&remote, "/downloads/tv", "/mnt/media/tv")
            .expect("path under the remote root should remap");

        let expected: PathBuf = segments.iter().fold(PathBuf::from("/mnt/media/tv"), |p, s| p.join(s));
        prop_assert_eq!(PathBuf::from(remapped), expected);
    }

    #[test]
    fn remap_rejects_sibling_prefix(segments in arb_relative()) {
        let sibling = format!("/downloads/tv2/{}", segments.join("/"));
        prop_assert_eq!(remap_path(&sibling, "/downloads/tv", "/mnt/media/tv"), None);
    }

    #[test]
    fn remap_storage_needs_local_override(segments in arb_relative()) {
        let output: PathBuf = segments.iter().fold(PathBuf::from("/downloads/tv"), |p, s| p.join(s));

        let mut item = DownloadClientItem::new("NZBGet", "1", "Series.Title.S01E01", DownloadItemStatus::Completed);
        item.output_path = Some(output.clone());

        remap_storage(&mut item, Path::new("/downloads/tv"), None);
        prop_assert_eq!(item.output_path.as_ref(), Some(&output));
    }

    #[test]
    fn queue_remaining_never_exceeds_total(
        queue in prop::collection::vec(arb_queue_item(), 1..6),
        rate in prop_oneof![Just(0i64), Just(1i64), 1i64..10_000_000, Just(i64::MAX)],
        paused in any::<bool>(),
    ) {
        let status = NzbgetGlobalStatus { download_rate: rate, download_paused: paused };
        let items = reconcile_queue("NZBGet", &status, &queue, &[]);

        prop_assert_eq!(items.len(), queue.len());
        for item in &items {
            prop_assert!(item.total_size >= 0);
            prop_assert!(item.remaining_size >= 0);
            prop_assert!(item.remaining_size <= item.total_size);
            prop_assert!(!item.status.is_terminal());
        }
    }
}
