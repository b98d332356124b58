//! Split descriptors and the split factory
//!
//! A split is the unit of parallel scan assignment: a byte range of one
//! file plus the block-level locality the scheduler uses for worker
//! placement. The factory clamps filesystem block ranges against the
//! split range and enforces that the result covers the split end to end.

use crate::config::Session;
use crate::error::{LoaderError, Result};
use crate::fs::{BlockLocation, HostAddress};
use crate::metadata::{ColumnCoercions, PartitionKey, SchemaProperties};
use crate::predicate::{path_matches, ValueDomain};
use serde::{Deserialize, Serialize};

/// A clamped block range with the hosts storing its replicas
///
/// Invariant: `start <= end`. A zero-width block exists only for a
/// zero-width split it coincides with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalBlock {
    pub start: u64,
    pub end: u64,
    pub addresses: Vec<HostAddress>,
}

/// A fully described split, ready for the sink
///
/// Invariants upheld by the factory:
/// - `blocks` is non-empty, `blocks[0].start == start`,
///   `blocks[last].end == end`
/// - a non-splittable split has exactly one block covering the range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalSplit {
    pub partition_name: String,
    pub path: String,
    pub start: u64,
    pub end: u64,
    pub file_size: u64,
    pub schema: SchemaProperties,
    pub partition_keys: Vec<PartitionKey>,
    pub blocks: Vec<InternalBlock>,
    pub bucket_number: Option<usize>,
    pub splittable: bool,
    pub force_local_scheduling: bool,
    pub coercions: ColumnCoercions,
}

/// Per-partition context shared by every split built for that partition
pub struct SplitFactory<'a> {
    pub partition_name: &'a str,
    pub schema: &'a SchemaProperties,
    pub partition_keys: &'a [PartitionKey],
    pub coercions: &'a ColumnCoercions,
    pub session: &'a Session,
    pub path_domain: Option<&'a ValueDomain>,
}

impl SplitFactory<'_> {
    /// Build a split for `[start, start + length)` of a file, or `None`
    /// when the `$path` domain prunes the file.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        path: &str,
        block_locations: &[BlockLocation],
        start: u64,
        length: u64,
        file_size: u64,
        splittable: bool,
        bucket_number: Option<usize>,
    ) -> Result<Option<InternalSplit>> {
        if !path_matches(self.path_domain, path) {
            return Ok(None);
        }

        let end = start + length;
        let mut blocks = Vec::with_capacity(block_locations.len());
        for location in block_locations {
            // clamp the block range against the split range
            let block_start = start.max(location.offset);
            let block_end = end.min(location.offset + location.length);
            if block_start > block_end {
                // block is outside the split range
                continue;
            }
            if block_start == block_end && !(block_start == start && block_end == end) {
                // skip zero-width blocks, except the one covering a
                // zero-width split exactly
                continue;
            }
            blocks.push(InternalBlock {
                start: block_start,
                end: block_end,
                addresses: location.hosts.clone(),
            });
        }

        // The split must be covered end to end by locality information
        let covered = blocks
            .first()
            .is_some_and(|first| first.start == start)
            && blocks.last().is_some_and(|last| last.end == end);
        if !covered {
            return Err(LoaderError::BadBlockMetadata {
                path: path.to_string(),
                start,
                end,
            });
        }

        if !splittable {
            // collapse to a single block, inheriting the first block's hosts
            let addresses = blocks[0].addresses.clone();
            blocks = vec![InternalBlock {
                start,
                end,
                addresses,
            }];
        }

        let force_local_scheduling =
            self.session.is_force_local_scheduling() && all_blocks_have_real_address(&blocks);

        Ok(Some(InternalSplit {
            partition_name: self.partition_name.to_string(),
            path: path.to_string(),
            start,
            end,
            file_size,
            schema: self.schema.clone(),
            partition_keys: self.partition_keys.to_vec(),
            blocks,
            bucket_number,
            splittable,
            force_local_scheduling,
            coercions: self.coercions.clone(),
        }))
    }
}

fn all_blocks_have_real_address(blocks: &[InternalBlock]) -> bool {
    blocks.iter().all(|block| has_real_address(&block.addresses))
}

// The filesystem reports "localhost" when it has no locality information.
// Only the literal string counts as unreal; loopback IPs are taken at
// face value.
fn has_real_address(addresses: &[HostAddress]) -> bool {
    addresses
        .iter()
        .any(|address| address.host_text() != "localhost")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Owns the per-partition context a factory borrows
    struct Fixture {
        schema: SchemaProperties,
        keys: Vec<PartitionKey>,
        coercions: ColumnCoercions,
        session: Session,
        path_domain: Option<ValueDomain>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                schema: SchemaProperties::new(),
                keys: Vec::new(),
                coercions: ColumnCoercions::new(),
                session: Session::default(),
                path_domain: None,
            }
        }

        fn force_local(mut self) -> Self {
            self.session = Session::new(true);
            self
        }

        fn path_domain(mut self, domain: ValueDomain) -> Self {
            self.path_domain = Some(domain);
            self
        }

        fn factory(&self) -> SplitFactory<'_> {
            SplitFactory {
                partition_name: "ds=2020-01-01",
                schema: &self.schema,
                partition_keys: &self.keys,
                coercions: &self.coercions,
                session: &self.session,
                path_domain: self.path_domain.as_ref(),
            }
        }
    }

    fn block(offset: u64, length: u64, hosts: &[&str]) -> BlockLocation {
        BlockLocation::new(offset, length, hosts)
    }

    #[test]
    fn blocks_clamp_to_split_range() {
        let fixture = Fixture::new();
        let factory = fixture.factory();

        // split [10, 50) over blocks [0, 25) and [25, 100)
        let split = factory
            .create(
                "/t/a",
                &[block(0, 25, &["h1"]), block(25, 75, &["h2"])],
                10,
                40,
                100,
                true,
                None,
            )
            .unwrap()
            .unwrap();

        assert_eq!(split.blocks.len(), 2);
        assert_eq!((split.blocks[0].start, split.blocks[0].end), (10, 25));
        assert_eq!((split.blocks[1].start, split.blocks[1].end), (25, 50));
        assert_eq!(split.start, 10);
        assert_eq!(split.end, 50);
    }

    #[test]
    fn clamp_equals_interval_intersection() {
        // the clamped interval is the set intersection of split and block,
        // except when that intersection is an off-boundary point
        let fixture = Fixture::new();
        let factory = fixture.factory();

        let split = factory
            .create(
                "/t/a",
                &[
                    block(0, 30, &["h1"]),   // intersects [20, 30)
                    block(30, 30, &["h2"]),  // contained  [30, 60)
                    block(60, 100, &["h3"]), // intersects [60, 80)
                ],
                20,
                60,
                160,
                true,
                None,
            )
            .unwrap()
            .unwrap();

        let ranges: Vec<_> = split.blocks.iter().map(|b| (b.start, b.end)).collect();
        assert_eq!(ranges, vec![(20, 30), (30, 60), (60, 80)]);
    }

    #[test]
    fn disjoint_blocks_are_skipped() {
        let fixture = Fixture::new();
        let factory = fixture.factory();

        let split = factory
            .create(
                "/t/a",
                &[block(0, 50, &["h1"]), block(200, 50, &["h2"])],
                0,
                50,
                250,
                true,
                None,
            )
            .unwrap()
            .unwrap();
        assert_eq!(split.blocks.len(), 1);
        assert_eq!((split.blocks[0].start, split.blocks[0].end), (0, 50));
    }

    #[test]
    fn zero_width_non_boundary_block_is_skipped() {
        let fixture = Fixture::new();
        let factory = fixture.factory();

        // block [50, 50) touches the split [0, 100) only at a point
        let err = factory
            .create(
                "/t/a",
                &[block(0, 50, &["h1"]), block(50, 0, &["h2"])],
                0,
                100,
                100,
                true,
                None,
            )
            .unwrap_err();
        // and without it the range is uncovered
        assert!(matches!(err, LoaderError::BadBlockMetadata { .. }));
    }

    #[test]
    fn zero_width_split_keeps_coinciding_block() {
        let fixture = Fixture::new();
        let factory = fixture.factory();

        let split = factory
            .create("/t/empty", &[block(0, 0, &["h1"])], 0, 0, 0, true, None)
            .unwrap()
            .unwrap();
        assert_eq!(split.blocks.len(), 1);
        assert_eq!((split.blocks[0].start, split.blocks[0].end), (0, 0));
    }

    #[test]
    fn uncovered_range_is_bad_metadata() {
        let fixture = Fixture::new();
        let factory = fixture.factory();

        // no blocks at all
        let err = factory
            .create("/t/a", &[], 0, 10, 10, true, None)
            .unwrap_err();
        assert!(matches!(err, LoaderError::BadBlockMetadata { .. }));

        // gap at the tail
        let err = factory
            .create("/t/a", &[block(0, 5, &["h1"])], 0, 10, 10, true, None)
            .unwrap_err();
        match err {
            LoaderError::BadBlockMetadata { path, start, end } => {
                assert_eq!(path, "/t/a");
                assert_eq!((start, end), (0, 10));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_splittable_collapses_to_single_block() {
        let fixture = Fixture::new();
        let factory = fixture.factory();

        let split = factory
            .create(
                "/t/a.gz",
                &[block(0, 25, &["h1"]), block(25, 25, &["h2"])],
                0,
                50,
                50,
                false,
                None,
            )
            .unwrap()
            .unwrap();

        assert!(!split.splittable);
        assert_eq!(split.blocks.len(), 1);
        assert_eq!((split.blocks[0].start, split.blocks[0].end), (0, 50));
        // hosts inherited from the first real block
        assert_eq!(split.blocks[0].addresses[0].host_text(), "h1");
    }

    #[test]
    fn force_local_requires_real_addresses() {
        let forcing = Fixture::new().force_local();

        // every block has a real host
        let split = forcing
            .factory()
            .create(
                "/t/a",
                &[block(0, 25, &["h1", "localhost"]), block(25, 25, &["h2"])],
                0,
                50,
                50,
                true,
                None,
            )
            .unwrap()
            .unwrap();
        assert!(split.force_local_scheduling);

        // one block knows only localhost
        let split = forcing
            .factory()
            .create(
                "/t/a",
                &[block(0, 25, &["h1"]), block(25, 25, &["localhost"])],
                0,
                50,
                50,
                true,
                None,
            )
            .unwrap()
            .unwrap();
        assert!(!split.force_local_scheduling);

        // session off wins regardless of addresses
        let relaxed = Fixture::new();
        let split = relaxed
            .factory()
            .create("/t/a", &[block(0, 50, &["h1"])], 0, 50, 50, true, None)
            .unwrap()
            .unwrap();
        assert!(!split.force_local_scheduling);
    }

    #[test]
    fn path_domain_prunes_file() {
        let fixture = Fixture::new().path_domain(ValueDomain::of_values(["/t/a"]));
        let factory = fixture.factory();

        let kept = factory
            .create("/t/a", &[block(0, 10, &["h1"])], 0, 10, 10, true, None)
            .unwrap();
        assert!(kept.is_some());

        let pruned = factory
            .create("/t/b", &[block(0, 10, &["h1"])], 0, 10, 10, true, None)
            .unwrap();
        assert!(pruned.is_none());
    }

    #[test]
    fn bucket_number_is_carried() {
        let fixture = Fixture::new();
        let split = fixture
            .factory()
            .create("/t/00003_0", &[block(0, 10, &["h1"])], 0, 10, 10, true, Some(3))
            .unwrap()
            .unwrap();
        assert_eq!(split.bucket_number, Some(3));
    }
}
