use super::types::{Anchor, RelativeStrand};
use crate::device::{DeviceAllocation, DeviceAllocator, Stream};
use crate::error::Result;
use crate::index::{DeviceIndex, Representation};

/// Anchors shared between one query index and one target index.
///
/// The anchor list is charged to device memory for as long as the matcher
/// lives; drop it as soon as overlaps have been extracted.
#[derive(Debug)]
pub struct Matcher {
    anchors: Vec<Anchor>,
    _workspace: Option<DeviceAllocation>,
}

impl Matcher {
    /// Merge-join the two sorted indices on minimizer hash.
    ///
    /// In all-to-all runs only anchors whose target read id is above the query
    /// read id are kept, so each read pair is reported once and no read
    /// matches itself.
    pub fn new(
        allocator: &DeviceAllocator,
        query_index: &DeviceIndex,
        target_index: &DeviceIndex,
        stream: &Stream,
        all_to_all: bool,
    ) -> Result<Self> {
        let _work = stream.begin_work()?;
        let query = query_index.representations();
        let target = target_index.representations();

        let mut count = 0usize;
        for_each_hash_run(query, target, |q_run, t_run| {
            count += q_run
                .iter()
                .map(|q| {
                    t_run
                        .iter()
                        .filter(|t| !(all_to_all && t.read_id <= q.read_id))
                        .count()
                })
                .sum::<usize>();
        });

        if count == 0 {
            return Ok(Self {
                anchors: Vec::new(),
                _workspace: None,
            });
        }

        let workspace = allocator.allocate(
            (count * std::mem::size_of::<Anchor>()) as u64,
            &format!(
                "anchors {} x {}",
                query_index.descriptor(),
                target_index.descriptor()
            ),
        )?;

        let mut anchors = Vec::with_capacity(count);
        for_each_hash_run(query, target, |q_run, t_run| {
            for q in q_run {
                for t in t_run {
                    if all_to_all && t.read_id <= q.read_id {
                        continue;
                    }
                    anchors.push(Anchor {
                        query_read_id: q.read_id,
                        target_read_id: t.read_id,
                        query_position: q.position,
                        target_position: t.position,
                        relative_strand: if q.strand == t.strand {
                            RelativeStrand::Forward
                        } else {
                            RelativeStrand::Reverse
                        },
                    });
                }
            }
        });

        log::trace!(
            "Matched {} x {}: {} anchors",
            query_index.descriptor(),
            target_index.descriptor(),
            anchors.len()
        );

        Ok(Self {
            anchors,
            _workspace: Some(workspace),
        })
    }

    #[inline]
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }
}

/// Call `f` with every pair of equal-hash runs of two hash-sorted slices.
fn for_each_hash_run<F>(query: &[Representation], target: &[Representation], mut f: F)
where
    F: FnMut(&[Representation], &[Representation]),
{
    let (mut i, mut j) = (0usize, 0usize);
    while i < query.len() && j < target.len() {
        let (qh, th) = (query[i].hash, target[j].hash);
        if qh < th {
            i += query[i..].partition_point(|r| r.hash < th);
        } else if th < qh {
            j += target[j..].partition_point(|r| r.hash < qh);
        } else {
            let q_end = i + query[i..].partition_point(|r| r.hash == qh);
            let t_end = j + target[j..].partition_point(|r| r.hash == qh);
            f(&query[i..q_end], &target[j..t_end]);
            i = q_end;
            j = t_end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batching::IndexDescriptor;
    use crate::core::io::{FastaParser, Read};
    use crate::core::utils::reverse_complement;
    use crate::device::{DeviceId, set_device};
    use crate::index::{IndexBuilder, MinimizerIndexBuilder};

    const SEQ: &[u8] = b"ACGGTTAGCCATGACGTTAGCAGGACTTAGCCGATCGATTACGGATCAGGCTAACGTTGCATTGACCAGTAGGCATCAGTTACAGG";

    fn setup(reads: Vec<Read>) -> (FastaParser, MinimizerIndexBuilder, DeviceAllocator, Stream) {
        set_device(DeviceId(0));
        (
            FastaParser::from_reads(reads),
            MinimizerIndexBuilder::new(9, 4, 1.0).unwrap(),
            DeviceAllocator::new(DeviceId(0), 1 << 20),
            Stream::new(DeviceId(0)).unwrap(),
        )
    }

    #[test]
    fn test_identical_reads_anchor_on_the_diagonal() {
        let (source, builder, allocator, stream) =
            setup(vec![Read::new("q", SEQ.to_vec()), Read::new("t", SEQ.to_vec())]);
        let q = builder.build_host_index(&source, IndexDescriptor::new(0, 1)).unwrap();
        let t = builder.build_host_index(&source, IndexDescriptor::new(1, 1)).unwrap();
        let q = builder.upload_to_device(&q, &allocator, &stream).unwrap();
        let t = builder.upload_to_device(&t, &allocator, &stream).unwrap();
        let free_before = allocator.free_memory();

        let matcher = Matcher::new(&allocator, &q, &t, &stream, false).unwrap();
        assert!(!matcher.anchors().is_empty());
        assert!(allocator.free_memory() < free_before);
        for anchor in matcher.anchors() {
            assert_eq!(anchor.query_read_id, 0);
            assert_eq!(anchor.target_read_id, 1);
            assert_eq!(anchor.relative_strand, RelativeStrand::Forward);
        }
        assert!(
            matcher
                .anchors()
                .iter()
                .any(|a| a.query_position == a.target_position)
        );

        drop(matcher);
        assert_eq!(allocator.free_memory(), free_before);
    }

    #[test]
    fn test_reverse_complement_gives_reverse_anchors() {
        let (source, builder, allocator, stream) = setup(vec![
            Read::new("q", SEQ.to_vec()),
            Read::new("t", reverse_complement(SEQ)),
        ]);
        let q = builder.build_host_index(&source, IndexDescriptor::new(0, 1)).unwrap();
        let t = builder.build_host_index(&source, IndexDescriptor::new(1, 1)).unwrap();
        let q = builder.upload_to_device(&q, &allocator, &stream).unwrap();
        let t = builder.upload_to_device(&t, &allocator, &stream).unwrap();

        let matcher = Matcher::new(&allocator, &q, &t, &stream, false).unwrap();
        assert!(!matcher.anchors().is_empty());
        assert!(
            matcher
                .anchors()
                .iter()
                .all(|a| a.relative_strand == RelativeStrand::Reverse)
        );
    }

    #[test]
    fn test_all_to_all_keeps_each_read_pair_once() {
        let (source, builder, allocator, stream) =
            setup(vec![Read::new("a", SEQ.to_vec()), Read::new("b", SEQ.to_vec())]);
        let index = builder.build_host_index(&source, IndexDescriptor::new(0, 2)).unwrap();
        let index = builder.upload_to_device(&index, &allocator, &stream).unwrap();

        let everything = Matcher::new(&allocator, &index, &index, &stream, false).unwrap();
        assert!(everything.anchors().iter().any(|a| a.query_read_id == a.target_read_id));
        assert!(everything.anchors().iter().any(|a| a.query_read_id == 1 && a.target_read_id == 0));

        let symmetric = Matcher::new(&allocator, &index, &index, &stream, true).unwrap();
        assert!(!symmetric.anchors().is_empty());
        assert!(
            symmetric
                .anchors()
                .iter()
                .all(|a| a.query_read_id == 0 && a.target_read_id == 1)
        );
    }
}
