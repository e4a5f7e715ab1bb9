use std::{path::Path, sync::Arc};

use anyhow::Context;
use rust_htslib::bam::{self, Read};

use crate::{
    record::{CigarOp, Record},
    region::{Contig, Region},
};

/// Ordered stream of alignment records overlapping a region
///
/// Records must be delivered in non-decreasing order of alignment start;
/// the depth calculation relies on this and does not check it.
/// The stream is closed when dropped.
pub trait RecordReader {
    /// Fill rec with the next record.  Returns false at the end of the stream
    fn read(&mut self, rec: &mut Record) -> anyhow::Result<bool>;
}

/// Source of alignment records that supports random access by region
pub trait AlignmentSource {
    /// Contig names and lengths in file order
    fn seq_dict(&self) -> &[(Contig, usize)];

    /// Get reader for records overlapping region.  Returns None if the
    /// contig is not present in the source
    fn query<'a>(&'a mut self, region: &Region)
        -> anyhow::Result<Option<Box<dyn RecordReader + 'a>>>;

    /// One region per contig covering the whole reference
    fn whole_genome_regions(&self) -> anyhow::Result<Vec<Region>> {
        self.seq_dict()
            .iter()
            .filter(|(_, l)| *l > 0)
            .map(|(c, l)| Region::new(Arc::clone(c), 1, *l))
            .collect()
    }
}

/// Indexed SAM/BAM/CRAM file read through htslib
pub struct HtsSource {
    rdr: bam::IndexedReader,
    seq_dict: Vec<(Contig, usize)>,
}

pub fn open_input<P: AsRef<Path>>(
    name: P,
    reference: Option<&Path>,
    hts_threads: usize,
) -> anyhow::Result<HtsSource> {
    let name = name.as_ref();
    debug!(
        "Try to open input file {} with reference {:?}",
        name.display(),
        reference,
    );

    // Opening an IndexedReader also loads the index
    let mut rdr = bam::IndexedReader::from_path(name).with_context(|| {
        format!(
            "Failed to open input file {} (or its index)",
            name.display()
        )
    })?;

    if let Some(r) = reference {
        rdr.set_reference(r)
            .with_context(|| format!("Could not set reference {}", r.display()))?
    }

    if hts_threads > 0 {
        debug!("Attach {} decompression threads to file", hts_threads);
        rdr.set_threads(hts_threads)?
    }

    let hdr = rdr.header();
    let seq_dict = (0..hdr.target_count())
        .map(|tid| {
            let name = String::from_utf8_lossy(hdr.tid2name(tid));
            let len = hdr.target_len(tid).unwrap_or(0) as usize;
            (Contig::from(name.as_ref()), len)
        })
        .collect();

    Ok(HtsSource { rdr, seq_dict })
}

impl AlignmentSource for HtsSource {
    fn seq_dict(&self) -> &[(Contig, usize)] {
        &self.seq_dict
    }

    fn query<'a>(
        &'a mut self,
        region: &Region,
    ) -> anyhow::Result<Option<Box<dyn RecordReader + 'a>>> {
        let tid = self.rdr.header().tid(region.ctg().as_bytes());
        match tid {
            Some(tid) => {
                // htslib uses 0-based half open coordinates
                self.rdr
                    .fetch((tid, (region.start() - 1) as i64, region.end() as i64))
                    .with_context(|| format!("Error fetching region {}", region))?;
                Ok(Some(Box::new(HtsRegionReader {
                    rdr: &mut self.rdr,
                    brec: bam::Record::new(),
                })))
            }
            None => Ok(None),
        }
    }
}

struct HtsRegionReader<'a> {
    rdr: &'a mut bam::IndexedReader,
    brec: bam::Record,
}

impl<'a> RecordReader for HtsRegionReader<'a> {
    fn read(&mut self, rec: &mut Record) -> anyhow::Result<bool> {
        match self.rdr.read(&mut self.brec) {
            None => Ok(false),
            Some(r) => {
                r.with_context(|| "Error reading alignment record")?;
                copy_record(&self.brec, rec);
                Ok(true)
            }
        }
    }
}

/// Decode an htslib packed CIGAR element (length << 4 | op)
fn decode_cigar(c: u32) -> CigarOp {
    let l = c >> 4;
    match c & 0xf {
        0 => CigarOp::Match(l),
        1 => CigarOp::Ins(l),
        2 => CigarOp::Del(l),
        3 => CigarOp::RefSkip(l),
        4 => CigarOp::SoftClip(l),
        5 => CigarOp::HardClip(l),
        7 => CigarOp::Equal(l),
        8 => CigarOp::Diff(l),
        // 6 is padding; anything else is malformed and treated the same way
        _ => CigarOp::Pad(l),
    }
}

fn copy_record(brec: &bam::Record, rec: &mut Record) {
    // Unmapped records can have pos -1
    let pos = (brec.pos() + 1).max(0) as usize;
    rec.set_header(brec.mapq(), brec.flags(), pos);
    let q = rec.qual_mut();
    q.clear();
    q.extend_from_slice(brec.qual());
    let c = rec.cigar_mut();
    c.clear();
    c.extend(brec.raw_cigar().iter().map(|x| decode_cigar(*x)));
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::region::parse_region;
    use rust_htslib::bam::header::{Header, HeaderRecord};
    use std::{collections::HashMap, path::PathBuf};

    /// SAM lines for a small coordinate sorted BAM on contig 1 (length 300)
    ///
    /// r1 covers 100-104 after a soft clip, r2 is a paired duplicate over
    /// 102-104 and r3 lies outside 1:100-110
    const TEST_SAM: [&[u8]; 4] = [
        b"r0\t0\t1\t95\t60\t5M\t*\t0\t0\tACGTA\tIIIII",
        b"r1\t0\t1\t100\t60\t2S5M\t*\t0\t0\tTTACGTA\tIIIIIII",
        b"r2\t1025\t1\t102\t60\t3M\t=\t150\t0\tACG\tIII",
        b"r3\t0\t1\t200\t60\t4M\t*\t0\t0\tACGT\tIIII",
    ];

    /// Write and index test.bam in dir
    pub(crate) fn write_test_bam(dir: &Path) -> PathBuf {
        let path = dir.join("test.bam");
        let mut header = Header::new();
        let mut hd = HeaderRecord::new(b"HD");
        hd.push_tag(b"VN", &"1.6");
        hd.push_tag(b"SO", &"coordinate");
        header.push_record(&hd);
        let mut sq = HeaderRecord::new(b"SQ");
        sq.push_tag(b"SN", &"1");
        sq.push_tag(b"LN", &300i64);
        header.push_record(&sq);
        let view = bam::HeaderView::from_header(&header);

        {
            let mut wrt = bam::Writer::from_path(&path, &header, bam::Format::Bam).unwrap();
            for line in TEST_SAM {
                wrt.write(&bam::Record::from_sam(&view, line).unwrap()).unwrap();
            }
        }
        bam::index::build(&path, None, bam::index::Type::Bai, 1).unwrap();
        path
    }

    fn fetch_all(src: &mut HtsSource, region: &str) -> Option<Vec<Record>> {
        let mut rdr = src.query(&parse_region(region).unwrap()).unwrap()?;
        let mut v = Vec::new();
        let mut rec = Record::new();
        while rdr.read(&mut rec).unwrap() {
            v.push(rec.clone())
        }
        Some(v)
    }

    #[test]
    fn hts_source_fetches_region() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_bam(dir.path());
        let mut src = open_input(&path, None, 0).unwrap();
        assert_eq!(src.seq_dict(), &[(Contig::from("1"), 300usize)]);

        let v = fetch_all(&mut src, "1:100-110").unwrap();
        assert_eq!(v.len(), 2);
        // 1-based positions, soft clip not projected
        assert_eq!(v[0].pos(), 100);
        assert_eq!(
            v[0].ref_positions().collect::<Vec<_>>(),
            vec![None, None, Some(100), Some(101), Some(102), Some(103), Some(104)]
        );
        assert_eq!(v[0].qual(), &[40u8; 7]);
        assert_eq!(v[1].pos(), 102);
        assert!(v[1].is_paired() && v[1].is_duplicate() && !v[1].is_mate_unmapped());

        // r0 ends at 99, r3 starts at 200
        let v = fetch_all(&mut src, "1:99-99").unwrap();
        assert_eq!(v.iter().map(|r| r.pos()).collect::<Vec<_>>(), vec![95]);
        assert!(fetch_all(&mut src, "1:105-199").unwrap().is_empty());
        assert!(fetch_all(&mut src, "chrZ:1-10").is_none());
    }

    #[test]
    fn missing_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_bam(dir.path());
        let mut bai = path.clone().into_os_string();
        bai.push(".bai");
        std::fs::remove_file(bai).unwrap();
        assert!(open_input(&path, None, 0).is_err());
    }

    /// In memory alignment source.  Records for each contig must be sorted on position
    pub(crate) struct MemSource {
        pub seq_dict: Vec<(Contig, usize)>,
        pub records: HashMap<Contig, Vec<Record>>,
    }

    struct MemReader<'a> {
        it: std::vec::IntoIter<&'a Record>,
    }

    impl<'a> RecordReader for MemReader<'a> {
        fn read(&mut self, rec: &mut Record) -> anyhow::Result<bool> {
            Ok(match self.it.next() {
                Some(r) => {
                    rec.clone_from(r);
                    true
                }
                None => false,
            })
        }
    }

    impl AlignmentSource for MemSource {
        fn seq_dict(&self) -> &[(Contig, usize)] {
            &self.seq_dict
        }

        fn query<'a>(
            &'a mut self,
            region: &Region,
        ) -> anyhow::Result<Option<Box<dyn RecordReader + 'a>>> {
            if !self.seq_dict.iter().any(|(c, _)| c == region.ctg()) {
                return Ok(None);
            }
            // Records that overlap the region
            let v: Vec<&Record> = self
                .records
                .get(region.ctg())
                .map(|v| {
                    v.iter()
                        .filter(|r| {
                            let last = r.ref_positions().flatten().last().unwrap_or(r.pos());
                            r.pos() <= region.end() && last >= region.start()
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(Some(Box::new(MemReader { it: v.into_iter() })))
        }
    }

    #[test]
    fn cigar_decoding() {
        assert_eq!(decode_cigar(10 << 4), CigarOp::Match(10));
        assert_eq!(decode_cigar((3 << 4) | 4), CigarOp::SoftClip(3));
        assert_eq!(decode_cigar((2 << 4) | 2), CigarOp::Del(2));
        assert_eq!(decode_cigar((5 << 4) | 8), CigarOp::Diff(5));
    }

    #[test]
    fn whole_genome_fallback() {
        let src = MemSource {
            seq_dict: vec![
                (Contig::from("1"), 1000),
                (Contig::from("2"), 0),
                (Contig::from("MT"), 16569),
            ],
            records: HashMap::new(),
        };
        let v = src.whole_genome_regions().unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].to_string(), "1:1-1000");
        assert_eq!(v[1].to_string(), "MT:1-16569");
    }
}
