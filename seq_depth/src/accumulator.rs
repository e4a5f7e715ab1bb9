use std::{collections::HashMap, ops::AddAssign};

use crate::{
    config::Config,
    record::{Record, BAM_FQCFAIL, BAM_FSECONDARY, BAM_FUNMAP},
    region::Region,
    sink::{DepthSink, DepthSpan},
};

const FORBID_FLAGS: u16 = BAM_FUNMAP | BAM_FSECONDARY | BAM_FQCFAIL;

#[derive(Debug, Clone, Copy)]
pub struct ReadFilter {
    min_mapq: u8,
    min_qual: u8,
    keep_duplicates: bool,
}

impl ReadFilter {
    pub fn new(min_mapq: u8, min_qual: u8, keep_duplicates: bool) -> Self {
        Self {
            min_mapq,
            min_qual,
            keep_duplicates,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.min_mapq(), cfg.min_qual(), cfg.keep_duplicates())
    }

    /// Read level filter applied before any counting
    fn pass_filter(&self, rec: &Record) -> bool {
        rec.mapq() >= self.min_mapq && (rec.flag() & FORBID_FLAGS) == 0
    }
}

/// Read counts collected while calculating depth
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadStats {
    pub paired: u64,
    pub paired_mapped_mate: u64,
    pub duplicates: u64,
    pub aligned_bases: u64,
}

impl AddAssign for ReadStats {
    fn add_assign(&mut self, other: Self) {
        self.paired += other.paired;
        self.paired_mapped_mate += other.paired_mapped_mate;
        self.duplicates += other.duplicates;
        self.aligned_bases += other.aligned_bases;
    }
}

/// Exact per-base depth for one region at a time
///
/// Only positions that can still change are held in memory.  Records for a
/// region must be supplied in non-decreasing order of alignment start: once a
/// record starting at x has been seen, all positions < x are final and are
/// passed on to the sink, one base at a time, in order.  Out of order records
/// give wrong depths; this is not checked.
pub struct Accumulator {
    filter: ReadFilter,
    region: Option<Region>,
    // Counts for positions > flushed
    cov: HashMap<usize, u32>,
    // Last position passed on to the sink
    flushed: usize,
    stats: ReadStats,
}

impl Accumulator {
    pub fn new(filter: ReadFilter) -> Self {
        Self {
            filter,
            region: None,
            cov: HashMap::new(),
            flushed: 0,
            stats: ReadStats::default(),
        }
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    pub fn start_region(&mut self, region: &Region) {
        self.cov.clear();
        self.flushed = region.start() - 1;
        self.region = Some(region.clone());
    }

    /// Count a base aligned to position x (1-based)
    pub fn record_base(&mut self, x: usize, pass_qual: bool) {
        if let Some(reg) = self.region.as_ref() {
            if reg.contains(x) {
                self.stats.aligned_bases += 1;
                if pass_qual {
                    *self.cov.entry(x).or_insert(0) += 1
                }
            }
        }
    }

    /// Pass on all positions < barrier that have not already been flushed
    pub fn flush_up_to(&mut self, barrier: usize, sink: &mut dyn DepthSink) -> anyhow::Result<()> {
        let Some(reg) = self.region.as_ref() else {
            return Ok(());
        };
        let barrier = barrier.min(reg.end() + 1);
        while self.flushed + 1 < barrier {
            let x = self.flushed + 1;
            let depth = self.cov.remove(&x).unwrap_or(0);
            sink.mark_depth(&DepthSpan::site(reg.ctg(), x, depth))?;
            self.flushed = x;
        }
        Ok(())
    }

    pub fn add_record(&mut self, rec: &Record, sink: &mut dyn DepthSink) -> anyhow::Result<()> {
        // Nothing will be added before the start of this record
        self.flush_up_to(rec.pos(), sink)?;

        if !self.filter.pass_filter(rec) {
            return Ok(());
        }
        if rec.is_paired() {
            self.stats.paired += 1;
            if !rec.is_mate_unmapped() {
                self.stats.paired_mapped_mate += 1
            }
        }
        if rec.is_duplicate() {
            self.stats.duplicates += 1;
            if !self.filter.keep_duplicates {
                return Ok(());
            }
        }

        let min_qual = self.filter.min_qual;
        for (x, q) in rec.ref_positions().zip(rec.qual().iter()) {
            if let Some(x) = x {
                self.record_base(x, *q >= min_qual)
            }
        }
        Ok(())
    }

    /// Flush the remainder of the region
    pub fn finish_region(&mut self, sink: &mut dyn DepthSink) -> anyhow::Result<()> {
        if let Some(end) = self.region.as_ref().map(|r| r.end()) {
            self.flush_up_to(end + 1, sink)?;
        }
        debug_assert!(self.cov.is_empty());
        self.cov.clear();
        self.region = None;
        Ok(())
    }

    #[cfg(test)]
    fn pending_positions(&self) -> usize {
        self.cov.len()
    }
}
