use std::fmt;

use crate::region::{Contig, Region};

mod aggregator;
mod bedgraph;
mod covfasta;
mod histogram;

pub use aggregator::Aggregator;
pub use bedgraph::BedGraphSink;
pub use covfasta::CovFastaSink;
pub use histogram::Histogram;

/// Run of consecutive positions with the same depth
///
/// Coordinates are 0-based half open, so a single base at 1-based position x
/// has start = x - 1 and end = x
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthSpan {
    pub ctg: Contig,
    pub start: usize,
    pub end: usize,
    pub depth: u32,
}

impl DepthSpan {
    /// Span for the single base at 1-based position x
    pub fn site(ctg: &Contig, x: usize, depth: u32) -> Self {
        Self {
            ctg: Contig::clone(ctg),
            start: x - 1,
            end: x,
            depth,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

impl fmt::Display for DepthSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t{}", self.ctg, self.start, self.end, self.depth)
    }
}

/// Consumer of depth spans
///
/// Within a region, spans arrive ordered and non-overlapping.  For each
/// region the calls are start_region, zero or more mark_depth, finish_region.
/// finish is called once after the last region, and sinks that own an output
/// should flush and close it there.
pub trait DepthSink {
    fn start_region(&mut self, _region: &Region) -> anyhow::Result<()> {
        Ok(())
    }

    fn mark_depth(&mut self, span: &DepthSpan) -> anyhow::Result<()>;

    fn finish_region(&mut self, _region: &Region) -> anyhow::Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
