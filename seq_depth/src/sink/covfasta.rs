use std::io::Write;

use anyhow::Context;

use super::{DepthSink, DepthSpan};
use crate::region::Region;

/// Number of depth values per line
const LINE_WIDTH: usize = 100;

/// Per-base depth in a FASTA like layout
///
/// Each region starts with a header line >contig:start-end (1-based, inclusive)
/// followed by the depth at every position, space separated, 100 values per line
pub struct CovFastaSink<W: Write> {
    wrt: Option<W>,
    // Number of values written for the current region
    offset: usize,
}

impl<W: Write> CovFastaSink<W> {
    pub fn new(wrt: W) -> Self {
        Self {
            wrt: Some(wrt),
            offset: 0,
        }
    }

    fn writer(&mut self) -> anyhow::Result<&mut W> {
        self.wrt
            .as_mut()
            .ok_or_else(|| anyhow!("Write to closed covfasta output"))
    }
}

impl<W: Write> DepthSink for CovFastaSink<W> {
    fn start_region(&mut self, region: &Region) -> anyhow::Result<()> {
        self.offset = 0;
        write!(self.writer()?, ">{}", region).with_context(|| "Error writing covfasta output")
    }

    fn mark_depth(&mut self, span: &DepthSpan) -> anyhow::Result<()> {
        let mut off = self.offset;
        let w = self.writer()?;
        for _ in span.start..span.end {
            let sep = if off % LINE_WIDTH == 0 { '\n' } else { ' ' };
            write!(w, "{}{}", sep, span.depth).with_context(|| "Error writing covfasta output")?;
            off += 1;
        }
        self.offset = off;
        Ok(())
    }

    fn finish_region(&mut self, _region: &Region) -> anyhow::Result<()> {
        writeln!(self.writer()?).with_context(|| "Error writing covfasta output")
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        if let Some(mut w) = self.wrt.take() {
            w.flush().with_context(|| "Error flushing covfasta output")?
        }
        Ok(())
    }
}
