use super::{DepthSink, DepthSpan};
use crate::region::Region;

/// Coalesces adjacent spans of equal depth and passes the result on to its clients
///
/// Gaps between incoming spans are treated as zero depth.  The spans emitted
/// for a region are contiguous and no two consecutive spans have the same depth.
/// As the Aggregator is itself a DepthSink, aggregators can be chained.
pub struct Aggregator<'a> {
    pending: Option<DepthSpan>,
    clients: Vec<&'a mut dyn DepthSink>,
}

impl<'a> Aggregator<'a> {
    pub fn new() -> Self {
        Self {
            pending: None,
            clients: Vec::new(),
        }
    }

    pub fn add_client(&mut self, client: &'a mut dyn DepthSink) {
        self.clients.push(client)
    }

    fn emit(&mut self, span: &DepthSpan) -> anyhow::Result<()> {
        for c in self.clients.iter_mut() {
            c.mark_depth(span)?
        }
        Ok(())
    }
}

impl<'a> Default for Aggregator<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> DepthSink for Aggregator<'a> {
    fn start_region(&mut self, region: &Region) -> anyhow::Result<()> {
        self.pending = None;
        for c in self.clients.iter_mut() {
            c.start_region(region)?
        }
        Ok(())
    }

    fn mark_depth(&mut self, span: &DepthSpan) -> anyhow::Result<()> {
        let Some(mut p) = self.pending.take() else {
            self.pending = Some(span.clone());
            return Ok(());
        };

        debug_assert!(p.end <= span.start);
        if p.end < span.start {
            if p.depth == 0 {
                p.end = span.start
            } else {
                self.emit(&p)?;
                p = DepthSpan {
                    ctg: p.ctg.clone(),
                    start: p.end,
                    end: span.start,
                    depth: 0,
                }
            }
        }

        if p.depth != span.depth {
            self.emit(&p)?;
            self.pending = Some(span.clone())
        } else {
            p.end = span.end;
            self.pending = Some(p)
        }
        Ok(())
    }

    fn finish_region(&mut self, region: &Region) -> anyhow::Result<()> {
        if let Some(p) = self.pending.take() {
            self.emit(&p)?
        }
        for c in self.clients.iter_mut() {
            c.finish_region(region)?
        }
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        for c in self.clients.iter_mut() {
            c.finish()?
        }
        Ok(())
    }
}
