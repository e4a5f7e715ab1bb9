use std::io::Write;

use anyhow::Context;

use super::{DepthSink, DepthSpan};

/// Writes one tab separated line (contig, start, end, depth) per span,
/// with 0-based half open coordinates
pub struct BedGraphSink<W: Write> {
    wrt: Option<W>,
}

impl<W: Write> BedGraphSink<W> {
    pub fn new(wrt: W) -> Self {
        Self { wrt: Some(wrt) }
    }
}

impl<W: Write> DepthSink for BedGraphSink<W> {
    fn mark_depth(&mut self, span: &DepthSpan) -> anyhow::Result<()> {
        let w = self
            .wrt
            .as_mut()
            .ok_or_else(|| anyhow!("Write to closed bedGraph output"))?;
        writeln!(w, "{}", span).with_context(|| "Error writing bedGraph output")
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        if let Some(mut w) = self.wrt.take() {
            w.flush().with_context(|| "Error flushing bedGraph output")?
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Contig;

    #[test]
    fn one_line_per_span() {
        let mut buf = Vec::new();
        {
            let mut s = BedGraphSink::new(&mut buf);
            for (a, b, d) in [(99, 104, 1), (104, 110, 0)] {
                s.mark_depth(&DepthSpan {
                    ctg: Contig::from("1"),
                    start: a,
                    end: b,
                    depth: d,
                })
                .unwrap()
            }
            s.finish().unwrap();
            // Output is closed exactly once
            s.finish().unwrap();
            assert!(s
                .mark_depth(&DepthSpan::site(&Contig::from("1"), 200, 0))
                .is_err());
        }
        assert_eq!(String::from_utf8(buf).unwrap(), "1\t99\t104\t1\n1\t104\t110\t0\n");
    }
}
