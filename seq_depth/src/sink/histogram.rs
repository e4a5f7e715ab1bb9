use super::{DepthSink, DepthSpan};

/// Number of bases at each depth
///
/// Depths >= max_depth are counted in the last bucket
pub struct Histogram {
    counts: Vec<u64>,
}

impl Histogram {
    pub fn new(max_depth: usize) -> Self {
        Self {
            counts: vec![0; max_depth + 1],
        }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// For each depth d, the number of bases with depth < d
    pub fn cumulative_below(&self) -> Vec<u64> {
        let mut t = 0;
        self.counts
            .iter()
            .map(|x| {
                let c = t;
                t += *x;
                c
            })
            .collect()
    }

    /// For each depth d, the number of bases with depth >= d
    pub fn cumulative_at_least(&self) -> Vec<u64> {
        let mut v = vec![0; self.counts.len()];
        let mut t = 0;
        for (c, x) in v.iter_mut().zip(self.counts.iter()).rev() {
            t += *x;
            *c = t;
        }
        v
    }
}

impl DepthSink for Histogram {
    fn mark_depth(&mut self, span: &DepthSpan) -> anyhow::Result<()> {
        let ix = (span.depth as usize).min(self.counts.len() - 1);
        self.counts[ix] += span.len() as u64;
        Ok(())
    }
}
