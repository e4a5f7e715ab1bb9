use std::{fmt, path::Path, sync::Arc};

use anyhow::Context;
use compress_io::compress::CompressIo;
use regex::Regex;
use utils::{get_next_line, parse_usize_with_commas};

pub type Contig = Arc<str>;

/// Largest coordinate accepted (htslib positions are i64)
pub const MAX_COORD: usize = i64::MAX as usize;

/// Closed genomic interval on one contig, 1-based inclusive coordinates
///
/// Ordering is by (contig, start, end)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Region {
    ctg: Contig,
    start: usize,
    end: usize,
}

impl Region {
    pub fn new(ctg: Contig, start: usize, end: usize) -> anyhow::Result<Self> {
        if start == 0 {
            Err(anyhow!("Region start must be >= 1 for {}", ctg))
        } else if start > end {
            Err(anyhow!("Range error for {} - {} > {}", ctg, start, end))
        } else if end > MAX_COORD {
            Err(anyhow!("Region end {} for {} is too large", end, ctg))
        } else {
            Ok(Self { ctg, start, end })
        }
    }

    pub fn ctg(&self) -> &Contig {
        &self.ctg
    }
    pub fn start(&self) -> usize {
        self.start
    }
    pub fn end(&self) -> usize {
        self.end
    }
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }
    pub fn contains(&self, x: usize) -> bool {
        x >= self.start && x <= self.end
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.ctg, self.start, self.end)
    }
}

/// Parse a region of the form contig:start-end (1-based, inclusive)
///
/// The contig name is everything before the last ':', so names such as
/// HLA-A*01:01 are handled.  Thousands separators are accepted in coordinates.
pub fn parse_region(s: &str) -> anyhow::Result<Region> {
    let r = Regex::new(r"^\s*(\S+):([0-9,]+)-([0-9,]+)\s*$").unwrap();
    let c = r
        .captures(s)
        .ok_or_else(|| anyhow!("Illegal region: {} (expected contig:start-end)", s))?;
    let ctg = c.get(1).unwrap().as_str();
    let start = parse_usize_with_commas(c.get(2).unwrap().as_str())
        .with_context(|| format!("Illegal region: {}", s))?;
    let end = parse_usize_with_commas(c.get(3).unwrap().as_str())
        .with_context(|| format!("Illegal region: {}", s))?;
    Region::new(Arc::from(ctg), start, end).with_context(|| format!("Illegal region: {}", s))
}

/// Read intervals from a BED file (may be compressed)
///
/// BED coordinates are 0-based half-open; they are converted to 1-based inclusive.
/// Header lines (#, track, browser), short lines and empty intervals are skipped.
pub fn read_bed_file<P: AsRef<Path>>(fname: P) -> anyhow::Result<Vec<Region>> {
    let fname = fname.as_ref();
    debug!("Reading in regions from BED file {}", fname.display());

    let mut rdr = CompressIo::new()
        .path(fname)
        .bufreader()
        .with_context(|| format!("Could not open BED file {}", fname.display()))?;

    let mut buf = String::new();
    let mut line = 0;
    let mut v = Vec::new();
    let mut ctg: Option<Contig> = None;

    while let Some(fields) = get_next_line(&mut rdr, &mut buf)
        .with_context(|| format!("Error after reading {} lines from {}", line, fname.display()))?
    {
        line += 1;
        if fields.len() < 3
            || fields[0].starts_with('#')
            || fields[0].starts_with("track")
            || fields[0].starts_with("browser")
        {
            continue;
        }
        let a = parse_usize_with_commas(fields[1])
            .with_context(|| format!("{}:{} Error reading start", fname.display(), line))?;
        let b = parse_usize_with_commas(fields[2])
            .with_context(|| format!("{}:{} Error reading end", fname.display(), line))?;
        if b < a {
            return Err(anyhow!(
                "{}:{} Range error - {} > {}",
                fname.display(),
                line,
                a,
                b
            ));
        } else if b == a {
            warn!("{}:{} Skipping empty interval", fname.display(), line);
            continue;
        }
        // Consecutive lines are normally on the same contig, so share the name
        let c = match ctg.take() {
            Some(c) if c.as_ref() == fields[0] => c,
            _ => Arc::from(fields[0]),
        };
        v.push(Region::new(Arc::clone(&c), a + 1, b)?);
        ctg = Some(c);
    }
    debug!(
        "Finished reading in {} lines; found {} intervals",
        line,
        v.len()
    );
    Ok(v)
}

/// Sort regions and merge those that overlap or abut
///
/// The result is ordered by (contig, start), pairwise disjoint and non-abutting,
/// and covers exactly the same positions as the input.
pub fn normalize(mut v: Vec<Region>) -> Vec<Region> {
    if v.len() <= 1 {
        return v;
    }
    v.sort_unstable();
    let mut out = Vec::with_capacity(v.len());
    let mut it = v.into_iter();
    let mut prev = it.next().unwrap();
    for r in it {
        if r.ctg == prev.ctg && r.start <= prev.end + 1 {
            let merged = Region {
                ctg: Arc::clone(&prev.ctg),
                start: prev.start,
                end: prev.end.max(r.end),
            };
            warn!("Intervals overlap, coalescing {} and {} to {}", prev, r, merged);
            prev = merged
        } else {
            out.push(prev);
            prev = r
        }
    }
    out.push(prev);
    out
}
