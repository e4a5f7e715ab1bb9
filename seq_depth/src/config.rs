use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

use crate::region::Region;

pub const DEFAULT_MIN_MAPQ: u8 = 20;
pub const DEFAULT_MIN_QUAL: u8 = 20;
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Config
///
/// Configuration info for the program
/// This is generated from the command line arguments and (optionally) a config file
/// Once set it is read only, and is shared between all worker threads
///
/// input_files - SAM/BAM/CRAM files to process
/// regions - sorted, merged list of regions.  If empty, whole contigs from each input are used
/// min_mapq - minimum mapping quality for a read to be used
/// min_qual - minimum base quality for a base to be counted
/// keep_duplicates - count reads flagged as duplicates
/// compress - compress bedGraph and covfasta output
/// bedgraph, cov_fasta - which coverage tracks to generate
/// suffix - added to output file names
/// output_dir - output directory
/// max_depth - depths >= max_depth are grouped together in the histogram
/// reference - reference FASTA (for CRAM input)
/// threads - number of files processed in parallel
/// hts_threads - decompression threads per input file
/// fail_fast - stop all processing after the first failed file
///
pub struct Config {
    input_files: Vec<PathBuf>,
    regions: Vec<Region>,
    min_mapq: u8,
    min_qual: u8,
    keep_duplicates: bool,
    compress: bool,
    bedgraph: bool,
    cov_fasta: bool,
    suffix: String,
    output_dir: Option<PathBuf>,
    max_depth: usize,
    reference: Option<PathBuf>,
    threads: usize,
    hts_threads: usize,
    fail_fast: bool,
}

impl Config {
    pub fn new(input_files: Vec<PathBuf>, regions: Vec<Region>) -> Self {
        Self {
            input_files,
            regions,
            min_mapq: DEFAULT_MIN_MAPQ,
            min_qual: DEFAULT_MIN_QUAL,
            keep_duplicates: false,
            compress: false,
            bedgraph: false,
            cov_fasta: false,
            suffix: String::new(),
            output_dir: None,
            max_depth: DEFAULT_MAX_DEPTH,
            reference: None,
            threads: 1,
            hts_threads: 0,
            fail_fast: false,
        }
    }

    pub fn set_min_mapq(&mut self, x: u8) {
        self.min_mapq = x
    }

    pub fn set_min_qual(&mut self, x: u8) {
        self.min_qual = x
    }

    pub fn set_keep_duplicates(&mut self, x: bool) {
        self.keep_duplicates = x
    }

    pub fn set_compress(&mut self, x: bool) {
        self.compress = x
    }

    pub fn set_outputs(&mut self, bedgraph: bool, cov_fasta: bool) {
        self.bedgraph = bedgraph;
        self.cov_fasta = cov_fasta;
    }

    /// A leading '.' is added to the suffix if not already present
    pub fn set_suffix(&mut self, s: &str) {
        self.suffix = if s.is_empty() || s.starts_with('.') {
            s.to_owned()
        } else {
            format!(".{}", s)
        }
    }

    pub fn set_output_dir<P: AsRef<Path>>(&mut self, dir: P) {
        self.output_dir = Some(dir.as_ref().to_owned())
    }

    pub fn set_max_depth(&mut self, x: usize) -> anyhow::Result<()> {
        if x == 0 {
            Err(anyhow!("Maximum histogram depth must be > 0"))
        } else {
            self.max_depth = x;
            Ok(())
        }
    }

    pub fn set_reference<P: AsRef<Path>>(&mut self, p: P) {
        self.reference = Some(p.as_ref().to_owned())
    }

    pub fn set_threads(&mut self, n: usize) {
        self.threads = n.max(1)
    }

    pub fn set_hts_threads(&mut self, n: usize) {
        self.hts_threads = n
    }

    pub fn set_fail_fast(&mut self, x: bool) {
        self.fail_fast = x
    }

    pub fn input_files(&self) -> &[PathBuf] {
        &self.input_files
    }
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
    pub fn min_mapq(&self) -> u8 {
        self.min_mapq
    }
    pub fn min_qual(&self) -> u8 {
        self.min_qual
    }
    pub fn keep_duplicates(&self) -> bool {
        self.keep_duplicates
    }
    pub fn compress(&self) -> bool {
        self.compress
    }
    pub fn bedgraph(&self) -> bool {
        self.bedgraph
    }
    pub fn cov_fasta(&self) -> bool {
        self.cov_fasta
    }
    pub fn suffix(&self) -> &str {
        &self.suffix
    }
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
    pub fn reference(&self) -> Option<&Path> {
        self.reference.as_deref()
    }
    pub fn threads(&self) -> usize {
        self.threads
    }
    pub fn hts_threads(&self) -> usize {
        self.hts_threads
    }
    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }
}

/// Settings read from a TOML config file
///
/// All entries are optional.  Command line options take precedence.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub inputs: Option<Vec<PathBuf>>,
    pub min_mapq: Option<u8>,
    pub min_base_qual: Option<u8>,
    pub keep_duplicates: Option<bool>,
    pub compress: Option<bool>,
    pub bed: Option<PathBuf>,
    pub regions: Option<Vec<String>>,
    pub bedgraph: Option<bool>,
    pub cov_fasta: Option<bool>,
    pub suffix: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub max_depth: Option<usize>,
    pub reference: Option<PathBuf>,
    pub threads: Option<usize>,
    pub hts_threads: Option<usize>,
    pub fail_fast: Option<bool>,
}

impl ConfigFile {
    pub fn from_path<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let p = p.as_ref();
        debug!("Reading configuration from {}", p.display());
        let s = fs::read_to_string(p)
            .with_context(|| format!("Could not read config file {}", p.display()))?;
        toml::from_str(&s).with_context(|| format!("Error parsing config file {}", p.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn suffix_gets_leading_dot() {
        let mut cfg = Config::new(Vec::new(), Vec::new());
        cfg.set_suffix("v2");
        assert_eq!(cfg.suffix(), ".v2");
        cfg.set_suffix(".v3");
        assert_eq!(cfg.suffix(), ".v3");
        cfg.set_suffix("");
        assert_eq!(cfg.suffix(), "");
    }

    #[test]
    fn defaults() {
        let mut cfg = Config::new(Vec::new(), Vec::new());
        assert_eq!((cfg.min_mapq(), cfg.min_qual(), cfg.max_depth()), (20, 20, 1000));
        assert!(!cfg.keep_duplicates() && !cfg.bedgraph() && !cfg.cov_fasta());
        assert_eq!(cfg.threads(), 1);
        assert!(cfg.set_max_depth(0).is_err());
    }

    #[test]
    fn config_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
inputs = ["a.bam", "b.bam"]
min_mapq = 30
keep_duplicates = true
regions = ["1:100-200", "2:5-10"]
bedgraph = true
suffix = "hq"
"#
        )
        .unwrap();
        f.flush().unwrap();
        let c = ConfigFile::from_path(f.path()).unwrap();
        assert_eq!(c.inputs.as_ref().map(|v| v.len()), Some(2));
        assert_eq!(c.min_mapq, Some(30));
        assert_eq!(c.min_base_qual, None);
        assert_eq!(c.keep_duplicates, Some(true));
        assert_eq!(c.regions.as_ref().map(|v| v.len()), Some(2));
        assert_eq!(c.suffix.as_deref(), Some("hq"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "min_mapping_quality = 30").unwrap();
        f.flush().unwrap();
        assert!(ConfigFile::from_path(f.path()).is_err());
    }
}
