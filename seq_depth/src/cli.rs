use std::{num::NonZeroUsize, path::PathBuf};

use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};

use utils::{init_log, LogLevel};

use crate::{
    config::{Config, ConfigFile, DEFAULT_MAX_DEPTH, DEFAULT_MIN_MAPQ, DEFAULT_MIN_QUAL},
    output::setup_output,
    region::{normalize, parse_region, read_bed_file, Region},
};

/// Set up definition of command options for clap
fn cli_model() -> Command {
    Command::new("seq_depth")
        .about("Calculate per base sequencing depth from SAM/BAM/CRAM files")
        .version(crate_version!())
        .author("Simon Heath")
        .arg(
            Arg::new("timestamp")
                .short('X')
                .long("timestamp")
                .value_parser(value_parser!(stderrlog::Timestamp))
                .value_name("GRANULARITY")
                .default_value("none")
                .help("Prepend log entries with a timestamp"),
        )
        .arg(
            Arg::new("loglevel")
                .short('l')
                .long("loglevel")
                .value_name("LOGLEVEL")
                .value_parser(value_parser!(LogLevel))
                .ignore_case(true)
                .default_value("warn")
                .help("Set log level"),
        )
        .arg(
            Arg::new("quiet")
                .action(ArgAction::SetTrue)
                .long("quiet")
                .conflicts_with("loglevel")
                .help("Silence all output"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .value_name("FILE")
                .help("Read settings from TOML file (command line options take precedence)"),
        )
        .arg(
            Arg::new("min_mapq")
                .short('q')
                .long("min-mapq")
                .value_parser(value_parser!(u8))
                .value_name("INT")
                .help(format!("Minimum mapping quality [default: {}]", DEFAULT_MIN_MAPQ)),
        )
        .arg(
            Arg::new("min_qual")
                .short('Q')
                .long("min-base-qual")
                .value_parser(value_parser!(u8))
                .value_name("INT")
                .help(format!("Minimum base quality [default: {}]", DEFAULT_MIN_QUAL)),
        )
        .arg(
            Arg::new("keep_duplicates")
                .short('D')
                .long("keep-duplicates")
                .action(ArgAction::SetTrue)
                .help("Do not discard reads flagged as duplicates"),
        )
        .arg(
            Arg::new("compress")
                .short('z')
                .long("compress")
                .action(ArgAction::SetTrue)
                .help("Compress bedGraph and covfasta output with gzip"),
        )
        .arg(
            Arg::new("bed")
                .short('b')
                .long("bed")
                .value_parser(value_parser!(PathBuf))
                .value_name("FILE")
                .help("BED file with regions to process"),
        )
        .arg(
            Arg::new("region")
                .short('r')
                .long("region")
                .value_parser(value_parser!(String))
                .value_name("REGION")
                .action(ArgAction::Append)
                .help("Region to process (contig:start-end, 1 based, inclusive)"),
        )
        .arg(
            Arg::new("cov_fasta")
                .short('f')
                .long("cov-fasta")
                .action(ArgAction::SetTrue)
                .help("Generate covfasta output"),
        )
        .arg(
            Arg::new("bedgraph")
                .short('g')
                .long("bedgraph")
                .action(ArgAction::SetTrue)
                .help("Generate bedGraph output"),
        )
        .arg(
            Arg::new("suffix")
                .short('s')
                .long("suffix")
                .value_parser(value_parser!(String))
                .value_name("STRING")
                .help("Suffix added to output file names"),
        )
        .arg(
            Arg::new("output_dir")
                .short('o')
                .long("output-dir")
                .value_parser(value_parser!(PathBuf))
                .value_name("DIR")
                .help("Output directory [default: directory of input file]"),
        )
        .arg(
            Arg::new("max_depth")
                .short('m')
                .long("max-depth")
                .value_parser(value_parser!(usize))
                .value_name("INT")
                .help(format!(
                    "Depths at or above this are grouped together in the report [default: {}]",
                    DEFAULT_MAX_DEPTH
                )),
        )
        .arg(
            Arg::new("reference")
                .short('T')
                .long("reference")
                .value_parser(value_parser!(PathBuf))
                .value_name("FILE")
                .help("Reference FASTA file (for CRAM input)"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_parser(value_parser!(NonZeroUsize))
                .value_name("INT")
                .help("Number of input files processed in parallel [default: 1]"),
        )
        .arg(
            Arg::new("hts_threads")
                .short('H')
                .long("hts-threads")
                .value_parser(value_parser!(usize))
                .value_name("INT")
                .help("Decompression threads per input file [default: 0]"),
        )
        .arg(
            Arg::new("fail_fast")
                .long("fail-fast")
                .action(ArgAction::SetTrue)
                .help("Stop all processing after the first failed input file"),
        )
        .arg(
            Arg::new("input")
                .value_parser(value_parser!(PathBuf))
                .value_name("INPUT")
                .num_args(1..)
                .help("Input SAM/BAM/CRAM files (must be sorted and indexed)"),
        )
}

/// Regions from the command line take precedence over those from the config file
fn get_regions(m: &ArgMatches, cf: &ConfigFile) -> anyhow::Result<Vec<Region>> {
    let cli_regions: Vec<&String> = m
        .get_many::<String>("region")
        .map(|v| v.collect())
        .unwrap_or_default();
    let cli_bed = m.get_one::<PathBuf>("bed");

    let (regions, bed): (Vec<&String>, _) = if cli_regions.is_empty() && cli_bed.is_none() {
        (
            cf.regions.as_ref().map(|v| v.iter().collect()).unwrap_or_default(),
            cf.bed.as_ref(),
        )
    } else {
        (cli_regions, cli_bed)
    };

    let mut v = match bed {
        Some(p) => read_bed_file(p)?,
        None => Vec::new(),
    };
    for s in regions {
        v.push(parse_region(s)?)
    }
    let n = v.len();
    let v = normalize(v);
    if n > 0 {
        debug!("{} regions read, {} after merging", n, v.len());
    }
    Ok(v)
}

/// Build Config from command line matches and optional config file
fn make_config(m: &ArgMatches) -> anyhow::Result<Config> {
    let cf = match m.get_one::<PathBuf>("config") {
        Some(p) => ConfigFile::from_path(p)?,
        None => ConfigFile::default(),
    };

    let input_files: Vec<PathBuf> = match m.get_many::<PathBuf>("input") {
        Some(v) => v.cloned().collect(),
        None => cf.inputs.clone().unwrap_or_default(),
    };
    if input_files.is_empty() {
        return Err(anyhow!("No input files specified"));
    }

    let regions = get_regions(m, &cf)?;
    let mut cfg = Config::new(input_files, regions);

    if let Some(x) = m.get_one::<u8>("min_mapq").copied().or(cf.min_mapq) {
        cfg.set_min_mapq(x)
    }
    if let Some(x) = m.get_one::<u8>("min_qual").copied().or(cf.min_base_qual) {
        cfg.set_min_qual(x)
    }
    if let Some(x) = m.get_one::<usize>("max_depth").copied().or(cf.max_depth) {
        cfg.set_max_depth(x)?
    }
    cfg.set_keep_duplicates(m.get_flag("keep_duplicates") || cf.keep_duplicates.unwrap_or(false));
    cfg.set_compress(m.get_flag("compress") || cf.compress.unwrap_or(false));
    cfg.set_outputs(
        m.get_flag("bedgraph") || cf.bedgraph.unwrap_or(false),
        m.get_flag("cov_fasta") || cf.cov_fasta.unwrap_or(false),
    );
    cfg.set_fail_fast(m.get_flag("fail_fast") || cf.fail_fast.unwrap_or(false));

    if let Some(s) = m.get_one::<String>("suffix").or(cf.suffix.as_ref()) {
        cfg.set_suffix(s)
    }
    if let Some(p) = m.get_one::<PathBuf>("output_dir").or(cf.output_dir.as_ref()) {
        cfg.set_output_dir(p)
    }
    if let Some(p) = m.get_one::<PathBuf>("reference").or(cf.reference.as_ref()) {
        cfg.set_reference(p)
    }

    // Set up threads
    let nt = m
        .get_one::<NonZeroUsize>("threads")
        .map(|x| usize::from(*x))
        .or(cf.threads)
        .unwrap_or(1);
    let ncpus = num_cpus::get();
    if nt > ncpus {
        warn!(
            "Requested threads ({}) is greater than the number of available cores ({})",
            nt, ncpus
        );
    }
    cfg.set_threads(nt);
    if let Some(x) = m.get_one::<usize>("hts_threads").copied().or(cf.hts_threads) {
        cfg.set_hts_threads(x)
    }

    setup_output(&cfg)?;
    Ok(cfg)
}

/// Handle command line options.  Set up Config structure
pub fn handle_cli() -> anyhow::Result<Config> {
    // Get matches from command line
    let m = cli_model().get_matches();

    // Setup logging
    init_log(&m)?;

    debug!("Processing command line options");
    make_config(&m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_from(args: &[&str]) -> anyhow::Result<Config> {
        let m = cli_model().try_get_matches_from(args)?;
        make_config(&m)
    }

    #[test]
    fn defaults_from_command_line() {
        let cfg = config_from(&["seq_depth", "a.bam"]).unwrap();
        assert_eq!(cfg.input_files(), &[PathBuf::from("a.bam")]);
        assert_eq!((cfg.min_mapq(), cfg.min_qual()), (20, 20));
        assert_eq!(cfg.max_depth(), 1000);
        assert_eq!(cfg.threads(), 1);
        assert!(cfg.regions().is_empty());
        assert!(!cfg.bedgraph() && !cfg.cov_fasta() && !cfg.compress());
    }

    #[test]
    fn no_input_is_an_error() {
        assert!(config_from(&["seq_depth"]).is_err());
    }

    #[test]
    fn regions_are_merged() {
        let cfg = config_from(&[
            "seq_depth",
            "-r",
            "1:50-120",
            "-r",
            "1:100-200",
            "--region",
            "2:1-10",
            "-q",
            "30",
            "-g",
            "a.bam",
        ])
        .unwrap();
        let v: Vec<_> = cfg.regions().iter().map(|r| r.to_string()).collect();
        assert_eq!(v, vec!["1:50-200", "2:1-10"]);
        assert_eq!(cfg.min_mapq(), 30);
        assert!(cfg.bedgraph());
    }

    #[test]
    fn bad_region_is_an_error() {
        assert!(config_from(&["seq_depth", "-r", "1:200-100", "a.bam"]).is_err());
        assert!(config_from(&["seq_depth", "-r", "chr1", "a.bam"]).is_err());
        assert!(config_from(&["seq_depth", "-m", "0", "a.bam"]).is_err());
    }

    #[test]
    fn command_line_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("depth.toml");
        let mut f = std::fs::File::create(&cfg_path).unwrap();
        writeln!(
            f,
            r#"
inputs = ["x.bam", "y.bam"]
min_mapq = 5
min_base_qual = 7
regions = ["3:1-100"]
cov_fasta = true
threads = 2
"#
        )
        .unwrap();
        drop(f);
        let p = cfg_path.to_str().unwrap();

        let cfg = config_from(&["seq_depth", "-c", p]).unwrap();
        assert_eq!(cfg.input_files().len(), 2);
        assert_eq!((cfg.min_mapq(), cfg.min_qual()), (5, 7));
        assert_eq!(cfg.regions()[0].to_string(), "3:1-100");
        assert!(cfg.cov_fasta());
        assert_eq!(cfg.threads(), 2);

        let cfg = config_from(&["seq_depth", "-c", p, "-q", "40", "-r", "4:1-5", "z.bam"]).unwrap();
        assert_eq!(cfg.input_files(), &[PathBuf::from("z.bam")]);
        assert_eq!((cfg.min_mapq(), cfg.min_qual()), (40, 7));
        assert_eq!(cfg.regions().len(), 1);
        assert_eq!(cfg.regions()[0].to_string(), "4:1-5");
    }
}
