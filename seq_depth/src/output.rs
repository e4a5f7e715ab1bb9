use anyhow::Context;
use compress_io::{compress::CompressIo, compress_type::CompressType};
use std::{
    collections::HashMap,
    ffi::OsString,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::config::Config;

/// Output file prefix for an input file
///
/// A trailing .bam or .cram is removed from the input path, the suffix is
/// appended, and if an output directory is set the file name is placed there
pub fn output_prefix(cfg: &Config, input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = [".bam", ".BAM", ".cram", ".CRAM"]
        .iter()
        .find_map(|ext| name.strip_suffix(*ext))
        .unwrap_or(name.as_str());
    let mut fname = OsString::from(stem);
    fname.push(cfg.suffix());
    match cfg.output_dir() {
        Some(d) => d.join(fname),
        None => input.with_file_name(fname),
    }
}

fn add_ext(prefix: &Path, ext: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_owned();
    s.push(ext);
    PathBuf::from(s)
}

/// Create output directory if required, and check that no two inputs
/// would write to the same output files
pub fn setup_output(cfg: &Config) -> anyhow::Result<()> {
    if let Some(d) = cfg.output_dir() {
        if !d.exists() {
            fs::create_dir_all(d)
                .with_context(|| format!("Error creating output directory {}", d.display()))?;
        }
    }
    let mut h = HashMap::new();
    for p in cfg.input_files() {
        let prefix = output_prefix(cfg, p);
        if let Some(q) = h.insert(prefix.clone(), p) {
            return Err(anyhow!(
                "Input files {} and {} would both write output to {}",
                q.display(),
                p.display(),
                prefix.display()
            ));
        }
    }
    Ok(())
}

/// Open a coverage track file (<prefix>.<ext>, with .gz added if compressing)
pub fn open_track(cfg: &Config, prefix: &Path, ext: &str) -> anyhow::Result<Box<dyn Write>> {
    let path = if cfg.compress() {
        add_ext(prefix, &format!(".{}.gz", ext))
    } else {
        add_ext(prefix, &format!(".{}", ext))
    };
    trace!("Opening output file {}", path.display());
    let mut cio = CompressIo::new();
    cio.path(&path);
    if cfg.compress() {
        cio.ctype(CompressType::Gzip);
    }
    let wrt = cio
        .bufwriter()
        .with_context(|| format!("Problem creating output file {}", path.display()))?;
    Ok(Box::new(wrt))
}

/// Open the (uncompressed) report file <prefix>.report
pub fn open_report(prefix: &Path) -> anyhow::Result<Box<dyn Write>> {
    let path = add_ext(prefix, ".report");
    trace!("Opening report file {}", path.display());
    let wrt = CompressIo::new()
        .path(&path)
        .bufwriter()
        .with_context(|| format!("Problem creating report file {}", path.display()))?;
    Ok(Box::new(wrt))
}
