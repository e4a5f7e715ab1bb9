use std::{
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::Context;

use crate::{
    accumulator::{Accumulator, ReadFilter, ReadStats},
    config::Config,
    input::{open_input, AlignmentSource},
    output::{open_report, open_track, output_prefix},
    record::Record,
    region::Region,
    report::write_report,
    sink::{Aggregator, BedGraphSink, CovFastaSink, DepthSink, Histogram},
};

/// Shared flag used to stop workers early
///
/// Checked at every region boundary and between records
#[derive(Debug, Default)]
pub struct CancelToken(AtomicBool);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.is_cancelled() {
            Err(anyhow!("Processing cancelled"))
        } else {
            Ok(())
        }
    }
}

/// Calculate depth over all regions for one alignment source
///
/// If no regions are configured, every contig in the source's sequence
/// dictionary is processed in full.  Every depth span goes to hist and to
/// all the track sinks.  Sinks are finished (and so closed) on success.
pub fn calc_depth<S: AlignmentSource>(
    cfg: &Config,
    src: &mut S,
    hist: &mut Histogram,
    tracks: Vec<&mut dyn DepthSink>,
    cancel: &CancelToken,
) -> anyhow::Result<ReadStats> {
    let whole_genome;
    let regions: &[Region] = if cfg.regions().is_empty() {
        whole_genome = src.whole_genome_regions()?;
        debug!(
            "No regions specified: using {} contigs from input",
            whole_genome.len()
        );
        &whole_genome
    } else {
        cfg.regions()
    };

    let mut acc = Accumulator::new(ReadFilter::from_config(cfg));
    let mut agg = Aggregator::new();
    agg.add_client(hist);
    for t in tracks {
        agg.add_client(t)
    }

    let mut rec = Record::new();
    let mut n_recs: u64 = 0;
    for reg in regions {
        cancel.check()?;
        debug!("Processing region {} ({} bases)", reg, reg.len());
        agg.start_region(reg)?;
        acc.start_region(reg);
        let mut rdr = src.query(reg)?;
        match rdr.as_mut() {
            Some(r) => {
                while r.read(&mut rec)? {
                    cancel.check()?;
                    acc.add_record(&rec, &mut agg)?;
                    n_recs += 1;
                }
            }
            None => warn!("Contig {} not found in input file", reg.ctg()),
        }
        acc.finish_region(&mut agg)?;
        agg.finish_region(reg)?;
        drop(rdr);
    }
    agg.finish()?;
    debug!("{} records read from {} regions", n_recs, regions.len());
    Ok(*acc.stats())
}

/// Process one input file, writing the requested tracks and the report
pub fn process_file(cfg: &Config, input: &Path, cancel: &CancelToken) -> anyhow::Result<ReadStats> {
    info!("Processing {}", input.display());
    let prefix = output_prefix(cfg, input);

    let mut src = open_input(input, cfg.reference(), cfg.hts_threads())?;

    let mut bedgraph = if cfg.bedgraph() {
        Some(BedGraphSink::new(open_track(cfg, &prefix, "bedgraph")?))
    } else {
        None
    };
    let mut cov_fasta = if cfg.cov_fasta() {
        Some(CovFastaSink::new(open_track(cfg, &prefix, "covfasta")?))
    } else {
        None
    };
    let mut tracks: Vec<&mut dyn DepthSink> = Vec::with_capacity(2);
    if let Some(s) = bedgraph.as_mut() {
        tracks.push(s)
    }
    if let Some(s) = cov_fasta.as_mut() {
        tracks.push(s)
    }

    let mut hist = Histogram::new(cfg.max_depth());
    let stats = calc_depth(cfg, &mut src, &mut hist, tracks, cancel)
        .with_context(|| format!("Error calculating depth for {}", input.display()))?;
    drop(src);

    let mut report = open_report(&prefix)?;
    write_report(&mut report, &stats, &hist)
        .with_context(|| format!("Error writing report for {}", input.display()))?;

    info!(
        "Finished processing {}: {} reference positions processed",
        input.display(),
        hist.total()
    );
    Ok(stats)
}
