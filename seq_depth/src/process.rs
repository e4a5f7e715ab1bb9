use std::{path::Path, thread};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::{
    accumulator::ReadStats,
    config::Config,
    worker::{process_file, CancelToken},
};

/// Result of processing one input file, tagged with the file index
type FileResult = (usize, anyhow::Result<ReadStats>);

fn process_task(
    cfg: &Config,
    ix: usize,
    cancel: &CancelToken,
    recv: Receiver<usize>,
    snd: Sender<FileResult>,
) -> anyhow::Result<()> {
    debug!("Process task {} starting up", ix);
    while let Ok(i) = recv.recv() {
        let path = &cfg.input_files()[i];
        trace!("Task {} received file {}", ix, path.display());
        let res = if cancel.is_cancelled() {
            Err(anyhow!("Not processed due to an earlier failure"))
        } else {
            process_file(cfg, path, cancel)
        };
        snd.send((i, res))?;
    }
    debug!("Process task {} closing down", ix);
    Ok(())
}

fn log_failure(path: &Path, e: &anyhow::Error) {
    error!("Processing of {} failed: {:#}", path.display(), e)
}

/// Process all input files using a pool of worker threads
///
/// Each file is handled completely by one worker.  A failure with one file
/// does not affect the others unless fail_fast is set, in which case the
/// remaining workers are cancelled.  Returns an error if any file failed.
pub fn process_samples(cfg: &Config) -> anyhow::Result<()> {
    let files = cfg.input_files();
    let nf = files.len();
    let nt = cfg.threads().min(nf).max(1);
    info!("Processing {} input files using {} worker threads", nf, nt);

    let cancel = CancelToken::default();

    // All jobs are queued up front; workers exit when the queue is empty
    let (send_job, recv_job) = bounded(nf.max(1));
    for i in 0..nf {
        send_job.send(i)?;
    }
    drop(send_job);

    let (send_res, recv_res) = bounded(nt * 2);

    let (total, n_done, n_failed) = thread::scope(|sc| -> anyhow::Result<(ReadStats, usize, usize)> {
        let cancel = &cancel;
        let join_handles: Vec<_> = (0..nt)
            .map(|ix| {
                let r = recv_job.clone();
                let s = send_res.clone();
                sc.spawn(move || process_task(cfg, ix + 1, cancel, r, s))
            })
            .collect();
        drop(send_res);

        let mut total = ReadStats::default();
        let (mut n_done, mut n_failed) = (0, 0);
        while let Ok((i, res)) = recv_res.recv() {
            n_done += 1;
            match res {
                Ok(stats) => total += stats,
                Err(e) => {
                    log_failure(&files[i], &e);
                    n_failed += 1;
                    if cfg.fail_fast() && !cancel.is_cancelled() {
                        warn!("Cancelling remaining work");
                        cancel.cancel()
                    }
                }
            }
        }

        for jh in join_handles {
            jh.join()
                .map_err(|_| anyhow!("Worker thread panicked"))??
        }
        Ok((total, n_done, n_failed))
    })?;

    info!(
        "Run totals - paired reads: {}, paired with mapped mates: {}, duplicates: {}, aligned bases: {}",
        total.paired, total.paired_mapped_mate, total.duplicates, total.aligned_bases
    );

    if n_failed > 0 || n_done < nf {
        Err(anyhow!(
            "{} of {} input files could not be processed",
            n_failed + nf - n_done,
            nf
        ))
    } else {
        info!("All {} input files processed", nf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::tests::write_test_bam;
    use std::path::PathBuf;

    fn missing_inputs(dir: &Path, n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| dir.join(format!("missing{}.bam", i))).collect()
    }

    #[test]
    fn failed_files_give_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::new(missing_inputs(dir.path(), 3), Vec::new());
        cfg.set_threads(2);
        let e = process_samples(&cfg).unwrap_err();
        assert_eq!(e.to_string(), "3 of 3 input files could not be processed");
    }

    #[test]
    fn fail_fast_still_accounts_for_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::new(missing_inputs(dir.path(), 5), Vec::new());
        cfg.set_fail_fast(true);
        let e = process_samples(&cfg).unwrap_err();
        assert_eq!(e.to_string(), "5 of 5 input files could not be processed");
        // Nothing is written for inputs that could not be opened
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn queued_files_are_skipped_once_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::new(missing_inputs(dir.path(), 2), Vec::new());
        let cancel = CancelToken::default();
        cancel.cancel();

        let (send_job, recv_job) = bounded(2);
        send_job.send(0).unwrap();
        send_job.send(1).unwrap();
        drop(send_job);
        let (send_res, recv_res) = bounded(2);
        process_task(&cfg, 1, &cancel, recv_job, send_res).unwrap();

        let v: Vec<FileResult> = recv_res.try_iter().collect();
        assert_eq!(v.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1]);
        for (_, res) in v {
            assert_eq!(
                res.unwrap_err().to_string(),
                "Not processed due to an earlier failure"
            );
        }
    }

    #[test]
    fn good_files_complete_after_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let bam = write_test_bam(dir.path());
        let mut inputs = missing_inputs(dir.path(), 1);
        inputs.push(bam);
        let mut cfg = Config::new(inputs, Vec::new());
        cfg.set_threads(2);
        let e = process_samples(&cfg).unwrap_err();
        assert_eq!(e.to_string(), "1 of 2 input files could not be processed");
        assert!(dir.path().join("test.report").exists());
        assert!(!dir.path().join("missing0.report").exists());
    }
}
