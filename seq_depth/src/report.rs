use std::io::Write;

use crate::{accumulator::ReadStats, sink::Histogram};

const SEPARATOR: &str =
    "#-----------------------------------------------------------------------------------------#";

/// Write read counts and depth distribution
pub fn write_report<W: Write>(wrt: &mut W, stats: &ReadStats, hist: &Histogram) -> anyhow::Result<()> {
    writeln!(wrt, "Total Reads Paired:\t{}", stats.paired)?;
    writeln!(
        wrt,
        "Total Paired Reads With Mapped Mates:\t{}",
        stats.paired_mapped_mate
    )?;
    writeln!(wrt, "Duplicate Reads:\t{}", stats.duplicates)?;
    writeln!(wrt, "Total aligned bases:\t{}", stats.aligned_bases)?;

    writeln!(wrt, "{}", SEPARATOR)?;
    writeln!(wrt, "Coverage\tCount\tCumulative Below\tCumulative Above")?;
    // Cumulative Below excludes the row's own depth; Cumulative Above includes it
    let below = hist.cumulative_below();
    let at_least = hist.cumulative_at_least();
    for (d, ((n, b), a)) in hist
        .counts()
        .iter()
        .zip(below.iter())
        .zip(at_least.iter())
        .enumerate()
    {
        writeln!(wrt, "{}\t{}\t{}\t{}", d, n, b, a)?
    }
    writeln!(wrt, "{}", SEPARATOR)?;
    wrt.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        region::Contig,
        sink::{DepthSink, DepthSpan},
    };

    #[test]
    fn report_layout() {
        let mut hist = Histogram::new(2);
        for (a, b, d) in [(0, 6, 0), (6, 9, 1), (9, 10, 7)] {
            hist.mark_depth(&DepthSpan {
                ctg: Contig::from("1"),
                start: a,
                end: b,
                depth: d,
            })
            .unwrap();
        }
        let stats = ReadStats {
            paired: 4,
            paired_mapped_mate: 3,
            duplicates: 1,
            aligned_bases: 400,
        };
        let mut buf = Vec::new();
        write_report(&mut buf, &stats, &hist).unwrap();
        let s = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = s.lines().collect();
        assert_eq!(lines[0], "Total Reads Paired:\t4");
        assert_eq!(lines[1], "Total Paired Reads With Mapped Mates:\t3");
        assert_eq!(lines[2], "Duplicate Reads:\t1");
        assert_eq!(lines[3], "Total aligned bases:\t400");
        assert_eq!(lines[4], SEPARATOR);
        assert_eq!(&lines[6..9], &["0\t6\t0\t10", "1\t3\t6\t4", "2\t1\t9\t1"]);
        assert_eq!(lines[9], SEPARATOR);
        assert_eq!(lines.len(), 10);
    }
}
