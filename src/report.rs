use crate::interval::{CnvInterval, SourceMask, DETAIL_SEPARATOR};
use crate::merge::MergeStats;
use crate::pool::IntervalPool;
use log::info;
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Which intervals of the pool a report contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportView {
    /// Every interval ever created, with its merge target for lineage reconstruction
    All,
    /// Only the intervals that were not absorbed into a merge
    Active,
}

impl ReportView {
    fn includes(self, interval: &CnvInterval) -> bool {
        match self {
            ReportView::All => true,
            ReportView::Active => !interval.is_retired(),
        }
    }
}

/// Column titles of the spreadsheet sheets; the TSV reports carry no header
pub const REPORT_COLUMNS: [&str; 8] = [
    "ID",
    "Chromosome",
    "Start",
    "End",
    "HitTag",
    "Rank",
    "mergeTo",
    "Detail",
];

#[derive(Serialize)]
struct ReportRow<'a> {
    id: usize,
    chromosome: &'a str,
    start: i32,
    end: i32,
    hit_tag: String,
    rank: u32,
    merge_to: Option<usize>,
    detail: &'a str,
}

impl<'a> From<&'a CnvInterval> for ReportRow<'a> {
    fn from(interval: &'a CnvInterval) -> Self {
        Self {
            id: interval.id(),
            chromosome: interval.chromosome(),
            start: interval.start(),
            end: interval.end(),
            hit_tag: interval.source_mask().to_string(),
            rank: interval.rank(),
            merge_to: interval.merge_target(),
            detail: interval.detail(),
        }
    }
}

fn csv_error(e: csv::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("Failed to write report row: {}", e))
}

/// Write one view of the pool as headerless TSV, one interval per line.
/// Details already hold tabs and are written unquoted.
pub fn write_report<W: Write>(pool: &IntervalPool, view: ReportView, writer: W) -> io::Result<usize> {
    let mut tsv = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer);

    let mut rows = 0;
    for interval in pool.iter().filter(|interval| view.includes(interval)) {
        tsv.serialize(ReportRow::from(interval)).map_err(csv_error)?;
        rows += 1;
    }
    tsv.flush()?;
    Ok(rows)
}

/// Write `<prefix>.all.tsv` and `<prefix>.tsv` (active intervals only)
pub fn write_reports(pool: &IntervalPool, prefix: &str) -> io::Result<(String, String)> {
    let all_path = format!("{}.all.tsv", prefix);
    let lite_path = format!("{}.tsv", prefix);

    for (path, view) in [(&all_path, ReportView::All), (&lite_path, ReportView::Active)] {
        let file = File::create(path).map_err(|e| {
            io::Error::new(e.kind(), format!("Failed to create '{}': {}", path, e))
        })?;
        let rows = write_report(pool, view, BufWriter::new(file))?;
        info!("Wrote {} intervals to {}", rows, path);
    }

    Ok((all_path, lite_path))
}

fn xlsx_error(e: XlsxError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("Failed to write spreadsheet: {}", e))
}

fn write_sheet(sheet: &mut Worksheet, pool: &IntervalPool, view: ReportView) -> Result<usize, XlsxError> {
    for (col, title) in (0u16..).zip(REPORT_COLUMNS) {
        sheet.write_string(0, col, title)?;
    }

    let mut rows: u32 = 0;
    for interval in pool.iter().filter(|interval| view.includes(interval)) {
        let row = rows + 1;
        sheet.write_number(row, 0, interval.id() as f64)?;
        sheet.write_string(row, 1, interval.chromosome())?;
        sheet.write_number(row, 2, interval.start())?;
        sheet.write_number(row, 3, interval.end())?;
        sheet.write_string(row, 4, interval.source_mask().to_string())?;
        sheet.write_number(row, 5, interval.rank())?;
        if let Some(target) = interval.merge_target() {
            sheet.write_number(row, 6, target as f64)?;
        }
        // One cell per interval, parent rows separated by tabs
        sheet.write_string(row, 7, interval.detail().replace(DETAIL_SEPARATOR, "\t"))?;
        rows += 1;
    }
    Ok(rows as usize)
}

/// Write both views into one workbook with the sheets `all` and `lite`.
/// Returns the number of intervals on each sheet.
pub fn write_xlsx(pool: &IntervalPool, path: &str) -> io::Result<(usize, usize)> {
    let mut workbook = Workbook::new();

    let mut counts = [0; 2];
    for (count, (name, view)) in counts
        .iter_mut()
        .zip([("all", ReportView::All), ("lite", ReportView::Active)])
    {
        let sheet = workbook.add_worksheet().set_name(name).map_err(xlsx_error)?;
        *count = write_sheet(sheet, pool, view).map_err(xlsx_error)?;
    }

    workbook.save(path).map_err(|e| {
        io::Error::new(io::ErrorKind::Other, format!("Failed to save '{}': {}", path, e))
    })?;
    info!(
        "Wrote {} intervals ({} active) to {}",
        counts[0], counts[1], path
    );
    Ok((counts[0], counts[1]))
}

/// Counts over the active intervals of a merged pool
#[derive(Debug, Default, PartialEq)]
pub struct PoolSummary {
    /// Active intervals per chromosome, in natural chromosome order
    pub per_chromosome: Vec<(String, usize)>,
    /// Active intervals per combination of contributing sources
    pub per_sources: Vec<(SourceMask, usize)>,
}

impl PoolSummary {
    pub fn from_pool(pool: &IntervalPool) -> Self {
        let mut per_chromosome: FxHashMap<&str, usize> = FxHashMap::default();
        let mut per_sources: FxHashMap<SourceMask, usize> = FxHashMap::default();
        for interval in pool.active() {
            *per_chromosome.entry(interval.chromosome()).or_default() += 1;
            *per_sources.entry(interval.source_mask()).or_default() += 1;
        }

        let mut per_chromosome: Vec<(String, usize)> = per_chromosome
            .into_iter()
            .map(|(chrom, count)| (chrom.to_string(), count))
            .collect();
        per_chromosome.sort_by(|a, b| natord::compare(&a.0, &b.0));

        let mut per_sources: Vec<(SourceMask, usize)> = per_sources.into_iter().collect();
        per_sources.sort();

        Self {
            per_chromosome,
            per_sources,
        }
    }
}

pub fn print_summary<W: Write>(
    pool: &IntervalPool,
    stats: &MergeStats,
    mut out: W,
) -> io::Result<()> {
    let summary = PoolSummary::from_pool(pool);

    writeln!(out, "Raw intervals: {}", stats.raw_count)?;
    writeln!(out, "Merged intervals: {}", stats.merges)?;
    writeln!(out, "Active intervals: {}", stats.active_count)?;
    writeln!(out, "Merge rounds: {}", stats.rounds)?;

    if !summary.per_chromosome.is_empty() {
        writeln!(out, "\nActive intervals per chromosome:")?;
        for (chrom, count) in &summary.per_chromosome {
            writeln!(out, "{}\t{}", chrom, count)?;
        }

        writeln!(out, "\nActive intervals per source combination:")?;
        for (mask, count) in &summary.per_sources {
            writeln!(out, "{}\t{}", mask, count)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{merge_trio, MergeConfig};

    fn merged_pool() -> (IntervalPool, MergeStats) {
        let proband = vec![vec!["chr1", "100", "200", "DUP"], vec!["chr10", "0", "50"]];
        let father = vec![vec!["chr1", "110", "190"]];
        let mother = vec![vec!["chr2", "5", "10"]];
        merge_trio(&MergeConfig::default(), &proband, &father, &mother).unwrap()
    }

    #[test]
    fn test_write_all_view() {
        let (pool, _) = merged_pool();
        let mut out = Vec::new();
        assert_eq!(write_report(&pool, ReportView::All, &mut out).unwrap(), 5);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "0\tchr1\t100\t200\t001\t1\t4\t001\tchr1\t100\t200\tDUP");
        assert_eq!(lines[2], "2\tchr1\t110\t190\t010\t1\t4\t010\tchr1\t110\t190");
        assert_eq!(
            lines[4],
            "4\tchr1\t100\t200\t011\t2\t\t001\tchr1\t100\t200\tDUP<br>010\tchr1\t110\t190"
        );
    }

    #[test]
    fn test_write_active_view() {
        let (pool, _) = merged_pool();
        let mut out = Vec::new();
        assert_eq!(write_report(&pool, ReportView::Active, &mut out).unwrap(), 3);

        let text = String::from_utf8(out).unwrap();
        let ids: Vec<&str> = text
            .lines()
            .map(|line| line.split('\t').next().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "3", "4"]);
    }

    #[test]
    fn test_empty_pool_writes_nothing() {
        let pool = IntervalPool::new();
        let mut out = Vec::new();
        assert_eq!(write_report(&pool, ReportView::All, &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_write_xlsx() {
        let (pool, _) = merged_pool();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("trio.xlsx");
        let path = path.to_str().unwrap();

        assert_eq!(write_xlsx(&pool, path).unwrap(), (5, 3));
        // xlsx is a zip container
        let bytes = std::fs::read(path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_write_xlsx_empty_pool() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.xlsx");
        let path = path.to_str().unwrap();
        assert_eq!(write_xlsx(&IntervalPool::new(), path).unwrap(), (0, 0));
        assert!(std::path::Path::new(path).exists());
    }

    #[test]
    fn test_summary_counts() {
        let (pool, stats) = merged_pool();
        let summary = PoolSummary::from_pool(&pool);
        assert_eq!(
            summary.per_chromosome,
            vec![
                ("chr1".to_string(), 1),
                ("chr2".to_string(), 1),
                ("chr10".to_string(), 1)
            ]
        );
        assert_eq!(
            summary.per_sources,
            vec![
                (SourceMask::PROBAND, 1),
                (SourceMask::PROBAND | SourceMask::FATHER, 1),
                (SourceMask::MOTHER, 1)
            ]
        );

        let mut out = Vec::new();
        print_summary(&pool, &stats, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Raw intervals: 4\nMerged intervals: 1\nActive intervals: 3\n"));
        assert!(text.contains("chr10\t1"));
        assert!(text.contains("011\t1"));
    }
}
