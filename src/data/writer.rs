use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::model::{BRANCH_HEADER, Branch, LoopParameters, SUMMARY_HEADER};

// ---------------------------------------------------------------------------
// CSV tables
// ---------------------------------------------------------------------------

/// Write `rows` as CSV under an explicit header.
///
/// The header is written even when `rows` is empty.
fn write_table<'a, T, I>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    writer.write_record(header).context("writing CSV header")?;
    for row in rows {
        writer.serialize(row).context("writing CSV row")?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

/// Persist a branch as an `E,D` table.
pub fn write_branch(path: &Path, branch: &Branch) -> Result<()> {
    write_table(path, &BRANCH_HEADER, &branch.samples)
}

/// Write the `Filename,Ec,Slope,Ps` summary.
pub fn write_summary(path: &Path, rows: &[LoopParameters]) -> Result<()> {
    write_table(path, &SUMMARY_HEADER, rows)
}

// ---------------------------------------------------------------------------
// Fixed-width scientific text
// ---------------------------------------------------------------------------

/// Format a value as `d.dddde±XX`: four decimals, explicit exponent sign,
/// at least two exponent digits (`1.2345e+03`, `-5.0000e-07`).
pub fn format_sci(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let raw = format!("{value:.4e}");
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => raw,
    }
}

/// Write rows of numbers as space-separated scientific text without header.
pub fn write_sci_table(path: &Path, rows: &[Vec<f64>]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for row in rows {
        let line: Vec<String> = row.iter().map(|&v| format_sci(v)).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    out.flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_branch;
    use crate::data::model::{BranchKind, Sample};

    #[test]
    fn sci_format_matches_fixed_width() {
        assert_eq!(format_sci(1234.5), "1.2345e+03");
        assert_eq!(format_sci(-5e-7), "-5.0000e-07");
        assert_eq!(format_sci(0.0), "0.0000e+00");
        assert_eq!(format_sci(1.0e120), "1.0000e+120");
        assert_eq!(format_sci(f64::NAN), "nan");
    }

    #[test]
    fn empty_summary_is_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        write_summary(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Filename,Ec,Slope,Ps\n");
    }

    #[test]
    fn branch_table_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upper_x.csv");
        let branch = Branch::new(
            BranchKind::Upper,
            vec![Sample::new(-1.5, 0.25), Sample::new(2.0, 1e-7)],
        );
        write_branch(&path, &branch).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("E,D\n"));
        assert_eq!(load_branch(&path, BranchKind::Upper).unwrap(), branch);
    }

    #[test]
    fn sci_table_is_space_separated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.dat");
        write_sci_table(&path, &[vec![1000.0, 0.2, -0.5]]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "1.0000e+03 2.0000e-01 -5.0000e-01\n"
        );
    }
}
