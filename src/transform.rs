//! Raw-signal transformer: instrument export → rescaled three-column table.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::TransformConfig;
use crate::data::loader::parse_number;
use crate::data::writer::write_sci_table;
use crate::error::LoopError;

/// One data row of a raw export after rescaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalRow {
    pub freq1: f64,
    pub volt1: f64,
    pub volt2: f64,
}

impl SignalRow {
    fn values(&self) -> Vec<f64> {
        vec![self.freq1, self.volt1, self.volt2]
    }
}

/// Parse and rescale the data section of a raw export.
///
/// The first `skip_lines` lines are instrument metadata.  Every following
/// row must carry Freq1, Volt1, Freq2 and Volt2 in its first four columns;
/// further columns are ignored.  Freq2 is validated but not kept.
pub fn transform_text(text: &str, cfg: &TransformConfig) -> Result<Vec<SignalRow>> {
    let Ok(delimiter) = u8::try_from(cfg.delimiter) else {
        bail!("delimiter {:?} is not a single-byte character", cfg.delimiter);
    };

    let body: String = text.split_inclusive('\n').skip(cfg.skip_lines).collect();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("data row {row_no}"))?;
        let line = cfg.skip_lines
            + record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(row_no + 1);

        let cell = |column: usize| -> Result<f64, LoopError> {
            let tok = record
                .get(column)
                .ok_or_else(|| LoopError::parse(line, column, "<missing>"))?;
            parse_number(tok, line, column)
        };

        let freq1 = cell(0)?;
        let volt1 = cell(1)?;
        cell(2)?;
        let volt2 = cell(3)?;

        rows.push(SignalRow {
            freq1,
            volt1: cfg.volt1.apply(volt1),
            volt2: cfg.volt2.apply(volt2),
        });
    }

    Ok(rows)
}

/// Transform one raw file into `<output_dir>/<stem>.dat`.
///
/// Returns the written path.  Nothing is written when the input fails to
/// parse.
pub fn transform_file(input: &Path, output_dir: &Path, cfg: &TransformConfig) -> Result<PathBuf> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let rows = transform_text(&text, cfg)?;

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("no usable file name in {}", input.display()))?;
    let output = output_dir.join(format!("{stem}.dat"));

    let table: Vec<Vec<f64>> = rows.iter().map(SignalRow::values).collect();
    write_sci_table(&output, &table)?;
    Ok(output)
}
