use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, Float32Array, Float64Array};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};

use super::model::{Branch, BranchKind, Sample, Trace};
use crate::error::LoopError;

// ---------------------------------------------------------------------------
// Column layout
// ---------------------------------------------------------------------------

/// Where to find E and D when the table has no `E` / `D` named columns.
///
/// Zero-based positions.  The defaults pick columns 1 and 2, which are the
/// rescaled Volt1 / Volt2 columns written by the raw-signal transformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceColumns {
    pub field: usize,
    pub response: usize,
}

impl Default for TraceColumns {
    fn default() -> Self {
        TraceColumns {
            field: 1,
            response: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load an E–D trace from a file.  Dispatch by extension.
///
/// * `.csv`           – comma separated, same column rules as text
/// * `.parquet`/`.pq` – Float64 or Float32 columns
/// * anything else    – whitespace separated text (`.dat`, `.txt`, ...)
pub fn load_trace(path: &Path, columns: &TraceColumns) -> Result<Trace> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => load_csv_trace(path, columns),
        "parquet" | "pq" => load_parquet_trace(path, columns),
        _ => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(parse_trace_text(&text, columns)?)
        }
    }
}

/// Read back a branch table written by [`super::writer::write_branch`].
pub fn load_branch(path: &Path, kind: BranchKind) -> Result<Branch> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let headers = reader.headers().context("reading branch header")?.clone();
    if headers.iter().ne(["E", "D"]) {
        bail!(
            "{}: expected header 'E,D', found '{}'",
            path.display(),
            headers.iter().collect::<Vec<_>>().join(",")
        );
    }

    let samples = reader
        .deserialize::<Sample>()
        .enumerate()
        .map(|(row, rec)| rec.with_context(|| format!("{}: row {}", path.display(), row + 1)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Branch::new(kind, samples))
}

// ---------------------------------------------------------------------------
// Whitespace-delimited text
// ---------------------------------------------------------------------------

/// Parse a whitespace-delimited table.
///
/// `#` starts a comment that runs to the end of the line; blank lines are
/// skipped.  The first remaining line is a header when it names an `E` or
/// `D` column, or when none of its tokens is a number.  Anything else is
/// data, so a corrupt first row is reported rather than dropped.
pub fn parse_trace_text(text: &str, columns: &TraceColumns) -> Result<Trace, LoopError> {
    let rows = text.lines().enumerate().filter_map(|(i, line)| {
        let content = line.split('#').next().unwrap_or("");
        let tokens: Vec<&str> = content.split_whitespace().collect();
        (!tokens.is_empty()).then_some((i + 1, tokens))
    });
    collect_trace(rows, columns)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn load_csv_trace(path: &Path, columns: &TraceColumns) -> Result<Trace> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(row_no + 1);
        if record.iter().all(str::is_empty) {
            continue;
        }
        records.push((line, record));
    }

    let rows = records
        .iter()
        .map(|(line, rec)| (*line, rec.iter().collect::<Vec<&str>>()));
    Ok(collect_trace(rows, columns)?)
}

// ---------------------------------------------------------------------------
// Shared row handling
// ---------------------------------------------------------------------------

fn collect_trace<'a, I>(rows: I, columns: &TraceColumns) -> Result<Trace, LoopError>
where
    I: IntoIterator<Item = (usize, Vec<&'a str>)>,
{
    let mut rows = rows.into_iter().peekable();
    let mut field_idx = columns.field;
    let mut response_idx = columns.response;

    // A first row is a header only if it names E/D or holds no number at all;
    // a partly numeric row is data and its bad cell must surface.
    let header = rows
        .peek()
        .map(|(_, first)| (named_column(first, "E"), named_column(first, "D"), first))
        .filter(|(named_field, named_response, first)| {
            named_field.is_some()
                || named_response.is_some()
                || !first.iter().any(|tok| tok.parse::<f64>().is_ok())
        })
        .map(|(named_field, named_response, _)| (named_field, named_response));

    if let Some((named_field, named_response)) = header {
        field_idx = named_field.unwrap_or(field_idx);
        response_idx = named_response.unwrap_or(response_idx);
        rows.next();
    }

    rows.map(|(line, tokens)| {
        let e = parse_cell(&tokens, line, field_idx)?;
        let d = parse_cell(&tokens, line, response_idx)?;
        Ok(Sample::new(e, d))
    })
    .collect()
}

fn named_column(header: &[&str], name: &str) -> Option<usize> {
    header.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn parse_cell(tokens: &[&str], line: usize, column: usize) -> Result<f64, LoopError> {
    let tok = tokens
        .get(column)
        .ok_or_else(|| LoopError::parse(line, column, "<missing>"))?;
    parse_number(tok, line, column)
}

/// Parse one token as a finite `f64`.
pub(crate) fn parse_number(tok: &str, line: usize, column: usize) -> Result<f64, LoopError> {
    match tok.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(LoopError::parse(line, column, tok)),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a trace from a Parquet file.
///
/// Columns named `E` and `D` are used when present, ignoring case like the
/// text and CSV loaders, otherwise the positional [`TraceColumns`].  Values may be Float64 or Float32; nulls are rejected.
fn load_parquet_trace(path: &Path, columns: &TraceColumns) -> Result<Trace> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut trace = Vec::new();
    let mut line = 0usize;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        let field_idx = named_column(&names, "E").unwrap_or(columns.field);
        let response_idx = named_column(&names, "D").unwrap_or(columns.response);

        if field_idx >= batch.num_columns() || response_idx >= batch.num_columns() {
            bail!(
                "Parquet file has {} columns, cannot read E from {} and D from {}",
                batch.num_columns(),
                field_idx,
                response_idx
            );
        }

        let e = column_values(batch.column(field_idx), line, field_idx)?;
        let d = column_values(batch.column(response_idx), line, response_idx)?;
        trace.extend(e.into_iter().zip(d).map(|(e, d)| Sample::new(e, d)));
        line += batch.num_rows();
    }

    Ok(trace)
}

/// Extract a float column as `Vec<f64>`; `offset` numbers rows across batches.
fn column_values(col: &Arc<dyn Array>, offset: usize, column: usize) -> Result<Vec<f64>> {
    let values: Vec<Option<f64>> =
        if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
            arr.iter().collect()
        } else if let Some(arr) = col.as_any().downcast_ref::<Float32Array>() {
            arr.iter().map(|v| v.map(f64::from)).collect()
        } else {
            bail!(
                "column {column} has type {:?}, expected Float64 or Float32",
                col.data_type()
            )
        };

    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v {
            Some(v) if v.is_finite() => Ok(v),
            other => Err(anyhow::Error::from(LoopError::parse(
                offset + row + 1,
                column,
                other.map_or_else(|| "null".to_string(), |v| v.to_string()),
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_header_selects_columns() {
        let text = "# exported by scope\nD  idx  E\n0.5 1 -2.0\n0.7 2 -1.0 # trailing note\n";
        let trace = parse_trace_text(text, &TraceColumns::default()).unwrap();
        assert_eq!(trace, vec![Sample::new(-2.0, 0.5), Sample::new(-1.0, 0.7)]);
    }

    #[test]
    fn unnamed_header_uses_positions() {
        let text = "Freq1 Volt1 Volt2\n1.0e+03 -3.0e+00 2.5e-01\n\n1.0e+03 3.0e+00 -2.5e-01\n";
        let trace = parse_trace_text(text, &TraceColumns::default()).unwrap();
        assert_eq!(trace, vec![Sample::new(-3.0, 0.25), Sample::new(3.0, -0.25)]);
    }

    #[test]
    fn numeric_first_line_is_data() {
        let text = "1.0 2.0 3.0\n4.0 5.0 6.0\n";
        let trace = parse_trace_text(text, &TraceColumns::default()).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[0], Sample::new(2.0, 3.0));
    }

    #[test]
    fn non_numeric_cell_reports_position() {
        let text = "x E D\n0 1.0 2.0\n0 abc 2.0\n";
        let err = parse_trace_text(text, &TraceColumns::default()).unwrap_err();
        assert_eq!(err, LoopError::parse(3, 1, "abc"));
    }

    #[test]
    fn short_row_is_a_parse_error() {
        let text = "x E D\n0 1.0\n";
        let err = parse_trace_text(text, &TraceColumns::default()).unwrap_err();
        assert!(matches!(err, LoopError::Parse { line: 2, column: 2, .. }));
    }

    #[test]
    fn nan_is_rejected() {
        assert!(parse_number("NaN", 1, 0).is_err());
        assert!(parse_number("inf", 1, 0).is_err());
        assert_eq!(parse_number(" 1.5e-3 ", 1, 0).unwrap(), 1.5e-3);
    }

    #[test]
    fn corrupt_first_row_is_not_taken_for_a_header() {
        let text = "1.0e+03 abc 2.0e-01\n1.0e+03 1.0e+00 3.0e-01\n";
        let err = parse_trace_text(text, &TraceColumns::default()).unwrap_err();
        assert_eq!(err, LoopError::parse(1, 1, "abc"));
    }

    #[test]
    fn partly_numeric_header_naming_columns_is_kept() {
        let text = "t0 E D 1\n0 -1.0 0.5 1\n";
        let trace = parse_trace_text(text, &TraceColumns::default()).unwrap();
        assert_eq!(trace, vec![Sample::new(-1.0, 0.5)]);
    }

    #[test]
    fn header_only_gives_empty_trace() {
        let trace = parse_trace_text("# nothing\nE D\n", &TraceColumns::default()).unwrap();
        assert!(trace.is_empty());
    }

    #[test]
    fn csv_trace_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.csv");
        std::fs::write(&path, "# comment\nE,D\n-1.0,0.5\n1.0,-0.5\n").unwrap();
        let trace = load_trace(&path, &TraceColumns::default()).unwrap();
        assert_eq!(trace, vec![Sample::new(-1.0, 0.5), Sample::new(1.0, -0.5)]);
    }

    fn write_parquet(dir: &Path, names: [&str; 2]) -> std::path::PathBuf {
        use arrow::array::ArrayRef;
        use arrow::datatypes::{DataType, Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let schema = Arc::new(Schema::new(vec![
            Field::new(names[0], DataType::Float64, false),
            Field::new(names[1], DataType::Float32, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(vec![0.25, -0.25])) as ArrayRef,
                Arc::new(Float32Array::from(vec![1.5f32, -1.5])) as ArrayRef,
            ],
        )
        .unwrap();

        let path = dir.join("loop.parquet");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        path
    }

    #[test]
    fn parquet_trace_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_parquet(dir.path(), ["D", "E"]);
        let trace = load_trace(&path, &TraceColumns::default()).unwrap();
        assert_eq!(trace, vec![Sample::new(1.5, 0.25), Sample::new(-1.5, -0.25)]);
    }

    #[test]
    fn parquet_column_names_ignore_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_parquet(dir.path(), ["d", "e"]);
        let trace = load_trace(&path, &TraceColumns::default()).unwrap();
        assert_eq!(trace, vec![Sample::new(1.5, 0.25), Sample::new(-1.5, -0.25)]);
    }
}
