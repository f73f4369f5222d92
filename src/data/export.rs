use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Float64Builder, Int64Array, ListBuilder, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Value as JsonValue};

use super::loader::SpectrumData;
use super::model::{MetadataValue, Spectrum};

/// Metadata column carrying the unit of the `x` axis.
pub const UNIT_COLUMN: &str = "frequency_unit";

// ---------------------------------------------------------------------------
// Spectrum rows
// ---------------------------------------------------------------------------

/// Turn a decoded file into one exportable row: the trace as `x` / `y`
/// plus every `METADATA` entry as a typed column.
pub fn to_spectrum(data: &SpectrumData) -> Result<Spectrum> {
    let series = data.spectrum().context("extracting spectrum")?;

    let mut metadata: BTreeMap<String, MetadataValue> = data
        .metadata()
        .into_iter()
        .flatten()
        .filter_map(|(k, v)| Some((k.clone(), MetadataValue::guess(v.as_scalar()?))))
        .collect();
    if let Some(unit) = series.frequency_unit {
        metadata.insert(UNIT_COLUMN.to_string(), MetadataValue::String(unit));
    }

    Ok(Spectrum {
        x: series.frequencies,
        y: series.powers,
        metadata,
    })
}

/// Write spectra to a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – `x` and `y` list columns plus one column per metadata key
/// * `.json`    – `[{ "x": [...], "y": [...], ...meta }, ...]`
/// * `.csv`     – columns `x` and `y` containing semicolon-separated floats
pub fn export_file(path: &Path, spectra: &[Spectrum]) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => write_parquet(path, spectra),
        "json" => write_json(path, spectra),
        "csv" => write_csv(path, spectra),
        other => bail!("Unsupported export extension: .{other}"),
    }?;
    info!("wrote {} spectra to {}", spectra.len(), path.display());
    Ok(())
}

/// Sorted union of metadata column names.
fn column_names(spectra: &[Spectrum]) -> Vec<String> {
    spectra
        .iter()
        .flat_map(|sp| sp.metadata.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ---------------------------------------------------------------------------
// JSON writer
// ---------------------------------------------------------------------------

fn write_json(path: &Path, spectra: &[Spectrum]) -> Result<()> {
    let rows: Vec<JsonValue> = spectra
        .iter()
        .map(|sp| -> Result<JsonValue> {
            let mut obj = Map::new();
            obj.insert("x".into(), sp.x.clone().into());
            obj.insert("y".into(), sp.y.clone().into());
            for (key, val) in &sp.metadata {
                obj.insert(key.clone(), serde_json::to_value(val)?);
            }
            Ok(JsonValue::Object(obj))
        })
        .collect::<Result<_>>()?;

    let file = File::create(path).context("creating JSON file")?;
    serde_json::to_writer_pretty(file, &rows).context("writing JSON")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV writer
// ---------------------------------------------------------------------------

fn write_csv(path: &Path, spectra: &[Spectrum]) -> Result<()> {
    let columns = column_names(spectra);
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;

    let mut header = vec!["x".to_string(), "y".to_string()];
    header.extend(columns.iter().cloned());
    writer.write_record(&header).context("writing CSV header")?;

    for (row_no, sp) in spectra.iter().enumerate() {
        let mut record = vec![join_floats(&sp.x), join_floats(&sp.y)];
        record.extend(columns.iter().map(|col| {
            sp.metadata
                .get(col)
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        writer
            .write_record(&record)
            .with_context(|| format!("writing CSV row {row_no}"))?;
    }

    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn join_floats(values: &[f64]) -> String {
    values
        .iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

// ---------------------------------------------------------------------------
// Parquet writer
// ---------------------------------------------------------------------------

fn write_parquet(path: &Path, spectra: &[Spectrum]) -> Result<()> {
    let list_type = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
    let mut fields = vec![
        Field::new("x", list_type.clone(), false),
        Field::new("y", list_type, false),
    ];
    let mut arrays: Vec<ArrayRef> = vec![
        Arc::new(f64_list(spectra.iter().map(|sp| sp.x.as_slice()))),
        Arc::new(f64_list(spectra.iter().map(|sp| sp.y.as_slice()))),
    ];

    for col in column_names(spectra) {
        let cells: Vec<Option<&MetadataValue>> = spectra
            .iter()
            .map(|sp| sp.metadata.get(&col).filter(|v| **v != MetadataValue::Null))
            .collect();
        let array = metadata_column(&cells);
        fields.push(Field::new(&col, array.data_type().clone(), true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn f64_list<'a>(rows: impl Iterator<Item = &'a [f64]>) -> arrow::array::ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        builder.values().append_slice(row);
        builder.append(true);
    }
    builder.finish()
}

/// Narrowest Arrow type holding every non-null cell: Int64, then Float64,
/// then Boolean, falling back to Utf8.
fn metadata_column(cells: &[Option<&MetadataValue>]) -> ArrayRef {
    let present = || cells.iter().flatten();

    if present().all(|v| matches!(v, MetadataValue::Integer(_))) {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                Some(MetadataValue::Integer(i)) => Some(*i),
                _ => None,
            })
            .collect();
        return Arc::new(Int64Array::from(values));
    }
    if present().all(|v| v.as_f64().is_some()) {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| c.and_then(MetadataValue::as_f64))
            .collect();
        return Arc::new(Float64Array::from(values));
    }
    if present().all(|v| matches!(v, MetadataValue::Bool(_))) {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|c| match c {
                Some(MetadataValue::Bool(b)) => Some(*b),
                _ => None,
            })
            .collect();
        return Arc::new(BooleanArray::from(values));
    }
    let values: Vec<Option<String>> = cells.iter().map(|c| c.map(|v| v.to_string())).collect();
    Arc::new(StringArray::from(values))
}
