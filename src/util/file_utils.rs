// External crates
use chrono::NaiveDate;
use log::info;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

// Local modules
use crate::constants::{CUSTOMER_ID, ORDER_ID, TOTAL_ORDER_VALUE, WORKING_COLUMNS};
use crate::error::{ForecastError, Result};

/// Column types the export is read with instead of inferred ones
///
/// Identifiers stay strings so zero-padded ids keep their padding, and order
/// values must parse as floats so malformed amounts fail the load.
fn order_schema_overwrite() -> SchemaRef {
    Arc::new(Schema::from_iter([
        (PlSmallStr::from_static(ORDER_ID), DataType::String),
        (PlSmallStr::from_static(CUSTOMER_ID), DataType::String),
        (PlSmallStr::from_static(TOTAL_ORDER_VALUE), DataType::Float64),
    ]))
}

/// Loads an order export from `dir/file_name` into a DataFrame
///
/// The remaining columns are inferred over the whole file.
///
/// # Arguments
///
/// * `dir` - Directory holding the exports
/// * `file_name` - Name of the CSV file inside `dir`
///
/// # Returns
///
/// Returns the raw order table, or an error if the file or a working column is
/// missing or an order value is not a number
pub fn load_orders<P: AsRef<Path>>(dir: P, file_name: &str) -> Result<DataFrame> {
    let full_path = dir.as_ref().join(file_name);
    info!("Loading orders from: {}", full_path.display());

    if !full_path.exists() {
        return Err(ForecastError::FileNotFound(full_path));
    }

    let file = File::open(&full_path)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_schema_overwrite(Some(order_schema_overwrite()))
        .into_reader_with_file_handle(file)
        .finish()?;

    ensure_columns(&df, &WORKING_COLUMNS)?;
    info!("Loaded {} order rows with {} columns", df.height(), df.width());

    Ok(df)
}

/// Fails with [`ForecastError::MissingColumn`] for the first absent column
pub fn ensure_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    for &name in columns {
        if df.column(name).is_err() {
            return Err(ForecastError::MissingColumn(name.to_string()));
        }
    }
    Ok(())
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| ForecastError::MissingColumn(name.to_string()))
}

/// Column values rendered as strings, keeping nulls
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let casted = column(df, name)?.cast(&DataType::String)?;
    let values = casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

/// Column values as f64
///
/// The cast is strict and a null cell is an error, so nothing is silently
/// replaced by a default.
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let casted = column(df, name)?.strict_cast(&DataType::Float64)?;
    casted
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| ForecastError::MissingValue {
                column: name.to_string(),
                row,
            })
        })
        .collect()
}

/// Reads a Date column back into calendar dates
pub fn date_values(df: &DataFrame, name: &str) -> Result<Vec<NaiveDate>> {
    column(df, name)?
        .date()?
        .as_date_iter()
        .enumerate()
        .map(|(row, d)| {
            d.ok_or_else(|| ForecastError::MissingValue {
                column: name.to_string(),
                row,
            })
        })
        .collect()
}

/// Builds a polars Date series from calendar dates
pub fn dates_to_series(name: &str, dates: &[NaiveDate]) -> Series {
    DateChunked::from_naive_date(name.into(), dates.iter().copied()).into_series()
}
