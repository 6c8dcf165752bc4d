// External crates
use log::{debug, info};
use polars::lazy::frame::pivot::pivot_stable;
use polars::prelude::*;

// Local modules
use crate::constants::{
    CREATED_AT, CUSTOMER_ID, DATE, IS_WEEKEND, ORDER_COUNT, ORDER_ID, RETURNING_MARKER,
    TOTAL_ORDER_VALUE, TOTAL_VALUE, VISITOR_TYPE, WORKING_COLUMNS,
};
use crate::error::{ForecastError, Result};
use crate::util::file_utils::{dates_to_series, ensure_columns, string_values};
use crate::util::model_utils::TargetMetric;

// Timestamps are reduced to their leading ISO calendar date
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";
const ISO_DATE_LEN: u32 = 10;

// Per-customer daily amount before pivoting
const AMOUNT: &str = "amount";

/// Drops repeated orders, keeping the first row seen for every `order_id`
///
/// Rows without an order id are never treated as duplicates of each other.
pub fn drop_duplicate_orders(df: &DataFrame) -> Result<DataFrame> {
    ensure_columns(df, &[ORDER_ID])?;
    let out = df
        .clone()
        .lazy()
        .filter(col(ORDER_ID).is_null().or(col(ORDER_ID).is_first_distinct()))
        .collect()?;

    let dropped = df.height() - out.height();
    if dropped > 0 {
        info!("There are {} duplicate rows for this dataset.", dropped);
    }
    Ok(out)
}

/// Keeps only customers with an order history
///
/// Rows with a missing visitor type are excluded, the rest must contain
/// `returning` in any letter case.
pub fn filter_returning_customers(df: &DataFrame) -> Result<DataFrame> {
    ensure_columns(df, &[VISITOR_TYPE])?;
    let visitor_type = col(VISITOR_TYPE).cast(DataType::String);
    let out = df
        .clone()
        .lazy()
        .filter(
            visitor_type.clone().is_not_null().and(
                visitor_type
                    .str()
                    .to_lowercase()
                    .str()
                    .contains_literal(lit(RETURNING_MARKER)),
            ),
        )
        .collect()?;

    info!(
        "Kept {} returning-customer rows out of {}",
        out.height(),
        df.height()
    );
    let missing: usize = out.get_columns().iter().map(|c| c.null_count()).sum();
    info!("There are {} missing values left in this dataset.", missing);
    Ok(out)
}

/// Drops every descriptive column the forecasting pipeline does not use
pub fn drop_unused_columns(df: &DataFrame) -> Result<DataFrame> {
    let dropped: Vec<String> = df
        .get_column_names()
        .into_iter()
        .filter(|name| !WORKING_COLUMNS.contains(&name.as_str()))
        .map(|name| name.to_string())
        .collect();
    debug!("Dropping unused columns: {:?}", dropped);

    Ok(df.select(WORKING_COLUMNS)?)
}

/// Calendar date of an order timestamp
///
/// Accepts anything starting with `YYYY-MM-DD`: plain dates, naive timestamps
/// with a space or `T` separator, and RFC 3339 stamps (the local date is kept).
/// Unparseable values become null.
fn order_date() -> Expr {
    col(CREATED_AT)
        .cast(DataType::String)
        .str()
        .strip_chars(lit(" \t\r\n"))
        .str()
        .slice(lit(0), lit(ISO_DATE_LEN))
        .str()
        .to_date(StrptimeOptions {
            format: Some(ISO_DATE_FORMAT.into()),
            strict: false,
            ..Default::default()
        })
}

/// Adds a `date` column derived from `created_at`
///
/// Fails with [`ForecastError::InvalidTimestamp`] naming the first timestamp
/// that has no calendar date.
pub fn attach_order_dates(df: &DataFrame) -> Result<DataFrame> {
    ensure_columns(df, &[CREATED_AT])?;
    let out = df.clone().lazy().with_column(order_date().alias(DATE)).collect()?;

    let failed = out
        .clone()
        .lazy()
        .filter(col(DATE).is_null())
        .select([col(CREATED_AT).cast(DataType::String)])
        .limit(1)
        .collect()?;
    if failed.height() > 0 {
        let raw = string_values(&failed, CREATED_AT)?
            .into_iter()
            .flatten()
            .next()
            .unwrap_or_else(|| "<null>".to_string());
        return Err(ForecastError::InvalidTimestamp(raw));
    }

    Ok(out)
}

/// Aggregates dated orders into one row per calendar day
///
/// # Returns
///
/// A table sorted by date with `date`, `order_count`, `total_value` and
/// `is_weekend`. Days without orders do not appear. An empty input gives an
/// empty table with the same schema.
pub fn aggregate_daily(df: &DataFrame) -> Result<DataFrame> {
    ensure_columns(df, &[DATE, ORDER_ID, TOTAL_ORDER_VALUE])?;
    let out = df
        .clone()
        .lazy()
        .group_by([col(DATE)])
        .agg([
            col(ORDER_ID).count().alias(ORDER_COUNT),
            col(TOTAL_ORDER_VALUE)
                .cast(DataType::Float64)
                .sum()
                .alias(TOTAL_VALUE),
        ])
        // ISO weekdays: Saturday is 6, Sunday 7
        .with_column(col(DATE).dt().weekday().gt_eq(lit(6)).alias(IS_WEEKEND))
        .sort([DATE], SortMultipleOptions::default())
        .collect()?;

    info!("Aggregated orders into {} days", out.height());
    Ok(out)
}

/// Pivots dated orders into one zero-filled column per customer
///
/// Every customer is reindexed onto the contiguous date range between the
/// first and last order, so each column has a value for every day. Rows
/// without a customer id are skipped.
pub fn aggregate_customer_daily(df: &DataFrame, metric: TargetMetric) -> Result<DataFrame> {
    ensure_columns(df, &[DATE, CUSTOMER_ID, ORDER_ID, TOTAL_ORDER_VALUE])?;
    let amount = match metric {
        TargetMetric::Orders => col(ORDER_ID).is_not_null().cast(DataType::Float64),
        TargetMetric::Earnings => col(TOTAL_ORDER_VALUE).cast(DataType::Float64),
    };

    let per_day = df
        .clone()
        .lazy()
        .filter(col(CUSTOMER_ID).is_not_null())
        .group_by([col(DATE), col(CUSTOMER_ID).cast(DataType::String)])
        .agg([amount.sum().alias(AMOUNT)])
        .collect()?;

    if per_day.height() == 0 {
        return Ok(DataFrame::new(vec![dates_to_series(DATE, &[]).into_column()])?);
    }

    let pivoted = pivot_stable(
        &per_day,
        [CUSTOMER_ID],
        Some([DATE]),
        Some([AMOUNT]),
        true,
        None,
        None,
    )?;
    let customers: Vec<PlSmallStr> = pivoted
        .get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != DATE)
        .cloned()
        .collect();

    let calendar = per_day
        .lazy()
        .select([date_range(
            col(DATE).min(),
            col(DATE).max(),
            Duration::parse("1d"),
            ClosedWindow::Both,
        )
        .alias(DATE)]);

    let out = calendar
        .left_join(pivoted.lazy(), col(DATE), col(DATE))
        .with_columns(
            customers
                .iter()
                .map(|name| col(name.clone()).fill_null(lit(0.0)))
                .collect::<Vec<_>>(),
        )
        .sort([DATE], SortMultipleOptions::default())
        .collect()?;

    info!(
        "Built {} customer series over {} days for {}",
        customers.len(),
        out.height(),
        metric
    );
    Ok(out)
}

/// Dedupe, keep returning customers, drop unused columns and attach dates
pub fn clean_orders(raw: &DataFrame) -> Result<DataFrame> {
    let df = drop_duplicate_orders(raw)?;
    let df = filter_returning_customers(&df)?;
    let df = drop_unused_columns(&df)?;
    attach_order_dates(&df)
}

/// Full preprocessing chain producing the daily aggregate table
pub fn prepare_daily_series(raw: &DataFrame) -> Result<DataFrame> {
    aggregate_daily(&clean_orders(raw)?)
}

/// Full preprocessing chain producing the per-customer table for `metric`
pub fn prepare_customer_series(raw: &DataFrame, metric: TargetMetric) -> Result<DataFrame> {
    aggregate_customer_daily(&clean_orders(raw)?, metric)
}
