//! 表格讀寫（CSV）
//!
//! 欄位：`Month, Year, Date, <指標…>, Total, Predicted`，配產後再加上
//! `Optimal_<指標…>, Optimal_Total, Optimal_Profit, Feasible`。
//! 讀取時 `Date` 與指標欄位必填，`Predicted` 預設為 false，`Total` 一律重新計算。

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use plan_core::calendar;
use plan_core::{HistoryRecord, PlanError, PlanRow};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// 非指標欄位
const RESERVED_COLUMNS: [&str; 6] = ["Month", "Year", "Date", "Total", "Predicted", "Feasible"];

const OPTIMAL_PREFIX: &str = "Optimal_";

/// 載入的表格
#[derive(Debug, Clone)]
pub struct Table {
    /// 指標欄位（依檔案欄位順序）
    pub metric_names: Vec<String>,

    pub records: Vec<HistoryRecord>,
}

/// 從檔案讀取表格
pub fn read_table(path: &Path) -> Result<Table> {
    let file = File::open(path).with_context(|| format!("無法開啟 {}", path.display()))?;
    let table = parse_table(file).with_context(|| format!("無法解析 {}", path.display()))?;

    tracing::info!(
        "讀取 {}：{} 列，指標 {:?}",
        path.display(),
        table.records.len(),
        table.metric_names
    );
    Ok(table)
}

/// 解析 CSV 內容
pub fn parse_table<R: io::Read>(reader: R) -> plan_core::Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let date_idx = headers
        .iter()
        .position(|h| h == "Date")
        .ok_or_else(|| PlanError::MissingColumn("Date".to_string()))?;
    let predicted_idx = headers.iter().position(|h| h == "Predicted");

    let metric_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| is_metric_column(h))
        .map(|(idx, h)| (idx, h.clone()))
        .collect();
    if metric_columns.is_empty() {
        return Err(PlanError::MissingColumn("指標欄位".to_string()));
    }

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(csv_error)?;
        // 第 1 列為表頭
        let row_no = line + 2;

        let date = parse_date(row.get(date_idx).unwrap_or_default())
            .ok_or_else(|| {
                PlanError::InvalidDate(format!(
                    "第 {} 列: {:?}",
                    row_no,
                    row.get(date_idx).unwrap_or_default()
                ))
            })?;

        let mut metrics = BTreeMap::new();
        for (idx, name) in &metric_columns {
            let raw = row.get(*idx).unwrap_or_default();
            let value = parse_count(raw).ok_or_else(|| {
                PlanError::DataError(format!(
                    "第 {} 列 {} 不是非負整數: {:?}",
                    row_no, name, raw
                ))
            })?;
            metrics.insert(name.clone(), value);
        }

        let predicted = match predicted_idx.and_then(|idx| row.get(idx)) {
            Some(raw) => parse_flag(raw).ok_or_else(|| {
                PlanError::DataError(format!("第 {} 列 Predicted 無法解析: {:?}", row_no, raw))
            })?,
            None => false,
        };

        let record = if predicted {
            HistoryRecord::forecast(date, metrics)
        } else {
            HistoryRecord::new(date, metrics)
        };
        records.push(record);
    }

    Ok(Table {
        metric_names: metric_columns.into_iter().map(|(_, name)| name).collect(),
        records,
    })
}

/// 寫出表格到檔案
pub fn write_table(path: &Path, metric_names: &[String], rows: &[PlanRow]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("無法建立 {}", path.display()))?;
    write_rows(file, metric_names, rows).with_context(|| format!("無法寫入 {}", path.display()))?;

    tracing::info!("寫入 {}：{} 列", path.display(), rows.len());
    Ok(())
}

/// 寫出 CSV 內容；任一列含配產結果時加上配產欄位
pub fn write_rows<W: io::Write>(writer: W, metric_names: &[String], rows: &[PlanRow]) -> Result<()> {
    let with_allocation = rows.iter().any(|row| row.allocation.is_some());
    let mut writer = csv::Writer::from_writer(writer);

    let mut header: Vec<String> = vec!["Month".into(), "Year".into(), "Date".into()];
    header.extend(metric_names.iter().cloned());
    header.push("Total".into());
    header.push("Predicted".into());
    if with_allocation {
        header.extend(metric_names.iter().map(|m| format!("{}{}", OPTIMAL_PREFIX, m)));
        header.push("Optimal_Total".into());
        header.push("Optimal_Profit".into());
        header.push("Feasible".into());
    }
    writer.write_record(&header)?;

    for row in rows {
        let record = &row.record;
        let mut fields: Vec<String> = vec![
            calendar::month_initial(record.date).to_string(),
            record.date.year().to_string(),
            record.date.format(DATE_FORMAT).to_string(),
        ];
        fields.extend(
            metric_names
                .iter()
                .map(|m| record.metric(m).map(|v| v.to_string()).unwrap_or_default()),
        );
        fields.push(record.total().to_string());
        fields.push(flag(record.predicted).to_string());

        if with_allocation {
            match &row.allocation {
                Some(result) if result.feasible => {
                    fields.extend(
                        metric_names
                            .iter()
                            .map(|m| result.quantity(m).map(|v| v.to_string()).unwrap_or_default()),
                    );
                    fields.push(result.total_units.to_string());
                    fields.push(result.total_profit.normalize().to_string());
                    fields.push(flag(true).to_string());
                }
                Some(_) => {
                    fields.extend(std::iter::repeat(String::new()).take(metric_names.len() + 2));
                    fields.push(flag(false).to_string());
                }
                None => {
                    fields.extend(std::iter::repeat(String::new()).take(metric_names.len() + 3));
                }
            }
        }

        writer.write_record(&fields)?;
    }

    writer.flush()?;
    Ok(())
}

fn is_metric_column(header: &str) -> bool {
    !header.is_empty()
        && !RESERVED_COLUMNS.contains(&header)
        && !header.starts_with(OPTIMAL_PREFIX)
        && !header.starts_with("Unnamed")
}

/// 接受 `2022-01-31` 與 `2022-01-31 00:00:00`
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.split_whitespace().next()?;
    NaiveDate::parse_from_str(day, DATE_FORMAT).ok()
}

/// 非負整數；接受 `50.0` 這類整數值浮點
pub(crate) fn parse_count(raw: &str) -> Option<u64> {
    if let Ok(value) = raw.parse::<u64>() {
        return Some(value);
    }
    let value: f64 = raw.parse().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "" | "false" | "0" => Some(false),
        "true" | "1" => Some(true),
        _ => None,
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn csv_error(err: csv::Error) -> PlanError {
    PlanError::DataError(format!("CSV 格式錯誤: {}", err))
}
