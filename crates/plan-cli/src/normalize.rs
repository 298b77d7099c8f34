//! 原始試算表整理
//!
//! 支援 Excel (.xlsx/.xls/.ods) 與 CSV。缺少 Year 或 Month 的列會被略過；
//! 月份取自該列在工作表中的位置（位置 mod 12），日期為該月月底。

use anyhow::{anyhow, bail, Context, Result};
use calamine::{open_workbook_auto, Reader};
use plan_core::{calendar, HistoryRecord, PlanError};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::table;

/// 原始資料列
#[derive(Debug, Clone)]
pub struct RawRow {
    /// 在資料區（表頭之後）的位置，從 0 起算
    pub position: usize,

    pub cells: HashMap<String, String>,
}

/// 依副檔名讀取原始檔案
pub fn read_raw(path: &Path) -> Result<Vec<RawRow>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let rows = match ext.as_str() {
        "csv" => read_csv(path)?,
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook(path)?,
        _ => bail!("不支援的檔案格式: {}", path.display()),
    };

    tracing::info!("讀取 {}：{} 列原始資料", path.display(), rows.len());
    Ok(rows)
}

fn read_csv(path: &Path) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("無法開啟 {}", path.display()))?;

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for (position, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("{} 第 {} 列格式錯誤", path.display(), position + 2))?;
        rows.push(RawRow {
            position,
            cells: to_cells(&headers, record.iter()),
        });
    }
    Ok(rows)
}

fn read_workbook(path: &Path) -> Result<Vec<RawRow>> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("無法開啟 {}", path.display()))?;

    // 只讀第一個工作表
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("{} 沒有工作表", path.display()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("無法讀取工作表 {}", sheet))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| anyhow!("{} 沒有表頭", path.display()))?
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    Ok(rows
        .enumerate()
        .map(|(position, row)| RawRow {
            position,
            cells: to_cells(&headers, row.iter().map(|cell| cell.to_string())),
        })
        .collect())
}

fn to_cells<I, S>(headers: &[String], values: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    headers
        .iter()
        .zip(values)
        .filter(|(header, _)| !header.is_empty())
        .map(|(header, value)| (header.clone(), value.as_ref().trim().to_string()))
        .collect()
}

/// 將原始資料列整理成歷史紀錄
pub fn normalize_rows(rows: &[RawRow], metrics: &[String]) -> plan_core::Result<Vec<HistoryRecord>> {
    let mut records = Vec::new();

    for row in rows {
        let line = row.position + 2;
        let (Some(year), Some(_)) = (non_empty(row, "Year"), non_empty(row, "Month")) else {
            tracing::debug!("略過第 {} 列：缺少 Year 或 Month", line);
            continue;
        };

        let year = parse_year(year)
            .ok_or_else(|| PlanError::DataError(format!("第 {} 列 Year 無法解析: {:?}", line, year)))?;
        let month = (row.position % 12) as u32 + 1;
        let date = calendar::last_day_of_month(year, month)?;

        let mut values = BTreeMap::new();
        for name in metrics {
            let raw = row
                .cells
                .get(name)
                .ok_or_else(|| PlanError::MissingColumn(name.clone()))?;
            let value = table::parse_count(raw).ok_or_else(|| {
                PlanError::DataError(format!("第 {} 列 {} 不是非負整數: {:?}", line, name, raw))
            })?;
            values.insert(name.clone(), value);
        }

        records.push(HistoryRecord::new(date, values));
    }

    if records.is_empty() {
        return Err(PlanError::DataError("沒有同時具備 Year 與 Month 的資料列".to_string()));
    }
    Ok(records)
}

fn non_empty<'a>(row: &'a RawRow, column: &str) -> Option<&'a str> {
    row.cells
        .get(column)
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
}

fn parse_year(raw: &str) -> Option<i32> {
    if let Ok(year) = raw.parse::<i32>() {
        return Some(year);
    }
    let value: f64 = raw.parse().ok()?;
    (value.fract() == 0.0 && value >= 1.0 && value <= 9999.0).then_some(value as i32)
}
