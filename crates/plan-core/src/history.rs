//! 歷史產量模型

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::calendar;
use crate::{PlanError, Result};

/// 單月歷史（或預測）紀錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// 月底日期
    pub date: NaiveDate,

    /// 各產品線數量
    pub metrics: BTreeMap<String, u64>,

    /// 是否為預測值
    pub predicted: bool,
}

impl HistoryRecord {
    /// 創建歷史紀錄
    pub fn new(date: NaiveDate, metrics: BTreeMap<String, u64>) -> Self {
        Self {
            date,
            metrics,
            predicted: false,
        }
    }

    /// 創建預測紀錄
    pub fn forecast(date: NaiveDate, metrics: BTreeMap<String, u64>) -> Self {
        Self {
            date,
            metrics,
            predicted: true,
        }
    }

    /// 建構器模式：設置單一指標
    pub fn with_metric(mut self, name: &str, value: u64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    /// 指標總和
    pub fn total(&self) -> u64 {
        self.metrics.values().sum()
    }

    pub fn metric(&self, name: &str) -> Option<u64> {
        self.metrics.get(name).copied()
    }
}

/// 單一指標的時間序列
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    /// 指標名稱
    pub metric: String,

    /// (日期, 數值)，日期遞增
    pub points: Vec<(NaiveDate, f64)>,
}

impl MetricSeries {
    pub fn new(metric: String, points: Vec<(NaiveDate, f64)>) -> Self {
        Self { metric, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|(d, _)| *d).collect()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|(d, _)| *d)
    }
}

/// 歷史資料存放區（依日期遞增、每月一筆）
#[derive(Debug, Clone)]
pub struct HistoryStore {
    records: Vec<HistoryRecord>,

    /// 指標欄位順序（沿用載入順序）
    metric_names: Vec<String>,
}

impl HistoryStore {
    /// 創建並驗證歷史資料
    pub fn new(records: Vec<HistoryRecord>, metric_names: Vec<String>) -> Result<Self> {
        if records.is_empty() {
            return Err(PlanError::DataError("歷史資料為空".to_string()));
        }
        if metric_names.is_empty() {
            return Err(PlanError::DataError("未指定任何指標欄位".to_string()));
        }

        for (idx, record) in records.iter().enumerate() {
            for name in &metric_names {
                if !record.metrics.contains_key(name) {
                    return Err(PlanError::DataError(format!(
                        "第 {} 筆紀錄 ({}) 缺少指標 {}",
                        idx + 1,
                        record.date,
                        name
                    )));
                }
            }
            if record.metrics.len() != metric_names.len() {
                return Err(PlanError::DataError(format!(
                    "第 {} 筆紀錄 ({}) 的指標集合與其他紀錄不一致",
                    idx + 1,
                    record.date
                )));
            }
        }

        for pair in records.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.date <= prev.date {
                return Err(PlanError::DataError(format!(
                    "日期必須嚴格遞增: {} 之後出現 {}",
                    prev.date, next.date
                )));
            }
            if calendar::month_index(next.date) == calendar::month_index(prev.date) {
                return Err(PlanError::DataError(format!(
                    "同一月份出現多筆紀錄: {} 與 {}",
                    prev.date, next.date
                )));
            }
        }

        Ok(Self {
            records,
            metric_names,
        })
    }

    /// 以預設產品線建立
    pub fn with_default_metrics(records: Vec<HistoryRecord>) -> Result<Self> {
        let names = crate::DEFAULT_METRICS.iter().map(|s| s.to_string()).collect();
        Self::new(records, names)
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn metric_names(&self) -> &[String] {
        &self.metric_names
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 最後一筆日期
    pub fn last_date(&self) -> NaiveDate {
        // new() 已保證非空
        self.records[self.records.len() - 1].date
    }

    /// 取出單一指標序列
    pub fn series(&self, metric: &str) -> Result<MetricSeries> {
        if !self.metric_names.iter().any(|m| m == metric) {
            return Err(PlanError::DataError(format!("未知的指標: {}", metric)));
        }

        let points = self
            .records
            .iter()
            .map(|r| (r.date, r.metrics[metric] as f64))
            .collect();

        Ok(MetricSeries::new(metric.to_string(), points))
    }

    /// 取出所有指標序列（依欄位順序）
    pub fn all_series(&self) -> Result<Vec<MetricSeries>> {
        self.metric_names.iter().map(|m| self.series(m)).collect()
    }

    /// 附加預測紀錄，回傳合併後的紀錄
    pub fn extended_with(&self, forecast: Vec<HistoryRecord>) -> Vec<HistoryRecord> {
        let mut merged = self.records.clone();
        merged.extend(forecast);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(y: i32, m: u32, fish: u64, ducks: u64) -> HistoryRecord {
        let date = calendar::last_day_of_month(y, m).unwrap();
        HistoryRecord::new(date, BTreeMap::new())
            .with_metric("Fish", fish)
            .with_metric("Ducks", ducks)
    }

    #[test]
    fn test_record_total() {
        let r = record(2022, 1, 120, 80);
        assert_eq!(r.total(), 200);
        assert!(!r.predicted);
        assert_eq!(r.metric("Fish"), Some(120));
        assert_eq!(r.metric("Geese"), None);
    }

    #[test]
    fn test_store_series() {
        let store = HistoryStore::with_default_metrics(vec![
            record(2022, 1, 100, 50),
            record(2022, 2, 110, 51),
            record(2022, 3, 120, 52),
        ])
        .unwrap();

        let fish = store.series("Fish").unwrap();
        assert_eq!(fish.metric, "Fish");
        assert_eq!(fish.values(), vec![100.0, 110.0, 120.0]);
        assert_eq!(fish.last_date(), Some(store.last_date()));

        assert_eq!(store.all_series().unwrap().len(), 2);
        assert!(matches!(store.series("Geese"), Err(PlanError::DataError(_))));
    }

    #[test]
    fn test_store_rejects_unsorted() {
        let result = HistoryStore::with_default_metrics(vec![
            record(2022, 2, 100, 50),
            record(2022, 1, 110, 51),
        ]);
        assert!(matches!(result, Err(PlanError::DataError(_))));
    }

    #[test]
    fn test_store_rejects_duplicate_month() {
        let mid_month = HistoryRecord::new(
            chrono::NaiveDate::from_ymd_opt(2022, 1, 15).unwrap(),
            BTreeMap::new(),
        )
        .with_metric("Fish", 1)
        .with_metric("Ducks", 1);

        let result = HistoryStore::with_default_metrics(vec![mid_month, record(2022, 1, 110, 51)]);
        assert!(matches!(result, Err(PlanError::DataError(_))));
    }

    #[test]
    fn test_store_rejects_missing_metric() {
        let partial = HistoryRecord::new(
            calendar::last_day_of_month(2022, 2).unwrap(),
            BTreeMap::new(),
        )
        .with_metric("Fish", 1);

        let result = HistoryStore::with_default_metrics(vec![record(2022, 1, 1, 1), partial]);
        assert!(matches!(result, Err(PlanError::DataError(_))));

        assert!(HistoryStore::with_default_metrics(Vec::new()).is_err());
    }
}
