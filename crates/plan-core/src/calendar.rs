//! 月份日曆運算
//!
//! 歷史資料以月底日期為錨點，預測期間必須沿用相同的月底節奏。

use chrono::{Datelike, Months, NaiveDate};

use crate::{PlanError, Result};

/// 取得指定年月的最後一天
pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };

    first_of_next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| PlanError::InvalidDate(format!("{}-{:02}", year, month)))
}

/// 檢查是否為月底
pub fn is_month_end(date: NaiveDate) -> bool {
    date.succ_opt().map(|next| next.day() == 1).unwrap_or(true)
}

/// 向後推算整月
///
/// 月底日期推算後仍落在目標月份的月底（1/31 → 2/28 → 3/31）；
/// 其他日期保留日數，超出目標月份長度時截到月底。
pub fn advance_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    let shifted = date
        .checked_add_months(Months::new(months))
        .ok_or_else(|| PlanError::InvalidDate(format!("{} + {} 個月溢出", date, months)))?;

    if is_month_end(date) {
        last_day_of_month(shifted.year(), shifted.month())
    } else {
        Ok(shifted)
    }
}

/// 產生預測期間日期
///
/// 每一期都從 `last` 直接推算，避免月底截斷在連續推算中累積。
pub fn forecast_dates(last: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
    (1..=horizon)
        .map(|step| {
            let step = u32::try_from(step)
                .map_err(|_| PlanError::InvalidHorizon(horizon))?;
            advance_months(last, step)
        })
        .collect()
}

/// 月份序號（年 × 12 + 月份索引），用於判斷連續月份與季節相位
pub fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

/// 月份英文名稱首字母（輸出表格的 Month 欄）
pub fn month_initial(date: NaiveDate) -> &'static str {
    const INITIALS: [&str; 12] = ["J", "F", "M", "A", "M", "J", "J", "A", "S", "O", "N", "D"];
    INITIALS[date.month0() as usize]
}
