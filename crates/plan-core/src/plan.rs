//! 配產結果模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::history::HistoryRecord;
use crate::{PlanError, Result};

/// 單期配產結果（每期獨立產生，不共享狀態）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    /// 各產品線最佳產量（無可行解時為空）
    pub quantities: BTreeMap<String, u64>,

    /// 總產量
    pub total_units: u64,

    /// 總利潤
    pub total_profit: Decimal,

    /// 是否可行
    pub feasible: bool,

    /// 無可行解原因
    pub reason: Option<String>,
}

impl AllocationResult {
    /// 創建可行結果
    pub fn optimal(quantities: BTreeMap<String, u64>, total_profit: Decimal) -> Self {
        let total_units = quantities.values().sum();
        Self {
            quantities,
            total_units,
            total_profit,
            feasible: true,
            reason: None,
        }
    }

    /// 創建不可行結果
    pub fn infeasible(reason: String) -> Self {
        Self {
            quantities: BTreeMap::new(),
            total_units: 0,
            total_profit: Decimal::ZERO,
            feasible: false,
            reason: Some(reason),
        }
    }

    pub fn quantity(&self, metric: &str) -> Option<u64> {
        self.quantities.get(metric).copied()
    }

    /// 將不可行結果轉為錯誤（呼叫端選擇中止時使用）
    pub fn into_result(self, period: &str) -> Result<Self> {
        if self.feasible {
            Ok(self)
        } else {
            Err(PlanError::InfeasibleAllocation {
                period: period.to_string(),
                reason: self.reason.unwrap_or_default(),
            })
        }
    }
}

/// 輸出表格的一列：原始（或預測）紀錄 + 配產結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRow {
    pub record: HistoryRecord,

    pub allocation: Option<AllocationResult>,
}

impl PlanRow {
    pub fn new(record: HistoryRecord) -> Self {
        Self {
            record,
            allocation: None,
        }
    }

    /// 建構器模式：設置配產結果
    pub fn with_allocation(mut self, allocation: AllocationResult) -> Self {
        self.allocation = Some(allocation);
        self
    }

    pub fn is_feasible(&self) -> Option<bool> {
        self.allocation.as_ref().map(|a| a.feasible)
    }
}
