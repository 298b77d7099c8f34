//! 結果組裝：把原始／預測紀錄與配產結果合併成輸出列

use plan_core::{AllocationResult, HistoryRecord, HistoryStore, PlanRow};
use plan_optimizer::AllocationEngine;

use crate::cli::InfeasiblePolicy;

/// 歷史紀錄後接預測紀錄
pub fn forecast_rows(store: &HistoryStore, forecast: Vec<HistoryRecord>) -> Vec<PlanRow> {
    store
        .extended_with(forecast)
        .into_iter()
        .map(PlanRow::new)
        .collect()
}

/// 配產結果組裝器
pub struct ResultAssembler<'a> {
    engine: &'a AllocationEngine,
    policy: InfeasiblePolicy,
}

impl<'a> ResultAssembler<'a> {
    pub fn new(engine: &'a AllocationEngine, policy: InfeasiblePolicy) -> Self {
        Self { engine, policy }
    }

    /// 逐期配產並組成輸出列
    ///
    /// 求解器或配置錯誤一律中止；無可行解依策略處理。
    pub fn assemble(&self, records: Vec<HistoryRecord>) -> plan_core::Result<Vec<PlanRow>> {
        let allocations = self.engine.allocate_periods(&records);

        let mut rows = Vec::with_capacity(records.len());
        let mut infeasible = 0usize;
        for (record, period) in records.into_iter().zip(allocations) {
            let mut result = period.outcome?;
            if !result.feasible {
                result = self.resolve(&record, result)?;
            }
            if !result.feasible {
                infeasible += 1;
            }
            rows.push(PlanRow::new(record).with_allocation(result));
        }

        if infeasible > 0 {
            tracing::warn!("{} / {} 期無可行解", infeasible, rows.len());
        }
        Ok(rows)
    }

    fn resolve(
        &self,
        record: &HistoryRecord,
        result: AllocationResult,
    ) -> plan_core::Result<AllocationResult> {
        match self.policy {
            InfeasiblePolicy::Report => Ok(result),
            InfeasiblePolicy::Abort => result.into_result(&record.date.to_string()),
            InfeasiblePolicy::Clamp => {
                let clamped = self.engine.clamp_to_capacity(&record.metrics);
                let retry = self.engine.allocate(&clamped)?;
                if retry.feasible {
                    tracing::info!("{} 最低產量壓到產能上限後可行: {:?}", record.date, clamped);
                }
                Ok(retry)
            }
        }
    }
}
