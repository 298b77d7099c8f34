//! 配產引擎
//!
//! 每期獨立建立並求解一個小型整數規劃：
//!
//! ```text
//! max  Σ profit[m] · q[m]
//! s.t. q[m] ≥ required[m]
//!      q[m] ≤ max_capacity[m]
//!      Σ resource_cost[m] · q[m] ≤ resource_limit
//!      q[m] ∈ ℕ
//! ```

use chrono::NaiveDate;
use plan_core::{
    AllocationInput, AllocationResult, HistoryRecord, MetricAllocation, PlanError, Result,
    SolverSettings,
};
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::branch::{BranchAndBound, SolveStatus};
use crate::model::{LinearProgram, Relation, Sense, Variable};

/// 單期配產結果（含日期，方便回報）
#[derive(Debug)]
pub struct PeriodAllocation {
    pub date: NaiveDate,
    pub outcome: Result<AllocationResult>,
}

/// 配產引擎
pub struct AllocationEngine {
    input: AllocationInput,
    solver: BranchAndBound,
}

/// 某產品線本期的求解資料
struct MetricTerm<'a> {
    name: &'a str,
    params: &'a MetricAllocation,
    minimum: u64,
}

impl AllocationEngine {
    /// 創建新的配產引擎（配置錯誤在此即失敗）
    pub fn new(input: AllocationInput, settings: SolverSettings) -> Result<Self> {
        input.validate()?;
        Ok(Self {
            input,
            solver: BranchAndBound::new(settings),
        })
    }

    pub fn input(&self) -> &AllocationInput {
        &self.input
    }

    /// 求解單期配產
    ///
    /// 未列在 `required` 的產品線最低產量視為 0。無可行解時回傳
    /// `feasible = false` 的結果而不是錯誤；`Err` 只代表配置或求解器本身的問題。
    pub fn allocate(&self, required: &BTreeMap<String, u64>) -> Result<AllocationResult> {
        let terms = self.terms(required)?;

        if let Some(reason) = self.precheck(&terms) {
            tracing::debug!("配產預檢不可行: {}", reason);
            return Ok(AllocationResult::infeasible(reason));
        }

        let lp = self.build_model(&terms)?;
        let result = self.solver.solve(&lp).map_err(|err| {
            tracing::error!(
                "配產求解失敗: required={:?} params={:?} settings={:?}: {}",
                required,
                self.input,
                self.solver.settings(),
                err
            );
            err
        })?;

        match result.status {
            SolveStatus::Optimal => {}
            SolveStatus::Infeasible => {
                let reason = result.messages.join("; ");
                return Ok(AllocationResult::infeasible(reason));
            }
            SolveStatus::Unbounded => {
                return Err(PlanError::SolverError(format!(
                    "配產模型不應無界: required={:?}",
                    required
                )));
            }
        }

        let mut quantities = BTreeMap::new();
        for (term, &value) in terms.iter().zip(&result.values) {
            if !value.is_finite() || value < 0.0 {
                return Err(PlanError::SolverError(format!(
                    "{} 的解 {} 無效",
                    term.name, value
                )));
            }
            quantities.insert(term.name.to_string(), value as u64);
        }

        let profit = self.verify(&terms, &quantities)?;
        tracing::debug!(
            "配產完成：{:?}，利潤 {}，節點 {}",
            quantities,
            profit,
            result.nodes_explored
        );

        Ok(AllocationResult::optimal(quantities, profit))
    }

    /// 以紀錄中的各指標值作為最低產量
    pub fn allocate_record(&self, record: &HistoryRecord) -> Result<AllocationResult> {
        self.allocate(&record.metrics)
    }

    /// 將最低產量壓到產能上限以內（未配置的指標原樣保留）
    pub fn clamp_to_capacity(&self, required: &BTreeMap<String, u64>) -> BTreeMap<String, u64> {
        required
            .iter()
            .map(|(name, &value)| {
                let clamped = self
                    .input
                    .metric(name)
                    .map_or(value, |m| value.min(m.max_capacity));
                (name.clone(), clamped)
            })
            .collect()
    }

    /// 所有期別配產（各期獨立回報成敗，順序與輸入一致）
    pub fn allocate_periods(&self, records: &[HistoryRecord]) -> Vec<PeriodAllocation> {
        tracing::info!(
            "開始配產：{} 期，產品線 {:?}，{} 預算 {}",
            records.len(),
            self.input.metric_names(),
            self.input.resource_name,
            self.input.resource_limit
        );

        let start_time = std::time::Instant::now();

        let allocations: Vec<PeriodAllocation> = records
            .par_iter()
            .map(|record| {
                let outcome = self.allocate_record(record);
                match &outcome {
                    Ok(result) if !result.feasible => tracing::warn!(
                        "{} 無可行解: {}",
                        record.date,
                        result.reason.as_deref().unwrap_or_default()
                    ),
                    Err(err) => tracing::error!("{} 配產失敗: {}", record.date, err),
                    _ => {}
                }
                PeriodAllocation {
                    date: record.date,
                    outcome,
                }
            })
            .collect();

        tracing::info!("配產完成，耗時 {:?}", start_time.elapsed());

        allocations
    }

    fn terms<'a>(&'a self, required: &BTreeMap<String, u64>) -> Result<Vec<MetricTerm<'a>>> {
        if let Some(unknown) = required.keys().find(|name| self.input.metric(name).is_none()) {
            return Err(PlanError::ConfigError(format!("產品線 {} 沒有配產參數", unknown)));
        }

        Ok(self
            .input
            .metrics
            .iter()
            .map(|(name, params)| MetricTerm {
                name: name.as_str(),
                params,
                minimum: required.get(name).copied().unwrap_or(0),
            })
            .collect())
    }

    /// 最低產量本身就違反產能或預算時直接判定不可行
    fn precheck(&self, terms: &[MetricTerm<'_>]) -> Option<String> {
        let over_capacity: Vec<String> = terms
            .iter()
            .filter(|t| t.minimum > t.params.max_capacity)
            .map(|t| {
                format!(
                    "{} 需求 {} 超過產能上限 {}",
                    t.name, t.minimum, t.params.max_capacity
                )
            })
            .collect();
        if !over_capacity.is_empty() {
            return Some(over_capacity.join("; "));
        }

        let minimum_usage: Decimal = terms
            .iter()
            .map(|t| t.params.resource_cost * Decimal::from(t.minimum))
            .sum();
        if minimum_usage > self.input.resource_limit {
            return Some(format!(
                "最低產量需要 {} {}，超過預算 {}",
                minimum_usage, self.input.resource_name, self.input.resource_limit
            ));
        }

        None
    }

    fn build_model(&self, terms: &[MetricTerm<'_>]) -> Result<LinearProgram> {
        let mut lp = LinearProgram::new("allocation", Sense::Maximize);
        let mut objective = Vec::with_capacity(terms.len());
        let mut usage = Vec::with_capacity(terms.len());

        for term in terms {
            let j = lp.add_variable(Variable::integer(term.name));
            objective.push((j, to_f64(term.params.unit_profit, term.name)?));
            usage.push((j, to_f64(term.params.resource_cost, term.name)?));

            lp.add_constraint(
                &format!("Min {}", term.name),
                vec![(j, 1.0)],
                Relation::GreaterEq,
                term.minimum as f64,
            );
            lp.add_constraint(
                &format!("Max {}", term.name),
                vec![(j, 1.0)],
                Relation::LessEq,
                term.params.max_capacity as f64,
            );
        }

        lp.set_objective(&objective);
        lp.add_constraint(
            &format!("{} limit", self.input.resource_name),
            usage,
            Relation::LessEq,
            to_f64(self.input.resource_limit, &self.input.resource_name)?,
        );

        Ok(lp)
    }

    /// 以 Decimal 精確驗證整數解並計算利潤
    fn verify(&self, terms: &[MetricTerm<'_>], quantities: &BTreeMap<String, u64>) -> Result<Decimal> {
        let mut usage = Decimal::ZERO;
        let mut profit = Decimal::ZERO;

        for term in terms {
            let q = quantities.get(term.name).copied().unwrap_or(0);
            if q < term.minimum || q > term.params.max_capacity {
                return Err(PlanError::SolverError(format!(
                    "{} 的解 {} 超出 [{}, {}]",
                    term.name, q, term.minimum, term.params.max_capacity
                )));
            }
            usage += term.params.resource_cost * Decimal::from(q);
            profit += term.params.unit_profit * Decimal::from(q);
        }

        if usage > self.input.resource_limit {
            return Err(PlanError::SolverError(format!(
                "解需要 {} {}，超過預算 {}",
                usage, self.input.resource_name, self.input.resource_limit
            )));
        }

        Ok(profit)
    }
}

fn to_f64(value: Decimal, context: &str) -> Result<f64> {
    value
        .to_f64()
        .ok_or_else(|| PlanError::ConfigError(format!("{} 的係數 {} 無法轉換", context, value)))
}

/// 以預設求解設定配產單期
pub fn allocate(required: &BTreeMap<String, u64>, params: &AllocationInput) -> Result<AllocationResult> {
    AllocationEngine::new(params.clone(), SolverSettings::default())?.allocate(required)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn required(ducks: u64, fish: u64) -> BTreeMap<String, u64> {
        BTreeMap::from([("Ducks".to_string(), ducks), ("Fish".to_string(), fish)])
    }

    fn engine() -> AllocationEngine {
        AllocationEngine::new(AllocationInput::default(), SolverSettings::default()).unwrap()
    }

    #[test]
    fn test_budget_binds_after_best_ratio() {
        let result = allocate(&required(50, 40), &AllocationInput::default()).unwrap();

        assert!(result.feasible);
        assert_eq!(result.quantity("Ducks"), Some(400));
        assert_eq!(result.quantity("Fish"), Some(80));
        assert_eq!(result.total_units, 480);
        assert_eq!(result.total_profit, Decimal::from(2320));
    }

    #[test]
    fn test_fractional_budget_rounds_down() {
        // 鬆弛解 Fish = 79.9999992，取整成 80 會多用 0.0001 pellets
        let input = AllocationInput::default().with_resource_limit(Decimal::new(499_999_999, 4));
        let result = allocate(&required(50, 40), &input).unwrap();

        assert!(result.feasible);
        assert_eq!(result.quantity("Ducks"), Some(400));
        assert_eq!(result.quantity("Fish"), Some(79));
        assert_eq!(result.total_profit, Decimal::from(2000 + 79 * 4));
    }

    #[test]
    fn test_required_over_capacity() {
        let result = engine().allocate(&required(500, 0)).unwrap();

        assert!(!result.feasible);
        assert!(result.quantities.is_empty());
        assert!(result.reason.unwrap().contains("Ducks"));
    }

    #[test]
    fn test_required_over_budget() {
        // 300 × 100 + 200 × 125 = 55000 > 50000
        let result = engine().allocate(&required(300, 200)).unwrap();
        assert!(!result.feasible);

        let err = result.into_result("2022-01-31").unwrap_err();
        assert!(matches!(err, PlanError::InfeasibleAllocation { ref period, .. } if period == "2022-01-31"));
    }

    #[rstest]
    #[case(required(0, 0), 400, 80)]
    #[case(required(400, 80), 400, 80)]
    #[case(required(0, 200), 250, 200)]
    #[case(required(100, 300), 125, 300)]
    fn test_optimal_plans(#[case] req: BTreeMap<String, u64>, #[case] ducks: u64, #[case] fish: u64) {
        let result = engine().allocate(&req).unwrap();
        assert!(result.feasible);
        assert_eq!(result.quantity("Ducks"), Some(ducks));
        assert_eq!(result.quantity("Fish"), Some(fish));
    }

    #[test]
    fn test_missing_metric_defaults_to_zero() {
        let req = BTreeMap::from([("Fish".to_string(), 40)]);
        let result = engine().allocate(&req).unwrap();
        assert_eq!(result.quantity("Ducks"), Some(400));
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let req = BTreeMap::from([("Geese".to_string(), 1)]);
        assert!(matches!(engine().allocate(&req), Err(PlanError::ConfigError(_))));
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let input = AllocationInput::default().with_resource_limit(Decimal::from(-1));
        assert!(AllocationEngine::new(input, SolverSettings::default()).is_err());
    }

    #[test]
    fn test_clamp_to_capacity() {
        let clamped = engine().clamp_to_capacity(&required(500, 20));
        assert_eq!(clamped, required(400, 20));
    }

    #[test]
    fn test_repeated_calls_identical() {
        // 每單位原料利潤相同：多個最優解，結果仍須固定
        let input = AllocationInput::new("pellets".to_string(), Decimal::from(1000))
            .with_metric("A", MetricAllocation::new(Decimal::from(2), Decimal::from(10), 100))
            .with_metric("B", MetricAllocation::new(Decimal::from(4), Decimal::from(20), 100));
        let engine = AllocationEngine::new(input, SolverSettings::default()).unwrap();
        let req = BTreeMap::new();

        let first = engine.allocate(&req).unwrap();
        for _ in 0..5 {
            assert_eq!(engine.allocate(&req).unwrap(), first);
        }
        assert_eq!(first.total_profit, Decimal::from(200));
    }

    #[test]
    fn test_allocate_periods_in_order() {
        let dates: Vec<NaiveDate> = (1..=3)
            .map(|m| plan_core::calendar::last_day_of_month(2022, m).unwrap())
            .collect();
        let records = vec![
            HistoryRecord::new(dates[0], required(50, 40)),
            HistoryRecord::new(dates[1], required(500, 0)),
            HistoryRecord::new(dates[2], required(0, 0)),
        ];

        let allocations = engine().allocate_periods(&records);
        assert_eq!(allocations.len(), 3);
        assert_eq!(
            allocations.iter().map(|a| a.date).collect::<Vec<_>>(),
            dates
        );

        let feasible: Vec<bool> = allocations
            .iter()
            .map(|a| a.outcome.as_ref().unwrap().feasible)
            .collect();
        assert_eq!(feasible, vec![true, false, true]);
    }

    /// 窮舉所有整數點求最大利潤
    fn brute_force(
        req: (u64, u64),
        caps: (u64, u64),
        costs: (Decimal, Decimal),
        profits: (Decimal, Decimal),
        limit: Decimal,
    ) -> Option<Decimal> {
        let mut best = None;
        for d in req.0..=caps.0 {
            for f in req.1..=caps.1 {
                if Decimal::from(d) * costs.0 + Decimal::from(f) * costs.1 <= limit {
                    let profit = Decimal::from(d) * profits.0 + Decimal::from(f) * profits.1;
                    best = Some(best.map_or(profit, |b: Decimal| b.max(profit)));
                }
            }
        }
        best
    }

    proptest! {
        #[test]
        fn prop_feasible_and_optimal(
            req in (0u64..50, 0u64..50),
            caps in (0u64..40, 0u64..40),
            cost_cents in (1i64..3000, 1i64..3000),
            profit_cents in (0i64..1000, 0i64..1000),
            limit_units in 0i64..15_000_000,
        ) {
            // 成本與利潤到分，預算到萬分之一
            let costs = (Decimal::new(cost_cents.0, 2), Decimal::new(cost_cents.1, 2));
            let profits = (Decimal::new(profit_cents.0, 2), Decimal::new(profit_cents.1, 2));
            let limit = Decimal::new(limit_units, 4);

            let input = AllocationInput::new("pellets".to_string(), limit)
                .with_metric("Ducks", MetricAllocation::new(profits.0, costs.0, caps.0))
                .with_metric("Fish", MetricAllocation::new(profits.1, costs.1, caps.1));

            let result = allocate(&required(req.0, req.1), &input).unwrap();

            match brute_force(req, caps, costs, profits, limit) {
                None => prop_assert!(!result.feasible),
                Some(best) => {
                    prop_assert!(result.feasible);
                    let d = result.quantity("Ducks").unwrap();
                    let f = result.quantity("Fish").unwrap();
                    prop_assert!(d >= req.0 && d <= caps.0);
                    prop_assert!(f >= req.1 && f <= caps.1);
                    prop_assert!(Decimal::from(d) * costs.0 + Decimal::from(f) * costs.1 <= limit);
                    prop_assert_eq!(result.total_profit, best);
                }
            }
        }

        #[test]
        fn prop_over_capacity_never_feasible(extra in 1u64..100, fish in 0u64..300) {
            let result = engine().allocate(&required(400 + extra, fish)).unwrap();
            prop_assert!(!result.feasible);
            prop_assert!(result.quantities.is_empty());
        }
    }
}
