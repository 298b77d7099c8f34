//! 分支定界（混合整數求解）
//!
//! 深度優先；分支變數取索引最小的非整數變數，先走下取整分支。
//! 取整後的點須重新通過約束檢查才會成為現有解。
//! 只有界限嚴格優於現有解的節點才會更新現有解，相同輸入必得相同結果。

use plan_core::{PlanError, Result, SolverSettings};

use crate::model::{LinearProgram, Sense};
use crate::simplex::{self, Bounds, LpStatus};

/// 求解狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
}

/// 優化結果
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub status: SolveStatus,

    /// 變數值（非最優時為空）
    pub values: Vec<f64>,

    /// 目標函數值
    pub objective: f64,

    /// 探索過的節點數
    pub nodes_explored: usize,

    /// 優化信息
    pub messages: Vec<String>,
}

impl OptimizationResult {
    /// 創建可行的優化結果
    pub fn feasible(values: Vec<f64>, objective: f64, nodes_explored: usize) -> Self {
        Self {
            status: SolveStatus::Optimal,
            values,
            objective,
            nodes_explored,
            messages: Vec::new(),
        }
    }

    /// 創建不可行的優化結果
    pub fn infeasible(message: String, nodes_explored: usize) -> Self {
        Self {
            status: SolveStatus::Infeasible,
            values: Vec::new(),
            objective: 0.0,
            nodes_explored,
            messages: vec![message],
        }
    }

    fn unbounded(nodes_explored: usize) -> Self {
        Self {
            status: SolveStatus::Unbounded,
            values: Vec::new(),
            objective: 0.0,
            nodes_explored,
            messages: vec!["目標函數無界".to_string()],
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.status == SolveStatus::Optimal
    }
}

/// 分支定界求解器
pub struct BranchAndBound {
    settings: SolverSettings,
}

impl BranchAndBound {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// 求解混合整數模型
    pub fn solve(&self, lp: &LinearProgram) -> Result<OptimizationResult> {
        let int_tol = self.settings.integrality_tolerance;
        let feas_tol = self.settings.feasibility_tolerance;

        // 統一以最大化比較
        let sign = match lp.sense {
            Sense::Maximize => 1.0,
            Sense::Minimize => -1.0,
        };

        let mut stack: Vec<Vec<Bounds>> = vec![simplex::root_bounds(lp)];
        let mut incumbent: Option<(Vec<f64>, f64)> = None;
        let mut nodes = 0usize;

        while let Some(bounds) = stack.pop() {
            nodes += 1;
            if nodes > self.settings.max_nodes {
                return Err(PlanError::SolverError(format!(
                    "模型 {} 超過節點上限 {}",
                    lp.name, self.settings.max_nodes
                )));
            }

            let (values, objective) = match simplex::solve_relaxation(lp, &bounds, feas_tol)? {
                LpStatus::Infeasible => continue,
                LpStatus::Unbounded => {
                    tracing::warn!("模型 {} 的線性鬆弛無界", lp.name);
                    return Ok(OptimizationResult::unbounded(nodes));
                }
                LpStatus::Optimal { values, objective } => (values, objective),
            };

            let score = sign * objective;
            if let Some((_, best)) = &incumbent {
                if score <= best + feas_tol * (1.0 + best.abs()) {
                    continue;
                }
            }

            let fractional = lp
                .variables
                .iter()
                .zip(&values)
                .position(|(var, &x)| var.integer && (x - x.round()).abs() > int_tol);

            let branch_on = match fractional {
                Some(j) => j,
                None => {
                    let snapped: Vec<f64> = lp
                        .variables
                        .iter()
                        .zip(&values)
                        .map(|(var, &x)| if var.integer { x.round() } else { x })
                        .collect();

                    if lp.is_feasible(&snapped, feas_tol) {
                        let snapped_score = sign * lp.objective_value(&snapped);
                        tracing::trace!("節點 {} 找到整數解，目標值 {}", nodes, snapped_score);
                        incumbent = Some((snapped, snapped_score));
                        continue;
                    }

                    // 取整後違反約束：改在尚未精確取整的變數上分支
                    match lp
                        .variables
                        .iter()
                        .zip(&values)
                        .position(|(var, &x)| var.integer && x != x.round())
                    {
                        Some(j) => {
                            tracing::trace!(
                                "節點 {} 取整後不可行，改在 {} = {} 分支",
                                nodes,
                                lp.variables[j].name,
                                values[j]
                            );
                            j
                        }
                        None => continue,
                    }
                }
            };

            let x = values[branch_on];

            let mut up = bounds.clone();
            up[branch_on].lower = x.ceil();

            let mut down = bounds;
            down[branch_on].upper = Some(
                down[branch_on]
                    .upper
                    .map_or(x.floor(), |u| u.min(x.floor())),
            );

            // 後進先出：下取整分支先處理
            stack.push(up);
            stack.push(down);
        }

        tracing::debug!("模型 {} 探索 {} 個節點", lp.name, nodes);

        match incumbent {
            Some((values, _)) => {
                let objective = lp.objective_value(&values);
                Ok(OptimizationResult::feasible(values, objective, nodes))
            }
            None => Ok(OptimizationResult::infeasible(
                format!("模型 {} 無整數可行解", lp.name),
                nodes,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Relation, Variable};

    fn solver() -> BranchAndBound {
        BranchAndBound::new(SolverSettings::default())
    }

    #[test]
    fn test_integer_knapsack() {
        // max 5x + 4y, 6x + 4y ≤ 24, x + 2y ≤ 6 → 鬆弛解 (3, 1.5)，整數最優 (4, 0) = 20
        let mut lp = LinearProgram::new("knapsack", Sense::Maximize);
        let x = lp.add_variable(Variable::integer("x"));
        let y = lp.add_variable(Variable::integer("y"));
        lp.set_objective(&[(x, 5.0), (y, 4.0)]);
        lp.add_constraint("c1", vec![(x, 6.0), (y, 4.0)], Relation::LessEq, 24.0);
        lp.add_constraint("c2", vec![(x, 1.0), (y, 2.0)], Relation::LessEq, 6.0);

        let result = solver().solve(&lp).unwrap();
        assert!(result.is_feasible());
        assert_eq!(result.values, vec![4.0, 0.0]);
        assert!((result.objective - 20.0).abs() < 1e-9);
        assert!(result.nodes_explored > 1);
    }

    #[test]
    fn test_no_integer_point() {
        // 2x = 1 在整數上無解
        let mut lp = LinearProgram::new("parity", Sense::Maximize);
        let x = lp.add_variable(Variable::integer("x"));
        lp.set_objective(&[(x, 1.0)]);
        lp.add_constraint("half", vec![(x, 2.0)], Relation::Equal, 1.0);

        let result = solver().solve(&lp).unwrap();
        assert_eq!(result.status, SolveStatus::Infeasible);
        assert!(result.values.is_empty());
        assert!(!result.messages.is_empty());
    }

    #[test]
    fn test_unbounded() {
        let mut lp = LinearProgram::new("open", Sense::Maximize);
        let x = lp.add_variable(Variable::integer("x"));
        lp.set_objective(&[(x, 1.0)]);

        let result = solver().solve(&lp).unwrap();
        assert_eq!(result.status, SolveStatus::Unbounded);
    }

    #[test]
    fn test_minimize_integer() {
        // min 3x + 2y, x + y ≥ 3.5 → (0, 4) = 8
        let mut lp = LinearProgram::new("cover", Sense::Minimize);
        let x = lp.add_variable(Variable::integer("x"));
        let y = lp.add_variable(Variable::integer("y"));
        lp.set_objective(&[(x, 3.0), (y, 2.0)]);
        lp.add_constraint("demand", vec![(x, 1.0), (y, 1.0)], Relation::GreaterEq, 3.5);

        let result = solver().solve(&lp).unwrap();
        assert_eq!(result.values, vec![0.0, 4.0]);
        assert!((result.objective - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_near_integer_relaxation_rechecked() {
        // 鬆弛解 y = 79.9999992 在整數容差內，但取整成 80 會超出預算
        let mut lp = LinearProgram::new("pellets", Sense::Maximize);
        let x = lp.add_variable(Variable::integer("x").with_upper(400.0));
        let y = lp.add_variable(Variable::integer("y"));
        lp.set_objective(&[(x, 5.0), (y, 4.0)]);
        lp.add_constraint("limit", vec![(x, 100.0), (y, 125.0)], Relation::LessEq, 49_999.9999);

        let result = solver().solve(&lp).unwrap();
        assert!(result.is_feasible());
        assert_eq!(result.values, vec![400.0, 79.0]);
        assert!(lp.is_feasible(&result.values, 0.0));
    }

    #[test]
    fn test_node_limit() {
        let mut lp = LinearProgram::new("knapsack", Sense::Maximize);
        let x = lp.add_variable(Variable::integer("x"));
        let y = lp.add_variable(Variable::integer("y"));
        lp.set_objective(&[(x, 5.0), (y, 4.0)]);
        lp.add_constraint("c1", vec![(x, 6.0), (y, 4.0)], Relation::LessEq, 24.0);
        lp.add_constraint("c2", vec![(x, 1.0), (y, 2.0)], Relation::LessEq, 6.0);

        let tight = BranchAndBound::new(SolverSettings {
            max_nodes: 1,
            ..SolverSettings::default()
        });
        assert!(matches!(tight.solve(&lp), Err(PlanError::SolverError(_))));
    }
}
