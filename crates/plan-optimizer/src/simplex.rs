//! 兩階段單純形法（線性鬆弛求解）
//!
//! 稠密表格實作，進基與離基都採 Bland 規則：結果只取決於輸入，且不會循環。

use plan_core::{PlanError, Result};

use crate::model::{LinearProgram, Relation, Sense};

/// 單次求解的樞軸上限
const MAX_PIVOTS: usize = 50_000;

/// 變數界限（分支時逐節點收緊）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: Option<f64>,
}

/// 線性鬆弛求解狀態
#[derive(Debug, Clone, PartialEq)]
pub enum LpStatus {
    Optimal { values: Vec<f64>, objective: f64 },
    Infeasible,
    Unbounded,
}

enum Outcome {
    Optimal,
    Unbounded,
}

struct Tableau {
    rows: Vec<Vec<f64>>,
    basis: Vec<usize>,
    rhs_col: usize,
    tolerance: f64,
}

impl Tableau {
    fn reduced_cost(&self, cost: &[f64], col: usize) -> f64 {
        let basic: f64 = self
            .rows
            .iter()
            .zip(&self.basis)
            .map(|(row, &b)| cost[b] * row[col])
            .sum();
        cost[col] - basic
    }

    fn pivot(&mut self, pivot_row: usize, col: usize) {
        let p = self.rows[pivot_row][col];
        self.rows[pivot_row].iter_mut().for_each(|v| *v /= p);

        let pivot_values = self.rows[pivot_row].clone();
        for (i, row) in self.rows.iter_mut().enumerate() {
            if i == pivot_row {
                continue;
            }
            let factor = row[col];
            if factor != 0.0 {
                row.iter_mut()
                    .zip(&pivot_values)
                    .for_each(|(v, &pv)| *v -= factor * pv);
                row[col] = 0.0;
            }
        }
        self.basis[pivot_row] = col;
    }

    /// 最大化 `cost · x`；只有索引小於 `enterable` 的欄可以進基
    fn optimize(&mut self, cost: &[f64], enterable: usize) -> Result<Outcome> {
        let tol = self.tolerance;

        for _ in 0..MAX_PIVOTS {
            let entering = (0..enterable)
                .find(|&j| !self.basis.contains(&j) && self.reduced_cost(cost, j) > tol);
            let Some(col) = entering else {
                return Ok(Outcome::Optimal);
            };

            let mut leaving: Option<(usize, f64)> = None;
            for (i, row) in self.rows.iter().enumerate() {
                let a = row[col];
                if a <= tol {
                    continue;
                }
                let ratio = row[self.rhs_col] / a;
                leaving = match leaving {
                    None => Some((i, ratio)),
                    Some((best, best_ratio)) => {
                        let tie = (ratio - best_ratio).abs() <= tol;
                        if ratio < best_ratio - tol || (tie && self.basis[i] < self.basis[best]) {
                            Some((i, ratio))
                        } else {
                            Some((best, best_ratio))
                        }
                    }
                };
            }

            let Some((row, _)) = leaving else {
                return Ok(Outcome::Unbounded);
            };
            self.pivot(row, col);
        }

        Err(PlanError::SolverError(format!(
            "單純形法超過 {} 次樞軸仍未收斂",
            MAX_PIVOTS
        )))
    }

    /// 第一階段結束後把值為 0 的人工變數換出基底
    fn drive_out_artificials(&mut self, artificial_start: usize) {
        for i in 0..self.rows.len() {
            if self.basis[i] < artificial_start {
                continue;
            }
            if let Some(col) = (0..artificial_start).find(|&j| self.rows[i][j].abs() > self.tolerance) {
                self.pivot(i, col);
            }
            // 找不到代表該列為冗餘約束，人工變數留在基底且恆為 0
        }
    }
}

/// 模型本身的變數界限
pub fn root_bounds(lp: &LinearProgram) -> Vec<Bounds> {
    lp.variables
        .iter()
        .map(|v| Bounds {
            lower: v.lower,
            upper: v.upper,
        })
        .collect()
}

/// 求解線性鬆弛（忽略整數性）
pub fn solve_relaxation(lp: &LinearProgram, bounds: &[Bounds], tolerance: f64) -> Result<LpStatus> {
    let n = lp.num_variables();
    if bounds.len() != n {
        return Err(PlanError::SolverError(format!(
            "界限數量 {} 與變數數量 {} 不符",
            bounds.len(),
            n
        )));
    }

    for (var, b) in lp.variables.iter().zip(bounds) {
        if !b.lower.is_finite() {
            return Err(PlanError::SolverError(format!("變數 {} 的下界必須為有限值", var.name)));
        }
        if let Some(upper) = b.upper {
            if upper < b.lower - tolerance {
                return Ok(LpStatus::Infeasible);
            }
        }
    }

    // 以 y = x - lower 平移，使所有變數非負
    let mut rows: Vec<(Vec<f64>, Relation, f64)> = Vec::new();
    for constraint in &lp.constraints {
        let mut coeffs = vec![0.0; n];
        for &(j, a) in &constraint.terms {
            coeffs[j] += a;
        }
        let shift: f64 = coeffs.iter().zip(bounds).map(|(a, b)| a * b.lower).sum();
        rows.push((coeffs, constraint.relation, constraint.rhs - shift));
    }
    for (j, b) in bounds.iter().enumerate() {
        if let Some(upper) = b.upper {
            let mut coeffs = vec![0.0; n];
            coeffs[j] = 1.0;
            rows.push((coeffs, Relation::LessEq, upper - b.lower));
        }
    }

    // 右式非負
    for (coeffs, relation, rhs) in rows.iter_mut() {
        if *rhs < 0.0 {
            coeffs.iter_mut().for_each(|a| *a = -*a);
            *rhs = -*rhs;
            *relation = match *relation {
                Relation::LessEq => Relation::GreaterEq,
                Relation::GreaterEq => Relation::LessEq,
                Relation::Equal => Relation::Equal,
            };
        }
    }

    let m = rows.len();
    let n_slack = rows.iter().filter(|r| r.1 != Relation::Equal).count();
    let n_artificial = rows.iter().filter(|r| r.1 != Relation::LessEq).count();
    let artificial_start = n + n_slack;
    let total = artificial_start + n_artificial;
    let rhs_scale = rows.iter().fold(1.0_f64, |acc, r| acc.max(r.2.abs()));

    let mut tableau = Tableau {
        rows: vec![vec![0.0; total + 1]; m],
        basis: vec![0; m],
        rhs_col: total,
        tolerance,
    };

    let (mut slack, mut artificial) = (n, artificial_start);
    for (i, (coeffs, relation, rhs)) in rows.into_iter().enumerate() {
        let row = &mut tableau.rows[i];
        row[..n].copy_from_slice(&coeffs);
        row[total] = rhs;
        match relation {
            Relation::LessEq => {
                row[slack] = 1.0;
                tableau.basis[i] = slack;
                slack += 1;
            }
            Relation::GreaterEq => {
                row[slack] = -1.0;
                slack += 1;
                row[artificial] = 1.0;
                tableau.basis[i] = artificial;
                artificial += 1;
            }
            Relation::Equal => {
                row[artificial] = 1.0;
                tableau.basis[i] = artificial;
                artificial += 1;
            }
        }
    }

    // 第一階段：最小化人工變數總和
    if n_artificial > 0 {
        let mut phase_one = vec![0.0; total];
        phase_one[artificial_start..].iter_mut().for_each(|c| *c = -1.0);

        if let Outcome::Unbounded = tableau.optimize(&phase_one, total)? {
            return Err(PlanError::SolverError("第一階段不應無界".to_string()));
        }

        let infeasibility: f64 = tableau
            .rows
            .iter()
            .zip(&tableau.basis)
            .filter(|(_, &b)| b >= artificial_start)
            .map(|(row, _)| row[total])
            .sum();
        if infeasibility > tolerance * rhs_scale {
            return Ok(LpStatus::Infeasible);
        }

        tableau.drive_out_artificials(artificial_start);
    }

    // 第二階段：原目標（最小化轉為最大化）
    let sign = match lp.sense {
        Sense::Maximize => 1.0,
        Sense::Minimize => -1.0,
    };
    let mut phase_two = vec![0.0; total];
    for (c, &obj) in phase_two.iter_mut().zip(&lp.objective) {
        *c = sign * obj;
    }

    if let Outcome::Unbounded = tableau.optimize(&phase_two, artificial_start)? {
        return Ok(LpStatus::Unbounded);
    }

    let mut values: Vec<f64> = bounds.iter().map(|b| b.lower).collect();
    for (row, &b) in tableau.rows.iter().zip(&tableau.basis) {
        if b < n {
            values[b] += row[total];
        }
    }
    let objective = lp.objective_value(&values);

    Ok(LpStatus::Optimal { values, objective })
}
