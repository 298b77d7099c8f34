//! 小型稠密線性代數

use ndarray::{Array1, Array2};
use plan_core::{PlanError, Result};

/// 以 Cholesky 分解解對稱正定系統 `A x = b`
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    if a.dim() != (n, n) {
        return Err(PlanError::CalculationError(format!(
            "矩陣維度不符: {:?} 對 {}",
            a.dim(),
            n
        )));
    }

    // 下三角 L，A = L Lᵀ
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let dot: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - dot;
                if diag <= 0.0 || !diag.is_finite() {
                    return Err(PlanError::CalculationError(format!(
                        "矩陣非正定（第 {} 列主元 {}）",
                        i, diag
                    )));
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - dot) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let dot: f64 = (0..i).map(|k| l[[i, k]] * y[k]).sum();
        y[i] = (b[i] - dot) / l[[i, i]];
    }

    // Lᵀ x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let dot: f64 = (i + 1..n).map(|k| l[[k, i]] * x[k]).sum();
        x[i] = (y[i] - dot) / l[[i, i]];
    }

    Ok(x)
}
