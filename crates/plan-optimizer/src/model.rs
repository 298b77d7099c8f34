//! 線性規劃模型

use serde::{Deserialize, Serialize};

/// 目標方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Maximize,
    Minimize,
}

/// 約束關係
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    /// ≤
    LessEq,
    /// ≥
    GreaterEq,
    /// =
    Equal,
}

/// 決策變數
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,

    /// 下界（必須為有限值）
    pub lower: f64,

    /// 上界（None 表示無上界）
    pub upper: Option<f64>,

    /// 是否為整數變數
    pub integer: bool,
}

impl Variable {
    /// 非負連續變數
    pub fn continuous(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lower: 0.0,
            upper: None,
            integer: false,
        }
    }

    /// 非負整數變數
    pub fn integer(name: &str) -> Self {
        Self {
            integer: true,
            ..Self::continuous(name)
        }
    }

    /// 建構器模式：設置下界
    pub fn with_lower(mut self, lower: f64) -> Self {
        self.lower = lower;
        self
    }

    /// 建構器模式：設置上界
    pub fn with_upper(mut self, upper: f64) -> Self {
        self.upper = Some(upper);
        self
    }
}

/// 線性約束（稀疏係數）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub terms: Vec<(usize, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

impl Constraint {
    /// 約束左式在 `values` 的值
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(j, a)| a * values[j]).sum()
    }

    /// 檢查是否成立
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs(values);
        match self.relation {
            Relation::LessEq => lhs <= self.rhs + tolerance,
            Relation::GreaterEq => lhs >= self.rhs - tolerance,
            Relation::Equal => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// 混合整數線性規劃模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearProgram {
    pub name: String,
    pub sense: Sense,
    pub variables: Vec<Variable>,
    pub objective: Vec<f64>,
    pub constraints: Vec<Constraint>,
}

impl LinearProgram {
    /// 創建空模型
    pub fn new(name: &str, sense: Sense) -> Self {
        Self {
            name: name.to_string(),
            sense,
            variables: Vec::new(),
            objective: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// 加入變數，回傳索引
    pub fn add_variable(&mut self, variable: Variable) -> usize {
        self.variables.push(variable);
        self.objective.push(0.0);
        self.variables.len() - 1
    }

    /// 設置目標係數
    pub fn set_objective(&mut self, terms: &[(usize, f64)]) {
        self.objective.iter_mut().for_each(|c| *c = 0.0);
        for &(j, c) in terms {
            self.objective[j] = c;
        }
    }

    /// 加入約束
    pub fn add_constraint(&mut self, name: &str, terms: Vec<(usize, f64)>, relation: Relation, rhs: f64) {
        self.constraints.push(Constraint {
            name: name.to_string(),
            terms,
            relation,
            rhs,
        });
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// 目標函數值
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.iter().zip(values).map(|(c, x)| c * x).sum()
    }

    /// 檢查變數界限、整數性與所有約束
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        let bounds_ok = self.variables.iter().zip(values).all(|(var, &x)| {
            x >= var.lower - tolerance
                && var.upper.map_or(true, |u| x <= u + tolerance)
                && (!var.integer || (x - x.round()).abs() <= tolerance)
        });

        bounds_ok && self.constraints.iter().all(|c| c.is_satisfied(values, tolerance))
    }
}
