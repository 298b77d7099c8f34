//! # Plan Optimizer
//!
//! 優化算法模組（整數規劃、配產）

pub mod allocation;
pub mod branch;
pub mod model;
pub mod simplex;

// Re-export 主要類型
pub use allocation::{allocate, AllocationEngine, PeriodAllocation};
pub use branch::{BranchAndBound, OptimizationResult, SolveStatus};
pub use model::{Constraint, LinearProgram, Relation, Sense, Variable};
pub use simplex::{solve_relaxation, Bounds, LpStatus};
