//! 預測與配產配置模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{PlanError, Result};

/// 預測策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastStrategy {
    /// 阻尼趨勢指數平滑（無季節項）
    DampedExponentialSmoothing,

    /// 加法迴歸：趨勢 + 年季節性，懲罰式最小平方法擬合
    AdditiveRegressionWithSeasonality,
}

impl ForecastStrategy {
    /// 命令列使用的策略鍵值
    pub fn key(&self) -> &'static str {
        match self {
            ForecastStrategy::DampedExponentialSmoothing => "exponential",
            ForecastStrategy::AdditiveRegressionWithSeasonality => "prophet",
        }
    }
}

impl Default for ForecastStrategy {
    fn default() -> Self {
        ForecastStrategy::DampedExponentialSmoothing
    }
}

impl fmt::Display for ForecastStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ForecastStrategy {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exponential" | "damped" | "dampedexponentialsmoothing" => {
                Ok(ForecastStrategy::DampedExponentialSmoothing)
            }
            "prophet" | "seasonal" | "additiveregressionwithseasonality" => {
                Ok(ForecastStrategy::AdditiveRegressionWithSeasonality)
            }
            _ => Err(PlanError::UnsupportedStrategy(s.to_string())),
        }
    }
}

/// 加法季節迴歸設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalConfig {
    /// 趨勢轉折敏感度（越小越接近直線趨勢）
    pub changepoint_prior_scale: f64,

    /// 季節項強度先驗
    pub seasonality_prior_scale: f64,

    /// 季節週期（月）
    pub period: usize,

    /// 傅立葉階數上限
    pub fourier_order: usize,

    /// 趨勢轉折點數量
    pub n_changepoints: usize,

    /// 轉折點分布於歷史前段的比例
    pub changepoint_range: f64,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            changepoint_prior_scale: 0.001,
            seasonality_prior_scale: 0.8,
            period: 12,
            fourier_order: 10,
            n_changepoints: 25,
            changepoint_range: 0.8,
        }
    }
}

impl SeasonalConfig {
    /// 建構器模式：設置趨勢轉折敏感度
    pub fn with_changepoint_prior_scale(mut self, scale: f64) -> Self {
        self.changepoint_prior_scale = scale;
        self
    }

    /// 建構器模式：設置季節項強度
    pub fn with_seasonality_prior_scale(mut self, scale: f64) -> Self {
        self.seasonality_prior_scale = scale;
        self
    }

    /// 至少需要兩個完整季節週期
    pub fn min_observations(&self) -> usize {
        self.period * 2
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.changepoint_prior_scale > 0.0 && self.changepoint_prior_scale.is_finite()) {
            return Err(PlanError::ConfigError(
                "changepoint_prior_scale 必須為正數".to_string(),
            ));
        }
        if !(self.seasonality_prior_scale > 0.0 && self.seasonality_prior_scale.is_finite()) {
            return Err(PlanError::ConfigError(
                "seasonality_prior_scale 必須為正數".to_string(),
            ));
        }
        if self.period < 2 {
            return Err(PlanError::ConfigError("季節週期至少為 2".to_string()));
        }
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(PlanError::ConfigError(
                "changepoint_range 必須介於 (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// 預測配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// 預測期數
    pub horizon: usize,

    /// 預測策略
    pub strategy: ForecastStrategy,

    /// 重現用種子（所有工作執行緒共用、唯讀，記錄於日誌）
    pub seed: u64,

    pub seasonal: SeasonalConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 3,
            strategy: ForecastStrategy::default(),
            seed: 0,
            seasonal: SeasonalConfig::default(),
        }
    }
}

impl ForecastConfig {
    /// 創建新的預測配置
    pub fn new(horizon: usize, strategy: ForecastStrategy) -> Self {
        Self {
            horizon,
            strategy,
            ..Self::default()
        }
    }

    /// 建構器模式：設置隨機種子
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// 建構器模式：設置季節迴歸參數
    pub fn with_seasonal(mut self, seasonal: SeasonalConfig) -> Self {
        self.seasonal = seasonal;
        self
    }

    /// 計算開始前檢查配置
    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(PlanError::InvalidHorizon(self.horizon));
        }
        self.seasonal.validate()
    }
}

/// 單一產品線的配產參數
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAllocation {
    /// 單位利潤
    pub unit_profit: Decimal,

    /// 單位原料消耗
    pub resource_cost: Decimal,

    /// 工廠產能上限
    pub max_capacity: u64,
}

impl MetricAllocation {
    pub fn new(unit_profit: Decimal, resource_cost: Decimal, max_capacity: u64) -> Self {
        Self {
            unit_profit,
            resource_cost,
            max_capacity,
        }
    }

    /// 每單位原料可得利潤
    pub fn profit_per_resource(&self) -> Option<Decimal> {
        if self.resource_cost.is_zero() {
            None
        } else {
            Some(self.unit_profit / self.resource_cost)
        }
    }
}

/// 配產輸入（每期共用的預設常數，邏輯上屬於每期配置）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationInput {
    /// 共用原料名稱
    pub resource_name: String,

    /// 原料預算上限
    pub resource_limit: Decimal,

    /// 各產品線參數
    pub metrics: BTreeMap<String, MetricAllocation>,
}

impl Default for AllocationInput {
    fn default() -> Self {
        Self::new("pellets".to_string(), Decimal::from(50_000))
            .with_metric(
                "Ducks",
                MetricAllocation::new(Decimal::from(5), Decimal::from(100), 400),
            )
            .with_metric(
                "Fish",
                MetricAllocation::new(Decimal::from(4), Decimal::from(125), 300),
            )
    }
}

impl AllocationInput {
    /// 創建不含產品線的配產輸入
    pub fn new(resource_name: String, resource_limit: Decimal) -> Self {
        Self {
            resource_name,
            resource_limit,
            metrics: BTreeMap::new(),
        }
    }

    /// 建構器模式：加入產品線
    pub fn with_metric(mut self, name: &str, allocation: MetricAllocation) -> Self {
        self.metrics.insert(name.to_string(), allocation);
        self
    }

    /// 建構器模式：設置原料預算
    pub fn with_resource_limit(mut self, limit: Decimal) -> Self {
        self.resource_limit = limit;
        self
    }

    /// 從 JSON 載入
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PlanError::ConfigError(format!("配產參數 JSON 解析失敗: {}", e)))
    }

    pub fn metric(&self, name: &str) -> Option<&MetricAllocation> {
        self.metrics.get(name)
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.keys().cloned().collect()
    }

    /// 計算開始前檢查配置
    pub fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() {
            return Err(PlanError::ConfigError("至少需要一條產品線".to_string()));
        }
        if self.resource_limit < Decimal::ZERO {
            return Err(PlanError::ConfigError(format!(
                "{} 預算不可為負: {}",
                self.resource_name, self.resource_limit
            )));
        }
        for (name, metric) in &self.metrics {
            if metric.resource_cost < Decimal::ZERO {
                return Err(PlanError::ConfigError(format!(
                    "{} 的 {} 單位消耗不可為負: {}",
                    name, self.resource_name, metric.resource_cost
                )));
            }
        }
        Ok(())
    }
}

/// 分支定界求解器設定（固定設定以保證結果可重現）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// 最多探索的節點數
    pub max_nodes: usize,

    /// 整數判定容差
    pub integrality_tolerance: f64,

    /// 可行性判定容差
    pub feasibility_tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_nodes: 10_000,
            integrality_tolerance: 1e-6,
            feasibility_tolerance: 1e-9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("exponential", ForecastStrategy::DampedExponentialSmoothing)]
    #[case("Damped", ForecastStrategy::DampedExponentialSmoothing)]
    #[case("prophet", ForecastStrategy::AdditiveRegressionWithSeasonality)]
    #[case(" SEASONAL ", ForecastStrategy::AdditiveRegressionWithSeasonality)]
    fn test_parse_strategy(#[case] key: &str, #[case] expected: ForecastStrategy) {
        assert_eq!(key.parse::<ForecastStrategy>().unwrap(), expected);
    }

    #[test]
    fn test_unsupported_strategy() {
        let err = "linear".parse::<ForecastStrategy>().unwrap_err();
        assert!(matches!(err, PlanError::UnsupportedStrategy(ref s) if s == "linear"));
    }

    #[test]
    fn test_strategy_key_round_trip() {
        for strategy in [
            ForecastStrategy::DampedExponentialSmoothing,
            ForecastStrategy::AdditiveRegressionWithSeasonality,
        ] {
            assert_eq!(strategy.key().parse::<ForecastStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_forecast_config_validate() {
        assert!(ForecastConfig::default().validate().is_ok());

        let config = ForecastConfig::new(0, ForecastStrategy::DampedExponentialSmoothing);
        assert!(matches!(config.validate(), Err(PlanError::InvalidHorizon(0))));

        let config = ForecastConfig::default()
            .with_seasonal(SeasonalConfig::default().with_changepoint_prior_scale(0.0));
        assert!(matches!(config.validate(), Err(PlanError::ConfigError(_))));
    }

    #[test]
    fn test_default_allocation_input() {
        let input = AllocationInput::default();

        assert_eq!(input.resource_limit, Decimal::from(50_000));
        assert_eq!(input.metric_names(), vec!["Ducks".to_string(), "Fish".to_string()]);

        let ducks = input.metric("Ducks").unwrap();
        assert_eq!(ducks.max_capacity, 400);
        assert_eq!(ducks.profit_per_resource(), Some(Decimal::new(5, 2)));

        let fish = input.metric("Fish").unwrap();
        assert_eq!(fish.profit_per_resource(), Some(Decimal::new(32, 3)));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_allocation_input_from_json() {
        let json = r#"{
            "resource_name": "pellets",
            "resource_limit": 1000,
            "metrics": {
                "Ducks": { "unit_profit": 5, "resource_cost": 10, "max_capacity": 50 }
            }
        }"#;

        let input = AllocationInput::from_json(json).unwrap();
        assert_eq!(input.resource_limit, Decimal::from(1000));
        assert_eq!(input.metric("Ducks").unwrap().max_capacity, 50);

        assert!(matches!(
            AllocationInput::from_json("{"),
            Err(PlanError::ConfigError(_))
        ));
    }

    #[test]
    fn test_allocation_input_validate() {
        let empty = AllocationInput::new("pellets".to_string(), Decimal::from(10));
        assert!(empty.validate().is_err());

        let negative = AllocationInput::default().with_resource_limit(Decimal::from(-1));
        assert!(negative.validate().is_err());

        let negative_cost = AllocationInput::default().with_metric(
            "Fish",
            MetricAllocation::new(Decimal::from(4), Decimal::from(-125), 300),
        );
        assert!(negative_cost.validate().is_err());
    }
}
