//! 子命令實作

use anyhow::{Context, Result};
use plan_core::{AllocationInput, ForecastConfig, ForecastStrategy, HistoryStore, PlanRow, SolverSettings};
use plan_forecast::ForecastEngine;
use plan_optimizer::AllocationEngine;
use std::fs;

use crate::assembler::{self, ResultAssembler};
use crate::cli::{AllocateArgs, ForecastArgs, NormalizeArgs};
use crate::{normalize, table};

pub fn normalize(args: NormalizeArgs) -> Result<()> {
    let raw = normalize::read_raw(&args.input)?;
    let records = normalize::normalize_rows(&raw, &args.metrics)
        .with_context(|| format!("無法整理 {}", args.input.display()))?;

    let rows: Vec<PlanRow> = records.into_iter().map(PlanRow::new).collect();
    table::write_table(&args.output, &args.metrics, &rows)?;

    println!("整理完成：{} 列寫入 {}", rows.len(), args.output.display());
    Ok(())
}

pub fn forecast(args: ForecastArgs) -> Result<()> {
    // 方法與期數在讀檔前檢查
    let strategy: ForecastStrategy = args.method.parse()?;
    let config = ForecastConfig::new(args.count, strategy).with_seed(args.seed);
    let engine = ForecastEngine::new(config)?;

    let input = table::read_table(&args.input)?;
    let store = HistoryStore::new(input.records, input.metric_names)
        .with_context(|| format!("{} 不是有效的歷史資料", args.input.display()))?;

    let batch = engine.forecast_store(&store);
    for warning in batch.warnings() {
        println!("警告 {}: {}", warning.metric, warning.message);
    }
    let forecast = batch.into_records().context("預測失敗")?;

    let rows = assembler::forecast_rows(&store, forecast);
    table::write_table(&args.output, store.metric_names(), &rows)?;

    println!(
        "預測完成：{} 期（{}）寫入 {}",
        args.count,
        strategy,
        args.output.display()
    );
    Ok(())
}

pub fn allocate(args: AllocateArgs) -> Result<()> {
    let params = match &args.params {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("無法讀取配產參數 {}", path.display()))?;
            AllocationInput::from_json(&json)?
        }
        None => AllocationInput::default(),
    };
    let engine = AllocationEngine::new(params, SolverSettings::default())?;

    let input = table::read_table(&args.input)?;
    let rows = ResultAssembler::new(&engine, args.on_infeasible).assemble(input.records)?;
    table::write_table(&args.output, &input.metric_names, &rows)?;

    let infeasible = rows.iter().filter(|r| r.is_feasible() == Some(false)).count();
    println!(
        "配產完成：{} 期（{} 期無可行解）寫入 {}",
        rows.len(),
        infeasible,
        args.output.display()
    );
    Ok(())
}
