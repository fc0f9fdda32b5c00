use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::calculators::{Calculator, Population, ReformContext};
use super::dataset::Dataset;
use super::engine::Simulation;
use super::error::{BudgetError, Result};
use super::geography::{AreaWeights, GEOGRAPHIES};
use super::params::ParameterSet;
use super::reforms::{PolicyConfig, ReformDefinition, reform_catalog};
use super::types::{Entity, ImpactTables};

pub const DEFAULT_OUTPUT_DIR: &str = "./public/data";
pub const DEFAULT_DATA_DIR: &str = "./data";
const SCOTTISH_CODE_PREFIX: &str = "S";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub output_dir: PathBuf,
    pub data_dir: PathBuf,
    pub years: Vec<i32>,
    pub population: Population,
    pub scotland_areas_only: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            years: PolicyConfig::default().default_years,
            population: Population::Scotland,
            scotland_areas_only: true,
        }
    }
}

/// Read-only inputs shared by every reform and year.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub dataset: Arc<Dataset>,
    pub geographies: Vec<AreaWeights>,
}

/// Loads microdata (required) and area weight matrices (optional: a missing
/// geography only skips its calculator).
pub fn load_inputs(options: &PipelineOptions) -> Result<PipelineInputs> {
    let dataset = Arc::new(Dataset::load(&options.data_dir)?);
    let households = dataset.count(Entity::Household);

    let mut geographies = Vec::new();
    for source in &GEOGRAPHIES {
        let weights = match AreaWeights::load(source, &options.data_dir) {
            Ok(weights) => weights,
            Err(err) if err.is_missing_file() => {
                log::warn!("skipping {} impacts: {err}", source.label);
                continue;
            }
            Err(err) => return Err(err),
        };
        if let Some(columns) = weights.household_count() {
            if columns != households {
                return Err(BudgetError::invalid_data(
                    source.weights_file,
                    format!(
                        "{columns} household columns but the dataset has {households} households"
                    ),
                ));
            }
        }
        let weights = if options.scotland_areas_only {
            weights.retain_codes_with_prefix(SCOTTISH_CODE_PREFIX)
        } else {
            weights
        };
        log::info!("loaded {} {} areas", weights.len(), source.label);
        geographies.push(weights);
    }

    Ok(PipelineInputs {
        dataset,
        geographies,
    })
}

/// Reforms matching `ids`, in catalog order. No ids selects everything.
pub fn select_reforms(
    catalog: Vec<ReformDefinition>,
    ids: &[String],
) -> Result<Vec<ReformDefinition>> {
    if ids.is_empty() {
        return Ok(catalog);
    }
    let unknown: Vec<String> = ids
        .iter()
        .filter(|id| !catalog.iter().any(|r| &r.id == *id))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(BudgetError::UnknownReform { ids: unknown });
    }
    Ok(catalog
        .into_iter()
        .filter(|r| ids.contains(&r.id))
        .collect())
}

fn build_pair(
    reform: &ReformDefinition,
    dataset: &Arc<Dataset>,
    base: &ParameterSet,
) -> Result<(Simulation, Simulation)> {
    let (without, with) = reform.oriented();
    Ok((
        without.build(dataset.clone(), base)?,
        with.build(dataset.clone(), base)?,
    ))
}

/// Runs every reform x year x calculator into memory. Nothing is written
/// here, so an error leaves no partial output behind.
pub fn run_pipeline(
    reforms: &[ReformDefinition],
    inputs: &PipelineInputs,
    base: &ParameterSet,
    options: &PipelineOptions,
) -> Result<ImpactTables> {
    let mut calculators = vec![
        Calculator::Budgetary,
        Calculator::Distributional,
        Calculator::WinnersLosers,
        Calculator::Poverty,
    ];
    calculators.extend(inputs.geographies.iter().map(Calculator::Geographic));

    let mut tables = ImpactTables::default();
    for reform in reforms {
        log::info!("processing {}: {}", reform.id, reform.name);
        for &year in &options.years {
            log::debug!("  {} {year}", reform.id);
            let wrap = |source: BudgetError| BudgetError::Reform {
                reform_id: reform.id.clone(),
                year,
                source: Box::new(source),
            };
            let (without, with) = build_pair(reform, &inputs.dataset, base).map_err(wrap)?;
            let ctx = ReformContext {
                reform_id: &reform.id,
                reform_name: &reform.name,
                year,
                active: reform.is_active(year),
            };
            for calculator in &calculators {
                log::trace!("  {} {year}: {}", reform.id, calculator.name());
                calculator
                    .run(&without, &with, &ctx, options.population, &mut tables)
                    .map_err(wrap)?;
            }
        }
    }
    Ok(tables)
}

pub(crate) fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| BudgetError::csv(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| BudgetError::csv(path, e))?;
    }
    writer.flush().map_err(|e| BudgetError::io(path, e))?;
    log::info!("saved {}", path.display());
    Ok(())
}

fn write_table<T: Serialize>(
    output_dir: &Path,
    stem: &str,
    rows: &[T],
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let path = output_dir.join(format!("{stem}.csv"));
    write_rows(&path, rows)?;
    written.push(path);
    Ok(())
}

/// One CSV per non-empty table. Returns the files written.
pub fn write_tables(tables: &ImpactTables, output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir).map_err(|e| BudgetError::io(output_dir, e))?;
    let mut written = Vec::new();
    let dir = output_dir;
    write_table(dir, Calculator::Budgetary.name(), &tables.budgetary, &mut written)?;
    write_table(dir, Calculator::Distributional.name(), &tables.distributional, &mut written)?;
    write_table(dir, Calculator::WinnersLosers.name(), &tables.winners_losers, &mut written)?;
    write_table(dir, Calculator::Poverty.name(), &tables.metrics, &mut written)?;
    for (label, rows) in &tables.areas {
        write_table(dir, label, rows, &mut written)?;
    }
    Ok(written)
}

/// Full batch: select reforms, load inputs, compute everything, then write.
pub fn generate(
    config: &PolicyConfig,
    reform_ids: &[String],
    options: &PipelineOptions,
) -> Result<ImpactTables> {
    let reforms = select_reforms(reform_catalog(config, &options.years), reform_ids)?;
    let inputs = load_inputs(options)?;
    let tables = run_pipeline(&reforms, &inputs, &config.base_parameters(), options)?;
    write_tables(&tables, &options.output_dir)?;
    log::info!("all data saved to {}", options.output_dir.display());
    Ok(tables)
}
