mod calculators;
mod dataset;
mod engine;
mod error;
mod geography;
mod household;
mod params;
mod pipeline;
mod reforms;
mod sample;
mod types;

pub(crate) use dataset::read_records;
pub(crate) use pipeline::write_rows;

pub use calculators::{
    Calculator, DECILE_LABELS, Population, ReformContext, WINNER_THRESHOLD,
    distributional_rows, winners_losers_shares,
};
pub use dataset::{Dataset, HOUSEHOLDS_FILE, HouseholdRecord, PERSONS_FILE, PersonRecord};
pub use engine::{Microsimulation, Simulation, SimulationBuilder};
pub use error::{BudgetError, Result};
pub use geography::{Area, AreaWeights, GEOGRAPHIES, GeographySource};
pub use household::{HouseholdImpact, HouseholdInput, household_impacts};
pub use params::{
    CpiSchedule, FIRST_PARAMETER_YEAR, LAST_PARAMETER_YEAR, Parameter, ParameterSet, ScottishBand,
};
pub use pipeline::{
    DEFAULT_DATA_DIR, DEFAULT_OUTPUT_DIR, PipelineInputs, PipelineOptions, generate, load_inputs,
    run_pipeline, select_reforms, write_tables,
};
pub use reforms::{
    BabyBoostMethod, Modifier, ParameterChange, PolicyConfig, ReformDefinition, Scenario,
    SignConvention, pre_budget_baseline, reform_catalog,
};
pub use sample::{WeightedSample, relative_change};
pub use types::{
    AreaRow, BudgetaryRow, DistributionalRow, Entity, HousingBasis, ImpactTables, MetricRow,
    PovertyKind, Variable,
};
