use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::dataset::Dataset;
use super::engine::{Microsimulation, Simulation, SimulationBuilder};
use super::error::{BudgetError, Result};
use super::params::{CpiSchedule, Parameter, ParameterSet, ScottishBand};
use super::types::{Entity, Variable};

const WEEKS_IN_YEAR: f64 = 52.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BabyBoostMethod {
    /// Switch the engine's own under-one premium on.
    ParameterFlag,
    /// Leave the engine premium off and top up calculated SCP values.
    ValueTopUp,
}

/// Policy constants for the 2026-27 budget. Loaded once, validated, then
/// passed explicitly into reform construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub basic_threshold_2026: f64,
    pub intermediate_threshold_2026: f64,
    pub higher_threshold_frozen: f64,
    pub advanced_threshold_frozen: f64,
    pub top_threshold_frozen: f64,
    pub uplift_base_year: i32,
    pub freeze_years: Vec<i32>,
    pub scp_baseline_rate: f64,
    pub scp_inflation_rate: f64,
    pub scp_baby_rate: f64,
    pub baby_boost_start_year: i32,
    pub baby_boost_method: BabyBoostMethod,
    pub cpi: CpiSchedule,
    pub default_years: Vec<i32>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            basic_threshold_2026: 3_968.0,
            intermediate_threshold_2026: 16_957.0,
            higher_threshold_frozen: 31_093.0,
            advanced_threshold_frozen: 62_431.0,
            top_threshold_frozen: 112_571.0,
            uplift_base_year: 2026,
            freeze_years: vec![2027, 2028],
            scp_baseline_rate: 27.15,
            scp_inflation_rate: 28.20,
            scp_baby_rate: 40.0,
            baby_boost_start_year: 2027,
            baby_boost_method: BabyBoostMethod::ParameterFlag,
            cpi: CpiSchedule::default(),
            default_years: vec![2026, 2027, 2028, 2029, 2030],
        }
    }
}

impl PolicyConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BudgetError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|e| BudgetError::io(path, e))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        log::info!("loaded policy configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("basic_threshold_2026", self.basic_threshold_2026),
            ("intermediate_threshold_2026", self.intermediate_threshold_2026),
            ("higher_threshold_frozen", self.higher_threshold_frozen),
            ("advanced_threshold_frozen", self.advanced_threshold_frozen),
            ("top_threshold_frozen", self.top_threshold_frozen),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(BudgetError::Config(format!("{name} must be finite and >= 0")));
            }
        }
        if thresholds.windows(2).any(|pair| pair[0].1 >= pair[1].1) {
            return Err(BudgetError::Config(
                "thresholds must be strictly increasing from basic to top".to_string(),
            ));
        }

        let rates = [
            ("scp_baseline_rate", self.scp_baseline_rate),
            ("scp_inflation_rate", self.scp_inflation_rate),
            ("scp_baby_rate", self.scp_baby_rate),
        ];
        for (name, value) in rates {
            if !value.is_finite() || value < 0.0 {
                return Err(BudgetError::Config(format!("{name} must be finite and >= 0")));
            }
        }
        if self.scp_baby_rate < self.scp_inflation_rate {
            return Err(BudgetError::Config(
                "scp_baby_rate must be >= scp_inflation_rate".to_string(),
            ));
        }

        if self.freeze_years.is_empty() {
            return Err(BudgetError::Config("freeze_years must not be empty".to_string()));
        }
        if self.freeze_years.windows(2).any(|pair| pair[1] != pair[0] + 1) {
            return Err(BudgetError::Config(
                "freeze_years must be consecutive and ascending".to_string(),
            ));
        }
        if self.default_years.is_empty() {
            return Err(BudgetError::Config("default_years must not be empty".to_string()));
        }
        if !self.cpi.fallback.is_finite() || self.cpi.fallback <= -1.0 {
            return Err(BudgetError::Config("cpi.fallback must be > -1".to_string()));
        }
        if let Some((year, _)) = self
            .cpi
            .rates
            .iter()
            .find(|(_, rate)| !rate.is_finite() || **rate <= -1.0)
        {
            return Err(BudgetError::Config(format!("cpi rate for {year} must be > -1")));
        }
        Ok(())
    }

    /// Engine defaults with thresholds uprated by this configuration's CPI.
    pub fn base_parameters(&self) -> ParameterSet {
        ParameterSet::uprated(&self.cpi)
    }

    fn first_freeze_year(&self) -> i32 {
        self.freeze_years.iter().copied().min().unwrap_or(i32::MAX)
    }

    fn last_freeze_year(&self) -> i32 {
        self.freeze_years.iter().copied().max().unwrap_or(i32::MIN)
    }

    fn uplifted_threshold(&self, value_2026: f64, year: i32) -> Option<f64> {
        (year >= self.uplift_base_year)
            .then(|| self.cpi.uprate(value_2026, self.uplift_base_year, year))
    }

    fn frozen_threshold(&self, frozen: f64, year: i32) -> Option<f64> {
        if year < self.first_freeze_year() {
            None
        } else if year <= self.last_freeze_year() {
            Some(frozen)
        } else {
            Some(self.cpi.uprate(frozen, self.last_freeze_year(), year))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterChange {
    pub parameter: Parameter,
    pub year: i32,
    pub value: f64,
}

/// Value-setting transformations run after parameters are frozen. Each one
/// starts from formula values, so applying it again leaves results unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    /// Adds `weekly_boost` per baby under one to every benefit unit already
    /// receiving SCP.
    ScpBabyTopUp { years: Vec<i32>, weekly_boost: f64 },
}

impl Modifier {
    pub fn apply<M: Microsimulation + ?Sized>(&self, sim: &mut M) -> Result<()> {
        match self {
            Modifier::ScpBabyTopUp {
                years,
                weekly_boost,
            } => {
                for &year in years {
                    let scp = sim.formula_values(Variable::ScottishChildPayment, year)?;
                    let ages = sim.calculate(Variable::Age, year, None)?;
                    let babies: Vec<f64> = ages
                        .values()
                        .iter()
                        .map(|age| if *age < 1.0 { 1.0 } else { 0.0 })
                        .collect();
                    let babies = sim.map_result(&babies, Entity::Person, Entity::BenUnit)?;
                    let topped = scp
                        .iter()
                        .zip(&babies)
                        .map(|(current, count)| {
                            if *current > 0.0 {
                                current + count * weekly_boost * WEEKS_IN_YEAR
                            } else {
                                *current
                            }
                        })
                        .collect();
                    sim.set_input(Variable::ScottishChildPayment, year, topped)?;
                }
                Ok(())
            }
        }
    }
}

/// Ordered parameter changes plus modifiers. Building always applies every
/// parameter change before the simulation exists, then runs modifiers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scenario {
    parameter_changes: Vec<ParameterChange>,
    modifiers: Vec<Modifier>,
}

impl Scenario {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn parameter_changes(&self) -> &[ParameterChange] {
        &self.parameter_changes
    }

    pub fn with_change(mut self, parameter: Parameter, year: i32, value: f64) -> Self {
        self.parameter_changes.push(ParameterChange {
            parameter,
            year,
            value,
        });
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn merge(mut self, other: Scenario) -> Self {
        self.parameter_changes.extend(other.parameter_changes);
        self.modifiers.extend(other.modifiers);
        self
    }

    pub fn configure(&self, builder: &mut SimulationBuilder) {
        for change in &self.parameter_changes {
            builder.update(change.parameter, change.year, change.value);
        }
    }

    pub fn build(&self, dataset: Arc<Dataset>, base: &ParameterSet) -> Result<Simulation> {
        let mut builder = SimulationBuilder::new(dataset, base.clone());
        self.configure(&mut builder);
        let mut sim = builder.build();
        for modifier in &self.modifiers {
            modifier.apply(&mut sim)?;
        }
        Ok(sim)
    }
}

/// Which side of a reform pair has the policy switched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignConvention {
    ReformEnables,
    /// The policy ships on in the engine; the reform scenario is the
    /// counterfactual with it switched off.
    ReformDisables,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReformDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub applicable_years: Vec<i32>,
    pub sign: SignConvention,
    pub baseline: Scenario,
    pub reform: Scenario,
}

impl ReformDefinition {
    /// (without policy, with policy), so every difference reads as the
    /// gain to households from the policy.
    pub fn oriented(&self) -> (&Scenario, &Scenario) {
        match self.sign {
            SignConvention::ReformEnables => (&self.baseline, &self.reform),
            SignConvention::ReformDisables => (&self.reform, &self.baseline),
        }
    }

    pub fn is_active(&self, year: i32) -> bool {
        self.applicable_years.contains(&year)
    }
}

fn scp_rate(rate: f64, years: &[i32]) -> Scenario {
    years.iter().fold(Scenario::identity(), |s, &year| {
        s.with_change(Parameter::ScpAmount, year, rate)
    })
}

fn premium_off(years: &[i32]) -> Scenario {
    years.iter().fold(Scenario::identity(), |s, &year| {
        s.with_change(Parameter::ScpBabyPremiumInEffect, year, 0.0)
    })
}

fn premium_on(config: &PolicyConfig, years: &[i32]) -> Scenario {
    let active: Vec<i32> = years
        .iter()
        .copied()
        .filter(|year| *year >= config.baby_boost_start_year)
        .collect();
    match config.baby_boost_method {
        BabyBoostMethod::ParameterFlag => years.iter().fold(Scenario::identity(), |s, &year| {
            let on = year >= config.baby_boost_start_year;
            s.with_change(Parameter::ScpBabyPremiumInEffect, year, if on { 1.0 } else { 0.0 })
                .with_change(Parameter::ScpBabyAmount, year, config.scp_baby_rate)
        }),
        BabyBoostMethod::ValueTopUp => {
            let scenario = premium_off(years);
            if active.is_empty() {
                scenario
            } else {
                scenario.with_modifier(Modifier::ScpBabyTopUp {
                    years: active,
                    weekly_boost: config.scp_baby_rate - config.scp_inflation_rate,
                })
            }
        }
    }
}

/// SCP at the pre-budget rate with the under-one premium switched off.
pub fn pre_budget_baseline(config: &PolicyConfig, years: &[i32]) -> Scenario {
    scp_rate(config.scp_baseline_rate, years).merge(premium_off(years))
}

fn basic_uplift(config: &PolicyConfig, years: &[i32]) -> Scenario {
    threshold_schedule(ScottishBand::Basic, years, |year| {
        config.uplifted_threshold(config.basic_threshold_2026, year)
    })
}

fn intermediate_uplift(config: &PolicyConfig, years: &[i32]) -> Scenario {
    threshold_schedule(ScottishBand::Intermediate, years, |year| {
        config.uplifted_threshold(config.intermediate_threshold_2026, year)
    })
}

fn freeze(config: &PolicyConfig, band: ScottishBand, frozen: f64, years: &[i32]) -> Scenario {
    threshold_schedule(band, years, |year| config.frozen_threshold(frozen, year))
}

fn threshold_schedule(
    band: ScottishBand,
    years: &[i32],
    value: impl Fn(i32) -> Option<f64>,
) -> Scenario {
    years.iter().fold(Scenario::identity(), |s, &year| match value(year) {
        Some(threshold) => s.with_change(Parameter::ScottishThreshold(band), year, threshold),
        None => s,
    })
}

fn years_from(years: &[i32], first: i32) -> Vec<i32> {
    years.iter().copied().filter(|y| *y >= first).collect()
}

/// The eight budget reforms for `years`, combined package first.
pub fn reform_catalog(config: &PolicyConfig, years: &[i32]) -> Vec<ReformDefinition> {
    let pre_budget = pre_budget_baseline(config, years);
    let inflation = scp_rate(config.scp_inflation_rate, years);
    let first_freeze = config.first_freeze_year();

    let freezes = [
        (
            "higher_rate_freeze",
            "Higher rate threshold freeze",
            ScottishBand::Higher,
            config.higher_threshold_frozen,
        ),
        (
            "advanced_rate_freeze",
            "Advanced rate threshold freeze",
            ScottishBand::Advanced,
            config.advanced_threshold_frozen,
        ),
        (
            "top_rate_freeze",
            "Top rate threshold freeze",
            ScottishBand::Top,
            config.top_threshold_frozen,
        ),
    ];

    let combined = inflation
        .clone()
        .merge(premium_on(config, years))
        .merge(basic_uplift(config, years))
        .merge(intermediate_uplift(config, years))
        .merge(freezes.iter().fold(Scenario::identity(), |s, (_, _, band, frozen)| {
            s.merge(freeze(config, *band, *frozen, years))
        }));

    let mut catalog = vec![
        ReformDefinition {
            id: "combined".to_string(),
            name: "Scottish Budget 2026-27 package".to_string(),
            description: "SCP inflation rise and under-one premium, basic and intermediate \
                          threshold uplifts, and higher, advanced and top threshold freezes \
                          applied together."
                .to_string(),
            applicable_years: years.to_vec(),
            sign: SignConvention::ReformEnables,
            baseline: pre_budget.clone(),
            reform: combined,
        },
        ReformDefinition {
            id: "scp_inflation".to_string(),
            name: format!("SCP inflation adjustment (£{:.2}/week)", config.scp_inflation_rate),
            description: format!(
                "Scottish Child Payment rises from £{:.2} to £{:.2} per week.",
                config.scp_baseline_rate, config.scp_inflation_rate
            ),
            applicable_years: years.to_vec(),
            sign: SignConvention::ReformEnables,
            baseline: pre_budget.clone(),
            reform: inflation.clone().merge(premium_off(years)),
        },
        ReformDefinition {
            id: "scp_baby_boost".to_string(),
            name: format!("SCP Premium for under-ones (£{:.0}/week)", config.scp_baby_rate),
            description: format!(
                "SCP paid at £{:.2} per week for babies under one from {}.",
                config.scp_baby_rate, config.baby_boost_start_year
            ),
            applicable_years: years_from(years, config.baby_boost_start_year),
            sign: SignConvention::ReformDisables,
            baseline: inflation.clone().merge(premium_on(config, years)),
            reform: inflation.clone().merge(premium_off(years)),
        },
        ReformDefinition {
            id: "income_tax_basic_uplift".to_string(),
            name: "Basic rate threshold uplift".to_string(),
            description: format!(
                "Basic rate starts £{:.0} above the personal allowance in {}, CPI-uprated after.",
                config.basic_threshold_2026, config.uplift_base_year
            ),
            applicable_years: years_from(years, config.uplift_base_year),
            sign: SignConvention::ReformEnables,
            baseline: pre_budget.clone(),
            reform: pre_budget.clone().merge(basic_uplift(config, years)),
        },
        ReformDefinition {
            id: "income_tax_intermediate_uplift".to_string(),
            name: "Intermediate rate threshold uplift".to_string(),
            description: format!(
                "Intermediate rate starts £{:.0} above the personal allowance in {}, \
                 CPI-uprated after.",
                config.intermediate_threshold_2026, config.uplift_base_year
            ),
            applicable_years: years_from(years, config.uplift_base_year),
            sign: SignConvention::ReformEnables,
            baseline: pre_budget.clone(),
            reform: pre_budget.clone().merge(intermediate_uplift(config, years)),
        },
    ];

    for (id, name, band, frozen) in freezes {
        catalog.push(ReformDefinition {
            id: id.to_string(),
            name: name.to_string(),
            description: format!(
                "Threshold held at £{frozen:.0} above the personal allowance in {:?}, \
                 CPI-uprated from the frozen value after.",
                config.freeze_years
            ),
            applicable_years: years_from(years, first_freeze),
            sign: SignConvention::ReformEnables,
            baseline: pre_budget.clone(),
            reform: pre_budget.clone().merge(freeze(config, band, frozen, years)),
        });
    }
    catalog
}
