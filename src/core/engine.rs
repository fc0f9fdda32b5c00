use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use super::dataset::Dataset;
use super::error::{BudgetError, Result};
use super::params::{Parameter, ParameterSet, ScottishBand};
use super::sample::WeightedSample;
use super::types::{Entity, Variable};

const WEEKS_IN_YEAR: f64 = 52.0;
const CHILD_AGE_LIMIT: f64 = 18.0;
const SCP_AGE_LIMIT: f64 = 16.0;
const BABY_AGE_LIMIT: f64 = 1.0;
const EQUIVALENCE_ADULT_AGE: f64 = 14.0;

const ALLOWANCE_TAPER_START: f64 = 100_000.0;
const RUK_BASIC_BAND: f64 = 37_700.0;
const RUK_ADDITIONAL_THRESHOLD: f64 = 125_140.0;
const RUK_BASIC_RATE: f64 = 0.20;
const RUK_HIGHER_RATE: f64 = 0.40;
const RUK_ADDITIONAL_RATE: f64 = 0.45;

/// The calculation surface the comparison pipeline consumes.
pub trait Microsimulation {
    /// Values of `variable` for `year`, optionally mapped to another entity,
    /// weighted by that entity's household weights.
    fn calculate(&self, variable: Variable, year: i32, map_to: Option<Entity>)
    -> Result<WeightedSample>;

    /// Overrides a variable for one year. Later calculations observe the
    /// override, including variables derived from it.
    fn set_input(&mut self, variable: Variable, year: i32, values: Vec<f64>) -> Result<()>;

    /// Sums values going up the entity hierarchy and broadcasts them going down.
    fn map_result(&self, values: &[f64], from: Entity, to: Entity) -> Result<Vec<f64>>;

    /// Values of `variable` from its own formula, ignoring any `set_input`
    /// override of that variable. Overrides of its inputs still apply.
    fn formula_values(&self, variable: Variable, year: i32) -> Result<Vec<f64>>;
}

/// Configuration phase: parameters may change freely, nothing can be
/// calculated. `build` freezes them.
#[derive(Debug, Clone)]
pub struct SimulationBuilder {
    dataset: Arc<Dataset>,
    parameters: ParameterSet,
}

impl SimulationBuilder {
    pub fn new(dataset: Arc<Dataset>, parameters: ParameterSet) -> Self {
        Self {
            dataset,
            parameters,
        }
    }

    pub fn update(&mut self, parameter: Parameter, year: i32, value: f64) -> &mut Self {
        log::debug!("{parameter} [{year}] = {value}");
        self.parameters.update(parameter, year, value);
        self
    }

    pub fn build(self) -> Simulation {
        Simulation {
            dataset: self.dataset,
            parameters: self.parameters,
            inputs: HashMap::new(),
            cache: RefCell::new(HashMap::new()),
        }
    }
}

/// Evaluation phase. Parameters are fixed; results are cached per
/// (variable, year) until the next `set_input`.
#[derive(Debug)]
pub struct Simulation {
    dataset: Arc<Dataset>,
    parameters: ParameterSet,
    inputs: HashMap<(Variable, i32), Vec<f64>>,
    cache: RefCell<HashMap<(Variable, i32), Vec<f64>>>,
}

impl Simulation {
    fn compute(&self, variable: Variable, year: i32) -> Result<Vec<f64>> {
        if let Some(values) = self.inputs.get(&(variable, year)) {
            return Ok(values.clone());
        }
        if let Some(values) = self.cache.borrow().get(&(variable, year)) {
            return Ok(values.clone());
        }
        let values = self.formula(variable, year)?;
        self.cache
            .borrow_mut()
            .insert((variable, year), values.clone());
        Ok(values)
    }

    fn formula(&self, variable: Variable, year: i32) -> Result<Vec<f64>> {
        let persons = self.dataset.persons();
        let households = self.dataset.households();
        let values = match variable {
            Variable::Age => persons.iter().map(|p| p.age).collect(),
            Variable::IsChild => persons
                .iter()
                .map(|p| indicator(p.age < CHILD_AGE_LIMIT))
                .collect(),
            Variable::EmploymentIncome => persons.iter().map(|p| p.employment_income).collect(),
            Variable::OtherIncome => persons.iter().map(|p| p.other_income).collect(),
            Variable::HouseholdWeight => households.iter().map(|h| h.weight).collect(),
            Variable::InScotland => households
                .iter()
                .map(|h| indicator(h.in_scotland()))
                .collect(),
            Variable::HousingCosts => households.iter().map(|h| h.housing_costs).collect(),
            Variable::IncomeTax => self.income_tax(year)?,
            Variable::ScottishChildPayment => self.scottish_child_payment(year)?,
            Variable::HouseholdNetIncome => {
                let employment = self.compute(Variable::EmploymentIncome, year)?;
                let other = self.compute(Variable::OtherIncome, year)?;
                let tax = self.compute(Variable::IncomeTax, year)?;
                let personal: Vec<f64> = employment
                    .iter()
                    .zip(&other)
                    .zip(&tax)
                    .map(|((e, o), t)| e + o - t)
                    .collect();
                let personal = self.map_result(&personal, Entity::Person, Entity::Household)?;
                let scp = self.compute(Variable::ScottishChildPayment, year)?;
                let scp = self.map_result(&scp, Entity::BenUnit, Entity::Household)?;
                personal.iter().zip(&scp).map(|(p, s)| p + s).collect()
            }
            Variable::HouseholdNetIncomeAhc => {
                let net = self.compute(Variable::HouseholdNetIncome, year)?;
                let housing = self.compute(Variable::HousingCosts, year)?;
                net.iter().zip(&housing).map(|(n, h)| n - h).collect()
            }
            Variable::EquivalisedIncomeBhc => {
                self.equivalise(&self.compute(Variable::HouseholdNetIncome, year)?, year)?
            }
            Variable::EquivalisedIncomeAhc => {
                self.equivalise(&self.compute(Variable::HouseholdNetIncomeAhc, year)?, year)?
            }
            Variable::HouseholdIncomeDecile => self.income_deciles(year)?,
            Variable::InPovertyBhc => {
                self.poverty_flags(year, Variable::EquivalisedIncomeBhc, 1.0)?
            }
            Variable::InPovertyAhc => {
                self.poverty_flags(year, Variable::EquivalisedIncomeAhc, 1.0)?
            }
            Variable::InDeepPovertyBhc => {
                let ratio = self.parameters.get(Parameter::DeepPovertyRatio, year);
                self.poverty_flags(year, Variable::EquivalisedIncomeBhc, ratio)?
            }
            Variable::InDeepPovertyAhc => {
                let ratio = self.parameters.get(Parameter::DeepPovertyRatio, year);
                self.poverty_flags(year, Variable::EquivalisedIncomeAhc, ratio)?
            }
        };
        Ok(values)
    }

    fn income_tax(&self, year: i32) -> Result<Vec<f64>> {
        let employment = self.compute(Variable::EmploymentIncome, year)?;
        let other = self.compute(Variable::OtherIncome, year)?;
        let in_scotland = self.compute(Variable::InScotland, year)?;
        let in_scotland =
            self.map_result(&in_scotland, Entity::Household, Entity::Person)?;
        let schedule = ScottishSchedule::for_year(&self.parameters, year);
        let allowance = self.parameters.get(Parameter::PersonalAllowance, year);

        Ok(employment
            .iter()
            .zip(&other)
            .zip(&in_scotland)
            .map(|((e, o), scot)| {
                let gross = e + o;
                if *scot > 0.5 {
                    schedule.tax(gross, allowance)
                } else {
                    ruk_income_tax(gross, allowance)
                }
            })
            .collect())
    }

    fn scottish_child_payment(&self, year: i32) -> Result<Vec<f64>> {
        let dataset = &self.dataset;
        let ages = self.compute(Variable::Age, year)?;
        let in_scotland = self.compute(Variable::InScotland, year)?;
        let amount = self.parameters.get(Parameter::ScpAmount, year);
        let premium_on = self.parameters.get(Parameter::ScpBabyPremiumInEffect, year) > 0.5;
        let baby_amount = self.parameters.get(Parameter::ScpBabyAmount, year);
        let premium = if premium_on {
            (baby_amount - amount).max(0.0)
        } else {
            0.0
        };

        let benunits = dataset.count(Entity::BenUnit);
        let mut children = vec![0.0; benunits];
        let mut babies = vec![0.0; benunits];
        let mut qualifying = vec![false; benunits];
        let person_benunit = membership(dataset, Entity::Person, Entity::BenUnit)?;
        for ((person, age), &benunit) in dataset.persons().iter().zip(&ages).zip(person_benunit) {
            if person.receives_qualifying_benefit {
                qualifying[benunit] = true;
            }
            if *age < SCP_AGE_LIMIT {
                children[benunit] += 1.0;
            }
            if *age < BABY_AGE_LIMIT {
                babies[benunit] += 1.0;
            }
        }

        let benunit_household = membership(dataset, Entity::BenUnit, Entity::Household)?;
        Ok((0..benunits)
            .map(|b| {
                if !qualifying[b] || in_scotland[benunit_household[b]] < 0.5 {
                    return 0.0;
                }
                (children[b] * amount + babies[b] * premium) * WEEKS_IN_YEAR
            })
            .collect())
    }

    fn equivalise(&self, incomes: &[f64], year: i32) -> Result<Vec<f64>> {
        let ages = self.compute(Variable::Age, year)?;
        let person_household = membership(&self.dataset, Entity::Person, Entity::Household)?;
        let mut scale = vec![0.0; incomes.len()];
        let mut has_head = vec![false; incomes.len()];
        for (age, &household) in ages.iter().zip(person_household) {
            scale[household] += if *age < EQUIVALENCE_ADULT_AGE {
                0.20
            } else if has_head[household] {
                0.33
            } else {
                has_head[household] = true;
                0.67
            };
        }
        Ok(incomes
            .iter()
            .zip(&scale)
            .map(|(income, s)| if *s > 0.0 { income / s } else { *income })
            .collect())
    }

    /// Deciles of equivalised income, ranked by person-weighted position.
    fn income_deciles(&self, year: i32) -> Result<Vec<f64>> {
        let incomes = self.compute(Variable::EquivalisedIncomeBhc, year)?;
        let weights = self.compute(Variable::HouseholdWeight, year)?;
        let sizes = self.map_result(
            &vec![1.0; self.dataset.count(Entity::Person)],
            Entity::Person,
            Entity::Household,
        )?;
        let people: Vec<f64> = weights.iter().zip(&sizes).map(|(w, s)| w * s).collect();
        let total: f64 = people.iter().sum();

        let mut order: Vec<usize> = (0..incomes.len()).collect();
        order.sort_by(|&a, &b| incomes[a].total_cmp(&incomes[b]));

        let mut deciles = vec![1.0; incomes.len()];
        if total <= 0.0 {
            return Ok(deciles);
        }
        let mut below = 0.0;
        for index in order {
            let position = (below / total * 10.0).floor() + 1.0;
            deciles[index] = position.clamp(1.0, 10.0);
            below += people[index];
        }
        Ok(deciles)
    }

    fn poverty_flags(&self, year: i32, income: Variable, ratio: f64) -> Result<Vec<f64>> {
        let line = match income {
            Variable::EquivalisedIncomeAhc => self.parameters.get(Parameter::PovertyLineAhc, year),
            _ => self.parameters.get(Parameter::PovertyLineBhc, year),
        };
        let incomes = self.compute(income, year)?;
        Ok(incomes
            .iter()
            .map(|value| indicator(*value < line * ratio))
            .collect())
    }

    fn entity_weights(&self, entity: Entity, year: i32) -> Result<Vec<f64>> {
        let weights = self.compute(Variable::HouseholdWeight, year)?;
        self.map_result(&weights, Entity::Household, entity)
    }
}

impl Microsimulation for Simulation {
    fn calculate(
        &self,
        variable: Variable,
        year: i32,
        map_to: Option<Entity>,
    ) -> Result<WeightedSample> {
        let native = variable.entity();
        let target = map_to.unwrap_or(native);
        let values = self.map_result(&self.compute(variable, year)?, native, target)?;
        WeightedSample::new(values, self.entity_weights(target, year)?)
    }

    fn set_input(&mut self, variable: Variable, year: i32, values: Vec<f64>) -> Result<()> {
        let entity = variable.entity();
        let expected = self.dataset.count(entity);
        if values.len() != expected {
            return Err(BudgetError::InputLength {
                variable,
                entity,
                expected,
                actual: values.len(),
            });
        }
        self.inputs.insert((variable, year), values);
        self.cache.get_mut().clear();
        Ok(())
    }

    fn map_result(&self, values: &[f64], from: Entity, to: Entity) -> Result<Vec<f64>> {
        let expected = self.dataset.count(from);
        if values.len() != expected {
            return Err(BudgetError::LengthMismatch {
                what: from.name(),
                left: values.len(),
                right: expected,
            });
        }
        if from == to {
            return Ok(values.to_vec());
        }
        if let Some(parents) = self.dataset.membership(from, to) {
            let mut out = vec![0.0; self.dataset.count(to)];
            for (value, &parent) in values.iter().zip(parents) {
                out[parent] += value;
            }
            return Ok(out);
        }
        let parents = membership(&self.dataset, to, from)?;
        Ok(parents.iter().map(|&parent| values[parent]).collect())
    }

    fn formula_values(&self, variable: Variable, year: i32) -> Result<Vec<f64>> {
        self.formula(variable, year)
    }
}

fn membership(dataset: &Dataset, child: Entity, parent: Entity) -> Result<&[usize]> {
    dataset.membership(child, parent).ok_or_else(|| {
        BudgetError::invalid_data(
            "entity mapping",
            format!("{child} is not contained in {parent}"),
        )
    })
}

fn indicator(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

/// Personal allowance withdrawn at £1 for every £2 above the taper start.
fn tapered_allowance(gross: f64, allowance: f64) -> f64 {
    if gross > ALLOWANCE_TAPER_START {
        (allowance - (gross - ALLOWANCE_TAPER_START) / 2.0).max(0.0)
    } else {
        allowance.max(0.0)
    }
}

/// Scottish bands as (threshold above the allowance, rate), ascending.
#[derive(Debug, Clone)]
struct ScottishSchedule {
    bands: Vec<(f64, f64)>,
}

impl ScottishSchedule {
    fn for_year(parameters: &ParameterSet, year: i32) -> Self {
        let mut bands: Vec<(f64, f64)> = ScottishBand::ALL
            .iter()
            .map(|band| {
                (
                    parameters.get(Parameter::ScottishThreshold(*band), year),
                    parameters.get(Parameter::ScottishRate(*band), year),
                )
            })
            .collect();
        bands.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { bands }
    }

    fn tax(&self, gross: f64, allowance: f64) -> f64 {
        let gross = gross.max(0.0);
        let taxable = (gross - tapered_allowance(gross, allowance)).max(0.0);
        self.bands
            .iter()
            .enumerate()
            .map(|(i, (lower, rate))| {
                let upper = self
                    .bands
                    .get(i + 1)
                    .map_or(f64::INFINITY, |(next, _)| *next);
                (taxable.min(upper) - lower).max(0.0) * rate.clamp(0.0, 1.0)
            })
            .sum()
    }
}

fn ruk_income_tax(gross: f64, allowance: f64) -> f64 {
    let gross = gross.max(0.0);
    let taxable = (gross - tapered_allowance(gross, allowance)).max(0.0);
    let basic = taxable.min(RUK_BASIC_BAND);
    let additional = (taxable - RUK_ADDITIONAL_THRESHOLD).max(0.0);
    let higher = (taxable - basic - additional).max(0.0);
    basic * RUK_BASIC_RATE + higher * RUK_HIGHER_RATE + additional * RUK_ADDITIONAL_RATE
}
