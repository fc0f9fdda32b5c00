use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::dataset::{Dataset, HouseholdRecord, PersonRecord};
use super::engine::Microsimulation;
use super::error::{BudgetError, Result};
use super::reforms::{PolicyConfig, ReformDefinition, pre_budget_baseline, reform_catalog};
use super::types::Variable;

const HEAD_AGE: f64 = 35.0;
const PARTNER_AGE: f64 = 33.0;
const MAX_CHILD_AGE: f64 = 18.0;

/// A single Scottish household described by its earnings and children.
#[derive(Debug, Clone, PartialEq)]
pub struct HouseholdInput {
    pub employment_income: f64,
    pub is_married: bool,
    pub partner_income: f64,
    pub children_ages: Vec<f64>,
    pub receives_uc: bool,
}

impl Default for HouseholdInput {
    fn default() -> Self {
        Self {
            employment_income: 30_000.0,
            is_married: false,
            partner_income: 0.0,
            children_ages: Vec::new(),
            receives_uc: true,
        }
    }
}

impl HouseholdInput {
    pub fn validate(&self) -> Result<()> {
        if !self.employment_income.is_finite() || self.employment_income < 0.0 {
            return Err(BudgetError::InvalidInput(
                "employment_income must be finite and >= 0".to_string(),
            ));
        }
        if !self.partner_income.is_finite() || self.partner_income < 0.0 {
            return Err(BudgetError::InvalidInput(
                "partner_income must be finite and >= 0".to_string(),
            ));
        }
        if !self.is_married && self.partner_income > 0.0 {
            return Err(BudgetError::InvalidInput(
                "partner_income requires is_married".to_string(),
            ));
        }
        if let Some(age) = self
            .children_ages
            .iter()
            .find(|age| !age.is_finite() || **age < 0.0 || **age > MAX_CHILD_AGE)
        {
            return Err(BudgetError::InvalidInput(format!(
                "child age {age} must be between 0 and {MAX_CHILD_AGE}"
            )));
        }
        Ok(())
    }

    /// One household, one benefit unit, in Scotland.
    pub fn to_dataset(&self) -> Result<Dataset> {
        self.validate()?;
        let member = |person_id: u64, age: f64, income: f64| PersonRecord {
            person_id,
            household_id: 1,
            benunit_id: 1,
            age,
            employment_income: income,
            other_income: 0.0,
            receives_qualifying_benefit: self.receives_uc,
        };

        let mut persons = vec![member(1, HEAD_AGE, self.employment_income)];
        if self.is_married {
            persons.push(member(2, PARTNER_AGE, self.partner_income));
        }
        for age in &self.children_ages {
            let person_id = persons.len() as u64 + 1;
            persons.push(member(person_id, *age, 0.0));
        }

        Dataset::new(
            vec![HouseholdRecord {
                household_id: 1,
                weight: 1.0,
                region: "SCOTLAND".to_string(),
                housing_costs: 0.0,
            }],
            persons,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseholdImpact {
    pub year: i32,
    pub baseline_net_income: f64,
    pub impacts: BTreeMap<String, f64>,
    pub total: f64,
}

fn round_pence(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn net_income<M: Microsimulation>(sim: &M, year: i32) -> Result<f64> {
    let income = sim.calculate(Variable::HouseholdNetIncome, year, None)?;
    income.values().first().copied().ok_or_else(|| {
        BudgetError::InvalidInput("household produced no net income".to_string())
    })
}

fn reform_gain(
    reform: &ReformDefinition,
    dataset: &Arc<Dataset>,
    config: &PolicyConfig,
    year: i32,
) -> Result<f64> {
    if !reform.is_active(year) {
        return Ok(0.0);
    }
    let base = config.base_parameters();
    let (without, with) = reform.oriented();
    let before = net_income(&without.build(dataset.clone(), &base)?, year)?;
    let after = net_income(&with.build(dataset.clone(), &base)?, year)?;
    Ok(round_pence(after - before))
}

/// Each individual reform's effect on one household's net income, per year,
/// against the pre-budget baseline.
pub fn household_impacts(
    input: &HouseholdInput,
    config: &PolicyConfig,
    years: &[i32],
) -> Result<Vec<HouseholdImpact>> {
    let dataset = Arc::new(input.to_dataset()?);
    let catalog: Vec<ReformDefinition> = reform_catalog(config, years)
        .into_iter()
        .filter(|r| r.id != "combined")
        .collect();
    let baseline =
        pre_budget_baseline(config, years).build(dataset.clone(), &config.base_parameters())?;

    years
        .iter()
        .map(|&year| {
            let mut impacts = BTreeMap::new();
            for reform in &catalog {
                impacts.insert(reform.id.clone(), reform_gain(reform, &dataset, config, year)?);
            }
            let total = round_pence(impacts.values().sum());
            Ok(HouseholdImpact {
                year,
                baseline_net_income: round_pence(net_income(&baseline, year)?),
                impacts,
                total,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Entity;

    fn family() -> HouseholdInput {
        HouseholdInput {
            employment_income: 35_000.0,
            is_married: true,
            partner_income: 15_000.0,
            children_ages: vec![0.0, 4.0],
            receives_uc: true,
        }
    }

    #[test]
    fn builds_single_scottish_household() {
        let dataset = family().to_dataset().expect("dataset");
        assert_eq!(dataset.count(Entity::Household), 1);
        assert_eq!(dataset.count(Entity::BenUnit), 1);
        assert_eq!(dataset.count(Entity::Person), 4);
        assert!(dataset.households()[0].in_scotland());
        assert_eq!(dataset.persons()[1].age, 33.0);
    }

    #[test]
    fn rejects_invalid_inputs() {
        let mut input = family();
        input.children_ages.push(25.0);
        assert!(input.to_dataset().is_err());

        let input = HouseholdInput {
            employment_income: -1.0,
            ..HouseholdInput::default()
        };
        let err = input.validate().expect_err("negative income");
        assert!(err.to_string().contains("employment_income"));

        let input = HouseholdInput {
            partner_income: 10_000.0,
            ..HouseholdInput::default()
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn reports_each_reform_and_total_per_year() {
        let impacts =
            household_impacts(&family(), &PolicyConfig::default(), &[2026, 2027]).expect("impacts");
        assert_eq!(impacts.len(), 2);

        let first = &impacts[0];
        assert_eq!(first.year, 2026);
        assert_eq!(first.impacts.len(), 7);
        assert!(!first.impacts.contains_key("combined"));
        assert_eq!(first.impacts["scp_baby_boost"], 0.0);
        assert_eq!(first.impacts["higher_rate_freeze"], 0.0);
        assert!((first.impacts["scp_inflation"] - 2.0 * (28.20 - 27.15) * 52.0).abs() < 0.01);
        assert!(first.impacts["income_tax_basic_uplift"] > 0.0);

        let second = &impacts[1];
        assert!((second.impacts["scp_baby_boost"] - (40.0 - 28.20) * 52.0).abs() < 0.01);
        let sum: f64 = second.impacts.values().sum();
        assert!((second.total - sum).abs() < 0.01);
        assert!(second.baseline_net_income > 0.0);
    }

    #[test]
    fn no_child_payment_without_qualifying_benefit() {
        let input = HouseholdInput {
            receives_uc: false,
            ..family()
        };
        let impacts =
            household_impacts(&input, &PolicyConfig::default(), &[2027]).expect("impacts");
        assert_eq!(impacts[0].impacts["scp_inflation"], 0.0);
        assert_eq!(impacts[0].impacts["scp_baby_boost"], 0.0);
    }
}
