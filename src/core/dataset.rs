use std::collections::HashMap;
use std::path::Path;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

use super::error::{BudgetError, Result};
use super::types::Entity;

pub const HOUSEHOLDS_FILE: &str = "households.csv";
pub const PERSONS_FILE: &str = "persons.csv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdRecord {
    pub household_id: u64,
    pub weight: f64,
    pub region: String,
    #[serde(default)]
    pub housing_costs: f64,
}

impl HouseholdRecord {
    pub fn in_scotland(&self) -> bool {
        self.region.trim().eq_ignore_ascii_case("scotland")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub person_id: u64,
    pub household_id: u64,
    pub benunit_id: u64,
    pub age: f64,
    #[serde(default)]
    pub employment_income: f64,
    #[serde(default)]
    pub other_income: f64,
    #[serde(default, deserialize_with = "flag")]
    pub receives_qualifying_benefit: bool,
}

fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "" | "0" | "false" | "no" => Ok(false),
        other => Err(de::Error::custom(format!("expected a boolean flag, got {other:?}"))),
    }
}

/// Survey microdata with the person -> benefit unit -> household hierarchy
/// resolved to positional indices. Entity order is file order; benefit units
/// are ordered by first appearance.
#[derive(Debug, Clone)]
pub struct Dataset {
    households: Vec<HouseholdRecord>,
    persons: Vec<PersonRecord>,
    benunit_ids: Vec<u64>,
    person_household: Vec<usize>,
    person_benunit: Vec<usize>,
    benunit_household: Vec<usize>,
}

impl Dataset {
    pub fn new(households: Vec<HouseholdRecord>, persons: Vec<PersonRecord>) -> Result<Self> {
        let mut household_index = HashMap::with_capacity(households.len());
        for (index, household) in households.iter().enumerate() {
            if !household.weight.is_finite() || household.weight < 0.0 {
                return Err(BudgetError::invalid_data(
                    HOUSEHOLDS_FILE,
                    format!(
                        "household {} has weight {}; weights must be finite and >= 0",
                        household.household_id, household.weight
                    ),
                ));
            }
            if household_index
                .insert(household.household_id, index)
                .is_some()
            {
                return Err(BudgetError::invalid_data(
                    HOUSEHOLDS_FILE,
                    format!("duplicate household_id {}", household.household_id),
                ));
            }
        }

        let mut benunit_index: HashMap<u64, usize> = HashMap::new();
        let mut benunit_ids = Vec::new();
        let mut benunit_household = Vec::new();
        let mut person_household = Vec::with_capacity(persons.len());
        let mut person_benunit = Vec::with_capacity(persons.len());

        for person in &persons {
            let Some(&household) = household_index.get(&person.household_id) else {
                return Err(BudgetError::invalid_data(
                    PERSONS_FILE,
                    format!(
                        "person {} references unknown household {}",
                        person.person_id, person.household_id
                    ),
                ));
            };
            let benunit = match benunit_index.get(&person.benunit_id) {
                Some(&existing) => {
                    if benunit_household[existing] != household {
                        return Err(BudgetError::invalid_data(
                            PERSONS_FILE,
                            format!(
                                "benefit unit {} spans more than one household",
                                person.benunit_id
                            ),
                        ));
                    }
                    existing
                }
                None => {
                    let next = benunit_ids.len();
                    benunit_index.insert(person.benunit_id, next);
                    benunit_ids.push(person.benunit_id);
                    benunit_household.push(household);
                    next
                }
            };
            person_household.push(household);
            person_benunit.push(benunit);
        }

        Ok(Self {
            households,
            persons,
            benunit_ids,
            person_household,
            person_benunit,
            benunit_household,
        })
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let households = read_records(&dir.join(HOUSEHOLDS_FILE))?;
        let persons = read_records(&dir.join(PERSONS_FILE))?;
        let dataset = Self::new(households, persons)?;
        log::info!(
            "loaded {} households, {} benefit units, {} persons from {}",
            dataset.households.len(),
            dataset.benunit_ids.len(),
            dataset.persons.len(),
            dir.display()
        );
        Ok(dataset)
    }

    pub fn households(&self) -> &[HouseholdRecord] {
        &self.households
    }

    pub fn persons(&self) -> &[PersonRecord] {
        &self.persons
    }

    pub fn count(&self, entity: Entity) -> usize {
        match entity {
            Entity::Person => self.persons.len(),
            Entity::BenUnit => self.benunit_ids.len(),
            Entity::Household => self.households.len(),
        }
    }

    /// For each member of `child`, the index of the `parent` entity containing
    /// it. `None` when `child` is not strictly below `parent`.
    pub fn membership(&self, child: Entity, parent: Entity) -> Option<&[usize]> {
        match (child, parent) {
            (Entity::Person, Entity::BenUnit) => Some(&self.person_benunit),
            (Entity::Person, Entity::Household) => Some(&self.person_household),
            (Entity::BenUnit, Entity::Household) => Some(&self.benunit_household),
            _ => None,
        }
    }
}

pub(crate) fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(BudgetError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| BudgetError::csv(path, e))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| BudgetError::csv(path, e))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    fn household(
        household_id: u64,
        weight: f64,
        region: &str,
        housing_costs: f64,
    ) -> HouseholdRecord {
        HouseholdRecord {
            household_id,
            weight,
            region: region.to_string(),
            housing_costs,
        }
    }

    fn person(
        person_id: u64,
        household_id: u64,
        age: f64,
        employment_income: f64,
        other_income: f64,
        qualifying: bool,
    ) -> PersonRecord {
        PersonRecord {
            person_id,
            household_id,
            benunit_id: household_id,
            age,
            employment_income,
            other_income,
            receives_qualifying_benefit: qualifying,
        }
    }

    pub(crate) fn mixed_households() -> Vec<HouseholdRecord> {
        vec![
            household(1, 100.0, "SCOTLAND", 6_000.0),
            household(2, 150.0, "SCOTLAND", 4_000.0),
            household(3, 80.0, "SCOTLAND", 8_000.0),
            household(4, 200.0, "LONDON", 9_000.0),
            household(5, 120.0, "SCOTLAND", 12_000.0),
            household(6, 90.0, "SCOTLAND", 5_000.0),
        ]
    }

    pub(crate) fn mixed_persons() -> Vec<PersonRecord> {
        vec![
            person(1, 1, 35.0, 30_000.0, 0.0, true),
            person(2, 1, 33.0, 12_000.0, 0.0, true),
            person(3, 1, 5.0, 0.0, 0.0, true),
            person(4, 1, 0.0, 0.0, 0.0, true),
            person(5, 2, 45.0, 55_000.0, 0.0, false),
            person(6, 3, 70.0, 0.0, 9_000.0, false),
            person(7, 4, 40.0, 40_000.0, 0.0, false),
            person(8, 4, 8.0, 0.0, 0.0, false),
            person(9, 5, 28.0, 140_000.0, 0.0, false),
            person(10, 6, 30.0, 18_000.0, 0.0, true),
            person(11, 6, 10.0, 0.0, 0.0, true),
            person(12, 6, 17.0, 0.0, 0.0, true),
        ]
    }

    /// Five Scottish households (one with a baby in a qualifying benefit
    /// unit) and one English household.
    pub(crate) fn mixed_dataset() -> Dataset {
        Dataset::new(mixed_households(), mixed_persons()).expect("valid fixture")
    }
}
