use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Entity {
    Person,
    BenUnit,
    Household,
}

impl Entity {
    pub fn name(self) -> &'static str {
        match self {
            Entity::Person => "person",
            Entity::BenUnit => "benunit",
            Entity::Household => "household",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Variable {
    Age,
    IsChild,
    EmploymentIncome,
    OtherIncome,
    IncomeTax,
    ScottishChildPayment,
    HouseholdWeight,
    InScotland,
    HousingCosts,
    HouseholdNetIncome,
    HouseholdNetIncomeAhc,
    EquivalisedIncomeBhc,
    EquivalisedIncomeAhc,
    HouseholdIncomeDecile,
    InPovertyBhc,
    InPovertyAhc,
    InDeepPovertyBhc,
    InDeepPovertyAhc,
}

impl Variable {
    pub fn name(self) -> &'static str {
        match self {
            Variable::Age => "age",
            Variable::IsChild => "is_child",
            Variable::EmploymentIncome => "employment_income",
            Variable::OtherIncome => "other_income",
            Variable::IncomeTax => "income_tax",
            Variable::ScottishChildPayment => "scottish_child_payment",
            Variable::HouseholdWeight => "household_weight",
            Variable::InScotland => "in_scotland",
            Variable::HousingCosts => "housing_costs",
            Variable::HouseholdNetIncome => "household_net_income",
            Variable::HouseholdNetIncomeAhc => "household_net_income_ahc",
            Variable::EquivalisedIncomeBhc => "equiv_household_net_income",
            Variable::EquivalisedIncomeAhc => "equiv_household_net_income_ahc",
            Variable::HouseholdIncomeDecile => "household_income_decile",
            Variable::InPovertyBhc => "in_poverty_bhc",
            Variable::InPovertyAhc => "in_poverty_ahc",
            Variable::InDeepPovertyBhc => "in_deep_poverty_bhc",
            Variable::InDeepPovertyAhc => "in_deep_poverty_ahc",
        }
    }

    pub fn entity(self) -> Entity {
        match self {
            Variable::Age
            | Variable::IsChild
            | Variable::EmploymentIncome
            | Variable::OtherIncome
            | Variable::IncomeTax => Entity::Person,
            Variable::ScottishChildPayment => Entity::BenUnit,
            Variable::HouseholdWeight
            | Variable::InScotland
            | Variable::HousingCosts
            | Variable::HouseholdNetIncome
            | Variable::HouseholdNetIncomeAhc
            | Variable::EquivalisedIncomeBhc
            | Variable::EquivalisedIncomeAhc
            | Variable::HouseholdIncomeDecile
            | Variable::InPovertyBhc
            | Variable::InPovertyAhc
            | Variable::InDeepPovertyBhc
            | Variable::InDeepPovertyAhc => Entity::Household,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HousingBasis {
    Bhc,
    Ahc,
}

impl HousingBasis {
    pub const ALL: [HousingBasis; 2] = [HousingBasis::Bhc, HousingBasis::Ahc];

    pub fn label(self) -> &'static str {
        match self {
            HousingBasis::Bhc => "bhc",
            HousingBasis::Ahc => "ahc",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PovertyKind {
    Poverty,
    DeepPoverty,
}

impl PovertyKind {
    pub const ALL: [PovertyKind; 2] = [PovertyKind::Poverty, PovertyKind::DeepPoverty];

    pub fn label(self) -> &'static str {
        match self {
            PovertyKind::Poverty => "poverty",
            PovertyKind::DeepPoverty => "deep_poverty",
        }
    }

    pub fn variable(self, basis: HousingBasis) -> Variable {
        match (self, basis) {
            (PovertyKind::Poverty, HousingBasis::Bhc) => Variable::InPovertyBhc,
            (PovertyKind::Poverty, HousingBasis::Ahc) => Variable::InPovertyAhc,
            (PovertyKind::DeepPoverty, HousingBasis::Bhc) => Variable::InDeepPovertyBhc,
            (PovertyKind::DeepPoverty, HousingBasis::Ahc) => Variable::InDeepPovertyAhc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetaryRow {
    pub reform_id: String,
    pub reform_name: String,
    pub year: i32,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionalRow {
    pub reform_id: String,
    pub reform_name: String,
    pub year: i32,
    pub decile: String,
    pub value: f64,
    pub absolute_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub reform_id: String,
    pub reform_name: String,
    pub year: i32,
    pub metric: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaRow {
    pub reform_id: String,
    pub year: i32,
    pub code: String,
    pub name: String,
    pub average_gain: f64,
    pub relative_change: f64,
}

/// Tidy output accumulated across every reform and year before anything is
/// written. Area tables are keyed by the geography's output file stem.
#[derive(Debug, Clone, Default)]
pub struct ImpactTables {
    pub budgetary: Vec<BudgetaryRow>,
    pub distributional: Vec<DistributionalRow>,
    pub winners_losers: Vec<MetricRow>,
    pub metrics: Vec<MetricRow>,
    pub areas: BTreeMap<String, Vec<AreaRow>>,
}

