use super::engine::Microsimulation;
use super::error::Result;
use super::geography::AreaWeights;
use super::sample::{WeightedSample, relative_change};
use super::types::{
    AreaRow, BudgetaryRow, DistributionalRow, Entity, HousingBasis, ImpactTables, MetricRow,
    PovertyKind, Variable,
};

/// Income changes within ±£1 count as unchanged.
pub const WINNER_THRESHOLD: f64 = 1.0;

pub const DECILE_LABELS: [&str; 10] = [
    "1st", "2nd", "3rd", "4th", "5th", "6th", "7th", "8th", "9th", "10th",
];

#[derive(Debug, Clone, Copy)]
pub struct ReformContext<'a> {
    pub reform_id: &'a str,
    pub reform_name: &'a str,
    pub year: i32,
    /// False when the reform does not differ from its baseline this year.
    pub active: bool,
}

impl ReformContext<'_> {
    fn metric(&self, metric: impl Into<String>, value: f64) -> MetricRow {
        MetricRow {
            reform_id: self.reform_id.to_string(),
            reform_name: self.reform_name.to_string(),
            year: self.year,
            metric: metric.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Population {
    #[default]
    Scotland,
    All,
}

impl Population {
    pub fn household_mask<M: Microsimulation + ?Sized>(
        self,
        sim: &M,
        year: i32,
    ) -> Result<Vec<bool>> {
        let in_scotland = sim.calculate(Variable::InScotland, year, None)?;
        Ok(in_scotland
            .values()
            .iter()
            .map(|flag| self == Population::All || *flag > 0.5)
            .collect())
    }

    pub fn person_mask<M: Microsimulation + ?Sized>(self, sim: &M, year: i32) -> Result<Vec<bool>> {
        let in_scotland = sim.calculate(Variable::InScotland, year, Some(Entity::Person))?;
        Ok(in_scotland
            .values()
            .iter()
            .map(|flag| self == Population::All || *flag > 0.5)
            .collect())
    }
}

/// One aggregation per output table, run against a (without policy, with
/// policy) simulation pair.
#[derive(Debug, Clone, Copy)]
pub enum Calculator<'a> {
    Budgetary,
    Distributional,
    WinnersLosers,
    Poverty,
    Geographic(&'a AreaWeights),
}

impl Calculator<'_> {
    /// Stem of the output table this calculator fills.
    pub fn name(&self) -> &str {
        match self {
            Calculator::Budgetary => "budgetary_impact",
            Calculator::Distributional => "distributional_impact",
            Calculator::WinnersLosers => "winners_losers",
            Calculator::Poverty => "metrics",
            Calculator::Geographic(weights) => weights.label(),
        }
    }

    pub fn run<M: Microsimulation + ?Sized>(
        &self,
        without: &M,
        with: &M,
        ctx: &ReformContext<'_>,
        population: Population,
        tables: &mut ImpactTables,
    ) -> Result<()> {
        match self {
            Calculator::Budgetary => {
                let (_, change) = household_change(without, with, ctx.year, population)?;
                // £m; inactive years are pinned to zero rather than float noise
                let value = if ctx.active { change.sum() / 1e6 } else { 0.0 };
                tables.budgetary.push(BudgetaryRow {
                    reform_id: ctx.reform_id.to_string(),
                    reform_name: ctx.reform_name.to_string(),
                    year: ctx.year,
                    value,
                });
            }
            Calculator::Distributional => {
                let (baseline, change) = household_change(without, with, ctx.year, population)?;
                let mask = population.household_mask(without, ctx.year)?;
                let deciles = without
                    .calculate(Variable::HouseholdIncomeDecile, ctx.year, None)?
                    .mask(&mask)?;
                tables
                    .distributional
                    .extend(distributional_rows(ctx, &baseline, &change, deciles.values())?);
            }
            Calculator::WinnersLosers => {
                let (_, change) = household_change(without, with, ctx.year, population)?;
                let (winners, losers, unchanged) = winners_losers_shares(&change);
                tables.winners_losers.extend([
                    ctx.metric("winners_pct", winners),
                    ctx.metric("losers_pct", losers),
                    ctx.metric("unchanged_pct", unchanged),
                ]);
            }
            Calculator::Poverty => {
                tables
                    .metrics
                    .extend(poverty_rows(without, with, ctx, population)?);
            }
            Calculator::Geographic(weights) => {
                let rows = area_rows(without, with, ctx, weights)?;
                tables
                    .areas
                    .entry(self.name().to_string())
                    .or_default()
                    .extend(rows);
            }
        }
        Ok(())
    }
}

/// Baseline household net income and its change, both restricted to the
/// population and weighted by household weight.
fn household_change<M: Microsimulation + ?Sized>(
    without: &M,
    with: &M,
    year: i32,
    population: Population,
) -> Result<(WeightedSample, WeightedSample)> {
    let mask = population.household_mask(without, year)?;
    let baseline = without
        .calculate(Variable::HouseholdNetIncome, year, None)?
        .mask(&mask)?;
    let reform = with
        .calculate(Variable::HouseholdNetIncome, year, None)?
        .mask(&mask)?;
    let change = reform.difference(&baseline)?;
    Ok((baseline, change))
}

/// Shares of total weight gaining, losing and unchanged, in percent. An
/// empty population is entirely unchanged.
pub fn winners_losers_shares(change: &WeightedSample) -> (f64, f64, f64) {
    let total = change.total_weight();
    if total <= 0.0 {
        return (0.0, 0.0, 100.0);
    }
    let mut winners = 0.0;
    let mut losers = 0.0;
    for (value, weight) in change.values().iter().zip(change.weights()) {
        if *value > WINNER_THRESHOLD {
            winners += weight;
        } else if *value < -WINNER_THRESHOLD {
            losers += weight;
        }
    }
    let unchanged = total - winners - losers;
    (
        winners / total * 100.0,
        losers / total * 100.0,
        unchanged / total * 100.0,
    )
}

fn decile_code(raw: f64) -> Option<usize> {
    raw.is_finite().then(|| raw.round().clamp(1.0, 10.0) as usize)
}

/// Per-decile relative and absolute change, then an "All" row from the
/// overall weighted means. Empty deciles are skipped.
pub fn distributional_rows(
    ctx: &ReformContext<'_>,
    baseline: &WeightedSample,
    change: &WeightedSample,
    deciles: &[f64],
) -> Result<Vec<DistributionalRow>> {
    let codes: Vec<Option<usize>> = deciles.iter().map(|d| decile_code(*d)).collect();
    let row = |label: &str, baseline: &WeightedSample, change: &WeightedSample| {
        let absolute_change = change.mean();
        DistributionalRow {
            reform_id: ctx.reform_id.to_string(),
            reform_name: ctx.reform_name.to_string(),
            year: ctx.year,
            decile: label.to_string(),
            value: relative_change(absolute_change, baseline.mean()),
            absolute_change,
        }
    };

    let mut rows = Vec::with_capacity(DECILE_LABELS.len() + 1);
    for (index, label) in DECILE_LABELS.iter().enumerate() {
        let mask: Vec<bool> = codes.iter().map(|c| *c == Some(index + 1)).collect();
        let group_change = change.mask(&mask)?;
        if group_change.is_empty() {
            continue;
        }
        rows.push(row(label, &baseline.mask(&mask)?, &group_change));
    }
    rows.push(row("All", baseline, change));
    Ok(rows)
}

fn poverty_rows<M: Microsimulation + ?Sized>(
    without: &M,
    with: &M,
    ctx: &ReformContext<'_>,
    population: Population,
) -> Result<Vec<MetricRow>> {
    let year = ctx.year;
    let people = population.person_mask(without, year)?;
    let is_child = without.calculate(Variable::IsChild, year, Some(Entity::Person))?;
    let children: Vec<bool> = people
        .iter()
        .zip(is_child.values())
        .map(|(inside, child)| *inside && *child > 0.5)
        .collect();

    let mut rows = Vec::new();
    for basis in HousingBasis::ALL {
        for kind in PovertyKind::ALL {
            let variable = kind.variable(basis);
            let before = without.calculate(variable, year, Some(Entity::Person))?;
            let after = with.calculate(variable, year, Some(Entity::Person))?;
            for (prefix, mask) in [("", &people), ("child_", &children)] {
                let baseline_rate = before.mask(mask)?.mean() * 100.0;
                let reform_rate = after.mask(mask)?.mean() * 100.0;
                let stem = format!("{prefix}{}_rate_{}", kind.label(), basis.label());
                rows.push(ctx.metric(format!("{stem}_baseline"), baseline_rate));
                rows.push(ctx.metric(format!("{stem}_reform"), reform_rate));
                rows.push(ctx.metric(format!("{stem}_change"), reform_rate - baseline_rate));
            }
        }
    }
    Ok(rows)
}

/// Average household gain per area, weighting households by the area's row
/// of the allocation matrix instead of the survey weights.
fn area_rows<M: Microsimulation + ?Sized>(
    without: &M,
    with: &M,
    ctx: &ReformContext<'_>,
    weights: &AreaWeights,
) -> Result<Vec<AreaRow>> {
    let baseline = without.calculate(Variable::HouseholdNetIncome, ctx.year, None)?;
    let reform = with.calculate(Variable::HouseholdNetIncome, ctx.year, None)?;

    weights
        .rows()
        .map(|(area, row)| {
            let area_baseline = baseline.reweighted(row)?;
            let area_reform = reform.reweighted(row)?;
            let total = area_baseline.total_weight();
            let average_gain = if total > 0.0 {
                (area_reform.sum() - area_baseline.sum()) / total
            } else {
                0.0
            };
            Ok(AreaRow {
                reform_id: ctx.reform_id.to_string(),
                year: ctx.year,
                code: area.code.clone(),
                name: area.name.clone(),
                average_gain,
                relative_change: relative_change(average_gain, area_baseline.mean()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::dataset::fixtures::mixed_dataset;
    use crate::core::engine::{Simulation, SimulationBuilder};
    use crate::core::geography::Area;
    use crate::core::params::{Parameter, ParameterSet, ScottishBand};
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn ctx(active: bool) -> ReformContext<'static> {
        ReformContext {
            reform_id: "test_reform",
            reform_name: "Test reform",
            year: 2027,
            active,
        }
    }

    fn pair(basic_threshold: f64) -> (Simulation, Simulation) {
        let dataset = Arc::new(mixed_dataset());
        let base = ParameterSet::engine_default();
        let without = SimulationBuilder::new(dataset.clone(), base.clone()).build();
        let mut builder = SimulationBuilder::new(dataset, base);
        builder.update(
            Parameter::ScottishThreshold(ScottishBand::Basic),
            2027,
            basic_threshold,
        );
        (without, builder.build())
    }

    fn run_all(
        without: &Simulation,
        with: &Simulation,
        active: bool,
        weights: &AreaWeights,
    ) -> ImpactTables {
        let mut tables = ImpactTables::default();
        for calculator in [
            Calculator::Budgetary,
            Calculator::Distributional,
            Calculator::WinnersLosers,
            Calculator::Poverty,
            Calculator::Geographic(weights),
        ] {
            calculator
                .run(without, with, &ctx(active), Population::Scotland, &mut tables)
                .expect("calculator runs");
        }
        tables
    }

    fn two_areas() -> AreaWeights {
        AreaWeights::new(
            "local_authorities",
            vec![
                Area {
                    code: "S12000001".to_string(),
                    name: "First".to_string(),
                },
                Area {
                    code: "S12000002".to_string(),
                    name: "Second".to_string(),
                },
            ],
            vec![
                vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                vec![0.0, 2.0, 0.0, 0.0, 0.0, 3.0],
            ],
        )
        .expect("valid weights")
    }

    #[test]
    fn identity_reform_yields_all_zero_deltas() {
        let dataset = Arc::new(mixed_dataset());
        let base = ParameterSet::engine_default();
        let without = SimulationBuilder::new(dataset.clone(), base.clone()).build();
        let with = SimulationBuilder::new(dataset, base).build();

        let tables = run_all(&without, &with, true, &two_areas());
        assert!(tables.budgetary.iter().all(|r| r.value == 0.0));
        assert!(tables
            .distributional
            .iter()
            .all(|r| r.value == 0.0 && r.absolute_change == 0.0));
        assert!(tables
            .metrics
            .iter()
            .filter(|r| r.metric.ends_with("_change"))
            .all(|r| r.value == 0.0));
        let unchanged = tables
            .winners_losers
            .iter()
            .find(|r| r.metric == "unchanged_pct")
            .expect("unchanged row");
        assert_approx(unchanged.value, 100.0);
        assert!(tables.areas["local_authorities"]
            .iter()
            .all(|r| r.average_gain == 0.0 && r.relative_change == 0.0));
    }

    #[test]
    fn inactive_reform_reports_exactly_zero_cost() {
        let (without, with) = pair(4_000.0);
        let mut tables = ImpactTables::default();
        Calculator::Budgetary
            .run(&without, &with, &ctx(false), Population::Scotland, &mut tables)
            .expect("budgetary");
        assert_eq!(tables.budgetary[0].value, 0.0);

        Calculator::Budgetary
            .run(&without, &with, &ctx(true), Population::Scotland, &mut tables)
            .expect("budgetary");
        assert!(tables.budgetary[1].value > 0.0);
    }

    #[test]
    fn budgetary_cost_counts_household_weights_once() {
        let (without, with) = pair(4_000.0);
        let before = without
            .calculate(Variable::HouseholdNetIncome, 2027, None)
            .expect("baseline");
        let after = with
            .calculate(Variable::HouseholdNetIncome, 2027, None)
            .expect("reform");
        let scottish = [0usize, 1, 2, 4, 5];
        let expected: f64 = scottish
            .iter()
            .map(|&i| (after.values()[i] - before.values()[i]) * before.weights()[i])
            .sum::<f64>()
            / 1e6;

        let mut tables = ImpactTables::default();
        Calculator::Budgetary
            .run(&without, &with, &ctx(true), Population::Scotland, &mut tables)
            .expect("budgetary");
        assert_approx(tables.budgetary[0].value, expected);
    }

    #[test]
    fn all_row_uses_overall_weighted_means() {
        let weights = vec![1.0, 2.0, 5.0];
        let baseline = WeightedSample::new(vec![10_000.0, 20_000.0, 40_000.0], weights.clone())
            .expect("baseline");
        let change = WeightedSample::new(vec![100.0, 0.0, 400.0], weights).expect("change");
        let rows = distributional_rows(&ctx(true), &baseline, &change, &[1.0, 2.0, f64::NAN])
            .expect("rows");

        let labels: Vec<&str> = rows.iter().map(|r| r.decile.as_str()).collect();
        assert_eq!(labels, vec!["1st", "2nd", "All"]);

        let all = rows.last().expect("all row");
        let overall_change = (100.0 + 2_000.0) / 8.0;
        let overall_baseline = (10_000.0 + 40_000.0 + 200_000.0) / 8.0;
        assert_approx(all.absolute_change, overall_change);
        assert_approx(all.value, overall_change / overall_baseline * 100.0);

        let mean_of_deciles = rows[..2].iter().map(|r| r.value).sum::<f64>() / 2.0;
        assert!((all.value - mean_of_deciles).abs() > 1e-3);
    }

    #[test]
    fn decile_codes_are_rounded_and_clipped() {
        assert_eq!(decile_code(0.0), Some(1));
        assert_eq!(decile_code(3.4), Some(3));
        assert_eq!(decile_code(14.0), Some(10));
        assert_eq!(decile_code(f64::INFINITY), None);
    }

    #[test]
    fn empty_population_is_entirely_unchanged() {
        let empty = WeightedSample::uniform(Vec::new());
        assert_eq!(winners_losers_shares(&empty), (0.0, 0.0, 100.0));
        let weightless = WeightedSample::new(vec![50.0], vec![0.0]).expect("sample");
        assert_eq!(winners_losers_shares(&weightless), (0.0, 0.0, 100.0));
    }

    #[test]
    fn area_rows_weight_households_by_matrix_row() {
        let (without, with) = pair(4_000.0);
        let before = without
            .calculate(Variable::HouseholdNetIncome, 2027, None)
            .expect("baseline");
        let after = with
            .calculate(Variable::HouseholdNetIncome, 2027, None)
            .expect("reform");
        let gain = |i: usize| after.values()[i] - before.values()[i];

        let rows = area_rows(&without, &with, &ctx(true), &two_areas()).expect("area rows");
        assert_eq!(rows.len(), 2);
        assert_approx(rows[0].average_gain, gain(0));
        assert_approx(rows[1].average_gain, (2.0 * gain(1) + 3.0 * gain(5)) / 5.0);
        let second_baseline = (2.0 * before.values()[1] + 3.0 * before.values()[5]) / 5.0;
        assert_approx(
            rows[1].relative_change,
            rows[1].average_gain / second_baseline * 100.0,
        );
    }

    #[test]
    fn geographic_rows_are_filed_under_the_calculator_name() {
        let (without, with) = pair(4_000.0);
        let areas = two_areas();
        let tables = run_all(&without, &with, true, &areas);
        let calculator = Calculator::Geographic(&areas);
        assert_eq!(calculator.name(), "local_authorities");
        assert_eq!(tables.areas.len(), 1);
        assert_eq!(tables.areas[calculator.name()].len(), 2);
        assert_eq!(Calculator::Poverty.name(), "metrics");
    }

    #[test]
    fn area_matrix_must_match_household_count() {
        let (without, with) = pair(4_000.0);
        let narrow = AreaWeights::new(
            "constituency",
            vec![Area {
                code: "S14000001".to_string(),
                name: "Only".to_string(),
            }],
            vec![vec![1.0, 1.0]],
        )
        .expect("valid weights");
        assert!(area_rows(&without, &with, &ctx(true), &narrow).is_err());
    }

    #[test]
    fn poverty_metrics_cover_every_basis_and_kind() {
        let (without, with) = pair(4_000.0);
        let rows = poverty_rows(&without, &with, &ctx(true), Population::Scotland).expect("rows");
        assert_eq!(rows.len(), 2 * 2 * 2 * 3);
        assert!(rows.iter().any(|r| r.metric == "poverty_rate_bhc_baseline"));
        assert!(rows.iter().any(|r| r.metric == "child_deep_poverty_rate_ahc_change"));
        assert!(rows.iter().all(|r| (0.0..=100.0).contains(&r.value.abs())));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(128))]

        #[test]
        fn prop_winners_losers_unchanged_sum_to_100(
            rows in vec((-500i32..500, 0u32..1_000), 0..60)
        ) {
            let values: Vec<f64> = rows.iter().map(|(v, _)| *v as f64 / 100.0).collect();
            let weights: Vec<f64> = rows.iter().map(|(_, w)| *w as f64).collect();
            let change = WeightedSample::new(values, weights).expect("valid sample");
            let (winners, losers, unchanged) = winners_losers_shares(&change);
            prop_assert!((winners + losers + unchanged - 100.0).abs() <= 0.5);
            prop_assert!(winners >= 0.0 && losers >= 0.0 && unchanged >= -1e-9);
        }
    }
}
