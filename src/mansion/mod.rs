//! Geographic distribution of a council tax surcharge on £1m+ homes across
//! Scottish Parliament constituencies. No simulation is involved: council
//! sales estimates are split between constituencies by population times a
//! wealth factor, then the stock-based revenue is shared out by sales.

mod tables;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{BudgetError, Result, read_records, write_rows};

pub use tables::{CONSTITUENCY_COUNCILS, COUNCIL_SALES};

pub const POPULATION_FILE: &str = "constituency_population.csv";
pub const BAND_COUNTS_FILE: &str = "council_tax_bands_by_constituency.csv";
pub const DEFAULT_OUTPUT_FILE: &str = "scottish_parliament_constituency_impact.csv";

const HIGH_BANDS_LABEL: &str = "Bands F-H";
const TOTAL_LABEL: &str = "Total Dwellings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurchargeConfig {
    /// Annual surcharge for £1m-£2m homes.
    pub band_i_rate: f64,
    /// Annual surcharge for £2m+ homes.
    pub band_j_rate: f64,
    pub band_i_sales: f64,
    pub band_j_sales: f64,
    /// Estimated number of £1m+ homes in Scotland.
    pub stock: f64,
}

impl Default for SurchargeConfig {
    fn default() -> Self {
        Self {
            band_i_rate: 1_500.0,
            band_j_rate: 2_500.0,
            band_i_sales: 416.0,
            band_j_sales: 50.0,
            stock: 11_481.0,
        }
    }
}

impl SurchargeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BudgetError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|e| BudgetError::io(path, e))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("band_i_rate", self.band_i_rate),
            ("band_j_rate", self.band_j_rate),
            ("band_i_sales", self.band_i_sales),
            ("band_j_sales", self.band_j_sales),
            ("stock", self.stock),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(BudgetError::Config(format!("{name} must be finite and >= 0")));
        }
        if self.band_i_sales + self.band_j_sales <= 0.0 {
            return Err(BudgetError::Config(
                "band_i_sales + band_j_sales must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn band_i_share(&self) -> f64 {
        self.band_i_sales / (self.band_i_sales + self.band_j_sales)
    }

    pub fn band_j_share(&self) -> f64 {
        self.band_j_sales / (self.band_i_sales + self.band_j_sales)
    }

    pub fn blended_rate(&self) -> f64 {
        self.band_i_share() * self.band_i_rate + self.band_j_share() * self.band_j_rate
    }

    pub fn total_revenue(&self) -> f64 {
        self.stock * self.blended_rate()
    }
}

pub fn round_to_tenth_million(value: f64) -> f64 {
    (value / 100_000.0).round() * 100_000.0
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PopulationRecord {
    pub constituency: String,
    pub population: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BandCountRecord {
    pub constituency: String,
    pub band: String,
    pub dwellings: f64,
}

pub fn load_population(path: &Path) -> Result<BTreeMap<String, f64>> {
    let records: Vec<PopulationRecord> = read_records(path)?;
    Ok(records
        .into_iter()
        .map(|r| (r.constituency, r.population))
        .collect())
}

pub fn load_band_counts(path: &Path) -> Result<Vec<BandCountRecord>> {
    read_records(path)
}

/// Each constituency's share of Band F-H dwellings relative to the Scotland
/// average, rounded to 2 dp. Constituencies need both a Band F-H row and a
/// total row.
pub fn wealth_factors(records: &[BandCountRecord]) -> Result<BTreeMap<String, f64>> {
    let mut high: BTreeMap<&str, f64> = BTreeMap::new();
    let mut total: BTreeMap<&str, f64> = BTreeMap::new();
    for record in records {
        let name = record.constituency.as_str();
        match record.band.trim() {
            HIGH_BANDS_LABEL => *high.entry(name).or_default() += record.dwellings,
            TOTAL_LABEL => *total.entry(name).or_default() += record.dwellings,
            _ => {}
        }
    }

    let merged: Vec<(&str, f64, f64)> = high
        .iter()
        .filter_map(|(name, fh)| total.get(name).map(|t| (*name, *fh, *t)))
        .collect();
    let scotland_high: f64 = merged.iter().map(|(_, fh, _)| fh).sum();
    let scotland_total: f64 = merged.iter().map(|(_, _, t)| t).sum();
    if scotland_total <= 0.0 || scotland_high <= 0.0 {
        return Err(BudgetError::invalid_data(
            BAND_COUNTS_FILE,
            "no Band F-H dwellings to compare against",
        ));
    }
    let average = scotland_high / scotland_total;
    log::info!(
        "Scotland average Band F-H: {:.1}% ({scotland_high:.0} of {scotland_total:.0} dwellings)",
        average * 100.0
    );

    Ok(merged
        .into_iter()
        .map(|(name, fh, t)| {
            let share = if t > 0.0 { fh / t } else { 0.0 };
            (name.to_string(), round_to(share / average, 2))
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstituencyWeight {
    pub constituency: String,
    pub council: String,
    pub population: f64,
    pub wealth_factor: f64,
    pub weight: f64,
}

/// Population x wealth factor, normalised within each council. A council
/// whose adjusted total is zero splits evenly.
pub fn wealth_adjusted_weights(
    mapping: &[(&str, &str)],
    population: &BTreeMap<String, f64>,
    factors: &BTreeMap<String, f64>,
) -> Result<Vec<ConstituencyWeight>> {
    let mut councils: Vec<(&str, Vec<ConstituencyWeight>)> = Vec::new();
    for (constituency, council) in mapping {
        let pop = *population.get(*constituency).ok_or_else(|| {
            BudgetError::invalid_data(
                POPULATION_FILE,
                format!("no population for {constituency}"),
            )
        })?;
        let factor = *factors.get(*constituency).ok_or_else(|| {
            BudgetError::invalid_data(
                BAND_COUNTS_FILE,
                format!("no wealth factor for {constituency}"),
            )
        })?;
        let entry = ConstituencyWeight {
            constituency: constituency.to_string(),
            council: council.to_string(),
            population: pop,
            wealth_factor: factor,
            weight: pop * factor,
        };
        match councils.iter_mut().find(|(name, _)| name == council) {
            Some((_, members)) => members.push(entry),
            None => councils.push((*council, vec![entry])),
        }
    }

    let mut weights = Vec::with_capacity(mapping.len());
    for (_, mut members) in councils {
        let total: f64 = members.iter().map(|m| m.weight).sum();
        let count = members.len() as f64;
        for member in &mut members {
            member.weight = if total > 0.0 {
                member.weight / total
            } else {
                1.0 / count
            };
        }
        weights.extend(members);
    }
    Ok(weights)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationRow {
    pub constituency: String,
    pub council: String,
    pub population: f64,
    pub wealth_factor: f64,
    pub weight: f64,
    pub estimated_sales: f64,
    pub band_i_sales: f64,
    pub band_j_sales: f64,
    pub share_pct: f64,
    pub implied_from_sales: f64,
    pub allocated_revenue: f64,
}

/// Splits council sales by constituency weight and shares the stock-based
/// revenue by each constituency's share of all sales. Shares are rounded
/// for output only. Rows are sorted by estimated sales, largest first.
pub fn allocate_revenue(
    weights: &[ConstituencyWeight],
    council_sales: &[(&str, f64)],
    config: &SurchargeConfig,
) -> Result<Vec<AllocationRow>> {
    let total_sales: f64 = council_sales.iter().map(|(_, sales)| sales).sum();
    let total_revenue = config.total_revenue();

    let mut rows = weights
        .iter()
        .map(|w| {
            let sales = council_sales
                .iter()
                .find(|(council, _)| *council == w.council)
                .map(|(_, sales)| *sales)
                .ok_or_else(|| {
                    let reason = format!("no sales for {}", w.council);
                    BudgetError::invalid_data("council sales", reason)
                })?;
            let estimated_sales = sales * w.weight;
            let share = if total_sales > 0.0 {
                estimated_sales / total_sales
            } else {
                0.0
            };
            let band_i_sales = estimated_sales * config.band_i_share();
            let band_j_sales = estimated_sales * config.band_j_share();
            Ok(AllocationRow {
                constituency: w.constituency.clone(),
                council: w.council.clone(),
                population: w.population,
                wealth_factor: w.wealth_factor,
                weight: round_to(w.weight, 4),
                estimated_sales,
                band_i_sales,
                band_j_sales,
                share_pct: round_to(share * 100.0, 2),
                implied_from_sales: band_i_sales * config.band_i_rate
                    + band_j_sales * config.band_j_rate,
                allocated_revenue: share * total_revenue,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    rows.sort_by(|a, b| b.estimated_sales.total_cmp(&a.estimated_sales));
    Ok(rows)
}

/// Loads the reference files from `data_dir`, allocates revenue across the
/// built-in constituency table and writes the result to `output`.
pub fn run(data_dir: &Path, output: &Path, config: &SurchargeConfig) -> Result<Vec<AllocationRow>> {
    config.validate()?;
    let population = load_population(&data_dir.join(POPULATION_FILE))?;
    log::info!("loaded population for {} constituencies", population.len());
    let factors = wealth_factors(&load_band_counts(&data_dir.join(BAND_COUNTS_FILE))?)?;
    log::info!("loaded wealth factors for {} constituencies", factors.len());

    let weights = wealth_adjusted_weights(&CONSTITUENCY_COUNCILS, &population, &factors)?;
    let rows = allocate_revenue(&weights, &COUNCIL_SALES, config)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| BudgetError::io(parent, e))?;
    }
    write_rows(output, &rows)?;

    let total_sales: f64 = rows.iter().map(|r| r.estimated_sales).sum();
    let allocated: f64 = rows.iter().map(|r| r.allocated_revenue).sum();
    log::info!(
        "{} constituencies, {total_sales:.0} £1m+ sales, stock {:.0}",
        rows.len(),
        config.stock
    );
    log::info!(
        "revenue: {:.0} x £{:.0} = £{:.1}m (allocated £{:.1}m)",
        config.stock,
        config.blended_rate(),
        round_to_tenth_million(config.total_revenue()) / 1e6,
        round_to_tenth_million(allocated) / 1e6
    );
    let edinburgh: f64 = rows
        .iter()
        .filter(|r| r.council == "City of Edinburgh")
        .map(|r| r.allocated_revenue)
        .sum();
    log::info!("City of Edinburgh: £{:.1}m", round_to_tenth_million(edinburgh) / 1e6);
    for row in rows.iter().take(5) {
        log::info!(
            "  {}: {:.1} sales, £{:.2}m ({:.1}%)",
            row.constituency,
            row.estimated_sales,
            row.allocated_revenue / 1e6,
            row.share_pct
        );
    }
    Ok(rows)
}
