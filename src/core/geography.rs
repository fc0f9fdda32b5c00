use std::path::Path;

use serde::{Deserialize, Serialize};

use super::dataset::read_records;
use super::error::{BudgetError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub code: String,
    pub name: String,
}

/// Reference files for one geography and the stem of its output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeographySource {
    pub label: &'static str,
    pub areas_file: &'static str,
    pub weights_file: &'static str,
}

pub const GEOGRAPHIES: [GeographySource; 2] = [
    GeographySource {
        label: "local_authorities",
        areas_file: "local_authorities_2021.csv",
        weights_file: "local_authority_weights.csv",
    },
    GeographySource {
        label: "constituency",
        areas_file: "constituencies_2024.csv",
        weights_file: "parliamentary_constituency_weights.csv",
    },
];

/// An area-by-household allocation matrix: row `i` holds the weight each
/// household contributes to area `i`. Independent of the survey weights.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaWeights {
    label: String,
    areas: Vec<Area>,
    weights: Vec<Vec<f64>>,
}

impl AreaWeights {
    pub fn new(label: impl Into<String>, areas: Vec<Area>, weights: Vec<Vec<f64>>) -> Result<Self> {
        let label = label.into();
        if areas.len() != weights.len() {
            return Err(BudgetError::invalid_data(
                &label,
                format!("{} areas but {} weight rows", areas.len(), weights.len()),
            ));
        }
        if let Some(width) = weights.first().map(Vec::len) {
            for (area, row) in areas.iter().zip(&weights) {
                if row.len() != width {
                    return Err(BudgetError::invalid_data(
                        &label,
                        format!(
                            "weight row for {} has {} entries, expected {width}",
                            area.code,
                            row.len()
                        ),
                    ));
                }
                if row.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(BudgetError::invalid_data(
                        &label,
                        format!("weight row for {} has a negative or non-finite entry", area.code),
                    ));
                }
            }
        }
        Ok(Self {
            label,
            areas,
            weights,
        })
    }

    pub fn load(source: &GeographySource, data_dir: &Path) -> Result<Self> {
        let areas: Vec<Area> = read_records(&data_dir.join(source.areas_file))?;
        let weights = read_matrix(&data_dir.join(source.weights_file))?;
        Self::new(source.label, areas, weights)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Households covered by each row, or `None` for an empty matrix.
    pub fn household_count(&self) -> Option<usize> {
        self.weights.first().map(Vec::len)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&Area, &[f64])> {
        self.areas
            .iter()
            .zip(self.weights.iter().map(Vec::as_slice))
    }

    /// Keeps areas whose code starts with `prefix`, with their matrix rows.
    pub fn retain_codes_with_prefix(self, prefix: &str) -> Self {
        let (areas, weights) = self
            .areas
            .into_iter()
            .zip(self.weights)
            .filter(|(area, _)| area.code.starts_with(prefix))
            .unzip();
        Self {
            label: self.label,
            areas,
            weights,
        }
    }
}

fn read_matrix(path: &Path) -> Result<Vec<Vec<f64>>> {
    if !path.exists() {
        return Err(BudgetError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| BudgetError::csv(path, e))?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| BudgetError::csv(path, e))?;
        let row = record
            .iter()
            .map(|field| {
                field.parse::<f64>().map_err(|_| {
                    BudgetError::invalid_data(
                        path.display().to_string(),
                        format!("row {}: {field:?} is not a number", line + 1),
                    )
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }
    Ok(rows)
}
