use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const FIRST_PARAMETER_YEAR: i32 = 2025;
pub const LAST_PARAMETER_YEAR: i32 = 2035;
const THRESHOLD_BASE_YEAR: i32 = 2026;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ScottishBand {
    Starter,
    Basic,
    Intermediate,
    Higher,
    Advanced,
    Top,
}

impl ScottishBand {
    pub const ALL: [ScottishBand; 6] = [
        ScottishBand::Starter,
        ScottishBand::Basic,
        ScottishBand::Intermediate,
        ScottishBand::Higher,
        ScottishBand::Advanced,
        ScottishBand::Top,
    ];

    pub fn index(self) -> usize {
        match self {
            ScottishBand::Starter => 0,
            ScottishBand::Basic => 1,
            ScottishBand::Intermediate => 2,
            ScottishBand::Higher => 3,
            ScottishBand::Advanced => 4,
            ScottishBand::Top => 5,
        }
    }

    fn default_rate(self) -> f64 {
        match self {
            ScottishBand::Starter => 0.19,
            ScottishBand::Basic => 0.20,
            ScottishBand::Intermediate => 0.21,
            ScottishBand::Higher => 0.42,
            ScottishBand::Advanced => 0.45,
            ScottishBand::Top => 0.48,
        }
    }

    /// Thresholds above the personal allowance for 2025 and 2026.
    fn default_thresholds(self) -> (f64, f64) {
        match self {
            ScottishBand::Starter => (0.0, 0.0),
            ScottishBand::Basic => (2_827.0, 2_897.0),
            ScottishBand::Intermediate => (14_921.0, 15_291.0),
            ScottishBand::Higher => (31_092.0, 31_093.0),
            ScottishBand::Advanced => (62_430.0, 62_431.0),
            ScottishBand::Top => (112_570.0, 112_571.0),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Parameter {
    ScottishThreshold(ScottishBand),
    ScottishRate(ScottishBand),
    PersonalAllowance,
    ScpAmount,
    ScpBabyPremiumInEffect,
    ScpBabyAmount,
    PovertyLineBhc,
    PovertyLineAhc,
    DeepPovertyRatio,
}

impl Parameter {
    pub fn path(self) -> String {
        match self {
            Parameter::ScottishThreshold(band) => format!(
                "gov.hmrc.income_tax.rates.scotland.rates.brackets[{}].threshold",
                band.index()
            ),
            Parameter::ScottishRate(band) => format!(
                "gov.hmrc.income_tax.rates.scotland.rates.brackets[{}].rate",
                band.index()
            ),
            Parameter::PersonalAllowance => {
                "gov.hmrc.income_tax.allowances.personal_allowance.amount".to_string()
            }
            Parameter::ScpAmount => "gov.social_security_scotland.scp.amount".to_string(),
            Parameter::ScpBabyPremiumInEffect => {
                "gov.social_security_scotland.scp.baby_premium.in_effect".to_string()
            }
            Parameter::ScpBabyAmount => {
                "gov.social_security_scotland.scp.baby_premium.amount".to_string()
            }
            Parameter::PovertyLineBhc => "poverty.absolute_line.bhc".to_string(),
            Parameter::PovertyLineAhc => "poverty.absolute_line.ahc".to_string(),
            Parameter::DeepPovertyRatio => "poverty.deep_poverty_ratio".to_string(),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// CPI forecasts by year. Years without a forecast use `fallback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpiSchedule {
    pub rates: BTreeMap<i32, f64>,
    pub fallback: f64,
}

impl Default for CpiSchedule {
    fn default() -> Self {
        Self {
            rates: BTreeMap::from([
                (2026, 0.024),
                (2027, 0.021),
                (2028, 0.020),
                (2029, 0.020),
                (2030, 0.020),
            ]),
            fallback: 0.02,
        }
    }
}

impl CpiSchedule {
    pub fn rate(&self, year: i32) -> f64 {
        self.rates.get(&year).copied().unwrap_or(self.fallback)
    }

    /// Cumulative uprating from `from` to `to`: the product of `1 + cpi[y]`
    /// for `from <= y < to`. Going backwards returns the reciprocal.
    pub fn uprating_factor(&self, from: i32, to: i32) -> f64 {
        if to < from {
            return 1.0 / self.uprating_factor(to, from);
        }
        (from..to).map(|y| 1.0 + self.rate(y)).product()
    }

    pub fn uprate(&self, value: f64, from: i32, to: i32) -> f64 {
        (value * self.uprating_factor(from, to)).round()
    }
}

/// Year-indexed parameter values. A lookup for a year without an explicit
/// value uses the latest earlier year, or the earliest year when none is
/// earlier. Unset parameters read as 0.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSet {
    values: BTreeMap<Parameter, BTreeMap<i32, f64>>,
}

impl ParameterSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn engine_default() -> Self {
        Self::uprated(&CpiSchedule::default())
    }

    /// Post-budget law with thresholds uprated by `cpi` after 2026.
    pub fn uprated(cpi: &CpiSchedule) -> Self {
        let mut params = Self::empty();
        for band in ScottishBand::ALL {
            let (current, base) = band.default_thresholds();
            let threshold = Parameter::ScottishThreshold(band);
            params.update(threshold, FIRST_PARAMETER_YEAR, current);
            params.update(threshold, THRESHOLD_BASE_YEAR, base);
            for year in THRESHOLD_BASE_YEAR + 1..=LAST_PARAMETER_YEAR {
                params.update(threshold, year, cpi.uprate(base, THRESHOLD_BASE_YEAR, year));
            }
            params.update(
                Parameter::ScottishRate(band),
                FIRST_PARAMETER_YEAR,
                band.default_rate(),
            );
        }

        params.update(Parameter::PersonalAllowance, FIRST_PARAMETER_YEAR, 12_570.0);
        params.update(Parameter::ScpAmount, FIRST_PARAMETER_YEAR, 27.15);
        params.update(Parameter::ScpAmount, 2026, 28.20);
        params.update(Parameter::ScpBabyPremiumInEffect, FIRST_PARAMETER_YEAR, 0.0);
        params.update(Parameter::ScpBabyPremiumInEffect, 2027, 1.0);
        params.update(Parameter::ScpBabyAmount, FIRST_PARAMETER_YEAR, 40.0);
        params.update(Parameter::DeepPovertyRatio, FIRST_PARAMETER_YEAR, 0.5);

        for year in FIRST_PARAMETER_YEAR..=LAST_PARAMETER_YEAR {
            params.update(
                Parameter::PovertyLineBhc,
                year,
                cpi.uprate(19_000.0, FIRST_PARAMETER_YEAR, year),
            );
            params.update(
                Parameter::PovertyLineAhc,
                year,
                cpi.uprate(16_000.0, FIRST_PARAMETER_YEAR, year),
            );
        }
        params
    }

    pub fn get(&self, parameter: Parameter, year: i32) -> f64 {
        let Some(series) = self.values.get(&parameter) else {
            return 0.0;
        };
        series
            .range(..=year)
            .next_back()
            .or_else(|| series.iter().next())
            .map(|(_, value)| *value)
            .unwrap_or(0.0)
    }

    pub fn update(&mut self, parameter: Parameter, year: i32, value: f64) {
        self.values.entry(parameter).or_default().insert(year, value);
    }
}
