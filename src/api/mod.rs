use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::core::{
    DEFAULT_DATA_DIR, DEFAULT_OUTPUT_DIR, FIRST_PARAMETER_YEAR, HouseholdImpact, HouseholdInput,
    LAST_PARAMETER_YEAR, PipelineOptions, PolicyConfig, Population, generate, household_impacts,
    reform_catalog,
};
use crate::mansion::{self, SurchargeConfig};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliPopulation {
    Scotland,
    All,
}

impl From<CliPopulation> for Population {
    fn from(value: CliPopulation) -> Self {
        match value {
            CliPopulation::Scotland => Population::Scotland,
            CliPopulation::All => Population::All,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "scottish-budget",
    about = "Scottish Budget reform impacts: budgetary, distributional, poverty and geographic",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[command(flatten)]
    generate: GenerateArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every selected reform and write the impact tables (default)
    Generate(GenerateArgs),
    /// Per-reform impacts for a single household described in JSON
    Household(HouseholdArgs),
    /// Allocate mansion tax revenue across Scottish Parliament constituencies
    MansionTax(MansionTaxArgs),
}

#[derive(Args, Debug, Clone)]
struct GenerateArgs {
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,
    #[arg(
        long,
        num_args = 1..,
        help = "Years to simulate; defaults to the policy config's default years"
    )]
    years: Vec<i32>,
    #[arg(long, help = "Print available reform IDs and exit")]
    list_reforms: bool,
    #[arg(long = "reform", num_args = 1.., help = "Reform IDs to run; defaults to all")]
    reforms: Vec<String>,
    #[arg(long, help = "JSON file overriding the policy constants")]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = CliPopulation::Scotland)]
    population: CliPopulation,
    #[arg(long, help = "Keep non-Scottish areas in the geographic tables")]
    all_areas: bool,
}

#[derive(Args, Debug, Clone)]
struct HouseholdArgs {
    #[arg(long, conflicts_with = "input", help = "Household payload as a JSON string")]
    json: Option<String>,
    #[arg(long, help = "Path to a JSON payload; stdin is read when neither is given")]
    input: Option<PathBuf>,
    #[arg(long, num_args = 1..)]
    years: Vec<i32>,
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct MansionTaxArgs {
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,
    #[arg(long, help = "Output CSV; defaults to the public data directory")]
    output: Option<PathBuf>,
    #[arg(long, help = "JSON file overriding the surcharge rates and stock")]
    config: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HouseholdPayload {
    #[serde(alias = "employmentIncome")]
    employment_income: Option<f64>,
    #[serde(alias = "isMarried")]
    is_married: Option<bool>,
    #[serde(alias = "partnerIncome")]
    partner_income: Option<f64>,
    #[serde(alias = "childrenAges")]
    children_ages: Option<Vec<f64>>,
    #[serde(alias = "receivesUc", alias = "receives_universal_credit")]
    receives_uc: Option<bool>,
    year: Option<i32>,
}

#[derive(Debug)]
struct HouseholdRequest {
    input: HouseholdInput,
    years: Vec<i32>,
}

#[derive(Debug, Serialize)]
struct HouseholdResponse {
    results: Vec<HouseholdImpact>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn validate_years(years: &[i32]) -> Result<(), String> {
    let range = FIRST_PARAMETER_YEAR..=LAST_PARAMETER_YEAR;
    if let Some(year) = years.iter().find(|y| !range.contains(*y)) {
        return Err(format!(
            "--years must be between {FIRST_PARAMETER_YEAR} and {LAST_PARAMETER_YEAR}, got {year}"
        ));
    }
    let unique: BTreeSet<&i32> = years.iter().collect();
    if unique.len() != years.len() {
        return Err("--years must not repeat a year".to_string());
    }
    Ok(())
}

fn load_policy_config(path: Option<&Path>) -> Result<PolicyConfig, String> {
    let config = match path {
        Some(path) => PolicyConfig::load(path).map_err(|e| format!("--config: {e}"))?,
        None => PolicyConfig::default(),
    };
    config.validate().map_err(|e| format!("--config: {e}"))?;
    Ok(config)
}

fn resolve_years(years: &[i32], config: &PolicyConfig) -> Result<Vec<i32>, String> {
    let years = if years.is_empty() {
        config.default_years.clone()
    } else {
        years.to_vec()
    };
    validate_years(&years)?;
    Ok(years)
}

fn build_pipeline_options(
    args: &GenerateArgs,
    config: &PolicyConfig,
) -> Result<PipelineOptions, String> {
    if args.output_dir.as_os_str().is_empty() {
        return Err("--output-dir must not be empty".to_string());
    }
    if args.data_dir.as_os_str().is_empty() {
        return Err("--data-dir must not be empty".to_string());
    }
    if let Some(id) = args.reforms.iter().find(|id| id.trim().is_empty()) {
        return Err(format!("--reform must not be blank, got {id:?}"));
    }

    Ok(PipelineOptions {
        output_dir: args.output_dir.clone(),
        data_dir: args.data_dir.clone(),
        years: resolve_years(&args.years, config)?,
        population: args.population.into(),
        scotland_areas_only: !args.all_areas,
    })
}

fn list_reforms(config: &PolicyConfig, years: &[i32]) -> Vec<String> {
    reform_catalog(config, years)
        .into_iter()
        .map(|r| format!("{}: {}", r.id, r.name))
        .collect()
}

fn run_generate(args: &GenerateArgs) -> Result<(), String> {
    let config = load_policy_config(args.config.as_deref())?;
    let options = build_pipeline_options(args, &config)?;

    if args.list_reforms {
        for line in list_reforms(&config, &options.years) {
            println!("{line}");
        }
        return Ok(());
    }

    let tables = generate(&config, &args.reforms, &options).map_err(|e| e.to_string())?;
    log::info!(
        "{} budgetary, {} distributional, {} winners/losers and {} metric rows",
        tables.budgetary.len(),
        tables.distributional.len(),
        tables.winners_losers.len(),
        tables.metrics.len()
    );
    Ok(())
}

#[cfg(test)]
fn household_request_from_json(
    json: &str,
    default_years: &[i32],
) -> Result<HouseholdRequest, String> {
    let payload = serde_json::from_str::<HouseholdPayload>(json)
        .map_err(|e| format!("Invalid household JSON payload: {e}"))?;
    household_request_from_payload(payload, default_years)
}

fn household_request_from_payload(
    payload: HouseholdPayload,
    default_years: &[i32],
) -> Result<HouseholdRequest, String> {
    let mut input = HouseholdInput::default();

    if let Some(v) = payload.employment_income {
        input.employment_income = v;
    }
    if let Some(v) = payload.is_married {
        input.is_married = v;
    }
    if let Some(v) = payload.partner_income {
        input.partner_income = v;
    }
    if let Some(v) = payload.children_ages {
        input.children_ages = v;
    }
    if let Some(v) = payload.receives_uc {
        input.receives_uc = v;
    }
    input.validate().map_err(|e| e.to_string())?;

    let years = match payload.year {
        Some(year) => vec![year],
        None => default_years.to_vec(),
    };
    validate_years(&years).map_err(|e| e.replace("--years", "year"))?;

    Ok(HouseholdRequest { input, years })
}

fn read_household_payload(args: &HouseholdArgs) -> Result<String, String> {
    if let Some(json) = &args.json {
        return Ok(json.clone());
    }
    if let Some(path) = &args.input {
        return fs::read_to_string(path).map_err(|e| format!("--input {}: {e}", path.display()));
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| format!("stdin: {e}"))?;
    Ok(buffer)
}

fn household_response(args: &HouseholdArgs) -> Result<HouseholdResponse, String> {
    let config = load_policy_config(args.config.as_deref())?;
    let default_years = resolve_years(&args.years, &config)?;
    let raw = read_household_payload(args)?;
    let payload = serde_json::from_str::<HouseholdPayload>(&raw)
        .map_err(|e| format!("Invalid household JSON payload: {e}"))?;
    let request = household_request_from_payload(payload, &default_years)?;

    let results =
        household_impacts(&request.input, &config, &request.years).map_err(|e| e.to_string())?;
    Ok(HouseholdResponse { results })
}

fn run_household(args: &HouseholdArgs) -> i32 {
    let (body, code) = match household_response(args) {
        Ok(response) => (serde_json::to_string_pretty(&response), 0),
        Err(msg) => {
            log::error!("household calculation failed: {msg}");
            (serde_json::to_string(&ErrorResponse { error: msg }), 1)
        }
    };
    match body {
        Ok(body) => {
            println!("{body}");
            code
        }
        Err(e) => {
            log::error!("failed to serialise household response: {e}");
            1
        }
    }
}

fn run_mansion_tax(args: &MansionTaxArgs) -> Result<(), String> {
    let config = match &args.config {
        Some(path) => SurchargeConfig::load(path).map_err(|e| format!("--config: {e}"))?,
        None => SurchargeConfig::default(),
    };
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| Path::new(DEFAULT_OUTPUT_DIR).join(mansion::DEFAULT_OUTPUT_FILE));

    mansion::run(&args.data_dir, &output, &config).map_err(|e| e.to_string())?;
    Ok(())
}

/// Dispatches a parsed command line and returns the process exit code.
pub fn run(cli: Cli) -> i32 {
    let result = match &cli.command {
        None => run_generate(&cli.generate),
        Some(Command::Generate(args)) => run_generate(args),
        Some(Command::Household(args)) => return run_household(args),
        Some(Command::MansionTax(args)) => run_mansion_tax(args),
    };
    match result {
        Ok(()) => 0,
        Err(msg) => {
            log::error!("{msg}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YEARS: [i32; 2] = [2026, 2027];

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("scottish-budget").chain(args.iter().copied()))
            .expect("valid command line")
    }

    fn sample_args() -> GenerateArgs {
        parse(&[]).generate
    }

    #[test]
    fn flat_flags_default_to_generate() {
        let cli = parse(&["--reform", "scp_inflation", "higher_rate_freeze", "--years", "2026"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.generate.reforms, ["scp_inflation", "higher_rate_freeze"]);
        assert_eq!(cli.generate.years, [2026]);
        assert_eq!(cli.generate.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(cli.generate.population, CliPopulation::Scotland);

        let cli = parse(&["household", "--json", "{}"]);
        assert!(matches!(cli.command, Some(Command::Household(_))));
        let cli = parse(&["mansion-tax", "--data-dir", "/tmp/data"]);
        assert!(matches!(cli.command, Some(Command::MansionTax(_))));
    }

    #[test]
    fn build_pipeline_options_uses_config_years_by_default() {
        let config = PolicyConfig::default();
        let options = build_pipeline_options(&sample_args(), &config).expect("valid options");
        assert_eq!(options.years, config.default_years);
        assert!(options.scotland_areas_only);
        assert_eq!(options.population, Population::Scotland);

        let mut args = sample_args();
        args.all_areas = true;
        args.population = CliPopulation::All;
        let options = build_pipeline_options(&args, &config).expect("valid options");
        assert!(!options.scotland_areas_only);
        assert_eq!(options.population, Population::All);
    }

    #[test]
    fn build_pipeline_options_rejects_out_of_range_year() {
        let mut args = sample_args();
        args.years = vec![2026, 2040];
        let err = build_pipeline_options(&args, &PolicyConfig::default())
            .expect_err("must reject year outside parameter range");
        assert!(err.contains("--years"));
        assert!(err.contains("2040"));
    }

    #[test]
    fn build_pipeline_options_rejects_repeated_year() {
        let mut args = sample_args();
        args.years = vec![2027, 2027];
        let err = build_pipeline_options(&args, &PolicyConfig::default())
            .expect_err("must reject repeated year");
        assert!(err.contains("--years"));
    }

    #[test]
    fn build_pipeline_options_rejects_blank_reform() {
        let mut args = sample_args();
        args.reforms = vec![" ".to_string()];
        let err = build_pipeline_options(&args, &PolicyConfig::default())
            .expect_err("must reject blank reform id");
        assert!(err.contains("--reform"));
    }

    #[test]
    fn list_reforms_prints_catalog_in_order() {
        let lines = list_reforms(&PolicyConfig::default(), &YEARS);
        assert_eq!(lines.len(), 8);
        assert!(lines[0].starts_with("combined: "));
        assert!(lines[7].starts_with("top_rate_freeze: "));
    }

    #[test]
    fn unknown_reform_exits_non_zero_without_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("out");
        let cli = parse(&[
            "--reform",
            "not_a_reform",
            "--output-dir",
            output.to_str().expect("utf-8 path"),
            "--data-dir",
            dir.path().to_str().expect("utf-8 path"),
        ]);
        assert_eq!(run(cli), 1);
        assert!(!output.exists());
    }

    #[test]
    fn missing_data_exits_non_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("out");
        let cli = parse(&[
            "generate",
            "--output-dir",
            output.to_str().expect("utf-8 path"),
            "--data-dir",
            dir.path().join("absent").to_str().expect("utf-8 path"),
        ]);
        assert_eq!(run(cli), 1);
        assert!(!output.exists());
    }

    #[test]
    fn list_reforms_exits_zero() {
        assert_eq!(run(parse(&["--list-reforms"])), 0);
    }

    #[test]
    fn household_payload_accepts_camel_case_and_defaults() {
        let request = household_request_from_json(
            r#"{"employmentIncome": 42000, "isMarried": true, "partnerIncome": 12000,
                "childrenAges": [0, 3], "year": 2027}"#,
            &YEARS,
        )
        .expect("valid payload");
        assert_eq!(request.input.employment_income, 42_000.0);
        assert!(request.input.is_married);
        assert_eq!(request.input.children_ages, [0.0, 3.0]);
        assert!(request.input.receives_uc);
        assert_eq!(request.years, [2027]);

        let request = household_request_from_json("{}", &YEARS).expect("empty payload");
        assert_eq!(request.input, HouseholdInput::default());
        assert_eq!(request.years, YEARS);
    }

    #[test]
    fn household_payload_rejects_invalid_values() {
        let err = household_request_from_json(r#"{"employment_income": -5}"#, &YEARS)
            .expect_err("negative income");
        assert!(err.contains("employment_income"));

        let err = household_request_from_json(r#"{"children_ages": [30]}"#, &YEARS)
            .expect_err("adult child");
        assert!(err.contains("child age"));

        let err =
            household_request_from_json(r#"{"year": 2050}"#, &YEARS).expect_err("bad year");
        assert!(err.contains("year"));

        let err = household_request_from_json("not json", &YEARS).expect_err("bad json");
        assert!(err.starts_with("Invalid household JSON payload"));
    }

    #[test]
    fn household_command_reports_success_and_failure() {
        let ok = parse(&["household", "--json", r#"{"children_ages": [0], "year": 2027}"#]);
        assert_eq!(run(ok), 0);

        let bad = parse(&["household", "--json", r#"{"partner_income": 1000}"#]);
        assert_eq!(run(bad), 1);
    }

    #[test]
    fn household_response_serialises_impacts() {
        let args = HouseholdArgs {
            json: Some(r#"{"employment_income": 50000, "year": 2026}"#.to_string()),
            input: None,
            years: Vec::new(),
            config: None,
        };
        let response = household_response(&args).expect("response");
        let json = serde_json::to_value(&response).expect("json");
        let first = &json["results"][0];
        assert_eq!(first["year"], 2026);
        assert!(first["impacts"]["income_tax_basic_uplift"].as_f64().expect("number") > 0.0);
        assert!(first["total"].is_number());
    }
}
