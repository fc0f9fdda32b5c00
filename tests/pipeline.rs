use std::fs;
use std::path::Path;

use scottish_budget::core::{BudgetError, PipelineOptions, PolicyConfig, Population, generate};

const HOUSEHOLDS: &str = "\
household_id,weight,region,housing_costs
1,100,SCOTLAND,6000
2,150,Scotland,4000
3,80,SCOTLAND,0
4,200,LONDON,9000
";

const PERSONS: &str = "\
person_id,household_id,benunit_id,age,employment_income,other_income,receives_qualifying_benefit
1,1,1,35,30000,0,yes
2,1,1,33,12000,0,yes
3,1,1,4,0,0,yes
4,2,2,45,55000,0,no
5,3,3,70,0,9000,no
6,4,4,40,40000,0,no
7,4,4,8,0,0,no
";

const LOCAL_AUTHORITIES: &str = "\
code,name
S12000036,City of Edinburgh
S12000049,Glasgow City
E09000001,City of London
";

const LOCAL_AUTHORITY_WEIGHTS: &str = "\
1.0,0.5,0.0,0.0
0.0,0.5,1.0,0.0
0.0,0.0,0.0,1.0
";

fn write_inputs(dir: &Path, weights: &str) {
    fs::write(dir.join("households.csv"), HOUSEHOLDS).expect("households");
    fs::write(dir.join("persons.csv"), PERSONS).expect("persons");
    fs::write(dir.join("local_authorities_2021.csv"), LOCAL_AUTHORITIES).expect("areas");
    fs::write(dir.join("local_authority_weights.csv"), weights).expect("weights");
}

fn options(root: &Path) -> PipelineOptions {
    PipelineOptions {
        output_dir: root.join("public").join("data"),
        data_dir: root.to_path_buf(),
        years: vec![2026, 2027],
        population: Population::Scotland,
        scotland_areas_only: true,
    }
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[test]
fn generate_writes_tidy_tables_for_selected_reforms() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_inputs(dir.path(), LOCAL_AUTHORITY_WEIGHTS);
    let options = options(dir.path());

    let tables = generate(
        &PolicyConfig::default(),
        &ids(&["scp_inflation", "income_tax_basic_uplift"]),
        &options,
    )
    .expect("pipeline runs");

    assert_eq!(tables.budgetary.len(), 4);
    for row in &tables.budgetary {
        assert!(row.value > 0.0, "{} {} should cost money", row.reform_id, row.year);
    }
    assert!(tables.distributional.iter().any(|r| r.decile == "All"));
    assert!(!tables.metrics.is_empty());

    let budgetary = fs::read_to_string(options.output_dir.join("budgetary_impact.csv"))
        .expect("budgetary table");
    let mut lines = budgetary.lines();
    assert_eq!(lines.next(), Some("reform_id,reform_name,year,value"));
    assert_eq!(lines.count(), 4);

    let winners = fs::read_to_string(options.output_dir.join("winners_losers.csv"))
        .expect("winners table");
    assert!(winners.contains("winners_pct"));
    assert!(winners.contains("unchanged_pct"));

    let areas = fs::read_to_string(options.output_dir.join("local_authorities.csv"))
        .expect("area table");
    assert!(areas.starts_with("reform_id,year,code,name,average_gain,relative_change"));
    assert!(areas.contains("S12000036"));
    assert!(!areas.contains("E09000001"));

    assert!(!options.output_dir.join("constituency.csv").exists());
}

#[test]
fn unknown_reform_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_inputs(dir.path(), LOCAL_AUTHORITY_WEIGHTS);
    let options = options(dir.path());

    let err = generate(&PolicyConfig::default(), &ids(&["not_a_reform"]), &options)
        .expect_err("unknown reform");
    assert!(matches!(err, BudgetError::UnknownReform { .. }));
    assert!(err.to_string().contains("not_a_reform"));
    assert!(!options.output_dir.exists());
}

#[test]
fn mismatched_area_matrix_aborts_before_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_inputs(dir.path(), "1.0,0.0\n0.0,1.0\n0.0,0.0\n");
    let options = options(dir.path());

    let err = generate(&PolicyConfig::default(), &[], &options).expect_err("column mismatch");
    assert!(err.to_string().contains("household columns"));
    assert!(!options.output_dir.exists());
}

#[test]
fn missing_microdata_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let options = options(dir.path());

    let err = generate(&PolicyConfig::default(), &[], &options).expect_err("missing files");
    assert!(err.is_missing_file());
    assert!(!options.output_dir.exists());
}
