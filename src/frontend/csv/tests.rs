use std::path::PathBuf;

use super::*;

fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "sortition-csv-{}-{}",
        test,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

fn write_instance_files(dir: &Path, categories: &str, respondents: &str) {
    std::fs::write(dir.join(CATEGORIES_FILE), categories).expect("writable");
    std::fs::write(dir.join(RESPONDENTS_FILE), respondents).expect("writable");
}

#[test]
fn loads_an_instance() {
    let dir = scratch_dir("loads");
    write_instance_files(
        &dir,
        "category,feature,min,max\n\
         gender,female,1,2\n\
         gender,male,1,2\n\
         age,young,0,2\n\
         age,old,0,2\n",
        "gender,age\n\
         female,young\n\
         female,old\n\
         male,young\n\
         male,old\n",
    );

    let instance = load_instance(&dir, 2, &[]).expect("well-formed files");

    assert_eq!(instance.panel_size(), 2);
    assert_eq!(instance.pool_size(), 4);

    // categories and feature values keep their first-seen order
    let names: Vec<&str> = instance
        .categories()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, ["gender", "age"]);
    assert_eq!(instance.categories()[0].values[0].name, "female");
    assert_eq!(instance.categories()[0].values[0].min, 1);
    assert_eq!(instance.categories()[0].values[0].max, 2);

    assert_eq!(instance.agent(0).features, [0, 0]);
    assert_eq!(instance.agent(3).features, [1, 1]);
    assert!(!instance.household_mode());

    std::fs::remove_dir_all(&dir).expect("cleanup");
}

#[test]
fn auxiliary_columns_survive_the_load() {
    let dir = scratch_dir("auxiliary");
    write_instance_files(
        &dir,
        "category,feature,min,max\n\
         gender,female,0,2\n\
         gender,male,0,2\n",
        "email,gender,street,notes\n\
         a@example.org,female,main st 1,called back\n\
         b@example.org,male,oak ave 7,\n",
    );

    let columns = [String::from("street")];
    let instance = load_instance(&dir, 1, &columns).expect("well-formed files");

    // columns that are neither a category nor an address column ride
    // along on the agents
    assert_eq!(instance.agent(0).auxiliary["email"], "a@example.org");
    assert_eq!(instance.agent(0).auxiliary["notes"], "called back");
    assert_eq!(instance.agent(1).auxiliary["email"], "b@example.org");
    assert_eq!(instance.agent(1).auxiliary["notes"], "");

    // category and address columns are not duplicated into the
    // auxiliary data
    assert!(!instance.agent(0).auxiliary.contains_key("gender"));
    assert!(!instance.agent(0).auxiliary.contains_key("street"));

    std::fs::remove_dir_all(&dir).expect("cleanup");
}

#[test]
fn unknown_feature_values_are_rejected() {
    let dir = scratch_dir("unknown-feature");
    write_instance_files(
        &dir,
        "category,feature,min,max\n\
         gender,female,1,1\n\
         gender,male,1,1\n",
        "gender\n\
         female\n\
         other\n",
    );

    let err = load_instance(&dir, 2, &[]).expect_err("row 1 is invalid");
    assert!(matches!(
        err,
        Error::UnknownFeature(1, category, value) if category == "gender" && value == "other"
    ));

    std::fs::remove_dir_all(&dir).expect("cleanup");
}

#[test]
fn missing_category_column_is_rejected() {
    let dir = scratch_dir("missing-column");
    write_instance_files(
        &dir,
        "category,feature,min,max\n\
         gender,female,1,1\n\
         age,young,0,1\n",
        "gender\n\
         female\n",
    );

    let err = load_instance(&dir, 1, &[]).expect_err("age column is missing");
    assert!(matches!(
        err,
        Error::MissingColumn(file, column) if file == RESPONDENTS_FILE && column == "age"
    ));

    std::fs::remove_dir_all(&dir).expect("cleanup");
}

#[test]
fn malformed_quota_bounds_are_rejected() {
    let dir = scratch_dir("bad-quota");
    write_instance_files(
        &dir,
        "category,feature,min,max\n\
         gender,female,one,2\n",
        "gender\n\
         female\n",
    );

    let err = load_instance(&dir, 1, &[]).expect_err("min is not an integer");
    assert!(matches!(err, Error::InvalidInteger(0, _, value, column)
        if value == "one" && column == "min"));

    std::fs::remove_dir_all(&dir).expect("cleanup");
}

#[test]
fn address_columns_induce_households() {
    let dir = scratch_dir("households");
    write_instance_files(
        &dir,
        "category,feature,min,max\n\
         gender,female,0,2\n\
         gender,male,0,2\n",
        "gender,street,zip\n\
         female,main st 1,1000\n\
         male,main st 1,1000\n\
         female,main st 1,2000\n\
         male,oak ave 7,2000\n",
    );

    let columns = [String::from("street"), String::from("zip")];
    let instance = load_instance(&dir, 2, &columns).expect("well-formed files");

    // only respondents 0 and 1 agree on both address columns
    assert!(instance.household_mode());
    assert_eq!(instance.shared_households(), [vec![0, 1]]);
    assert_eq!(instance.agent(2).household, Some(1));
    assert_eq!(instance.agent(3).household, Some(2));

    std::fs::remove_dir_all(&dir).expect("cleanup");
}

#[test]
fn instance_validation_errors_pass_through() {
    let dir = scratch_dir("validation");
    write_instance_files(
        &dir,
        "category,feature,min,max\n\
         gender,female,2,1\n",
        "gender\n\
         female\n",
    );

    let err = load_instance(&dir, 1, &[]).expect_err("min above max");
    assert!(matches!(err, Error::Instance(_)));

    std::fs::remove_dir_all(&dir).expect("cleanup");
}
