//! CSV instance files.
//!
//! An instance directory holds two files:
//!
//! - `categories.csv` with columns `category, feature, min, max`, one
//!   quota per row;
//! - `respondents.csv` whose header lists the category names (plus any
//!   auxiliary columns, such as address fields), one pool member per
//!   row.
//!
//! Categories, feature values and agents keep the order in which the
//! files list them. When address columns are designated, respondents
//! agreeing on all of them form a household. Respondent columns that
//! are neither a category nor an address column are retained verbatim
//! on the agents as auxiliary data.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::instance::{self, Agent, Category, FeatureValue, Instance};

pub const CATEGORIES_FILE: &str = "categories.csv";
pub const RESPONDENTS_FILE: &str = "respondents.csv";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid CSV structure")]
    Csv(#[from] ::csv::Error),
    #[error("Error while reading file")]
    Io(#[from] std::io::Error),
    #[error("{0} is missing the {1} column")]
    MissingColumn(String, String),
    #[error("Row {0} of {1} has invalid integer {2} in the {3} column")]
    InvalidInteger(usize, String, String, String),
    #[error("Respondent {0} has unknown value {2} for category {1}")]
    UnknownFeature(usize, String, String),
    #[error("Respondent {0} has no value in the {1} column")]
    MissingValue(usize, String),
    #[error(transparent)]
    Instance(#[from] instance::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn column_index(headers: &::csv::StringRecord, file: &str, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| Error::MissingColumn(file.into(), name.into()))
}

fn parse_bound(row: usize, field: &str, column: &str) -> Result<usize> {
    field.trim().parse().map_err(|_| {
        Error::InvalidInteger(
            row,
            CATEGORIES_FILE.into(),
            field.into(),
            column.into(),
        )
    })
}

/// Reads `categories.csv`, preserving the first-seen order of categories
/// and feature values.
pub fn read_categories(path: &Path) -> Result<Vec<Category>> {
    let mut reader = ::csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    let headers = reader.headers()?.clone();
    let category_col = column_index(&headers, CATEGORIES_FILE, "category")?;
    let feature_col = column_index(&headers, CATEGORIES_FILE, "feature")?;
    let min_col = column_index(&headers, CATEGORIES_FILE, "min")?;
    let max_col = column_index(&headers, CATEGORIES_FILE, "max")?;

    let mut categories: Vec<Category> = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let field = |col: usize, name: &str| -> Result<String> {
            record
                .get(col)
                .map(str::to_string)
                .ok_or_else(|| Error::MissingValue(row, name.into()))
        };

        let category_name = field(category_col, "category")?;
        let value = FeatureValue {
            name: field(feature_col, "feature")?,
            min: parse_bound(row, &field(min_col, "min")?, "min")?,
            max: parse_bound(row, &field(max_col, "max")?, "max")?,
        };

        match categories.iter_mut().find(|c| c.name == category_name) {
            Some(category) => category.values.push(value),
            None => categories.push(Category {
                name: category_name,
                values: vec![value],
            }),
        }
    }

    Ok(categories)
}

/// Reads `respondents.csv` against a category list, returning the agents
/// (remaining columns retained as auxiliary data) and, per respondent,
/// the values of the requested address columns.
fn read_respondents(
    path: &Path,
    categories: &[Category],
    address_columns: &[String],
) -> Result<(Vec<Agent>, Vec<Vec<String>>)> {
    let mut reader = ::csv::ReaderBuilder::new().has_headers(true).from_path(path)?;

    let headers = reader.headers()?.clone();
    let category_cols: Vec<usize> = categories
        .iter()
        .map(|category| column_index(&headers, RESPONDENTS_FILE, &category.name))
        .collect::<Result<_>>()?;
    let address_cols: Vec<usize> = address_columns
        .iter()
        .map(|column| column_index(&headers, RESPONDENTS_FILE, column))
        .collect::<Result<_>>()?;
    // anything else in the file is carried along untouched
    let auxiliary_cols: Vec<(String, usize)> = headers
        .iter()
        .enumerate()
        .filter(|(col, _header)| !category_cols.contains(col) && !address_cols.contains(col))
        .map(|(col, header)| (header.to_string(), col))
        .collect();

    let value_lookup: Vec<BTreeMap<&str, usize>> = categories
        .iter()
        .map(|category| {
            category
                .values
                .iter()
                .enumerate()
                .map(|(v, value)| (value.name.as_str(), v))
                .collect()
        })
        .collect();

    let mut agents = Vec::new();
    let mut addresses = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;

        let mut features = Vec::with_capacity(categories.len());
        for (c, &col) in category_cols.iter().enumerate() {
            let field = record
                .get(col)
                .ok_or_else(|| Error::MissingValue(row, categories[c].name.clone()))?;
            let value = value_lookup[c].get(field).copied().ok_or_else(|| {
                Error::UnknownFeature(row, categories[c].name.clone(), field.to_string())
            })?;
            features.push(value);
        }

        let address: Vec<String> = address_cols
            .iter()
            .enumerate()
            .map(|(a, &col)| {
                record
                    .get(col)
                    .map(str::to_string)
                    .ok_or_else(|| Error::MissingValue(row, address_columns[a].clone()))
            })
            .collect::<Result<_>>()?;

        let auxiliary: BTreeMap<String, String> = auxiliary_cols
            .iter()
            .map(|(name, col)| {
                (
                    name.clone(),
                    record.get(*col).unwrap_or_default().to_string(),
                )
            })
            .collect();

        agents.push(Agent {
            features,
            household: None,
            auxiliary,
        });
        addresses.push(address);
    }

    Ok((agents, addresses))
}

/// Groups respondents into households: everyone agreeing with an earlier
/// respondent on all address columns joins that respondent's household.
fn assign_households(agents: &mut [Agent], addresses: &[Vec<String>]) {
    let mut counter = 0;
    for i in 0..agents.len() {
        if agents[i].household.is_some() {
            continue;
        }
        agents[i].household = Some(counter);
        for j in (i + 1)..agents.len() {
            if agents[j].household.is_none() && addresses[i] == addresses[j] {
                agents[j].household = Some(counter);
            }
        }
        counter += 1;
    }

    if counter == 1 {
        println!(
            "Warning: All pool members live in the same household. Probably, the configuration \
             is wrong?"
        );
    }
}

/// Reads an instance from a directory containing `categories.csv` and
/// `respondents.csv`. When `address_columns` is non-empty, the household
/// rule is switched on with households derived from those columns.
pub fn load_instance(dir: &Path, k: usize, address_columns: &[String]) -> Result<Instance> {
    let categories = read_categories(&dir.join(CATEGORIES_FILE))?;
    let (mut agents, addresses) =
        read_respondents(&dir.join(RESPONDENTS_FILE), &categories, address_columns)?;

    if !address_columns.is_empty() {
        assign_households(&mut agents, &addresses);
    }

    Ok(Instance::new(k, categories, agents)?)
}
