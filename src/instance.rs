//! Immutable description of a selection problem.
//!
//! An instance is a pool of agents, a target panel size `k` and, for
//! every feature value of every category, a `(min, max)` quota on how
//! many panel members may hold that value. Categories, feature values
//! and agents are all index-based lists: an agent stores, per category,
//! the index of its feature value in that category's value list. The
//! ordering of categories and values is the order in which they were
//! first seen in the input, which the LEGACY sampler relies on for its
//! tie-breaking.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use thiserror::Error;

/// Agents are identified by their position in the pool list.
pub type AgentId = usize;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Panel size must be at least 1")]
    ZeroPanelSize,
    #[error("Duplicate category {0}")]
    DuplicateCategory(String),
    #[error("Duplicate feature value {1} in category {0}")]
    DuplicateFeatureValue(String, String),
    #[error("Quota of {0}:{1} has min {2} larger than max {3}")]
    QuotaMinAboveMax(String, String, usize, usize),
    #[error("Category {0} has lower quotas summing to {1}, which exceeds the panel size {2}")]
    LowerQuotaSumTooLarge(String, usize, usize),
    #[error("Category {0} has upper quotas summing to {1}, which is below the panel size {2}")]
    UpperQuotaSumTooSmall(String, usize, usize),
    #[error("Agent {0} has {1} feature assignments but there are {2} categories")]
    AgentWithWrongFeatureCount(AgentId, usize, usize),
    #[error("Agent {0} references invalid feature value index {2} in category {1}")]
    AgentWithInvalidFeature(AgentId, String, usize),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One feature value of a category, together with its quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureValue {
    pub name: String,
    pub min: usize,
    pub max: usize,
}

/// A feature category (such as "gender") and its possible values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub values: Vec<FeatureValue>,
}

/// A pool member. `features[c]` is the index of the agent's feature
/// value within category `c`. Agents sharing a household key cannot sit
/// on the same panel; `None` means the agent lives alone (for the
/// purposes of the selection). Input columns that are neither a
/// category nor an address column are carried along in `auxiliary`,
/// untouched by the algorithms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub features: Vec<usize>,
    pub household: Option<usize>,
    pub auxiliary: BTreeMap<String, String>,
}

/// Index of a feature value: `(category index, value index)`.
pub type FeatureRef = (usize, usize);

#[derive(Debug, Clone)]
pub struct Instance {
    k: usize,
    categories: Vec<Category>,
    agents: Vec<Agent>,
    /// For each feature value, the ids of the agents holding it.
    holders: Vec<Vec<Vec<AgentId>>>,
    /// Households with at least two members.
    shared_households: Vec<Vec<AgentId>>,
}

impl Instance {
    /// Validates and builds an instance.
    ///
    /// The preconditions checked here are fatal input errors: a zero
    /// panel size, inconsistent quota rows, per-category quota sums that
    /// contradict `k`, and agents referencing unknown feature values.
    /// Quota sets that are merely unsatisfiable (for example demanding
    /// three holders of a value only two agents have) pass validation;
    /// diagnosing those is the job of the feasibility probe.
    pub fn new(k: usize, categories: Vec<Category>, agents: Vec<Agent>) -> Result<Self> {
        if k == 0 {
            return Err(Error::ZeroPanelSize);
        }

        for (i, category) in categories.iter().enumerate() {
            if categories[..i].iter().any(|c| c.name == category.name) {
                return Err(Error::DuplicateCategory(category.name.clone()));
            }

            let mut min_sum = 0usize;
            let mut max_sum = 0usize;
            for (j, value) in category.values.iter().enumerate() {
                if category.values[..j].iter().any(|v| v.name == value.name) {
                    return Err(Error::DuplicateFeatureValue(
                        category.name.clone(),
                        value.name.clone(),
                    ));
                }
                if value.min > value.max {
                    return Err(Error::QuotaMinAboveMax(
                        category.name.clone(),
                        value.name.clone(),
                        value.min,
                        value.max,
                    ));
                }
                min_sum += value.min;
                max_sum = max_sum.saturating_add(value.max);
            }

            if min_sum > k {
                return Err(Error::LowerQuotaSumTooLarge(
                    category.name.clone(),
                    min_sum,
                    k,
                ));
            }
            if max_sum < k {
                return Err(Error::UpperQuotaSumTooSmall(
                    category.name.clone(),
                    max_sum,
                    k,
                ));
            }
        }

        for (id, agent) in agents.iter().enumerate() {
            if agent.features.len() != categories.len() {
                return Err(Error::AgentWithWrongFeatureCount(
                    id,
                    agent.features.len(),
                    categories.len(),
                ));
            }
            for (c, &value) in agent.features.iter().enumerate() {
                if value >= categories[c].values.len() {
                    return Err(Error::AgentWithInvalidFeature(
                        id,
                        categories[c].name.clone(),
                        value,
                    ));
                }
            }
        }

        let mut holders: Vec<Vec<Vec<AgentId>>> = categories
            .iter()
            .map(|category| vec![Vec::new(); category.values.len()])
            .collect();
        for (id, agent) in agents.iter().enumerate() {
            for (c, &value) in agent.features.iter().enumerate() {
                holders[c][value].push(id);
            }
        }

        let mut by_household = BTreeMap::<usize, Vec<AgentId>>::new();
        for (id, agent) in agents.iter().enumerate() {
            if let Some(h) = agent.household {
                by_household.entry(h).or_default().push(id);
            }
        }
        let shared_households = by_household
            .into_values()
            .filter(|members| members.len() >= 2)
            .collect();

        Ok(Instance {
            k,
            categories,
            agents,
            holders,
            shared_households,
        })
    }

    pub fn panel_size(&self) -> usize {
        self.k
    }

    pub fn pool_size(&self) -> usize {
        self.agents.len()
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> &Agent {
        &self.agents[id]
    }

    pub fn feature_value(&self, (c, v): FeatureRef) -> &FeatureValue {
        &self.categories[c].values[v]
    }

    /// Iterates over all feature values in first-seen order.
    pub fn feature_refs(&self) -> impl Iterator<Item = FeatureRef> + '_ {
        self.categories
            .iter()
            .enumerate()
            .flat_map(|(c, category)| (0..category.values.len()).map(move |v| (c, v)))
    }

    /// Ids of the agents holding the given feature value.
    pub fn holders(&self, (c, v): FeatureRef) -> &[AgentId] {
        &self.holders[c][v]
    }

    /// Whether the at-most-one-per-household rule applies at all.
    pub fn household_mode(&self) -> bool {
        !self.shared_households.is_empty()
    }

    /// Households with at least two members; singleton households never
    /// constrain anything and are not listed.
    pub fn shared_households(&self) -> &[Vec<AgentId>] {
        &self.shared_households
    }

    /// Members of the household of `id`, other than `id` itself.
    pub fn housemates(&self, id: AgentId) -> impl Iterator<Item = AgentId> + '_ {
        let household = self.agents[id].household;
        self.shared_households
            .iter()
            .filter(move |members| household.is_some() && members.contains(&id))
            .flatten()
            .copied()
            .filter(move |&other| other != id)
    }

    /// Display name `category:value` of a feature value, as used in
    /// quota-relaxation notes.
    pub fn feature_name(&self, (c, v): FeatureRef) -> String {
        format!(
            "{}:{}",
            self.categories[c].name, self.categories[c].values[v].name
        )
    }
}
