use super::*;
use crate::instance::{Agent, Category, FeatureValue, Instance};

fn category(name: &str, values: &[(&str, usize, usize)]) -> Category {
    Category {
        name: name.to_string(),
        values: values
            .iter()
            .map(|&(value, min, max)| FeatureValue {
                name: value.to_string(),
                min,
                max,
            })
            .collect(),
    }
}

fn agent(features: &[usize]) -> Agent {
    Agent {
        features: features.to_vec(),
        household: None,
        auxiliary: BTreeMap::new(),
    }
}

fn check_distribution(instance: &Instance, distribution: &PanelDistribution) {
    assert_eq!(distribution.panels.len(), distribution.probabilities.len());

    // panels are distinct and feasible
    let distinct: BTreeSet<&Panel> = distribution.panels.iter().collect();
    assert_eq!(distinct.len(), distribution.panels.len());
    for panel in &distribution.panels {
        assert_eq!(panel.len(), instance.panel_size());
        for fv in instance.feature_refs() {
            let quota = instance.feature_value(fv);
            let count = instance
                .holders(fv)
                .iter()
                .filter(|id| panel.contains(id))
                .count();
            assert!(quota.min <= count && count <= quota.max);
        }
        for members in instance.shared_households() {
            assert!(members.iter().filter(|id| panel.contains(id)).count() <= 1);
        }
    }

    // probabilities are non-negative and normalized
    assert!(distribution.probabilities.iter().all(|&p| p >= 0.0));
    let total: f64 = distribution.probabilities.iter().sum();
    assert!((total - 1.0).abs() <= EPS, "total probability {}", total);
}

#[test]
fn trivial_two_of_four_is_uniform() {
    // one category, one seat for value a and one for value b, two
    // holders each: by symmetry every agent must be selected with
    // probability 1/2
    let instance = Instance::new(
        2,
        vec![category("x", &[("a", 1, 1), ("b", 1, 1)])],
        vec![agent(&[0]), agent(&[0]), agent(&[1]), agent(&[1])],
    )
    .expect("valid instance");

    let distribution = find_distribution_leximin(&instance, &LeximinOptions::default())
        .expect("feasible instance");
    check_distribution(&instance, &distribution);

    let marginals = distribution.marginals(instance.pool_size());
    for (&id, &prob) in &marginals {
        assert!(
            (prob - 0.5).abs() < 1e-3,
            "agent {} has marginal {}",
            id,
            prob
        );
    }
}

#[test]
fn overrepresented_majority_shares_the_remaining_seat() {
    // nine f-holders compete for one seat while the single m-holder is
    // forced onto every panel
    let mut agents: Vec<Agent> = (0..9).map(|_| agent(&[0])).collect();
    agents.push(agent(&[1]));

    let instance = Instance::new(
        2,
        vec![category("g", &[("f", 1, 1), ("m", 1, 1)])],
        agents,
    )
    .expect("valid instance");

    let distribution = find_distribution_leximin(&instance, &LeximinOptions::default())
        .expect("feasible instance");
    check_distribution(&instance, &distribution);

    let marginals = distribution.marginals(instance.pool_size());
    assert!((marginals[&9] - 1.0).abs() < 1e-3, "m agent {}", marginals[&9]);
    for id in 0..9 {
        assert!(
            (marginals[&id] - 1.0 / 9.0).abs() < 1e-3,
            "f agent {} has marginal {}",
            id,
            marginals[&id]
        );
    }
}

#[test]
fn households_are_respected() {
    // six agents in three households of two, trivial quotas: every
    // panel takes one agent per household, and by symmetry everyone is
    // selected with probability 1/2
    let mut agents: Vec<Agent> = (0..6).map(|_| agent(&[0])).collect();
    for (id, a) in agents.iter_mut().enumerate() {
        a.household = Some(id / 2);
    }

    let instance = Instance::new(3, vec![category("x", &[("a", 0, 3)])], agents)
        .expect("valid instance");

    let distribution = find_distribution_leximin(&instance, &LeximinOptions::default())
        .expect("feasible instance");
    check_distribution(&instance, &distribution);

    for panel in &distribution.panels {
        for household in 0..3usize {
            let members = [2 * household, 2 * household + 1];
            assert_eq!(members.iter().filter(|id| panel.contains(id)).count(), 1);
        }
    }

    let marginals = distribution.marginals(instance.pool_size());
    for (&id, &prob) in &marginals {
        assert!(
            (prob - 0.5).abs() < 1e-3,
            "agent {} has marginal {}",
            id,
            prob
        );
    }
}

#[test]
fn marginals_match_the_distribution() {
    let instance = Instance::new(
        3,
        vec![
            category("gender", &[("female", 1, 2), ("male", 1, 2)]),
            category("age", &[("young", 1, 2), ("old", 1, 2)]),
        ],
        vec![
            agent(&[0, 0]),
            agent(&[0, 1]),
            agent(&[1, 0]),
            agent(&[1, 1]),
            agent(&[0, 0]),
            agent(&[1, 1]),
        ],
    )
    .expect("valid instance");

    let distribution = find_distribution_leximin(&instance, &LeximinOptions::default())
        .expect("feasible instance");
    check_distribution(&instance, &distribution);

    // recompute every marginal by hand from the portfolio
    let marginals = distribution.marginals(instance.pool_size());
    for id in 0..instance.pool_size() {
        let direct: f64 = distribution
            .panels
            .iter()
            .zip(distribution.probabilities.iter())
            .filter(|(panel, _prob)| panel.contains(&id))
            .map(|(_panel, &prob)| prob)
            .sum();
        assert!((marginals[&id] - direct).abs() < 1e-9);
    }
}

#[test]
fn initial_portfolio_covers_every_coverable_agent() {
    // agent 4 holds value c with max = 0 and cannot sit on any panel;
    // everyone else must be covered
    let instance = Instance::new(
        2,
        vec![category("x", &[("a", 1, 1), ("b", 1, 1), ("c", 0, 0)])],
        vec![
            agent(&[0]),
            agent(&[0]),
            agent(&[1]),
            agent(&[1]),
            agent(&[2]),
        ],
    )
    .expect("valid instance");

    let panel_problem = super::super::feasibility::PanelProblem::new(&instance);
    let solver = crate::ilp::solvers::coin_cbc::CbcSolver::new();

    let (committees, covered, output_lines) =
        initial_portfolio(&panel_problem, 2 * instance.pool_size(), &solver)
            .expect("feasible instance");

    assert!(!committees.is_empty());
    assert_eq!(covered, BTreeSet::from([0, 1, 2, 3]));
    assert!(output_lines
        .iter()
        .any(|line| line.contains("Agent 4 not contained in any feasible committee")));

    // covered agents are exactly the members of the found panels
    assert_eq!(covered_agents(&committees), covered);
}

#[test]
fn uncoverable_agents_get_probability_zero() {
    let instance = Instance::new(
        2,
        vec![category("x", &[("a", 1, 1), ("b", 1, 1), ("c", 0, 0)])],
        vec![
            agent(&[0]),
            agent(&[0]),
            agent(&[1]),
            agent(&[1]),
            agent(&[2]),
        ],
    )
    .expect("valid instance");

    let distribution = find_distribution_leximin(&instance, &LeximinOptions::default())
        .expect("feasible instance");
    check_distribution(&instance, &distribution);

    let marginals = distribution.marginals(instance.pool_size());
    assert!(marginals[&4].abs() < 1e-6);
    for id in 0..4 {
        assert!((marginals[&id] - 0.5).abs() < 1e-3);
    }
}
