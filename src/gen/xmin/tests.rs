use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::*;
use crate::gen::leximin::find_distribution_leximin;
use crate::gen::EPS;
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

fn two_of_four() -> Instance {
    Instance::new(
        2,
        vec![category("x", &[("a", 1, 1), ("b", 1, 1)])],
        vec![agent(&[0]), agent(&[0]), agent(&[1]), agent(&[1])],
    )
    .expect("valid instance")
}

/// Sorted-ascending marginal vectors compared lexicographically, within
/// tolerance: `a` must not fall below `b` at the first differing entry.
fn leximin_dominates(a: &[f64], b: &[f64]) -> bool {
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(|x, y| x.partial_cmp(y).expect("finite probabilities"));
    b.sort_by(|x, y| x.partial_cmp(y).expect("finite probabilities"));

    for (x, y) in a.iter().zip(b.iter()) {
        if *x > *y + EPS {
            return true;
        }
        if *x < *y - EPS {
            return false;
        }
    }
    true
}

#[test]
fn support_grows_to_every_feasible_panel() {
    let instance = two_of_four();

    // a single multiplicative-weights round keeps the leximin portfolio
    // small, leaving panels for the extender to discover
    let options = LeximinOptions {
        multiplicative_weights_rounds: Some(1),
    };

    let leximin = find_distribution_leximin(&instance, &options).expect("feasible instance");

    let mut rng = StdRng::seed_from_u64(0);
    let xmin = find_distribution_xmin(&instance, &options, &mut rng).expect("feasible instance");

    let leximin_panels: BTreeSet<Panel> = leximin.panels.iter().cloned().collect();
    let xmin_panels: BTreeSet<Panel> = xmin.panels.iter().cloned().collect();

    assert!(xmin_panels.is_superset(&leximin_panels));

    // there are exactly four feasible panels and the sampler reaches
    // them all
    let all_panels: BTreeSet<Panel> = [[0, 2], [0, 3], [1, 2], [1, 3]]
        .iter()
        .map(|pair| pair.iter().copied().collect())
        .collect();
    assert_eq!(xmin_panels, all_panels);
}

#[test]
fn marginals_stay_leximin_optimal() {
    let instance = two_of_four();
    let options = LeximinOptions::default();

    let leximin = find_distribution_leximin(&instance, &options).expect("feasible instance");
    let mut rng = StdRng::seed_from_u64(0);
    let xmin = find_distribution_xmin(&instance, &options, &mut rng).expect("feasible instance");

    let leximin_marginals: Vec<f64> = leximin
        .marginals(instance.pool_size())
        .into_values()
        .collect();
    let xmin_marginals: Vec<f64> = xmin.marginals(instance.pool_size()).into_values().collect();

    assert!(leximin_dominates(&xmin_marginals, &leximin_marginals));

    for prob in &xmin_marginals {
        assert!((prob - 0.5).abs() < 1e-3);
    }
}

#[test]
fn distribution_stays_normalized() {
    let instance = two_of_four();
    let mut rng = StdRng::seed_from_u64(1);
    let xmin = find_distribution_xmin(&instance, &LeximinOptions::default(), &mut rng)
        .expect("feasible instance");

    assert!(xmin.probabilities.iter().all(|&p| p >= 0.0));
    let total: f64 = xmin.probabilities.iter().sum();
    assert!((total - 1.0).abs() <= EPS);

    for (panel, _prob) in xmin.panels.iter().zip(xmin.probabilities.iter()) {
        assert_eq!(panel.len(), instance.panel_size());
    }
}
