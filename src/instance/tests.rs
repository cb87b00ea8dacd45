use super::*;

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

#[test]
fn zero_panel_size_is_rejected() {
    let result = Instance::new(0, vec![category("x", &[("a", 0, 1)])], vec![agent(&[0])]);
    assert_eq!(result.unwrap_err(), Error::ZeroPanelSize);
}

#[test]
fn inverted_quota_is_rejected() {
    let result = Instance::new(1, vec![category("x", &[("a", 2, 1)])], vec![agent(&[0])]);
    assert_eq!(
        result.unwrap_err(),
        Error::QuotaMinAboveMax("x".into(), "a".into(), 2, 1)
    );
}

#[test]
fn contradictory_quota_sums_are_rejected() {
    // lower quotas demand 3 members of category x, but k = 2
    let result = Instance::new(
        2,
        vec![category("x", &[("a", 2, 2), ("b", 1, 2)])],
        vec![agent(&[0]), agent(&[0]), agent(&[1])],
    );
    assert_eq!(
        result.unwrap_err(),
        Error::LowerQuotaSumTooLarge("x".into(), 3, 2)
    );

    // upper quotas only allow 1 member, but k = 2
    let result = Instance::new(
        2,
        vec![category("x", &[("a", 0, 1), ("b", 0, 0)])],
        vec![agent(&[0]), agent(&[1])],
    );
    assert_eq!(
        result.unwrap_err(),
        Error::UpperQuotaSumTooSmall("x".into(), 1, 2)
    );
}

#[test]
fn duplicate_names_are_rejected() {
    let result = Instance::new(
        1,
        vec![
            category("x", &[("a", 0, 1)]),
            category("x", &[("b", 0, 1)]),
        ],
        vec![],
    );
    assert_eq!(result.unwrap_err(), Error::DuplicateCategory("x".into()));

    let result = Instance::new(
        1,
        vec![category("x", &[("a", 0, 1), ("a", 0, 1)])],
        vec![],
    );
    assert_eq!(
        result.unwrap_err(),
        Error::DuplicateFeatureValue("x".into(), "a".into())
    );
}

#[test]
fn agents_must_match_the_categories() {
    let categories = vec![category("x", &[("a", 0, 2), ("b", 0, 2)])];

    let result = Instance::new(2, categories.clone(), vec![agent(&[0, 1])]);
    assert_eq!(
        result.unwrap_err(),
        Error::AgentWithWrongFeatureCount(0, 2, 1)
    );

    let result = Instance::new(2, categories, vec![agent(&[0]), agent(&[2])]);
    assert_eq!(
        result.unwrap_err(),
        Error::AgentWithInvalidFeature(1, "x".into(), 2)
    );
}

#[test]
fn holders_are_indexed_by_feature_value() {
    let instance = Instance::new(
        2,
        vec![
            category("x", &[("a", 1, 1), ("b", 1, 1)]),
            category("y", &[("c", 0, 2), ("d", 0, 2)]),
        ],
        vec![
            agent(&[0, 0]),
            agent(&[0, 1]),
            agent(&[1, 0]),
            agent(&[1, 1]),
        ],
    )
    .expect("valid instance");

    assert_eq!(instance.holders((0, 0)), [0, 1]);
    assert_eq!(instance.holders((0, 1)), [2, 3]);
    assert_eq!(instance.holders((1, 0)), [0, 2]);
    assert_eq!(instance.holders((1, 1)), [1, 3]);

    let refs: Vec<FeatureRef> = instance.feature_refs().collect();
    assert_eq!(refs, [(0, 0), (0, 1), (1, 0), (1, 1)]);

    assert_eq!(instance.feature_name((1, 0)), "y:c");
}

#[test]
fn households_group_agents() {
    let mut agents = vec![
        agent(&[0]),
        agent(&[0]),
        agent(&[0]),
        agent(&[0]),
        agent(&[0]),
    ];
    agents[0].household = Some(7);
    agents[1].household = Some(7);
    agents[2].household = Some(3);
    agents[3].household = Some(7);
    // agent 4 lives alone

    let instance = Instance::new(2, vec![category("x", &[("a", 0, 2)])], agents)
        .expect("valid instance");

    assert!(instance.household_mode());
    assert_eq!(instance.shared_households(), [vec![0, 1, 3]]);

    let mates: Vec<AgentId> = instance.housemates(1).collect();
    assert_eq!(mates, [0, 3]);
    assert_eq!(instance.housemates(2).count(), 0);
    assert_eq!(instance.housemates(4).count(), 0);
}

#[test]
fn no_shared_household_means_no_household_mode() {
    let mut agents = vec![agent(&[0]), agent(&[0])];
    agents[0].household = Some(0);
    agents[1].household = Some(1);

    let instance = Instance::new(1, vec![category("x", &[("a", 0, 1)])], agents)
        .expect("valid instance");

    assert!(!instance.household_mode());
}
