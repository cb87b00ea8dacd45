use super::*;

fn var(name: &str) -> LinExpr<String> {
    LinExpr::var(name)
}

#[test]
fn expr_building_and_access() {
    let a = var("a");
    let b = var("b");

    let expr = 2.0 * &a + &b + 3.0;

    assert_eq!(expr.get(&String::from("a")), Some(2.0));
    assert_eq!(expr.get(&String::from("b")), Some(1.0));
    assert_eq!(expr.get(&String::from("c")), None);
    assert_eq!(expr.get_constant(), 3.0);
    assert_eq!(
        expr.variables(),
        BTreeSet::from([String::from("a"), String::from("b")])
    );
}

#[test]
fn sub_and_neg() {
    let a = var("a");
    let b = var("b");

    let expr = &a - &b;
    assert_eq!(expr.get(&String::from("a")), Some(1.0));
    assert_eq!(expr.get(&String::from("b")), Some(-1.0));

    let neg = -&expr;
    assert_eq!(neg.get(&String::from("a")), Some(-1.0));
    assert_eq!(neg.get(&String::from("b")), Some(1.0));
}

#[test]
fn sum_merges_coefficients() {
    let total = LinExpr::<String>::sum([
        LinExpr::term(1.5, "a"),
        LinExpr::term(0.5, "a"),
        LinExpr::var("b"),
        LinExpr::constant(4.0),
    ]);

    assert_eq!(total.get(&String::from("a")), Some(2.0));
    assert_eq!(total.get(&String::from("b")), Some(1.0));
    assert_eq!(total.get_constant(), 4.0);
}

#[test]
fn cleaned_removes_zero_coefficients() {
    let a = var("a");
    let b = var("b");

    let expr = (&a + &b) - &b;
    assert_eq!(expr.get(&String::from("b")), Some(0.0));

    let cleaned = expr.cleaned();
    assert_eq!(cleaned.get(&String::from("b")), None);
    assert_eq!(cleaned.variables(), BTreeSet::from([String::from("a")]));
}

#[test]
fn constraints_canonical_form() {
    let a = var("a");
    let b = var("b");
    let one = LinExpr::constant(1.0);

    let leq = (&a + &b).leq(&one);
    assert_eq!(leq.get_sign(), Sign::LessThan);
    assert_eq!(leq.get_constant(), -1.0);
    assert_eq!(leq.get_var(&String::from("a")), Some(1.0));

    // a >= 1 canonicalizes to 1 - a <= 0
    let geq = a.geq(&one);
    assert_eq!(geq.get_sign(), Sign::LessThan);
    assert_eq!(geq.get_var(&String::from("a")), Some(-1.0));
    assert_eq!(geq.get_constant(), 1.0);

    let eq = a.eq(&one);
    assert_eq!(eq.get_sign(), Sign::Equals);
}

#[test]
fn eval_and_satisfaction() {
    let a = var("a");
    let b = var("b");

    let values = BTreeMap::from([(String::from("a"), 2.0), (String::from("b"), 0.5)]);

    let expr = 2.0 * &a + &b;
    assert_eq!(expr.eval(&values), 4.5);

    let constraint = expr.leq(&LinExpr::constant(4.5));
    assert!(constraint.is_satisfied(&values, 1e-9));

    let violated = (2.0 * &a + &b).leq(&LinExpr::constant(4.0));
    assert!(!violated.is_satisfied(&values, 1e-9));
}

#[test]
fn display() {
    let a = var("a");
    let b = var("b");

    let expr = 2.0 * &a + &b - 1.0;
    assert_eq!(format!("{}", expr), "2*a + 1*b + (-1)");

    let constraint = (&a + &b).leq(&LinExpr::constant(1.0));
    assert_eq!(format!("{}", constraint), "1*a + 1*b + (-1) <= 0");

    assert_eq!(format!("{}", LinExpr::<String>::constant(0.0)), "0");
}
