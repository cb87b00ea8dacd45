use super::*;
use crate::ilp::solvers::{SolveResult, Solver};
use crate::ilp::{LinExpr, ObjectiveSense, ProblemBuilder, Variable};

fn transport_problem() -> crate::ilp::Problem<String> {
    // minimize 2a + 3b subject to a + b >= 4, a <= 3, everything >= 0
    let a = LinExpr::<String>::var("a");
    let b = LinExpr::<String>::var("b");

    ProblemBuilder::new()
        .set_variable("a", Variable::continuous().min(0.0))
        .set_variable("b", Variable::continuous().min(0.0))
        .add_constraint((&a + &b).geq(&LinExpr::constant(4.0)), "demand met")
        .add_constraint(a.leq(&LinExpr::constant(3.0)), "supply of a")
        .set_objective_function(2.0 * &a + 3.0 * &b, ObjectiveSense::Minimize)
        .build()
        .expect("all variables are declared")
}

#[test]
fn solves_an_lp() {
    let problem = transport_problem();
    let solver = HighsSolver::new();

    let result = solver.solve(&problem).expect("backend runs");
    let assignment = match result {
        SolveResult::Optimal(assignment) => assignment,
        other => panic!("expected an optimal solution, got {:?}", other),
    };

    // optimum at a = 3, b = 1, objective 9
    assert!((assignment.value(&String::from("a")) - 3.0).abs() < 1e-6);
    assert!((assignment.value(&String::from("b")) - 1.0).abs() < 1e-6);
    assert!((assignment.objective() - 9.0).abs() < 1e-6);
}

#[test]
fn barrier_without_crossover_reaches_the_same_optimum() {
    let problem = transport_problem();
    let solver = HighsSolver::barrier_no_crossover();

    let result = solver.solve(&problem).expect("backend runs");
    let assignment = match result {
        SolveResult::Optimal(assignment) => assignment,
        other => panic!("expected an optimal solution, got {:?}", other),
    };

    // the optimum is unique here, so even the interior-point iterate
    // must land on it (up to barrier tolerance)
    assert!((assignment.objective() - 9.0).abs() < 1e-4);
}

#[test]
fn barrier_balances_the_binding_caps() {
    // minimize y with a + b = 1, a <= y, b <= y: at the optimum y = 1/2
    // both cap constraints bind and a = b = 1/2. This is the shape of
    // the leximin dual stages, so it doubles as a smoke test for the
    // ipm configuration.
    let a = LinExpr::<String>::var("a");
    let b = LinExpr::<String>::var("b");
    let y = LinExpr::<String>::var("y");

    let problem = ProblemBuilder::new()
        .set_variable("a", Variable::continuous().min(0.0))
        .set_variable("b", Variable::continuous().min(0.0))
        .set_variable("y", Variable::continuous().min(0.0))
        .add_constraint((&a + &b).eq(&LinExpr::constant(1.0)), "unit mass")
        .add_constraint(a.leq(&y), "a below cap")
        .add_constraint(b.leq(&y), "b below cap")
        .set_objective_function(y, ObjectiveSense::Minimize)
        .build()
        .expect("all variables are declared");

    let solver = HighsSolver::barrier_no_crossover();
    let result = solver.solve(&problem).expect("backend runs");
    let assignment = match result {
        SolveResult::Optimal(assignment) => assignment,
        other => panic!("expected an optimal solution, got {:?}", other),
    };

    assert!((assignment.value(&String::from("y")) - 0.5).abs() < 1e-4);
    assert!((assignment.value(&String::from("a")) - 0.5).abs() < 1e-3);
    assert!((assignment.value(&String::from("b")) - 0.5).abs() < 1e-3);
}

#[test]
fn reports_infeasibility() {
    let a = LinExpr::<String>::var("a");

    let problem = ProblemBuilder::new()
        .set_variable("a", Variable::continuous().min(0.0).max(1.0))
        .add_constraint(a.geq(&LinExpr::constant(2.0)), "unreachable bound")
        .build()
        .expect("all variables are declared");

    let solver = HighsSolver::new();
    let result = solver.solve(&problem).expect("backend runs");
    assert!(matches!(result, SolveResult::Infeasible));
}
