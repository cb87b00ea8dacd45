//! Generic representation of LP/IP problems and the solver seam.
//!
//! The selection algorithms never talk to a solver library directly.
//! They describe a problem with [`ProblemBuilder`] (declared variables,
//! described constraints, an objective with a sense) and hand the built
//! [`Problem`] to a [`solvers::Solver`], which reports back an optimal
//! assignment, proven infeasibility, or an unexpected backend status.
//! Everything above this line is solver-agnostic; the only backend
//! setting that leaks through is the interior-point/cross-over switch of
//! [`solvers::highs::LpMethod`], which the leximin engine depends on.

pub mod linexpr;
pub mod solvers;


use std::collections::BTreeMap;

use thiserror::Error;

pub use linexpr::{Constraint, LinExpr, VariableName};

/// The kind of values a variable may take.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum VariableType {
    /// Continuous variable, represented by an `f64`.
    #[default]
    Continuous,
    /// Integer variable.
    Integer,
    /// Binary variable, restricted to 0 and 1.
    Binary,
}

/// Description of the range of values a variable may take.
///
/// Built with [`Variable::continuous`], [`Variable::integer`] or
/// [`Variable::binary`], optionally refined with [`Variable::min`] and
/// [`Variable::max`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Variable {
    var_type: VariableType,
    min: Option<ordered_float::OrderedFloat<f64>>,
    max: Option<ordered_float::OrderedFloat<f64>>,
}

impl Default for Variable {
    fn default() -> Self {
        Variable {
            var_type: VariableType::default(),
            min: None,
            max: None,
        }
    }
}

impl Variable {
    pub fn continuous() -> Self {
        Variable {
            var_type: VariableType::Continuous,
            min: None,
            max: None,
        }
    }

    pub fn integer() -> Self {
        Variable {
            var_type: VariableType::Integer,
            min: None,
            max: None,
        }
    }

    pub fn binary() -> Self {
        Variable {
            var_type: VariableType::Binary,
            min: None,
            max: None,
        }
    }

    pub fn min(mut self, m: f64) -> Self {
        self.min = Some(ordered_float::OrderedFloat(m));
        self
    }

    pub fn max(mut self, m: f64) -> Self {
        self.max = Some(ordered_float::OrderedFloat(m));
        self
    }

    pub fn get_type(&self) -> VariableType {
        self.var_type
    }

    pub fn get_min(&self) -> Option<f64> {
        self.min.map(|x| x.into_inner())
    }

    pub fn get_max(&self) -> Option<f64> {
        self.max.map(|x| x.into_inner())
    }
}

/// Sense in which the objective function is optimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ObjectiveSense {
    #[default]
    Minimize,
    Maximize,
}

/// Builder for [`Problem`].
///
/// Every variable used by a constraint or the objective must be declared
/// with [`ProblemBuilder::set_variable`]; [`ProblemBuilder::build`]
/// enforces this. Constraints carry a free-form description that shows up
/// in `Display` output, which is the main debugging aid when a model
/// misbehaves.
#[derive(Debug, Clone)]
pub struct ProblemBuilder<V: VariableName> {
    constraints: Vec<(Constraint<V>, String)>,
    variables: BTreeMap<V, Variable>,
    objective_func: LinExpr<V>,
    objective_sense: ObjectiveSense,
}

impl<V: VariableName> Default for ProblemBuilder<V> {
    fn default() -> Self {
        ProblemBuilder {
            constraints: Vec::default(),
            variables: BTreeMap::default(),
            objective_func: LinExpr::default(),
            objective_sense: ObjectiveSense::default(),
        }
    }
}

impl<V: VariableName> ProblemBuilder<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable, overwriting any previous description.
    pub fn set_variable<T: Into<V>>(mut self, name: T, var: Variable) -> Self {
        self.variables.insert(name.into(), var);
        self
    }

    pub fn set_variables<U: Into<V>, T: IntoIterator<Item = (U, Variable)>>(
        mut self,
        vars: T,
    ) -> Self {
        for (name, var) in vars {
            self.variables.insert(name.into(), var);
        }
        self
    }

    pub fn add_constraint<T: Into<String>>(mut self, constraint: Constraint<V>, desc: T) -> Self {
        self.constraints.push((constraint, desc.into()));
        self
    }

    pub fn add_constraints<U: Into<String>, T: IntoIterator<Item = (Constraint<V>, U)>>(
        mut self,
        constraints: T,
    ) -> Self {
        for (constraint, desc) in constraints {
            self.constraints.push((constraint, desc.into()));
        }
        self
    }

    /// Sets the objective function. The sense must always be given
    /// together with the expression.
    pub fn set_objective_function(mut self, obj_fn: LinExpr<V>, obj_sense: ObjectiveSense) -> Self {
        self.objective_func = obj_fn;
        self.objective_sense = obj_sense;
        self
    }
}

/// Errors raised by [`ProblemBuilder::build`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError<V: VariableName> {
    #[error("Variable {0} is used in constraint {2} ({1}) but not explicitly declared")]
    UndeclaredVariableInConstraint(V, Constraint<V>, String),
    #[error("Variable {0} is used in objective function ({1}) but not explicitly declared")]
    UndeclaredVariableInObjFunc(V, LinExpr<V>),
}

pub type BuildResult<T, V> = std::result::Result<T, BuildError<V>>;

impl<V: VariableName> ProblemBuilder<V> {
    /// Checks that every variable in use is declared and commits the
    /// builder into a [`Problem`].
    pub fn build(self) -> BuildResult<Problem<V>, V> {
        for (constraint, desc) in &self.constraints {
            if let Some(var) = self.check_variables_in_expr(constraint.get_lhs()) {
                return Err(BuildError::UndeclaredVariableInConstraint(
                    var,
                    constraint.clone(),
                    desc.clone(),
                ));
            }
        }

        if let Some(var) = self.check_variables_in_expr(&self.objective_func) {
            return Err(BuildError::UndeclaredVariableInObjFunc(
                var,
                self.objective_func.clone(),
            ));
        }

        let variables_vec: Vec<_> = self.variables.keys().cloned().collect();

        Ok(Problem {
            constraints: self.constraints,
            variables: self.variables,
            variables_vec,
            objective_func: self.objective_func,
            objective_sense: self.objective_sense,
        })
    }

    fn check_variables_in_expr(&self, expr: &LinExpr<V>) -> Option<V> {
        for var in expr.variables() {
            if !self.variables.contains_key(&var) {
                return Some(var);
            }
        }
        None
    }
}

/// A fully specified LP/IP problem, ready to be handed to a solver.
#[derive(Debug, Clone)]
pub struct Problem<V: VariableName> {
    constraints: Vec<(Constraint<V>, String)>,
    variables: BTreeMap<V, Variable>,
    variables_vec: Vec<V>,
    objective_func: LinExpr<V>,
    objective_sense: ObjectiveSense,
}

impl<V: VariableName> Problem<V> {
    pub fn into_builder(self) -> ProblemBuilder<V> {
        ProblemBuilder {
            constraints: self.constraints,
            variables: self.variables,
            objective_func: self.objective_func,
            objective_sense: self.objective_sense,
        }
    }

    pub fn get_constraints(&self) -> &[(Constraint<V>, String)] {
        &self.constraints[..]
    }

    pub fn get_variables(&self) -> &BTreeMap<V, Variable> {
        &self.variables
    }

    /// Variables in a stable order; solver backends create their columns
    /// in this order.
    pub fn get_variables_vec(&self) -> &[V] {
        &self.variables_vec[..]
    }

    pub fn get_objective_function(&self) -> &LinExpr<V> {
        &self.objective_func
    }

    pub fn get_objective_sense(&self) -> ObjectiveSense {
        self.objective_sense
    }
}

impl<V: VariableName> std::fmt::Display for Problem<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "variables : [")?;
        for v in self.variables.keys() {
            write!(f, " {}", v)?;
        }
        writeln!(f, " ]")?;

        writeln!(
            f,
            "objective : {} {}",
            match self.objective_sense {
                ObjectiveSense::Minimize => "minimize",
                ObjectiveSense::Maximize => "maximize",
            },
            self.objective_func
        )?;

        write!(f, "constraints :")?;
        for (i, (c, desc)) in self.constraints.iter().enumerate() {
            write!(f, "\n{}) {} ({})", i, c, desc)?;
        }

        Ok(())
    }
}
