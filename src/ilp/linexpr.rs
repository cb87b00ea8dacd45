//! Linear expressions and constraints over generic variable names.
//!
//! Expressions keep their coefficients in a `BTreeMap` keyed by the
//! variable name, so any ordered, displayable type can serve as a name.
//! The models in this crate use small enums (one per LP/IP) rather than
//! strings, which keeps constraint-building code readable and makes
//! solver round-trips type-safe.

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;

/// Trait for types usable as variable names.
pub trait VariableName:
    std::fmt::Debug + std::fmt::Display + PartialOrd + Ord + PartialEq + Eq + Clone + Send + Sync
{
}

impl<
        T: std::fmt::Debug
            + std::fmt::Display
            + PartialOrd
            + Ord
            + PartialEq
            + Eq
            + Clone
            + Send
            + Sync,
    > VariableName for T
{
}

/// A linear expression `Σ cᵢ·xᵢ + constant` with `f64` coefficients.
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq)]
pub struct LinExpr<V: VariableName> {
    coefs: BTreeMap<V, OrderedFloat<f64>>,
    constant: OrderedFloat<f64>,
}

impl<V: VariableName> Default for LinExpr<V> {
    fn default() -> Self {
        Self {
            coefs: BTreeMap::default(),
            constant: OrderedFloat::default(),
        }
    }
}

/// Comparison symbol of a constraint, always read as `lhs <sign> 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Sign {
    Equals,
    #[default]
    LessThan,
}

/// A linear constraint in the canonical form `expr = 0` or `expr <= 0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Constraint<V: VariableName> {
    sign: Sign,
    expr: LinExpr<V>,
}

impl<V: VariableName> Default for Constraint<V> {
    fn default() -> Self {
        Self {
            sign: Sign::default(),
            expr: LinExpr::default(),
        }
    }
}

impl<V: VariableName> LinExpr<V> {
    /// The expression consisting of a single variable with coefficient 1.
    pub fn var<T: Into<V>>(name: T) -> Self {
        LinExpr {
            coefs: BTreeMap::from([(name.into(), OrderedFloat(1.0))]),
            constant: OrderedFloat(0.0),
        }
    }

    /// The expression `coef * name`.
    pub fn term<T: Into<V>>(coef: f64, name: T) -> Self {
        LinExpr {
            coefs: BTreeMap::from([(name.into(), OrderedFloat(coef))]),
            constant: OrderedFloat(0.0),
        }
    }

    /// The constant expression.
    pub fn constant(number: f64) -> Self {
        LinExpr {
            coefs: BTreeMap::new(),
            constant: OrderedFloat(number),
        }
    }

    /// Sums an iterator of expressions, like repeated `+`.
    pub fn sum<I: IntoIterator<Item = LinExpr<V>>>(exprs: I) -> Self {
        let mut output = LinExpr::default();
        for expr in exprs {
            output += expr;
        }
        output
    }

    pub fn get_constant(&self) -> f64 {
        self.constant.into_inner()
    }

    pub fn get(&self, var: &V) -> Option<f64> {
        self.coefs.get(var).map(|x| x.into_inner())
    }

    pub fn variables(&self) -> BTreeSet<V> {
        self.coefs.keys().cloned().collect()
    }

    /// Iterates over the `(variable, coefficient)` pairs of the expression.
    pub fn coefficients(&self) -> impl Iterator<Item = (&V, f64)> {
        self.coefs.iter().map(|(v, c)| (v, c.into_inner()))
    }

    /// Evaluates the expression on an assignment of values.
    ///
    /// Variables missing from the assignment count as 0.
    pub fn eval(&self, values: &BTreeMap<V, f64>) -> f64 {
        let mut total = self.constant.into_inner();
        for (var, coef) in self.coefficients() {
            total += coef * values.get(var).copied().unwrap_or(0.0);
        }
        total
    }

    pub fn clean(&mut self) {
        self.coefs.retain(|_k, v| *v != OrderedFloat(0.0));
    }

    pub fn cleaned(&self) -> LinExpr<V> {
        let mut output = self.clone();
        output.clean();
        output
    }
}

impl<V: VariableName> LinExpr<V> {
    pub fn leq(&self, rhs: &LinExpr<V>) -> Constraint<V> {
        Constraint {
            expr: self - rhs,
            sign: Sign::LessThan,
        }
    }

    pub fn geq(&self, rhs: &LinExpr<V>) -> Constraint<V> {
        Constraint {
            expr: rhs - self,
            sign: Sign::LessThan,
        }
    }

    pub fn eq(&self, rhs: &LinExpr<V>) -> Constraint<V> {
        Constraint {
            expr: self - rhs,
            sign: Sign::Equals,
        }
    }
}

impl<V: VariableName> Constraint<V> {
    pub fn variables(&self) -> BTreeSet<V> {
        self.expr.variables()
    }

    pub fn coefficients(&self) -> impl Iterator<Item = (&V, f64)> {
        self.expr.coefficients()
    }

    pub fn get_var(&self, var: &V) -> Option<f64> {
        self.expr.get(var)
    }

    pub fn get_sign(&self) -> Sign {
        self.sign
    }

    pub fn get_constant(&self) -> f64 {
        self.expr.get_constant()
    }

    pub fn get_lhs(&self) -> &LinExpr<V> {
        &self.expr
    }

    /// Whether the constraint holds on an assignment, within `tol`.
    pub fn is_satisfied(&self, values: &BTreeMap<V, f64>, tol: f64) -> bool {
        let lhs = self.expr.eval(values);
        match self.sign {
            Sign::Equals => lhs.abs() <= tol,
            Sign::LessThan => lhs <= tol,
        }
    }
}

impl<V: VariableName> std::fmt::Display for LinExpr<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.coefs.is_empty() && self.constant.into_inner() == 0.0 {
            write!(f, "0")?;
            return Ok(());
        }

        let mut it = self.coefs.iter().peekable();
        while let Some((key, value)) = it.next() {
            if value.is_sign_negative() {
                write!(f, "({})*{}", value, key)?;
            } else {
                write!(f, "{}*{}", value, key)?;
            }

            if it.peek().is_some() || self.constant.0 != 0.0 {
                write!(f, " + ")?;
            }
        }

        if self.constant.into_inner() != 0.0 || self.coefs.is_empty() {
            if self.constant.is_sign_negative() {
                write!(f, "({})", self.constant)?
            } else {
                write!(f, "{}", self.constant)?
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Sign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Sign::Equals => "=",
                Sign::LessThan => "<=",
            }
        )
    }
}

impl<V: VariableName> std::fmt::Display for Constraint<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} 0", self.expr, self.sign)
    }
}

impl<V: VariableName> std::ops::Add for &LinExpr<V> {
    type Output = LinExpr<V>;

    fn add(self, rhs: &LinExpr<V>) -> Self::Output {
        let mut output = LinExpr {
            coefs: self.coefs.clone(),
            constant: self.constant,
        };

        for (key, value) in rhs.coefs.iter() {
            if let Some(coef) = output.coefs.get_mut(key) {
                *coef += value;
            } else {
                output.coefs.insert(key.clone(), *value);
            }
        }

        output.constant += rhs.constant;

        output
    }
}

impl<V: VariableName> std::ops::Add for LinExpr<V> {
    type Output = LinExpr<V>;

    fn add(self, rhs: LinExpr<V>) -> Self::Output {
        &self + &rhs
    }
}

impl<V: VariableName> std::ops::Add<LinExpr<V>> for &LinExpr<V> {
    type Output = LinExpr<V>;

    fn add(self, rhs: LinExpr<V>) -> Self::Output {
        self + &rhs
    }
}

impl<V: VariableName> std::ops::Add<&LinExpr<V>> for LinExpr<V> {
    type Output = LinExpr<V>;

    fn add(self, rhs: &LinExpr<V>) -> Self::Output {
        &self + rhs
    }
}

impl<V: VariableName> std::ops::Add<f64> for &LinExpr<V> {
    type Output = LinExpr<V>;

    fn add(self, rhs: f64) -> Self::Output {
        self + LinExpr::constant(rhs)
    }
}

impl<V: VariableName> std::ops::Add<f64> for LinExpr<V> {
    type Output = LinExpr<V>;

    fn add(self, rhs: f64) -> Self::Output {
        &self + rhs
    }
}

impl<V: VariableName> std::ops::AddAssign<LinExpr<V>> for LinExpr<V> {
    fn add_assign(&mut self, rhs: LinExpr<V>) {
        for (key, value) in rhs.coefs {
            *self.coefs.entry(key).or_insert(OrderedFloat(0.0)) += value;
        }
        self.constant += rhs.constant;
    }
}

impl<V: VariableName> std::ops::Mul<&LinExpr<V>> for f64 {
    type Output = LinExpr<V>;

    fn mul(self, rhs: &LinExpr<V>) -> Self::Output {
        let mut output = rhs.clone();

        for (_key, value) in output.coefs.iter_mut() {
            *value *= OrderedFloat(self);
        }

        output.constant *= self;

        output
    }
}

impl<V: VariableName> std::ops::Mul<LinExpr<V>> for f64 {
    type Output = LinExpr<V>;

    fn mul(self, rhs: LinExpr<V>) -> Self::Output {
        self * &rhs
    }
}

impl<V: VariableName> std::ops::Neg for &LinExpr<V> {
    type Output = LinExpr<V>;

    fn neg(self) -> Self::Output {
        (-1.0) * self
    }
}

impl<V: VariableName> std::ops::Neg for LinExpr<V> {
    type Output = LinExpr<V>;

    fn neg(self) -> Self::Output {
        -&self
    }
}

impl<V: VariableName> std::ops::Sub for &LinExpr<V> {
    type Output = LinExpr<V>;

    fn sub(self, rhs: &LinExpr<V>) -> Self::Output {
        self + (-1.0) * rhs
    }
}

impl<V: VariableName> std::ops::Sub for LinExpr<V> {
    type Output = LinExpr<V>;

    fn sub(self, rhs: LinExpr<V>) -> Self::Output {
        &self - &rhs
    }
}

impl<V: VariableName> std::ops::Sub<LinExpr<V>> for &LinExpr<V> {
    type Output = LinExpr<V>;

    fn sub(self, rhs: LinExpr<V>) -> Self::Output {
        self - &rhs
    }
}

impl<V: VariableName> std::ops::Sub<&LinExpr<V>> for LinExpr<V> {
    type Output = LinExpr<V>;

    fn sub(self, rhs: &LinExpr<V>) -> Self::Output {
        &self - rhs
    }
}

impl<V: VariableName> std::ops::Sub<f64> for &LinExpr<V> {
    type Output = LinExpr<V>;

    fn sub(self, rhs: f64) -> Self::Output {
        self + (-rhs)
    }
}

impl<V: VariableName> std::ops::Sub<f64> for LinExpr<V> {
    type Output = LinExpr<V>;

    fn sub(self, rhs: f64) -> Self::Output {
        &self - rhs
    }
}
