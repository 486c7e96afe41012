//! Solving an assembled constraint system with HiGHS.
use crate::problem::{ConstraintSystem, LinearExpr, Relation, VariableKey};
use crate::settings::Settings;
use anyhow::{Result, anyhow};
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use indexmap::IndexMap;
use log::info;
use std::collections::HashMap;

/// Values of every variable in an optimal solution
#[derive(Debug, Clone)]
pub struct Solution {
    values: IndexMap<VariableKey, f64>,
    objective: f64,
}

impl Solution {
    /// Value of a variable, if it is part of the problem
    pub fn value(&self, key: &VariableKey) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Evaluate an expression at the solution
    pub fn evaluate(&self, expr: &LinearExpr) -> f64 {
        expr.constant_part()
            + expr
                .terms()
                .iter()
                .map(|(key, coeff)| coeff * self.value(key).unwrap_or_default())
                .sum::<f64>()
    }

    /// Iterate over variables and their values in problem order
    pub fn iter(&self) -> impl Iterator<Item = (&VariableKey, f64)> {
        self.values.iter().map(|(key, value)| (key, *value))
    }

    /// Value of the objective, including its constant term
    pub fn objective(&self) -> f64 {
        self.objective
    }

    /// The values as a map, for checking against the constraint system
    pub fn to_map(&self) -> HashMap<VariableKey, f64> {
        self.values
            .iter()
            .map(|(key, value)| (key.clone(), *value))
            .collect()
    }
}

/// Minimise the objective of a constraint system.
///
/// # Arguments
///
/// * `system` - A fully assembled constraint system
/// * `settings` - Program settings; `solver_log` shows HiGHS's own log on the console
pub fn solve(system: &ConstraintSystem, settings: &Settings) -> Result<Solution> {
    let mut problem = Problem::default();
    let columns = system
        .iter_variables()
        .map(|(_, variable)| {
            let (lower, upper) = variable.domain.bounds();
            if variable.domain.is_integer() {
                problem.add_integer_column(variable.cost, lower..=upper)
            } else {
                problem.add_column(variable.cost, lower..=upper)
            }
        })
        .collect::<Vec<_>>();

    for (_, constraint) in system.iter_constraints() {
        let terms = constraint
            .terms()
            .iter()
            .map(|(idx, coeff)| (columns[*idx], *coeff));
        let rhs = constraint.rhs();
        match constraint.relation() {
            Relation::LessEqual => {
                problem.add_row(..=rhs, terms);
            }
            Relation::GreaterEqual => {
                problem.add_row(rhs.., terms);
            }
            Relation::Equal => {
                problem.add_row(rhs..=rhs, terms);
            }
        }
    }

    let mut model = problem.optimise(Sense::Minimise);
    if settings.solver_log {
        model.set_option("log_to_console", true);
        model.set_option("output_flag", true);
    } else {
        model.set_option("output_flag", false);
    }

    let solved = model.solve();
    match solved.status() {
        HighsModelStatus::Optimal => {
            let solution = solved.get_solution();
            let values: IndexMap<_, _> = system
                .iter_variables()
                .map(|(key, _)| key.clone())
                .zip(solution.columns().iter().copied())
                .collect();
            let objective = system.objective_constant()
                + system
                    .iter_variables()
                    .map(|(key, variable)| variable.cost * values[key])
                    .sum::<f64>();
            info!("Solved constraint system with objective {objective:.2}");

            Ok(Solution { values, objective })
        }
        status => Err(anyhow!("Could not solve: {status:?}")),
    }
}
