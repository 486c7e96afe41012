//! The assembled optimisation problem: named variables, named linear constraints and an objective.
//!
//! Builders never talk to the solver directly. They append to a [`ConstraintSystem`], which can be
//! inspected by name (for tests and debugging) and is handed to the solver only once complete.
use crate::generator::GeneratorID;
use crate::requirements::{ReserveID, ZoneID};
use crate::temporal::TimepointID;
use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use strum::IntoEnumIterator;

/// Coefficients smaller than this are dropped when terms are merged
const COEFFICIENT_EPSILON: f64 = 1e-12;

/// A per-generator, per-timepoint decision variable
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum GeneratorVariable {
    /// Commitment status
    Commit,
    /// Startup indicator
    Startup,
    /// Shutdown indicator
    Shutdown,
    /// Synchronised to the grid (committed or following a trajectory)
    Synced,
    /// Power above the minimum stable level while committed
    PowerAbovePmin,
    /// Indicator for the startup type at the given (zero-based) position
    StartupType(usize),
    /// Startup trajectory power of the given (zero-based) startup profile
    StartupPower(usize),
    /// Shutdown trajectory power
    ShutdownPower,
    /// Output of a generator without commitment
    Power,
}

impl fmt::Display for GeneratorVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit => write!(f, "Commit"),
            Self::Startup => write!(f, "Startup"),
            Self::Shutdown => write!(f, "Shutdown"),
            Self::Synced => write!(f, "Synced"),
            Self::PowerAbovePmin => write!(f, "PowerAbovePmin"),
            Self::StartupType(s) => write!(f, "StartupType{}", s + 1),
            Self::StartupPower(s) => write!(f, "StartupPower{}", s + 1),
            Self::ShutdownPower => write!(f, "ShutdownPower"),
            Self::Power => write!(f, "Power"),
        }
    }
}

/// Identifies a variable of the problem
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub enum VariableKey {
    /// A generator's variable in a timepoint
    Generator {
        /// The generator
        generator: GeneratorID,
        /// Which variable
        variable: GeneratorVariable,
        /// The timepoint
        timepoint: TimepointID,
    },
    /// Provision of a reserve product by a generator
    Provision {
        /// The generator
        generator: GeneratorID,
        /// The reserve product
        reserve: ReserveID,
        /// The timepoint
        timepoint: TimepointID,
    },
    /// Load not served in a zone
    Unserved {
        /// The load zone
        zone: ZoneID,
        /// The timepoint
        timepoint: TimepointID,
    },
    /// Generation in excess of load in a zone
    Overgeneration {
        /// The load zone
        zone: ZoneID,
        /// The timepoint
        timepoint: TimepointID,
    },
    /// Unmet requirement of a reserve product
    ReserveShortfall {
        /// The reserve product
        reserve: ReserveID,
        /// The timepoint
        timepoint: TimepointID,
    },
}

impl VariableKey {
    /// Key for a generator's variable in a timepoint
    pub fn generator(
        generator: &GeneratorID,
        variable: GeneratorVariable,
        timepoint: TimepointID,
    ) -> Self {
        Self::Generator {
            generator: generator.clone(),
            variable,
            timepoint,
        }
    }
}

impl fmt::Display for VariableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generator {
                generator,
                variable,
                timepoint,
            } => write!(f, "{variable}[{generator},{timepoint}]"),
            Self::Provision {
                generator,
                reserve,
                timepoint,
            } => write!(f, "Provision[{generator},{reserve},{timepoint}]"),
            Self::Unserved { zone, timepoint } => write!(f, "Unserved[{zone},{timepoint}]"),
            Self::Overgeneration { zone, timepoint } => {
                write!(f, "Overgeneration[{zone},{timepoint}]")
            }
            Self::ReserveShortfall { reserve, timepoint } => {
                write!(f, "ReserveShortfall[{reserve},{timepoint}]")
            }
        }
    }
}

/// The values a variable may take
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum Domain {
    /// Either 0 or 1
    Binary,
    /// Any value between the bounds (which may be infinite)
    Continuous {
        /// Lower bound
        lower: f64,
        /// Upper bound
        upper: f64,
    },
}

impl Domain {
    /// The interval [0, 1]
    pub const UNIT_INTERVAL: Self = Self::Continuous {
        lower: 0.0,
        upper: 1.0,
    };

    /// Any non-negative value
    pub const NON_NEGATIVE: Self = Self::Continuous {
        lower: 0.0,
        upper: f64::INFINITY,
    };

    /// Lower and upper bounds of the domain
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Self::Binary => (0.0, 1.0),
            Self::Continuous { lower, upper } => (lower, upper),
        }
    }

    /// Whether the variable must take an integer value
    pub fn is_integer(self) -> bool {
        self == Self::Binary
    }
}

/// A variable of the problem
#[derive(PartialEq, Debug, Clone)]
pub struct Variable {
    /// Permitted values
    pub domain: Domain,
    /// Coefficient in the (minimised) objective
    pub cost: f64,
}

/// A linear combination of variables plus a constant
#[derive(PartialEq, Debug, Clone, Default)]
pub struct LinearExpr {
    terms: Vec<(VariableKey, f64)>,
    constant: f64,
}

impl LinearExpr {
    /// A single variable with coefficient 1
    pub fn var(key: VariableKey) -> Self {
        Self::term(key, 1.0)
    }

    /// A single variable with the given coefficient
    pub fn term(key: VariableKey, coefficient: f64) -> Self {
        Self {
            terms: vec![(key, coefficient)],
            constant: 0.0,
        }
    }

    /// A constant
    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Add a term to the expression
    pub fn add_term(&mut self, key: VariableKey, coefficient: f64) {
        self.terms.push((key, coefficient));
    }

    /// Add a multiple of another expression to this one
    pub fn add_scaled(&mut self, other: &LinearExpr, factor: f64) {
        self.terms.extend(
            other
                .terms
                .iter()
                .map(|(key, coeff)| (key.clone(), coeff * factor)),
        );
        self.constant += other.constant * factor;
    }

    /// The terms of the expression (possibly with repeated variables)
    pub fn terms(&self) -> &[(VariableKey, f64)] {
        &self.terms
    }

    /// The constant part of the expression
    pub fn constant_part(&self) -> f64 {
        self.constant
    }

    /// Evaluate the expression, treating absent variables as zero
    pub fn evaluate(&self, values: &HashMap<VariableKey, f64>) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|(key, coeff)| coeff * values.get(key).copied().unwrap_or_default())
                .sum::<f64>()
    }
}

impl Add for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: LinearExpr) -> LinearExpr {
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
        self
    }
}

impl Sub for LinearExpr {
    type Output = LinearExpr;

    fn sub(self, rhs: LinearExpr) -> LinearExpr {
        self + (-rhs)
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        self * -1.0
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(mut self, rhs: f64) -> LinearExpr {
        for (_, coeff) in &mut self.terms {
            *coeff *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

impl std::iter::Sum for LinearExpr {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(LinearExpr::default(), Add::add)
    }
}

/// How the left-hand side of a constraint relates to the right-hand side
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Relation {
    /// lhs <= rhs
    LessEqual,
    /// lhs >= rhs
    GreaterEqual,
    /// lhs == rhs
    Equal,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Equal => "=",
        };
        write!(f, "{symbol}")
    }
}

/// The kinds of constraint in the problem
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, strum::Display, strum::EnumIter)]
pub enum ConstraintFamily {
    /// Commitment changes only through startups and shutdowns
    CommitTransition,
    /// Startup type indicators sum to the startup indicator
    StartupTypeSum,
    /// A startup type may only be used if the unit shut down within its down-time interval
    StartupTypeAdmissible,
    /// Synced is zero when the unit is unavailable
    SyncedOffline,
    /// Synced covers commitment and trajectory power
    Synced,
    /// Power plus upward reserves within available capacity
    MaxPower,
    /// Power minus downward reserves above the minimum stable level
    MinPower,
    /// Trajectory power is zero when committed and never above the minimum stable level
    TrajectoryMax,
    /// Limit on increases of power between timepoints
    RampUp,
    /// Limit on decreases of power between timepoints
    RampDown,
    /// Startup trajectory power only falls at the startup timepoint
    StartupPowerIncreasing,
    /// Startup trajectory power rises no faster than the startup ramp rate
    StartupPowerRamp,
    /// Power at startup follows on from the startup trajectory
    StartupConnect,
    /// Shutdown trajectory power only rises at the shutdown timepoint
    ShutdownPowerDecreasing,
    /// Shutdown trajectory power falls no faster than the shutdown ramp rate
    ShutdownPowerRamp,
    /// The shutdown trajectory follows on from the last committed power
    ShutdownConnect,
    /// Committed for at least the minimum up time after a startup
    MinUpTime,
    /// Offline for at least the minimum down time after a shutdown
    MinDownTime,
    /// Output of a variable generator within its capacity factor
    VariablePowerLimit,
    /// Zonal supply equals load
    LoadBalance,
    /// Reserve provision meets the requirement
    ReserveRequirement,
}

/// What a constraint applies to
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub enum Subject {
    /// A generator
    Generator(GeneratorID),
    /// A load zone
    Zone(ZoneID),
    /// A reserve product
    Reserve(ReserveID),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generator(id) => write!(f, "{id}"),
            Self::Zone(id) => write!(f, "{id}"),
            Self::Reserve(id) => write!(f, "{id}"),
        }
    }
}

/// The name of a constraint
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct ConstraintKey {
    /// The kind of constraint
    pub family: ConstraintFamily,
    /// What it applies to
    pub subject: Subject,
    /// The timepoint (for transitions, the later of the pair)
    pub timepoint: TimepointID,
    /// The startup type or profile, for per-type constraints
    pub startup_type: Option<usize>,
}

impl ConstraintKey {
    /// Name a constraint on a generator
    pub fn generator(
        family: ConstraintFamily,
        generator: &GeneratorID,
        timepoint: TimepointID,
    ) -> Self {
        Self {
            family,
            subject: Subject::Generator(generator.clone()),
            timepoint,
            startup_type: None,
        }
    }

    /// Name a per-type constraint on a generator
    pub fn startup_type(
        family: ConstraintFamily,
        generator: &GeneratorID,
        timepoint: TimepointID,
        startup_type: usize,
    ) -> Self {
        Self {
            startup_type: Some(startup_type),
            ..Self::generator(family, generator, timepoint)
        }
    }
}

impl fmt::Display for ConstraintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{},{}", self.family, self.subject, self.timepoint)?;
        if let Some(startup_type) = self.startup_type {
            write!(f, ",{}", startup_type + 1)?;
        }
        write!(f, "]")
    }
}

/// A linear constraint over the variables of a [`ConstraintSystem`]
#[derive(PartialEq, Debug, Clone)]
pub struct Constraint {
    terms: Vec<(usize, f64)>,
    relation: Relation,
    rhs: f64,
}

impl Constraint {
    /// Terms as (variable index, coefficient) pairs, each variable appearing once
    pub fn terms(&self) -> &[(usize, f64)] {
        &self.terms
    }

    /// The relation between the two sides
    pub fn relation(&self) -> Relation {
        self.relation
    }

    /// The right-hand side
    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    /// Lower and upper bounds on the left-hand side
    pub fn bounds(&self) -> (f64, f64) {
        match self.relation {
            Relation::LessEqual => (f64::NEG_INFINITY, self.rhs),
            Relation::GreaterEqual => (self.rhs, f64::INFINITY),
            Relation::Equal => (self.rhs, self.rhs),
        }
    }

    /// Whether the constraint holds for the given variable values (indexed like the variables)
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs: f64 = self
            .terms
            .iter()
            .map(|(idx, coeff)| coeff * values[*idx])
            .sum();
        let (lower, upper) = self.bounds();
        lhs >= lower - tolerance && lhs <= upper + tolerance
    }
}

/// Named variables, named constraints and a linear objective
#[derive(Debug, Default)]
pub struct ConstraintSystem {
    variables: IndexMap<VariableKey, Variable>,
    constraints: IndexMap<ConstraintKey, Constraint>,
    objective_constant: f64,
}

impl ConstraintSystem {
    /// Add a variable with zero cost.
    ///
    /// Panics if the variable has already been added.
    pub fn add_variable(&mut self, key: VariableKey, domain: Domain) {
        let variable = Variable { domain, cost: 0.0 };
        let existing = self.variables.insert(key, variable).is_some();
        assert!(!existing, "Duplicate entry for var");
    }

    /// Add a multiple of an expression to the objective.
    ///
    /// Panics if the expression refers to a variable which has not been added.
    pub fn add_cost(&mut self, expr: &LinearExpr, factor: f64) {
        for (key, coeff) in expr.terms() {
            self.variables
                .get_mut(key)
                .unwrap_or_else(|| panic!("No variable {key} found"))
                .cost += coeff * factor;
        }
        self.objective_constant += expr.constant_part() * factor;
    }

    /// Add the constraint `expr <relation> rhs`.
    ///
    /// Repeated variables are merged and the constant part of `expr` is moved to the right-hand
    /// side. Panics if the key is already in use or a variable has not been added.
    pub fn add_constraint(
        &mut self,
        key: ConstraintKey,
        expr: LinearExpr,
        relation: Relation,
        rhs: f64,
    ) {
        let mut merged: IndexMap<usize, f64> = IndexMap::new();
        for (var, coeff) in expr.terms() {
            let idx = self
                .variables
                .get_index_of(var)
                .unwrap_or_else(|| panic!("No variable {var} found for constraint {key}"));
            *merged.entry(idx).or_default() += coeff;
        }

        let constraint = Constraint {
            terms: merged
                .into_iter()
                .filter(|(_, coeff)| coeff.abs() > COEFFICIENT_EPSILON)
                .collect(),
            relation,
            rhs: rhs - expr.constant_part(),
        };

        let existing = self.constraints.insert(key, constraint).is_some();
        assert!(!existing, "Duplicate entry for constraint");
    }

    /// Get a variable by key
    pub fn variable(&self, key: &VariableKey) -> Option<&Variable> {
        self.variables.get(key)
    }

    /// Iterate over variables in the order they were added
    pub fn iter_variables(&self) -> impl Iterator<Item = (&VariableKey, &Variable)> {
        self.variables.iter()
    }

    /// Number of variables
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Get a constraint by key
    pub fn constraint(&self, key: &ConstraintKey) -> Option<&Constraint> {
        self.constraints.get(key)
    }

    /// Iterate over constraints in the order they were added
    pub fn iter_constraints(&self) -> impl Iterator<Item = (&ConstraintKey, &Constraint)> {
        self.constraints.iter()
    }

    /// Number of constraints
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// The coefficient of a variable in a constraint (zero if absent).
    ///
    /// Returns `None` if either the constraint or the variable does not exist.
    pub fn coefficient(&self, constraint: &ConstraintKey, variable: &VariableKey) -> Option<f64> {
        let constraint = self.constraints.get(constraint)?;
        let idx = self.variables.get_index_of(variable)?;
        Some(
            constraint
                .terms
                .iter()
                .find(|(var, _)| *var == idx)
                .map_or(0.0, |(_, coeff)| *coeff),
        )
    }

    /// Number of constraints of each family, in family order (families with none are omitted)
    pub fn count_by_family(&self) -> IndexMap<ConstraintFamily, usize> {
        let counts = self.constraints.keys().counts_by(|key| key.family);
        ConstraintFamily::iter()
            .filter_map(|family| counts.get(&family).map(|count| (family, *count)))
            .collect()
    }

    /// Whether any constraint of the given family exists
    pub fn has_family(&self, family: ConstraintFamily) -> bool {
        self.constraints.keys().any(|key| key.family == family)
    }

    /// Constant term of the objective
    pub fn objective_constant(&self) -> f64 {
        self.objective_constant
    }

    /// Variable values in variable order, treating absent variables as zero
    pub fn value_vector(&self, values: &HashMap<VariableKey, f64>) -> Vec<f64> {
        self.variables
            .keys()
            .map(|key| values.get(key).copied().unwrap_or_default())
            .collect()
    }

    /// Keys of the constraints violated by the given values
    pub fn violations(
        &self,
        values: &HashMap<VariableKey, f64>,
        tolerance: f64,
    ) -> Vec<&ConstraintKey> {
        let values = self.value_vector(values);
        self.constraints
            .iter()
            .filter(|(_, constraint)| !constraint.is_satisfied(&values, tolerance))
            .map(|(key, _)| key)
            .collect()
    }

    /// Whether the given variable values lie within their domains
    pub fn within_domains(&self, values: &HashMap<VariableKey, f64>, tolerance: f64) -> bool {
        self.variables.iter().all(|(key, variable)| {
            let value = values.get(key).copied().unwrap_or_default();
            let (lower, upper) = variable.domain.bounds();
            let integral =
                !variable.domain.is_integer() || (value - value.round()).abs() <= tolerance;
            value >= lower - tolerance && value <= upper + tolerance && integral
        })
    }

    /// Render a constraint in a human-readable form.
    ///
    /// For example `MinPower[g1,3]: +1 PowerAbovePmin[g1,3] >= 0`.
    pub fn format_constraint(&self, key: &ConstraintKey) -> Option<String> {
        let constraint = self.constraints.get(key)?;
        let lhs = if constraint.terms.is_empty() {
            "0".to_string()
        } else {
            constraint
                .terms
                .iter()
                .map(|(idx, coeff)| {
                    let (var, _) = self
                        .variables
                        .get_index(*idx)
                        .expect("Constraint refers to missing variable");
                    format!("{coeff:+} {var}")
                })
                .join(" ")
        };
        Some(format!(
            "{key}: {lhs} {} {}",
            constraint.relation, constraint.rhs
        ))
    }
}
