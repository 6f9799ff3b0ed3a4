//! Component-spanning error taxonomy. `Unsat` is carried as an error
//! variant for `?`-propagation convenience, but callers must treat it as a
//! result, not a failure: see `src/bin/dpve.rs` for the exit-0 handling.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DpveError {
    #[error("input error: {0}")]
    InputError(String),

    #[error("config error: {0}")]
    ConfigError(String),

    /// Discovered by an empty clause, a root SAT-filter BDD of 0, or the
    /// seed SAT solver. Not a fault: the driver reports UNSAT and exits 0.
    #[error("formula is unsatisfiable")]
    Unsat,

    #[error("resource exhausted at join node {node_index}: {detail}")]
    ResourceExhausted { node_index: usize, detail: String },

    #[error("no join tree received from planner before timeout")]
    PlannerAbsent,

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type DpveResult<T> = Result<T, DpveError>;
