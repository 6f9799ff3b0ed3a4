//! Component K (ambient): CLI configuration. `structopt`-derived raw flags,
//! resolved into typed values (`ResolvedConfig`) the driver actually
//! consumes — the split mirrors the teacher's own `Config` (raw strings and
//! integers on the wire) versus the typed enums the solver loop wants.
use crate::error::{DpveError, DpveResult};
use crate::types::{
    DynOrderMode, JoinPriority, MaximizerFormat, SatFilterMode, SignedHeuristic, TreeVarOrderHeuristic,
};
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

/// Crate version, surfaced the way splr's CLI does.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Raw command-line configuration, one field per flag in the external
/// interface list.
#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "dpve", about, author)]
pub struct Config {
    //
    //## I/O
    //
    /// A DIMACS-derived CNF file
    #[structopt(parse(from_os_str))]
    pub cnf_filename: PathBuf,

    /// Result filename; empty means stdout
    #[structopt(long = "result", short = "r", default_value = "", parse(from_os_str))]
    pub result_filename: PathBuf,

    /// Disable progress logging
    #[structopt(long = "quiet", short = "q")]
    pub quiet_mode: bool,

    /// Seconds to wait for the external planner (0 = wait for stdin to close)
    #[structopt(long = "pw", default_value = "0")]
    pub planner_wait: u64,

    //
    //## counting mode
    //
    /// Weighted counting
    #[structopt(long = "wc")]
    pub weighted_counting: bool,

    /// Projected counting (honors `c p show` lines)
    #[structopt(long = "pc")]
    pub projected_counting: bool,

    /// Exist-random valuation: outer vars maximized, inner vars summed
    #[structopt(long = "er")]
    pub exist_random: bool,

    /// log10-space arithmetic
    #[structopt(long = "lc")]
    pub log_counting: bool,

    /// Exact rational arithmetic instead of f64
    #[structopt(long = "mp")]
    pub multi_precision: bool,

    //
    //## pruning
    //
    /// Literal pruning bound in log10 space, e.g. "-3.2"
    #[structopt(long = "lb")]
    pub log_bound: Option<f64>,

    /// Threshold-model bit string (one '0'/'1' char per declared var) seeding the pruning bound
    #[structopt(long = "tm")]
    pub threshold_model: Option<String>,

    /// Seed the pruning bound from one SAT-solver model
    #[structopt(long = "sp")]
    pub sat_pruning: bool,

    /// SAT-filter pass: 0 = off, 1 = on, 2 = on with atomic abstraction
    #[structopt(long = "sa", default_value = "0")]
    pub sat_filter: u8,

    /// Perform weighted abstraction atomically (all projection vars of a node at once)
    #[structopt(long = "aa")]
    pub atomic_abstract: bool,

    //
    //## maximizer
    //
    /// Maximizer output format: neither|short|long|dual
    #[structopt(long = "mf", default_value = "neither")]
    pub maximizer_format: String,

    /// Verify the extracted maximizer against the CNF before reporting it
    #[structopt(long = "mv")]
    pub verify_maximizer: bool,

    /// Substitute the maximizing-sign diagram into the accumulator instead of folding max directly
    #[structopt(long = "sm")]
    pub substitution_maximization: bool,

    //
    //## diagram backend
    //
    /// Diagram variable order heuristic id (negative reverses): 1=biggest-node 2=highest-node 3=lex-p
    #[structopt(long = "dv", default_value = "1")]
    pub diagram_var_order: i32,

    /// Dynamic variable reordering: 0=off 1=manual1 2=manual2 3=auto
    #[structopt(long = "dy", default_value = "0")]
    pub dynamic_reorder: u8,

    /// Backend thread count
    #[structopt(long = "tc", default_value = "1")]
    pub thread_count: usize,

    /// Max memory in MB (0 = unbounded)
    #[structopt(long = "mm", default_value = "0")]
    pub max_mem_mb: usize,

    /// Hash-table ratio (CUDD-parity knob; no effect on this backend)
    #[structopt(long = "tr", default_value = "0")]
    pub table_ratio: usize,

    /// Init-table ratio (CUDD-parity knob; no effect on this backend)
    #[structopt(long = "ir", default_value = "0")]
    pub init_ratio: usize,

    /// Join-priority policy: a=arbitrary b=biggest-pair s=smallest-pair f=fcfs
    #[structopt(long = "jp", default_value = "f")]
    pub join_priority: String,

    /// Random seed
    #[structopt(long = "rs", default_value = "0")]
    pub random_seed: u64,
}

/// Typed, validated configuration the driver actually runs on. Built by
/// [`Config::resolve`]; never constructed directly from CLI strings.
#[derive(Clone, Debug)]
pub struct ResolvedConfig {
    pub cnf_filename: PathBuf,
    pub result_filename: Option<PathBuf>,
    pub quiet_mode: bool,
    pub planner_wait: Duration,

    pub weighted_counting: bool,
    pub projected_counting: bool,
    pub exist_random: bool,
    pub log_counting: bool,
    pub multi_precision: bool,

    pub log_bound: Option<f64>,
    pub threshold_model: Option<String>,
    pub sat_pruning: bool,
    pub sat_filter_mode: SatFilterMode,
    pub atomic_abstract: bool,

    pub maximizer_format: MaximizerFormat,
    pub verify_maximizer: bool,
    pub substitution_maximization: bool,

    pub diagram_var_order: SignedHeuristic<TreeVarOrderHeuristic>,
    pub dynamic_reorder: DynOrderMode,
    pub thread_count: usize,
    pub max_mem_mb: usize,
    pub table_ratio: usize,
    pub init_ratio: usize,
    pub join_priority: JoinPriority,
    pub random_seed: u64,
}

impl Config {
    /// Parses raw strings/integers into typed values and rejects
    /// incompatible combinations (§7 ConfigError; §9 substitutionMaximization
    /// rule).
    pub fn resolve(&self) -> DpveResult<ResolvedConfig> {
        let maximizer_format = match self.maximizer_format.to_lowercase().as_str() {
            "neither" => MaximizerFormat::Neither,
            "short" => MaximizerFormat::Short,
            "long" => MaximizerFormat::Long,
            "dual" => MaximizerFormat::Dual,
            other => return Err(DpveError::ConfigError(format!("unknown maximizer format '{}'", other))),
        };

        let join_priority = match self.join_priority.as_str() {
            "a" => JoinPriority::Arbitrary,
            "b" => JoinPriority::Biggest,
            "s" => JoinPriority::Smallest,
            "f" => JoinPriority::Fcfs,
            other => return Err(DpveError::ConfigError(format!("unknown join priority '{}'", other))),
        };

        let dynamic_reorder = match self.dynamic_reorder {
            0 => DynOrderMode::Off,
            1 => DynOrderMode::Manual1,
            2 => DynOrderMode::Manual2,
            3 => DynOrderMode::Auto,
            other => return Err(DpveError::ConfigError(format!("unknown dynamic reorder mode '{}'", other))),
        };

        let (sat_filter_mode, atomic_from_sa) = match self.sat_filter {
            0 => (SatFilterMode::Off, false),
            1 => (SatFilterMode::On, false),
            2 => (SatFilterMode::On, true),
            other => return Err(DpveError::ConfigError(format!("unknown sat-filter mode '{}'", other))),
        };

        let reversed = self.diagram_var_order < 0;
        let heuristic = match self.diagram_var_order.abs() {
            1 => TreeVarOrderHeuristic::BiggestNode,
            2 => TreeVarOrderHeuristic::HighestNode,
            3 => TreeVarOrderHeuristic::LexP,
            other => return Err(DpveError::ConfigError(format!("unknown diagram var order heuristic id '{}'", other))),
        };

        if self.substitution_maximization && self.weighted_counting {
            return Err(DpveError::ConfigError(
                "substitution maximization is valid only for unweighted counting".into(),
            ));
        }

        Ok(ResolvedConfig {
            cnf_filename: self.cnf_filename.clone(),
            result_filename: if self.result_filename.as_os_str().is_empty() {
                None
            } else {
                Some(self.result_filename.clone())
            },
            quiet_mode: self.quiet_mode,
            planner_wait: Duration::from_secs(self.planner_wait),

            weighted_counting: self.weighted_counting,
            projected_counting: self.projected_counting,
            exist_random: self.exist_random,
            log_counting: self.log_counting,
            multi_precision: self.multi_precision,

            log_bound: self.log_bound,
            threshold_model: self.threshold_model.clone(),
            sat_pruning: self.sat_pruning,
            sat_filter_mode,
            atomic_abstract: self.atomic_abstract || atomic_from_sa,

            maximizer_format,
            verify_maximizer: self.verify_maximizer,
            substitution_maximization: self.substitution_maximization,

            diagram_var_order: SignedHeuristic { heuristic, reversed },
            dynamic_reorder,
            thread_count: self.thread_count.max(1),
            max_mem_mb: self.max_mem_mb,
            table_ratio: self.table_ratio,
            init_ratio: self.init_ratio,
            join_priority,
            random_seed: self.random_seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            cnf_filename: PathBuf::from("x.cnf"),
            result_filename: PathBuf::new(),
            quiet_mode: false,
            planner_wait: 0,
            weighted_counting: false,
            projected_counting: false,
            exist_random: false,
            log_counting: false,
            multi_precision: true,
            log_bound: None,
            threshold_model: None,
            sat_pruning: false,
            sat_filter: 0,
            atomic_abstract: false,
            maximizer_format: "neither".into(),
            verify_maximizer: false,
            substitution_maximization: false,
            diagram_var_order: 1,
            dynamic_reorder: 0,
            thread_count: 1,
            max_mem_mb: 0,
            table_ratio: 0,
            init_ratio: 0,
            join_priority: "f".into(),
            random_seed: 0,
        }
    }

    #[test]
    fn resolves_defaults() {
        let resolved = base().resolve().unwrap();
        assert_eq!(resolved.maximizer_format, MaximizerFormat::Neither);
        assert_eq!(resolved.join_priority, JoinPriority::Fcfs);
        assert_eq!(resolved.sat_filter_mode, SatFilterMode::Off);
        assert!(!resolved.atomic_abstract);
    }

    #[test]
    fn sa_two_implies_atomic_abstract() {
        let mut cfg = base();
        cfg.sat_filter = 2;
        let resolved = cfg.resolve().unwrap();
        assert_eq!(resolved.sat_filter_mode, SatFilterMode::On);
        assert!(resolved.atomic_abstract);
    }

    #[test]
    fn substitution_maximization_rejected_when_weighted() {
        let mut cfg = base();
        cfg.weighted_counting = true;
        cfg.substitution_maximization = true;
        assert!(matches!(cfg.resolve(), Err(DpveError::ConfigError(_))));
    }

    #[test]
    fn negative_diagram_var_order_reverses() {
        let mut cfg = base();
        cfg.diagram_var_order = -2;
        let resolved = cfg.resolve().unwrap();
        assert_eq!(resolved.diagram_var_order.heuristic, TreeVarOrderHeuristic::HighestNode);
        assert!(resolved.diagram_var_order.reversed);
    }
}
