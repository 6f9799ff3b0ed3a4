// cargo test -- --nocapture
//
// End-to-end scenarios built directly against `Cnf`/`JoinTree`/`dpve::run`,
// bypassing stdin/process plumbing (the planner protocol is exercised
// separately by jointree::ingest's own unit tests).
use dpve::cnf::{Clause, Cnf};
use dpve::config::ResolvedConfig;
use dpve::dpve::run;
use dpve::error::DpveError;
use dpve::jointree::JoinTree;
use dpve::number::Number;
use dpve::types::{DynOrderMode, JoinPriority, MaximizerFormat, SatFilterMode, SignedHeuristic, TreeVarOrderHeuristic};
use dpve::validator::validates;
use std::path::PathBuf;
use std::time::Duration;

fn base_config() -> ResolvedConfig {
    ResolvedConfig {
        cnf_filename: PathBuf::new(),
        result_filename: None,
        quiet_mode: true,
        planner_wait: Duration::from_secs(0),
        weighted_counting: false,
        projected_counting: false,
        exist_random: false,
        log_counting: false,
        multi_precision: true,
        log_bound: None,
        threshold_model: None,
        sat_pruning: false,
        sat_filter_mode: SatFilterMode::Off,
        atomic_abstract: false,
        maximizer_format: MaximizerFormat::Neither,
        verify_maximizer: false,
        substitution_maximization: false,
        diagram_var_order: SignedHeuristic { heuristic: TreeVarOrderHeuristic::BiggestNode, reversed: false },
        dynamic_reorder: DynOrderMode::Off,
        thread_count: 1,
        max_mem_mb: 0,
        table_ratio: 0,
        init_ratio: 0,
        join_priority: JoinPriority::Fcfs,
        random_seed: 0,
    }
}

#[test]
fn unweighted_no_projection_counts_three() {
    // p cnf 2 1 / 1 -2 0: three of four full assignments satisfy it.
    let mut cnf = Cnf::new(0, false, false, true);
    let mut c = Clause::new(false);
    c.insert_literal(1);
    c.insert_literal(-2);
    cnf.add_clause(c);
    cnf.declared_var_count = 2;
    cnf.set_apparent_vars();
    cnf.outer_vars = (1..=2).collect();
    cnf.complete_literal_weights().unwrap();

    let mut tree = JoinTree::new(2, 1, 2);
    tree.install_terminals(&cnf);
    tree.add_nonterminal(1, vec![0], [1, 2].into_iter().collect());

    let outcome = run(&cnf, &tree, &base_config()).unwrap();
    assert!(outcome.satisfiable);
    assert_eq!(outcome.value, Number::parse("3", true).unwrap());
}

#[test]
fn xor_clause_pins_a_unique_model() {
    // p cnf 2 2 / x 1 2 0 / 1 0: x1 XOR x2, and x1, so x1=1, x2=0 uniquely.
    let mut cnf = Cnf::new(0, false, false, true);
    let mut xor = Clause::new(true);
    xor.insert_literal(1);
    xor.insert_literal(2);
    cnf.add_clause(xor);
    let mut unit = Clause::new(false);
    unit.insert_literal(1);
    cnf.add_clause(unit);
    cnf.declared_var_count = 2;
    cnf.set_apparent_vars();
    cnf.outer_vars = (1..=2).collect();
    cnf.complete_literal_weights().unwrap();

    let mut tree = JoinTree::new(2, 2, 3);
    tree.install_terminals(&cnf);
    tree.add_nonterminal(2, vec![0, 1], [1, 2].into_iter().collect());

    let outcome = run(&cnf, &tree, &base_config()).unwrap();
    assert_eq!(outcome.value, Number::parse("1", true).unwrap());
}

#[test]
fn weighted_single_clause_scales_by_literal_weight() {
    // p cnf 1 1 / 1 0, weights 0.3/0.7: WMC = 0.3.
    let mut cnf = Cnf::new(0, true, false, true);
    let mut c = Clause::new(false);
    c.insert_literal(1);
    cnf.add_clause(c);
    cnf.declared_var_count = 1;
    cnf.literal_weights.insert(1, Number::parse("0.3", true).unwrap());
    cnf.literal_weights.insert(-1, Number::parse("0.7", true).unwrap());
    cnf.set_apparent_vars();
    cnf.outer_vars = (1..=1).collect();
    cnf.complete_literal_weights().unwrap();

    let mut tree = JoinTree::new(1, 1, 2);
    tree.install_terminals(&cnf);
    tree.add_nonterminal(1, vec![0], [1].into_iter().collect());

    let mut config = base_config();
    config.weighted_counting = true;
    let outcome = run(&cnf, &tree, &config).unwrap();
    assert_eq!(outcome.value, Number::parse("0.3", true).unwrap());
}

#[test]
fn projected_counting_existentially_quantifies_the_inner_var() {
    // p cnf 2 2 / 1 2 0 / 1 -2 0 with `c p show 1`: x1=1 satisfies both
    // clauses for any x2, but x1=0 needs x2 true and false at once, so the
    // projected count over x1 alone is 1.
    let mut cnf = Cnf::new(0, false, true, true);
    let mut c0 = Clause::new(false);
    c0.insert_literal(1);
    c0.insert_literal(2);
    cnf.add_clause(c0);
    let mut c1 = Clause::new(false);
    c1.insert_literal(1);
    c1.insert_literal(-2);
    cnf.add_clause(c1);
    cnf.declared_var_count = 2;
    cnf.set_apparent_vars();
    cnf.outer_vars = [1].into_iter().collect();
    cnf.complete_literal_weights().unwrap();

    // Two-level tree: eliminate the inner var (2) at a child node before the
    // outer var (1) at the root, so the max/sum order matches the intended
    // quantifier nesting rather than an arbitrary HashSet iteration order.
    let mut tree = JoinTree::new(2, 2, 4);
    tree.install_terminals(&cnf);
    tree.add_nonterminal(2, vec![0, 1], [2].into_iter().collect());
    tree.add_nonterminal(3, vec![2], [1].into_iter().collect());

    let mut config = base_config();
    config.projected_counting = true;
    let outcome = run(&cnf, &tree, &config).unwrap();
    assert_eq!(outcome.value, Number::parse("1", true).unwrap());
}

#[test]
fn exist_random_maximizes_outer_and_sums_inner() {
    // outer {1} maximized, inner {2} summed with weights 0.5/0.5; clauses
    // {1,2} and {-1,-2} together mean x1 XOR x2, symmetric under swapping
    // x2's weight, so the random expectation is 0.5 regardless of x1, and
    // maximizing over x1 leaves 0.5.
    let mut cnf = Cnf::new(0, true, false, true);
    let mut c0 = Clause::new(false);
    c0.insert_literal(1);
    c0.insert_literal(2);
    cnf.add_clause(c0);
    let mut c1 = Clause::new(false);
    c1.insert_literal(-1);
    c1.insert_literal(-2);
    cnf.add_clause(c1);
    cnf.declared_var_count = 2;
    cnf.literal_weights.insert(2, Number::parse("0.5", true).unwrap());
    cnf.literal_weights.insert(-2, Number::parse("0.5", true).unwrap());
    cnf.set_apparent_vars();
    cnf.outer_vars = [1].into_iter().collect();
    cnf.complete_literal_weights().unwrap();

    let mut tree = JoinTree::new(2, 2, 4);
    tree.install_terminals(&cnf);
    tree.add_nonterminal(2, vec![0, 1], [2].into_iter().collect());
    tree.add_nonterminal(3, vec![2], [1].into_iter().collect());

    let mut config = base_config();
    config.weighted_counting = true;
    config.exist_random = true;
    let outcome = run(&cnf, &tree, &config).unwrap();
    assert_eq!(outcome.value, Number::parse("1/2", true).unwrap());
}

#[test]
fn empty_clause_is_reported_as_unsat_at_parse_time() {
    let mut cnf = Cnf::new(0, false, false, true);
    let err = cnf.read(std::io::Cursor::new("p cnf 1 1\n0\n")).unwrap_err();
    assert!(matches!(err, DpveError::Unsat));
}

#[test]
fn extracted_maximizer_validates_against_the_cnf() {
    // Same XOR scenario as above, but exist-random with every var outer
    // makes both vars maximized (a pure SAT witness search); the extracted
    // assignment must itself satisfy both clauses.
    let mut cnf = Cnf::new(0, false, false, true);
    let mut xor = Clause::new(true);
    xor.insert_literal(1);
    xor.insert_literal(2);
    cnf.add_clause(xor);
    let mut unit = Clause::new(false);
    unit.insert_literal(1);
    cnf.add_clause(unit);
    cnf.declared_var_count = 2;
    cnf.set_apparent_vars();
    cnf.outer_vars = (1..=2).collect();
    cnf.complete_literal_weights().unwrap();

    let mut tree = JoinTree::new(2, 2, 3);
    tree.install_terminals(&cnf);
    tree.add_nonterminal(2, vec![0, 1], [1, 2].into_iter().collect());

    let mut config = base_config();
    config.exist_random = true;
    config.maximizer_format = MaximizerFormat::Short;
    let outcome = run(&cnf, &tree, &config).unwrap();
    assert_eq!(outcome.value, Number::parse("1", true).unwrap());
    let maximizer = outcome.maximizer.expect("maximizer was requested");
    assert!(validates(&cnf, &maximizer));
    assert_eq!(maximizer.get(1), Some(true));
    assert_eq!(maximizer.get(2), Some(false));
}
