//! Component G: the bottom-up join-tree evaluator. Each node's ADD is built
//! from its children's, combined under the join-priority policy (§4.J),
//! then has its projection variables abstracted out with weights (§4.C's
//! `Dd::abstract_weighted_atomic`, or inline restrict/product otherwise).
use crate::cnf::Cnf;
use crate::dd::manager::DdVar;
use crate::dd::{clause_add, weight_const, Dd, ManagerHandle};
use crate::jointree::{JoinNode, JoinTree};
use crate::number::Number;
use crate::types::{Assignment, JoinPriority, MaximizerFormat, VarId};
use std::collections::HashMap;

/// Pruning/maximization controls threaded through one `solve_subtree` call,
/// mirroring the teacher's `PruneMaxParams`.
#[derive(Clone)]
pub struct PruneMaxParams {
    pub log_bound: f64,
    pub maximizer_format: MaximizerFormat,
    pub substitution_maximization: bool,
}

impl Default for PruneMaxParams {
    fn default() -> Self {
        PruneMaxParams { log_bound: f64::NEG_INFINITY, maximizer_format: MaximizerFormat::Neither, substitution_maximization: false }
    }
}

pub struct Executor<'a> {
    cnf: &'a Cnf,
    cnf_var_to_dd_var: &'a HashMap<VarId, DdVar>,
    dd_var_to_cnf_var: &'a [VarId],
    manager: ManagerHandle,
    exist_random: bool,
    join_priority: JoinPriority,
    atomic_abstract: bool,
    /// Set when the SAT filter ran first: terminals read their filtered,
    /// already-satisfied BDD (converted to ADD) instead of synthesizing a
    /// fresh clause-ADD from the assignment.
    sat_filter_bdds: Option<Vec<Option<Dd>>>,
    maximization_stack: Vec<(DdVar, Dd)>,
}

impl<'a> Executor<'a> {
    pub fn new(
        cnf: &'a Cnf,
        cnf_var_to_dd_var: &'a HashMap<VarId, DdVar>,
        dd_var_to_cnf_var: &'a [VarId],
        manager: ManagerHandle,
        exist_random: bool,
        join_priority: JoinPriority,
        atomic_abstract: bool,
        sat_filter_bdds: Option<Vec<Option<Dd>>>,
    ) -> Self {
        Executor {
            cnf,
            cnf_var_to_dd_var,
            dd_var_to_cnf_var,
            manager,
            exist_random,
            join_priority,
            atomic_abstract,
            sat_filter_bdds,
            maximization_stack: Vec::new(),
        }
    }

    fn terminal_add(&self, node_index: usize, assignment: &Assignment) -> Dd {
        if let Some(bdds) = &self.sat_filter_bdds {
            let bdd = bdds[node_index].clone().expect("sat-filter terminal must have a stored bdd");
            return bdd.to_add();
        }
        let clause = &self.cnf.clauses[node_index];
        let literals: Vec<(DdVar, bool, Option<bool>)> = clause
            .literals
            .iter()
            .map(|&lit| {
                let var = lit.unsigned_abs() as VarId;
                let dd_var = self.cnf_var_to_dd_var[&var];
                let sign = lit > 0;
                (dd_var, sign, assignment.get(var))
            })
            .collect();
        clause_add(&self.manager, &literals, clause.xor_flag)
    }

    pub fn solve_subtree(&mut self, tree: &JoinTree, node_index: usize, params: &PruneMaxParams, assignment: &Assignment) -> Dd {
        match tree.get_join_node(node_index) {
            JoinNode::Terminal(t) => self.terminal_add(t.node_index, assignment),
            JoinNode::Nonterminal(n) => {
                let children = n.children.clone();
                let projection_vars = n.projection_vars.clone();
                let child_dds: Vec<Dd> =
                    children.iter().map(|&c| self.solve_subtree(tree, c, params, assignment)).collect();
                let seed = match &self.sat_filter_bdds {
                    // The filter pass already conjoined this node's clause
                    // constraints into a BDD (satfilter.rs's `node_dds`);
                    // seed the product from it instead of starting blank,
                    // or every clause constraint would be dropped.
                    Some(bdds) => {
                        let bdd = bdds[node_index].clone().expect("sat-filter nonterminal must have a stored bdd");
                        bdd.to_add()
                    }
                    None => Dd::one(&self.manager),
                };
                let dd = crate::join_priority::fold(
                    seed,
                    child_dds,
                    self.join_priority,
                    |d| d.node_count(),
                    |a, b| a.product(b),
                );
                self.abstract_projection_vars(dd, &projection_vars, assignment, params)
            }
        }
    }

    fn abstract_projection_vars(
        &mut self,
        dd: Dd,
        projection_vars: &std::collections::HashSet<VarId>,
        assignment: &Assignment,
        params: &PruneMaxParams,
    ) -> Dd {
        if projection_vars.is_empty() {
            return dd;
        }

        if self.atomic_abstract {
            // Atomic path requires every projection var to be unassigned
            // (the bulk backend call has no per-variable assignment hook).
            debug_assert!(projection_vars.iter().all(|v| assignment.get(*v).is_none()));
            let vars: Vec<(DdVar, Number, Number, bool)> = projection_vars
                .iter()
                .map(|&v| {
                    let dd_var = self.cnf_var_to_dd_var[&v];
                    let pos = self.cnf.literal_weights[&(v as i64)].clone();
                    let neg = self.cnf.literal_weights[&(-(v as i64))].clone();
                    let sum = pos.clone() + neg.clone();
                    debug_assert!((sum.to_f64() - 1.0).abs() < 1e-3, "atomic abstraction requires pos+neg weight ~= 1");
                    let additive = self.cnf.outer_vars.contains(&v) ^ self.exist_random;
                    (dd_var, pos, neg, additive)
                })
                .collect();
            return dd.abstract_weighted_atomic(&vars);
        }

        // Sorted by diagram level, not hash order: with >=2 max-quantified
        // vars in the set, the push order into `maximization_stack` changes
        // which maximizing assignment gets extracted, so this must be
        // deterministic the same way the atomic path already is
        // (manager.rs's `abstract_weighted_atomic`).
        let mut ordered_vars: Vec<VarId> = projection_vars.iter().copied().collect();
        ordered_vars.sort_by_key(|&v| std::cmp::Reverse(dd.level_of(self.cnf_var_to_dd_var[&v])));

        let mut acc = dd;
        for var in ordered_vars {
            let dd_var = self.cnf_var_to_dd_var[&var];
            let pos_wt = self.cnf.literal_weights[&(var as i64)].clone();
            let neg_wt = self.cnf.literal_weights[&(-(var as i64))].clone();
            let additive = self.cnf.outer_vars.contains(&var) ^ self.exist_random;

            acc = match assignment.get(var) {
                Some(true) => acc.product(&weight_const(&self.manager, pos_wt.clone())),
                Some(false) => acc.product(&weight_const(&self.manager, neg_wt.clone())),
                None => {
                    let hi = acc.compose(dd_var, true).product(&weight_const(&self.manager, pos_wt.clone()));
                    let lo = acc.compose(dd_var, false).product(&weight_const(&self.manager, neg_wt.clone()));

                    let want_maximizer = params.maximizer_format != MaximizerFormat::Neither && !additive;
                    let mut substituted = None;
                    if want_maximizer {
                        let dsgn = hi.bool_diff(&lo);
                        self.maximization_stack.push((dd_var, dsgn.clone()));
                        if params.substitution_maximization {
                            // Craig-style: replace the accumulator by itself
                            // with `v` substituted by its own maximizing-sign
                            // diagram, instead of computing max(hi, lo)
                            // directly. Valid only for unweighted counting
                            // (the caller enforces that at config time).
                            let hi_full = acc.compose(dd_var, true);
                            let lo_full = acc.compose(dd_var, false);
                            substituted = Some(Dd::select(&dsgn, &hi_full, &lo_full));
                        }
                    }
                    substituted.unwrap_or_else(|| if additive { hi.sum(&lo) } else { hi.max(&lo) })
                }
            };

            if params.log_bound > f64::NEG_INFINITY && (!is_one(&pos_wt) || !is_one(&neg_wt)) {
                let pruned = acc.log_threshold(params.log_bound);
                acc = pruned;
            }
        }
        acc
    }

    /// Pops the maximizer stack LIFO, evaluating each stored derivative
    /// sign under the partial assignment accumulated so far, and returns
    /// the resulting full assignment over CNF variables (§4.G "Maximizer
    /// extraction").
    pub fn extract_maximizer(&mut self, declared_var_count: usize) -> Assignment {
        let mut dd_var_assignment: Vec<Option<bool>> = vec![None; self.dd_var_to_cnf_var.len()];
        let mut cnf_assignment = Assignment::new(declared_var_count);
        while let Some((dd_var, dsgn)) = self.maximization_stack.pop() {
            let val = dsgn.eval_partial(&dd_var_assignment);
            dd_var_assignment[dd_var] = Some(val);
            cnf_assignment.set(self.dd_var_to_cnf_var[dd_var], val);
        }
        cnf_assignment
    }
}

fn is_one(n: &Number) -> bool {
    (n.to_f64() - 1.0).abs() < 1e-12
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnf::Clause;
    use crate::dd::manager::{DynOrder, Manager};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn manager(n: usize) -> ManagerHandle {
        Rc::new(RefCell::new(Manager::new(n, false, false, true, 0, 0, 1, 0, DynOrder::Off)))
    }

    fn unweighted_cnf() -> Cnf {
        // (x1 v x2): two models out of four full assignments satisfy it,
        // but with x1 projected as an inner existential var and x2 kept
        // outer, the count over x1 is "does some x1 satisfy it" per x2.
        let mut cnf = Cnf::new(0, false, false, true);
        let mut c = Clause::new(false);
        c.insert_literal(1);
        c.insert_literal(2);
        cnf.add_clause(c);
        cnf.set_apparent_vars();
        cnf.complete_literal_weights().unwrap();
        cnf
    }

    fn single_clause_tree() -> JoinTree {
        let cnf = unweighted_cnf();
        let mut tree = JoinTree::new(2, 1, 2);
        tree.install_terminals(&cnf);
        tree.add_nonterminal(1, vec![0], [1].into_iter().collect());
        tree
    }

    #[test]
    fn model_count_over_single_clause() {
        let cnf = unweighted_cnf();
        let tree = single_clause_tree();
        let m = manager(2);
        let map: HashMap<VarId, DdVar> = [(1, 0), (2, 1)].into_iter().collect();
        let rev = vec![1, 2];
        let mut exec = Executor::new(&cnf, &map, &rev, m, false, JoinPriority::Fcfs, false, None);
        let params = PruneMaxParams::default();
        let assignment = Assignment::new(2);
        let dd = exec.solve_subtree(&tree, 1, &params, &assignment);
        // x1 projected (existential, default weights 1/1): true whenever x1
        // or x2 holds, i.e. for every x2 there's a satisfying x1, so the
        // weighted sum over x1 is 2 regardless of x2 (x1=T always works,
        // contributes 1 to each branch, x1=F works only when x2=T).
        assert_eq!(dd.eval(&[true]), Number::parse("2", true).unwrap());
        assert_eq!(dd.eval(&[false]), Number::parse("1", true).unwrap());
    }
}
