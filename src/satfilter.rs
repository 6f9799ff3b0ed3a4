//! Component F: the two-pass SAT filter. Builds one BDD per join node
//! bottom-up (each node's pre-abstraction conjunction, stashed for the
//! second pass) then pushes satisfying contexts from the root back down,
//! pruning subtrees that can no longer reach an unsatisfied clause.
use crate::cnf::Cnf;
use crate::dd::manager::DdVar;
use crate::dd::{Dd, ManagerHandle};
use crate::error::{DpveError, DpveResult};
use crate::join_priority;
use crate::jointree::{JoinNode, JoinTree};
use crate::types::{JoinPriority, VarId};
use std::collections::HashMap;

pub struct SatFilter<'a> {
    cnf: &'a Cnf,
    cnf_var_to_dd_var: &'a HashMap<VarId, DdVar>,
    manager: ManagerHandle,
    join_priority: JoinPriority,
    /// Per-node stored BDD, mirroring the original's `void* dd` field on
    /// `JoinNode` as an out-of-band arena (see DESIGN.md).
    node_dds: Vec<Option<Dd>>,
}

impl<'a> SatFilter<'a> {
    pub fn new(
        cnf: &'a Cnf,
        cnf_var_to_dd_var: &'a HashMap<VarId, DdVar>,
        manager: ManagerHandle,
        join_priority: JoinPriority,
        node_count: usize,
    ) -> Self {
        SatFilter { cnf, cnf_var_to_dd_var, manager, join_priority, node_dds: vec![None; node_count] }
    }

    fn clause_bdd(&self, clause_index: usize) -> Dd {
        let clause = &self.cnf.clauses[clause_index];
        let mut acc = Dd::bdd_zero(&self.manager);
        for &literal in &clause.literals {
            let var = literal.unsigned_abs() as VarId;
            let dd_var = self.cnf_var_to_dd_var[&var];
            let lit_dd = Dd::var_bdd(&self.manager, dd_var, literal > 0);
            acc = acc.bdd_or(&lit_dd);
        }
        acc
    }

    /// Upward build pass (§4.F step 1). Returns the node's projected BDD;
    /// side-effects `self.node_dds` with the pre-projection conjunction for
    /// nonterminals that do project, or `one` otherwise.
    pub fn solve_subtree(&mut self, tree: &JoinTree, node_index: usize) -> Dd {
        match tree.get_join_node(node_index) {
            JoinNode::Terminal(t) => {
                let d = self.clause_bdd(t.node_index);
                self.node_dds[node_index] = Some(Dd::bdd_one(&self.manager));
                d
            }
            JoinNode::Nonterminal(n) => {
                let children = n.children.clone();
                let projection_vars = n.projection_vars.clone();
                let child_dds: Vec<Dd> = children.iter().map(|&c| self.solve_subtree(tree, c)).collect();
                let seed = Dd::bdd_one(&self.manager);
                let prod = join_priority::fold(seed, child_dds, self.join_priority, |d| d.node_count(), |a, b| a.bdd_and(b));

                if !projection_vars.is_empty() {
                    self.node_dds[node_index] = Some(prod.clone());
                    let dd_vars: Vec<DdVar> = projection_vars.iter().map(|v| self.cnf_var_to_dd_var[v]).collect();
                    prod.bdd_exists(&dd_vars)
                } else {
                    self.node_dds[node_index] = Some(Dd::bdd_one(&self.manager));
                    prod
                }
            }
        }
    }

    /// Downward filter pass (§4.F step 2). Returns whether a not-yet-
    /// eliminated clause is reachable at or below `node_index`.
    pub fn filter_bdds(&mut self, tree: &JoinTree, node_index: usize, parent_bdd: &Dd) -> bool {
        let node = tree.get_join_node(node_index);
        let is_terminal = node.is_terminal();
        let has_projection = match node {
            JoinNode::Nonterminal(n) => !n.projection_vars.is_empty(),
            JoinNode::Terminal(_) => false,
        };

        let mut has_new_clause_descendants = is_terminal;
        let bottom_most;
        let effective_parent: Dd;

        if !has_projection {
            effective_parent = parent_bdd.clone();
            bottom_most = false;
        } else {
            let stored = self.node_dds[node_index].clone().expect("nonterminal with projection vars must have a stored dd");
            let filtered = filtered_bdd(&stored, parent_bdd);
            self.node_dds[node_index] = Some(filtered.clone());
            effective_parent = filtered;
            bottom_most = true;
            has_new_clause_descendants = false;
        }

        let children: Vec<usize> = match node {
            JoinNode::Nonterminal(n) => n.children.clone(),
            JoinNode::Terminal(_) => Vec::new(),
        };
        for child in children {
            has_new_clause_descendants |= self.filter_bdds(tree, child, &effective_parent);
        }

        if !(has_new_clause_descendants && bottom_most) {
            self.node_dds[node_index] = Some(Dd::bdd_one(&self.manager));
        }

        has_new_clause_descendants
    }

    /// Runs both passes over `tree` and returns the per-node stored BDDs,
    /// ready for the executor to read at satFilter-on terminals. Errs with
    /// `Unsat` if the root is unsatisfiable.
    pub fn run(mut self, tree: &JoinTree) -> DpveResult<Vec<Option<Dd>>> {
        let root_index = tree.declared_node_count - 1;
        let root_bdd = self.solve_subtree(tree, root_index);
        if !root_bdd.is_true() {
            return Err(DpveError::Unsat);
        }
        let one = Dd::bdd_one(&self.manager);
        self.filter_bdds(tree, root_index, &one);
        Ok(self.node_dds)
    }
}

/// `b | parent'`, where `parent' = parent` existentially abstracted over
/// the variables in `parent`'s support but not in `b`'s — the construction
/// that lets a deeper node's filtered BDD absorb everything its ancestors
/// already guarantee, without reintroducing variables it never mentioned.
fn filtered_bdd(b: &Dd, parent: &Dd) -> Dd {
    let b_support: std::collections::HashSet<DdVar> = b.support().into_iter().collect();
    let extra: Vec<DdVar> = parent.support().into_iter().filter(|v| !b_support.contains(v)).collect();
    let parent_restricted = parent.bdd_exists(&extra);
    b.bdd_or(&parent_restricted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnf::Clause;
    use crate::dd::manager::{DynOrder, Manager};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    fn manager(n: usize) -> ManagerHandle {
        Rc::new(RefCell::new(Manager::new(n, false, false, true, 0, 0, 1, 0, DynOrder::Off)))
    }

    fn two_clause_cnf() -> Cnf {
        // (x1 v x2) ^ (!x1 v x2): satisfiable (e.g. x2 = true).
        let mut cnf = Cnf::new(0, false, false, true);
        for (a, b) in [(1, 2), (-1, 2)] {
            let mut c = Clause::new(false);
            c.insert_literal(a);
            c.insert_literal(b);
            cnf.add_clause(c);
        }
        cnf.set_apparent_vars();
        cnf
    }

    fn unsat_cnf() -> Cnf {
        // x1 ^ !x1: unsatisfiable.
        let mut cnf = Cnf::new(0, false, false, true);
        for lit in [1, -1] {
            let mut c = Clause::new(false);
            c.insert_literal(lit);
            cnf.add_clause(c);
        }
        cnf.set_apparent_vars();
        cnf
    }

    fn two_clause_tree() -> JoinTree {
        let cnf = two_clause_cnf();
        let mut tree = JoinTree::new(2, 2, 3);
        tree.install_terminals(&cnf);
        tree.add_nonterminal(2, vec![0, 1], [1, 2].into_iter().collect());
        tree
    }

    #[test]
    fn satisfiable_tree_filters_without_error() {
        let cnf = two_clause_cnf();
        let m = manager(2);
        let map: HashMap<VarId, DdVar> = [(1, 0), (2, 1)].into_iter().collect();
        let tree = two_clause_tree();
        let filter = SatFilter::new(&cnf, &map, m, JoinPriority::Fcfs, tree.nodes.len());
        let result = filter.run(&tree);
        assert!(result.is_ok());
    }

    #[test]
    fn unsat_tree_reports_unsat() {
        let cnf = unsat_cnf();
        let m = manager(1);
        let map: HashMap<VarId, DdVar> = [(1, 0)].into_iter().collect();
        let mut tree = JoinTree::new(1, 2, 3);
        tree.install_terminals(&cnf);
        tree.add_nonterminal(2, vec![0, 1], HashSet::new());
        let filter = SatFilter::new(&cnf, &map, m, JoinPriority::Fcfs, tree.nodes.len());
        let result = filter.run(&tree);
        assert!(matches!(result, Err(DpveError::Unsat)));
    }
}
