//! Component D: the join-tree model the executor walks bottom-up, plus the
//! variable-order heuristics computed directly over its shape (distinct
//! from the CNF-level heuristics in [`crate::cnf`]).
pub mod ingest;

use crate::cnf::Cnf;
use crate::graph::{Graph, Label};
use crate::types::{Assignment, TreeVarOrderHeuristic, VarId};
use std::collections::{HashSet, VecDeque};

/// A node in a join tree: either a terminal standing for one CNF clause, or
/// a nonterminal combining its children and projecting out a variable set.
/// Modeled as an enum rather than the original's class hierarchy — there is
/// no need for dynamic dispatch once `width` is a plain recursive function.
#[derive(Clone, Debug)]
pub enum JoinNode {
    Terminal(JoinTerminal),
    Nonterminal(JoinNonterminal),
}

#[derive(Clone, Debug)]
pub struct JoinTerminal {
    /// Equal to the clause's index into `Cnf::clauses`.
    pub node_index: usize,
    pub pre_projection_vars: HashSet<VarId>,
}

#[derive(Clone, Debug)]
pub struct JoinNonterminal {
    pub node_index: usize,
    pub children: Vec<usize>,
    pub projection_vars: HashSet<VarId>,
    pub pre_projection_vars: HashSet<VarId>,
}

impl JoinNode {
    pub fn node_index(&self) -> usize {
        match self {
            JoinNode::Terminal(t) => t.node_index,
            JoinNode::Nonterminal(n) => n.node_index,
        }
    }

    pub fn pre_projection_vars(&self) -> &HashSet<VarId> {
        match self {
            JoinNode::Terminal(t) => &t.pre_projection_vars,
            JoinNode::Nonterminal(n) => &n.pre_projection_vars,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JoinNode::Terminal(_))
    }

    /// Variables a nonterminal still exposes to its parent once its own
    /// projection set has been eliminated; empty (meaningless) for a
    /// terminal, which has no projection set of its own.
    pub fn post_projection_vars(&self) -> HashSet<VarId> {
        match self {
            JoinNode::Terminal(t) => t.pre_projection_vars.clone(),
            JoinNode::Nonterminal(n) => {
                n.pre_projection_vars.difference(&n.projection_vars).copied().collect()
            }
        }
    }
}

/// A rooted join tree: a problem header (declared counts) plus the node
/// arena, indexed 0..declaredNodeCount with clause terminals first.
#[derive(Clone, Debug)]
pub struct JoinTree {
    pub declared_var_count: usize,
    pub declared_clause_count: usize,
    pub declared_node_count: usize,
    pub nodes: Vec<Option<JoinNode>>,
    /// Width of this tree as last computed or reported by the planner.
    pub width: Option<usize>,
    pub planner_duration: f64,
}

impl JoinTree {
    pub fn new(declared_var_count: usize, declared_clause_count: usize, declared_node_count: usize) -> Self {
        JoinTree {
            declared_var_count,
            declared_clause_count,
            declared_node_count,
            nodes: vec![None; declared_node_count],
            width: None,
            planner_duration: 0.0,
        }
    }

    /// Populates the terminal slots from a CNF's clauses, one per clause in
    /// declaration order (0-indexed, matching clause index).
    pub fn install_terminals(&mut self, cnf: &Cnf) {
        for (i, clause) in cnf.clauses.iter().enumerate() {
            self.nodes[i] = Some(JoinNode::Terminal(JoinTerminal {
                node_index: i,
                pre_projection_vars: clause.vars(),
            }));
        }
    }

    pub fn get_join_node(&self, node_index: usize) -> &JoinNode {
        self.nodes[node_index].as_ref().expect("join node must be installed before lookup")
    }

    pub fn get_join_root(&self) -> &JoinNonterminal {
        match self.get_join_node(self.declared_node_count - 1) {
            JoinNode::Nonterminal(n) => n,
            JoinNode::Terminal(_) => panic!("root join node must be a nonterminal"),
        }
    }

    /// Inserts a nonterminal, computing its `preProjectionVars` as the union
    /// of its children's post-projection vars, and returns its index.
    pub fn add_nonterminal(
        &mut self,
        node_index: usize,
        children: Vec<usize>,
        projection_vars: HashSet<VarId>,
    ) {
        let mut pre_projection_vars = HashSet::new();
        for &child_idx in &children {
            pre_projection_vars.extend(self.get_join_node(child_idx).post_projection_vars());
        }
        #[cfg(feature = "boundary_check")]
        debug_assert!(
            projection_vars.is_subset(&pre_projection_vars),
            "node {} projects a variable none of its children carry",
            node_index
        );
        self.nodes[node_index] = Some(JoinNode::Nonterminal(JoinNonterminal {
            node_index,
            children,
            projection_vars,
            pre_projection_vars,
        }));
    }

    /// Width of the subtree rooted at `node_index` under a (possibly empty)
    /// assignment: the max, over every node in the subtree, of the size of
    /// that node's `preProjectionVars` minus the assigned variables.
    pub fn width_at(&self, node_index: usize, assignment: &Assignment) -> usize {
        let node = self.get_join_node(node_index);
        let unassigned = node
            .pre_projection_vars()
            .iter()
            .filter(|&&v| assignment.get(v).is_none())
            .count();
        match node {
            JoinNode::Terminal(_) => unassigned,
            JoinNode::Nonterminal(n) => {
                let children_max = n.children.iter().map(|&c| self.width_at(c, assignment)).max().unwrap_or(0);
                unassigned.max(children_max)
            }
        }
    }

    /// Width of the whole tree under the empty assignment, matching what
    /// the planner reports as `joinTreeWidth`.
    pub fn compute_width(&self) -> usize {
        self.width_at(self.declared_node_count - 1, &Assignment::new(self.declared_var_count))
    }

    fn for_each_nonterminal_bfs(&self, f: &mut impl FnMut(&JoinNonterminal)) {
        let mut queue = VecDeque::new();
        queue.push_back(self.get_join_root());
        while let Some(n) = queue.pop_front() {
            f(n);
            for &child_idx in &n.children {
                if let JoinNode::Nonterminal(child) = self.get_join_node(child_idx) {
                    queue.push_back(child);
                }
            }
        }
    }

    /// For each variable, the size of the largest `preProjectionVars` set
    /// containing it (over every node in the tree), vars then sorted
    /// descending by that size with ties broken by first-seen order.
    fn biggest_node_var_order(&self, cnf: &Cnf) -> Vec<VarId> {
        let mut var_sizes: std::collections::HashMap<VarId, usize> =
            cnf.apparent_vars.iter().map(|&v| (v, 0)).collect();
        for node in self.nodes.iter().flatten() {
            let size = node.pre_projection_vars().len();
            for &v in node.pre_projection_vars() {
                let entry = var_sizes.entry(v).or_insert(0);
                *entry = (*entry).max(size);
            }
        }
        let mut vars: Vec<VarId> = var_sizes.keys().copied().collect();
        vars.sort_by(|a, b| var_sizes[b].cmp(&var_sizes[a]).then(a.cmp(b)));
        vars
    }

    /// Breadth-first traversal from the root, emitting each nonterminal's
    /// projection vars in BFS order.
    fn highest_node_var_order(&self) -> Vec<VarId> {
        let mut order = Vec::new();
        self.for_each_nonterminal_bfs(&mut |n| {
            let mut vars: Vec<VarId> = n.projection_vars.iter().copied().collect();
            vars.sort_unstable();
            order.extend(vars);
        });
        order
    }

    /// For each nonterminal in BFS order, a LEX-P elimination ranking
    /// (maximum cardinality search with the tiebreaker below) over the
    /// primal subgraph induced by that node's as-yet-unprocessed
    /// `preProjectionVars`.
    fn lex_p_var_order(&self, cnf: &Cnf) -> Vec<VarId> {
        let full_primal_graph = cnf.primal_graph();
        let tiebreaker_order = cnf.most_clauses_var_order();
        let tiebreaker: std::collections::HashMap<VarId, usize> =
            tiebreaker_order.iter().enumerate().map(|(i, &v)| (v, i)).collect();

        let mut processed: HashSet<VarId> = HashSet::new();
        let mut order = Vec::new();
        self.for_each_nonterminal_bfs(&mut |n| {
            let ranking = lex_p_var_ranking(&full_primal_graph, &mut processed, &tiebreaker, &n.pre_projection_vars);
            order.extend(ranking);
        });
        order
    }

    /// Dispatches on the (possibly negated) tree heuristic; negation
    /// reverses the returned order.
    pub fn var_order(&self, heuristic: TreeVarOrderHeuristic, reversed: bool, cnf: &Cnf) -> Vec<VarId> {
        let mut order = match heuristic {
            TreeVarOrderHeuristic::BiggestNode => self.biggest_node_var_order(cnf),
            TreeVarOrderHeuristic::HighestNode => self.highest_node_var_order(),
            TreeVarOrderHeuristic::LexP => self.lex_p_var_order(cnf),
        };
        if reversed {
            order.reverse();
        }
        order
    }
}

/// Maximum-cardinality-search style numbering of `var_set`, restricted to
/// the primal subgraph it induces: repeatedly pick the unnumbered vertex
/// with the lexicographically largest label (ties broken by `tiebreaker`,
/// a most-clauses var order used as a fixed total order), number it, then
/// append the current round number to each of its unnumbered neighbors'
/// labels. Returns the picked vertices in pick order.
fn lex_p_var_ranking(
    full_primal_graph: &Graph,
    processed: &mut HashSet<VarId>,
    tiebreaker: &std::collections::HashMap<VarId, usize>,
    pre_projection_vars: &HashSet<VarId>,
) -> Vec<VarId> {
    let var_set: HashSet<VarId> = pre_projection_vars.difference(processed).copied().collect();
    let mut labels: std::collections::HashMap<VarId, Label> =
        var_set.iter().map(|&v| (v, Label::default())).collect();
    let cur_graph = full_primal_graph.project_onto(&var_set);

    let mut numbered = Vec::new();
    let mut remaining = var_set.clone();
    let mut number = var_set.len();
    while number > 0 {
        let vertex = *remaining
            .iter()
            .max_by(|&&a, &&b| {
                labels[&a].cmp(&labels[&b]).then_with(|| tiebreaker[&a].cmp(&tiebreaker[&b]))
            })
            .expect("remaining is non-empty while number > 0");
        numbered.push(vertex);
        remaining.remove(&vertex);
        labels.remove(&vertex);
        if let Some(neighbors) = cur_graph.adjacency.get(&vertex) {
            for &neighbor in neighbors {
                if let Some(label) = labels.get_mut(&neighbor) {
                    label.add_number(number as i64);
                }
            }
        }
        number -= 1;
    }

    processed.extend(var_set);
    numbered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnf::Clause;

    fn chain_cnf() -> Cnf {
        // (x1 v x2) ^ (x2 v x3) ^ (x3 v x1): a 3-cycle primal graph.
        let mut cnf = Cnf::new(0, false, false, true);
        for (a, b) in [(1, 2), (2, 3), (3, 1)] {
            let mut c = Clause::new(false);
            c.insert_literal(a);
            c.insert_literal(b);
            cnf.add_clause(c);
        }
        cnf.set_apparent_vars();
        cnf
    }

    fn chain_tree() -> JoinTree {
        let cnf = chain_cnf();
        // Left-deep tree: ((t0 join t1) join t2), eliminating nothing
        // until the root, which eliminates all three vars.
        let mut tree = JoinTree::new(3, 3, 5);
        tree.install_terminals(&cnf);
        tree.add_nonterminal(3, vec![0, 1], HashSet::new());
        tree.add_nonterminal(4, vec![3, 2], [1, 2, 3].into_iter().collect());
        tree
    }

    #[test]
    fn width_matches_largest_preprojection_set() {
        let tree = chain_tree();
        // node 3 (join of clauses 0,1) exposes all of {1,2,3}; that's the
        // widest node in the tree, under the empty assignment.
        assert_eq!(tree.compute_width(), 3);
    }

    #[test]
    fn highest_node_order_is_root_first() {
        let tree = chain_tree();
        let order = tree.highest_node_var_order();
        // root (node 4) projects {1,2,3}; node 3 projects nothing.
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn biggest_node_order_reversible() {
        let cnf = chain_cnf();
        let tree = chain_tree();
        let forward = tree.var_order(TreeVarOrderHeuristic::BiggestNode, false, &cnf);
        let backward = tree.var_order(TreeVarOrderHeuristic::BiggestNode, true, &cnf);
        let mut rev = backward.clone();
        rev.reverse();
        assert_eq!(forward, rev);
        assert_eq!(forward.len(), 3);
    }

    #[test]
    fn lex_p_order_covers_all_vars_once() {
        let cnf = chain_cnf();
        let tree = chain_tree();
        let mut order = tree.var_order(TreeVarOrderHeuristic::LexP, false, &cnf);
        order.sort_unstable();
        assert_eq!(order, vec![1, 2, 3]);
    }
}
