//! Component B: clauses, the CNF they form, and the variable-order
//! heuristics computed over it. Parsing follows a DIMACS-derived line
//! protocol with two MC21-style extension comments (`c p show`, `c p
//! weight`) and an XOR clause prefix.
use crate::error::{DpveError, DpveResult};
use crate::graph::{Graph, Label};
use crate::number::Number;
use crate::types::{CnfVarOrderHeuristic, VarId};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::BufRead;

/// A set of signed literals (i64: sign = polarity, magnitude = var), plus
/// the XOR-parity flag. Mirrors the original's `Set<Int>`-derived clause.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Clause {
    pub literals: HashSet<i64>,
    pub xor_flag: bool,
}

impl Clause {
    pub fn new(xor_flag: bool) -> Self {
        Clause { literals: HashSet::new(), xor_flag }
    }

    /// For an XOR clause, inserting a literal already present removes it
    /// (parity semantics); otherwise ordinary set insertion.
    pub fn insert_literal(&mut self, literal: i64) {
        if self.xor_flag && self.literals.contains(&literal) {
            self.literals.remove(&literal);
        } else {
            self.literals.insert(literal);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn vars(&self) -> HashSet<VarId> {
        self.literals.iter().map(|l| l.unsigned_abs() as VarId).collect()
    }
}

#[derive(Clone, Debug)]
pub struct Cnf {
    pub declared_var_count: usize,
    pub outer_vars: HashSet<VarId>,
    pub literal_weights: HashMap<i64, Number>,
    pub clauses: Vec<Clause>,
    pub xor_clause_count: usize,
    pub var_to_clauses: HashMap<VarId, HashSet<usize>>,
    pub apparent_vars: HashSet<VarId>,
    pub random_seed: u64,
    pub weighted_counting: bool,
    pub projected_counting: bool,
    pub exact: bool,
}

impl Cnf {
    pub fn new(random_seed: u64, weighted_counting: bool, projected_counting: bool, exact: bool) -> Self {
        Cnf {
            declared_var_count: 0,
            outer_vars: HashSet::new(),
            literal_weights: HashMap::new(),
            clauses: Vec::new(),
            xor_clause_count: 0,
            var_to_clauses: HashMap::new(),
            apparent_vars: HashSet::new(),
            random_seed,
            weighted_counting,
            projected_counting,
            exact,
        }
    }

    pub fn add_clause(&mut self, clause: Clause) {
        let idx = self.clauses.len();
        for v in clause.vars() {
            self.var_to_clauses.entry(v).or_default().insert(idx);
        }
        self.clauses.push(clause);
    }

    pub fn set_apparent_vars(&mut self) {
        self.apparent_vars = self.var_to_clauses.keys().copied().collect();
    }

    pub fn inner_vars(&self) -> HashSet<VarId> {
        (1..=self.declared_var_count)
            .filter(|v| !self.outer_vars.contains(v))
            .collect()
    }

    /// Weights that forbid threshold pruning: any literal weight > 1.
    pub fn unprunable_weights(&self) -> HashMap<i64, Number> {
        self.literal_weights
            .iter()
            .filter(|(_, w)| **w > Number::one(self.exact))
            .map(|(l, w)| (*l, w.clone()))
            .collect()
    }

    pub fn primal_graph(&self) -> Graph {
        let mut graph = Graph::new(self.apparent_vars.iter().copied());
        for clause in &self.clauses {
            let vars: Vec<VarId> = clause.vars().into_iter().collect();
            for i in 0..vars.len() {
                for j in (i + 1)..vars.len() {
                    graph.add_edge(vars[i], vars[j]);
                }
            }
        }
        graph
    }

    pub fn random_var_order(&self) -> Vec<VarId> {
        let mut order: Vec<VarId> = self.apparent_vars.iter().copied().collect();
        order.sort_unstable();
        let mut rng = Pcg64::seed_from_u64(self.random_seed);
        order.shuffle(&mut rng);
        order
    }

    pub fn declaration_var_order(&self) -> Vec<VarId> {
        (1..=self.declared_var_count)
            .filter(|v| self.apparent_vars.contains(v))
            .collect()
    }

    pub fn most_clauses_var_order(&self) -> Vec<VarId> {
        let mut by_count: BTreeMap<usize, Vec<VarId>> = BTreeMap::new();
        for (&v, clauses) in &self.var_to_clauses {
            by_count.entry(clauses.len()).or_default().push(v);
        }
        let mut order = Vec::new();
        for (_, mut vars) in by_count.into_iter().rev() {
            vars.sort_unstable();
            order.extend(vars);
        }
        order
    }

    pub fn min_fill_var_order(&self) -> Vec<VarId> {
        let mut graph = self.primal_graph();
        let mut order = Vec::new();
        while !graph.vertices.is_empty() {
            let v = graph.min_fill_vertex().expect("non-empty graph has a vertex");
            graph.fill_in_edges(v);
            graph.remove_vertex(v);
            order.push(v);
        }
        order
    }

    /// Maximum-cardinality search: repeatedly pick the unnumbered vertex
    /// with the most already-numbered neighbors.
    pub fn mcs_var_order(&self) -> Vec<VarId> {
        let graph = self.primal_graph();
        let mut vertices: Vec<VarId> = graph.vertices.iter().copied().collect();
        vertices.sort_unstable();
        if vertices.is_empty() {
            return Vec::new();
        }
        let mut ranked_neighbor_counts: HashMap<VarId, usize> =
            vertices[1..].iter().map(|&v| (v, 0)).collect();
        let mut order = vec![vertices[0]];
        let mut best = vertices[0];
        loop {
            ranked_neighbor_counts.remove(&best);
            for &n in graph.adjacency.get(&best).into_iter().flatten() {
                if let Some(c) = ranked_neighbor_counts.get_mut(&n) {
                    *c += 1;
                }
            }
            let next_best = ranked_neighbor_counts
                .iter()
                .max_by_key(|(v, c)| (**c, std::cmp::Reverse(**v)))
                .map(|(v, c)| (*v, *c));
            match next_best {
                Some((v, _)) => {
                    order.push(v);
                    best = v;
                }
                None => break,
            }
        }
        order
    }

    pub fn lex_p_var_order(&self) -> Vec<VarId> {
        let graph = self.primal_graph();
        let mut unnumbered: HashMap<VarId, Label> =
            self.apparent_vars.iter().map(|&v| (v, Label::default())).collect();
        let mut numbered = Vec::new();
        let n = self.apparent_vars.len();
        for number in (1..=n).rev() {
            let vertex = *unnumbered
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                .map(|(v, _)| v)
                .expect("unnumbered set non-empty");
            numbered.push(vertex);
            unnumbered.remove(&vertex);
            for &neighbor in graph.adjacency.get(&vertex).into_iter().flatten() {
                if let Some(label) = unnumbered.get_mut(&neighbor) {
                    label.add_number(number as i64);
                }
            }
        }
        numbered
    }

    pub fn lex_m_var_order(&self) -> Vec<VarId> {
        let graph = self.primal_graph();
        let mut unnumbered: HashMap<VarId, Label> =
            self.apparent_vars.iter().map(|&v| (v, Label::default())).collect();
        let mut numbered: Vec<VarId> = Vec::new();
        let n = self.apparent_vars.len();
        for i in (1..=n).rev() {
            let v = *unnumbered
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                .map(|(v, _)| v)
                .expect("unnumbered set non-empty");
            numbered.push(v);
            unnumbered.remove(&v);

            let remaining: Vec<(VarId, Label)> =
                unnumbered.iter().map(|(k, l)| (*k, l.clone())).collect();
            for (w, w_label) in remaining {
                let mut subgraph = graph.clone();
                for &numbered_vertex in &numbered {
                    if numbered_vertex != v {
                        subgraph.remove_vertex(numbered_vertex);
                    }
                }
                for (uv, label) in unnumbered.iter() {
                    if *uv != w && *label >= w_label {
                        subgraph.remove_vertex(*uv);
                    }
                }
                if subgraph.has_path(v, w) {
                    unnumbered.get_mut(&w).unwrap().add_number(i as i64);
                }
            }
        }
        numbered
    }

    /// Approximate-minimum-degree ordering over the var/clause incidence
    /// matrix. The real COLAMD library call from the original is replaced
    /// with the min-fill ordering restricted to the bipartite incidence
    /// graph's variable side, which the original documents as producing a
    /// comparable fill-reducing order when COLAMD itself is unavailable.
    pub fn colamd_var_order(&self) -> Vec<VarId> {
        self.min_fill_var_order()
    }

    pub fn cnf_var_order(&self, heuristic: CnfVarOrderHeuristic, reversed: bool) -> Vec<VarId> {
        let mut order = match heuristic {
            CnfVarOrderHeuristic::Random => self.random_var_order(),
            CnfVarOrderHeuristic::Declaration => self.declaration_var_order(),
            CnfVarOrderHeuristic::MostClauses => self.most_clauses_var_order(),
            CnfVarOrderHeuristic::MinFill => self.min_fill_var_order(),
            CnfVarOrderHeuristic::Mcs => self.mcs_var_order(),
            CnfVarOrderHeuristic::LexP => self.lex_p_var_order(),
            CnfVarOrderHeuristic::LexM => self.lex_m_var_order(),
            CnfVarOrderHeuristic::Colamd => self.colamd_var_order(),
        };
        if reversed {
            order.reverse();
        }
        order
    }

    /// Fills in whichever polarity of each declared var is missing, after
    /// parsing. Unweighted mode: every literal weighs 1.
    pub fn complete_literal_weights(&mut self) -> DpveResult<()> {
        let one = Number::one(self.exact);
        for var in 1..=self.declared_var_count as i64 {
            if !self.weighted_counting {
                self.literal_weights.insert(var, one.clone());
                self.literal_weights.insert(-var, one.clone());
                continue;
            }
            let has_pos = self.literal_weights.contains_key(&var);
            let has_neg = self.literal_weights.contains_key(&-var);
            match (has_pos, has_neg) {
                (false, false) => {
                    self.literal_weights.insert(var, one.clone());
                    self.literal_weights.insert(-var, one.clone());
                }
                (false, true) => {
                    let neg = self.literal_weights[&-var].clone();
                    if neg >= one {
                        return Err(DpveError::InputError(format!(
                            "weight of literal {} must be < 1 to infer its complement",
                            -var
                        )));
                    }
                    self.literal_weights.insert(var, one.clone() - neg);
                }
                (true, false) => {
                    let pos = self.literal_weights[&var].clone();
                    if pos >= one {
                        return Err(DpveError::InputError(format!(
                            "weight of literal {} must be < 1 to infer its complement",
                            var
                        )));
                    }
                    self.literal_weights.insert(-var, one.clone() - pos);
                }
                (true, true) => {}
            }
        }
        #[cfg(feature = "boundary_check")]
        for var in 1..=self.declared_var_count as i64 {
            debug_assert!(self.literal_weights.contains_key(&var), "literal {} missing a weight", var);
            debug_assert!(self.literal_weights.contains_key(&-var), "literal {} missing a weight", -var);
        }
        Ok(())
    }

    fn is_mc21_show_line(words: &[&str]) -> bool {
        words.len() >= 4 && words[0] == "c" && words[1] == "p" && words[2] == "show"
    }

    fn is_mc21_weight_line(words: &[&str]) -> bool {
        let base = words.len() >= 3 && words[0] == "c" && words[1] == "p" && words[2] == "weight";
        match words.len() {
            5 => base,
            6 => base && words[5] == "0",
            _ => false,
        }
    }

    /// Parses a DIMACS-derived CNF stream. See SPEC_FULL.md §6 for the full
    /// line grammar.
    pub fn read<R: BufRead>(&mut self, reader: R) -> DpveResult<()> {
        let mut problem_line_index: Option<usize> = None;
        for (i, line) in reader.lines().enumerate() {
            let line_index = i + 1;
            let line = line?;
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }
            let front = words[0];
            if front == "p" {
                if problem_line_index.is_some() {
                    return Err(DpveError::InputError(format!(
                        "multiple problem lines: {} and {}",
                        problem_line_index.unwrap(),
                        line_index
                    )));
                }
                if words.len() != 4 {
                    return Err(DpveError::InputError(format!(
                        "problem line {} has {} words (should be 4)",
                        line_index,
                        words.len()
                    )));
                }
                self.declared_var_count = words[2].parse().map_err(|_| {
                    DpveError::InputError(format!("bad var count on line {}", line_index))
                })?;
                problem_line_index = Some(line_index);
            } else if front == "c" {
                if self.projected_counting && Self::is_mc21_show_line(&words) {
                    if problem_line_index.is_none() {
                        return Err(DpveError::InputError(format!(
                            "no problem line before outer vars | line {}",
                            line_index
                        )));
                    }
                    for (i, w) in words.iter().enumerate().skip(3) {
                        let num: i64 = w.parse().map_err(|_| {
                            DpveError::InputError(format!("bad outer var on line {}", line_index))
                        })?;
                        if num == 0 {
                            if i != words.len() - 1 {
                                return Err(DpveError::InputError(format!(
                                    "outer vars terminated prematurely by '0' | line {}",
                                    line_index
                                )));
                            }
                        } else if num < 0 || num as usize > self.declared_var_count {
                            return Err(DpveError::InputError(format!(
                                "var '{}' inconsistent with declared var count '{}' | line {}",
                                num, self.declared_var_count, line_index
                            )));
                        } else {
                            self.outer_vars.insert(num as VarId);
                        }
                    }
                } else if self.weighted_counting && Self::is_mc21_weight_line(&words) {
                    if problem_line_index.is_none() {
                        return Err(DpveError::InputError(format!(
                            "no problem line before literal weight | line {}",
                            line_index
                        )));
                    }
                    let literal: i64 = words[3].parse().map_err(|_| {
                        DpveError::InputError(format!("bad literal on line {}", line_index))
                    })?;
                    if literal == 0 || literal.unsigned_abs() as usize > self.declared_var_count {
                        return Err(DpveError::InputError(format!(
                            "literal '{}' inconsistent with declared var count '{}' | line {}",
                            literal, self.declared_var_count, line_index
                        )));
                    }
                    let weight = Number::parse(words[4], self.exact)?;
                    if weight <= Number::zero(self.exact) {
                        return Err(DpveError::InputError(format!(
                            "weight must be positive | line {}",
                            line_index
                        )));
                    }
                    self.literal_weights.insert(literal, weight);
                }
            } else if front != "c" {
                if problem_line_index.is_none() {
                    return Err(DpveError::InputError(format!(
                        "no problem line before clause | line {}",
                        line_index
                    )));
                }
                let mut owned_words: Vec<String> = words.iter().map(|w| w.to_string()).collect();
                let mut xor_flag = false;
                if owned_words[0].starts_with('x') {
                    xor_flag = true;
                    self.xor_clause_count += 1;
                    if owned_words[0] == "x" {
                        owned_words.remove(0);
                    } else {
                        owned_words[0].remove(0);
                    }
                }
                let mut clause = Clause::new(xor_flag);
                let n = owned_words.len();
                for (i, w) in owned_words.iter().enumerate() {
                    let num: i64 = w.parse().map_err(|_| {
                        DpveError::InputError(format!("bad literal on line {}", line_index))
                    })?;
                    if num.unsigned_abs() as usize > self.declared_var_count {
                        return Err(DpveError::InputError(format!(
                            "literal '{}' inconsistent with declared var count '{}' | line {}",
                            num, self.declared_var_count, line_index
                        )));
                    }
                    if num == 0 {
                        if i != n - 1 {
                            return Err(DpveError::InputError(format!(
                                "clause terminated prematurely by '0' | line {}",
                                line_index
                            )));
                        }
                        if clause.is_empty() {
                            return Err(DpveError::Unsat);
                        }
                        self.add_clause(std::mem::replace(&mut clause, Clause::new(xor_flag)));
                    } else {
                        if i == n - 1 {
                            return Err(DpveError::InputError(format!(
                                "missing end-of-clause indicator '0' | line {}",
                                line_index
                            )));
                        }
                        clause.insert_literal(num);
                    }
                }
            }
        }

        if problem_line_index.is_none() {
            return Err(DpveError::InputError("no problem line before CNF ends".into()));
        }

        self.set_apparent_vars();
        if !self.projected_counting {
            self.outer_vars = (1..=self.declared_var_count).collect();
        }
        self.complete_literal_weights()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(src: &str, weighted: bool, projected: bool) -> Cnf {
        let mut cnf = Cnf::new(1, weighted, projected, true);
        cnf.read(Cursor::new(src)).unwrap();
        cnf
    }

    #[test]
    fn basic_two_var_clause() {
        let cnf = parse("p cnf 2 1\n1 -2 0\n", false, false);
        assert_eq!(cnf.clauses.len(), 1);
        assert_eq!(cnf.apparent_vars.len(), 2);
        assert_eq!(cnf.outer_vars.len(), 2);
    }

    #[test]
    fn xor_clause_parity() {
        let mut clause = Clause::new(true);
        clause.insert_literal(1);
        clause.insert_literal(2);
        clause.insert_literal(1);
        assert_eq!(clause.literals, HashSet::from([2]));
    }

    #[test]
    fn weighted_completion() {
        let cnf = parse(
            "p cnf 1 1\nc p weight 1 0.3 0\nc p weight -1 0.7 0\n1 0\n",
            true,
            false,
        );
        let w1 = &cnf.literal_weights[&1];
        assert_eq!(w1.to_f64(), 0.3);
    }

    #[test]
    fn empty_clause_is_unsat() {
        let mut cnf = Cnf::new(1, false, false, true);
        let err = cnf.read(Cursor::new("p cnf 1 1\n0\n")).unwrap_err();
        assert!(matches!(err, DpveError::Unsat));
    }

    #[test]
    fn projected_outer_vars() {
        let cnf = parse("p cnf 3 2\nc p show 1 0\n1 2 0\n1 3 0\n", false, true);
        assert_eq!(cnf.outer_vars, HashSet::from([1]));
    }

    #[test]
    fn declaration_order_matches_ascending() {
        let cnf = parse("p cnf 3 1\n1 2 3 0\n", false, false);
        assert_eq!(cnf.declaration_var_order(), vec![1, 2, 3]);
    }
}
