//! Component I: a compact CDCL solver used to seed a safe initial log-bound
//! before the join-tree evaluator starts threshold-pruning (§4.H
//! "satSolverPruning"). Two-watched-literal BCP, first-UIP conflict
//! analysis and VSIDS-lite activity bumping, same idioms as the teacher's
//! assign/cdb modules, trimmed down to a single-purpose model finder: no
//! restarts, no clause deletion, no preprocessing. XOR clauses are expanded
//! at construction time into their plain-CNF ruling-out form rather than
//! solved natively.
use crate::cnf::Cnf;
use crate::types::{int2lit, Assignment, Lit, LiteralEncoding, VarId, VarIdEncoding};

#[derive(Clone, Copy, Debug)]
struct Watch {
    /// cached literal from the clause, known true or unassigned whenever
    /// the watch can be skipped without visiting the clause itself
    blocker: Lit,
    clause: usize,
}

/// A disposable CDCL instance over one CNF. `solve_once` finds a model;
/// `ban_model` adds a blocking clause so a later `solve_once` call finds a
/// different one, which lets the driver sample a few models and seed the
/// bound from whichever has the highest weight.
pub struct SatSeed {
    num_vars: usize,
    clauses: Vec<Vec<Lit>>,
    /// indexed by `Lit`: watchers woken when that literal is asserted true
    /// (i.e. when their watched literal, its negation, becomes false)
    watches: Vec<Vec<Watch>>,
    assign: Vec<Option<bool>>,
    level: Vec<i32>,
    reason: Vec<Option<usize>>,
    trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    q_head: usize,
    activity: Vec<f64>,
    var_inc: f64,
    var_decay: f64,
    polarity: Vec<bool>,
    /// set false the moment construction or solving proves the root level
    /// contradictory; once false every further call is a no-op `None`
    ok: bool,
}

impl SatSeed {
    pub fn from_cnf(cnf: &Cnf) -> Self {
        let num_vars = cnf.declared_var_count;
        let mut solver = SatSeed {
            num_vars,
            clauses: Vec::new(),
            watches: vec![Vec::new(); 2 * (num_vars + 1)],
            assign: vec![None; num_vars + 1],
            level: vec![0; num_vars + 1],
            reason: vec![None; num_vars + 1],
            trail: Vec::new(),
            trail_lim: Vec::new(),
            q_head: 0,
            activity: vec![0.0; num_vars + 1],
            var_inc: 1.0,
            var_decay: 0.95,
            polarity: vec![true; num_vars + 1],
            ok: true,
        };
        for clause in &cnf.clauses {
            if !solver.ok {
                break;
            }
            let literals: Vec<i64> = clause.literals.iter().copied().collect();
            if clause.xor_flag {
                for expanded in expand_xor(&literals) {
                    solver.add_initial_clause(expanded);
                    if !solver.ok {
                        break;
                    }
                }
            } else {
                solver.add_initial_clause(literals);
            }
        }
        solver
    }

    fn add_initial_clause(&mut self, int_lits: Vec<i64>) {
        if !self.ok {
            return;
        }
        let mut lits: Vec<Lit> = int_lits.iter().map(|&l| int2lit(l as i32)).collect();
        lits.sort_unstable();
        lits.dedup();
        for w in lits.windows(2) {
            if w[0].vi() == w[1].vi() {
                // both polarities present: tautology, trivially satisfied
                return;
            }
        }
        match lits.len() {
            0 => self.ok = false,
            1 => {
                if !self.enqueue(lits[0], None) {
                    self.ok = false;
                }
            }
            _ => {
                self.add_clause(lits);
            }
        }
    }

    fn add_clause(&mut self, lits: Vec<Lit>) -> usize {
        let idx = self.clauses.len();
        self.watches[lits[0].negate() as usize].push(Watch { blocker: lits[1], clause: idx });
        self.watches[lits[1].negate() as usize].push(Watch { blocker: lits[0], clause: idx });
        self.clauses.push(lits);
        idx
    }

    fn value(&self, lit: Lit) -> Option<bool> {
        self.assign[lit.vi()].map(|a| a == lit.positive())
    }

    fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }

    fn enqueue(&mut self, lit: Lit, reason: Option<usize>) -> bool {
        match self.value(lit) {
            Some(val) => val,
            None => {
                let v = lit.vi();
                self.assign[v] = Some(lit.positive());
                self.level[v] = self.decision_level() as i32;
                self.reason[v] = reason;
                self.trail.push(lit);
                true
            }
        }
    }

    fn propagate(&mut self) -> Option<usize> {
        while self.q_head < self.trail.len() {
            let p = self.trail[self.q_head];
            self.q_head += 1;
            let false_lit = p.negate();
            let idx = p as usize;
            let old = std::mem::take(&mut self.watches[idx]);
            let mut new_list = Vec::with_capacity(old.len());
            let mut conflict = None;
            let mut it = old.into_iter();
            for w in it.by_ref() {
                if conflict.is_some() {
                    new_list.push(w);
                    continue;
                }
                if self.value(w.blocker) == Some(true) {
                    new_list.push(w);
                    continue;
                }
                let cref = w.clause;
                if self.clauses[cref][0] == false_lit {
                    self.clauses[cref].swap(0, 1);
                }
                let other = self.clauses[cref][0];
                if other != w.blocker && self.value(other) == Some(true) {
                    new_list.push(Watch { blocker: other, clause: cref });
                    continue;
                }
                let mut moved = false;
                for k in 2..self.clauses[cref].len() {
                    let lk = self.clauses[cref][k];
                    if self.value(lk) != Some(false) {
                        self.clauses[cref].swap(1, k);
                        let new_watch_key = self.clauses[cref][1].negate() as usize;
                        self.watches[new_watch_key].push(Watch { blocker: other, clause: cref });
                        moved = true;
                        break;
                    }
                }
                if moved {
                    continue;
                }
                new_list.push(Watch { blocker: other, clause: cref });
                if self.value(other) == Some(false) {
                    conflict = Some(cref);
                } else if !self.enqueue(other, Some(cref)) {
                    conflict = Some(cref);
                }
            }
            new_list.extend(it);
            self.watches[idx] = new_list;
            if let Some(c) = conflict {
                return Some(c);
            }
        }
        None
    }

    /// First-UIP analysis. Returns the learnt (asserting) clause, literal 0
    /// being the UIP, and the level to backtrack to.
    fn analyze(&mut self, confl: usize) -> (Vec<Lit>, usize) {
        let mut seen = vec![false; self.num_vars + 1];
        let mut learnt: Vec<Lit> = vec![0];
        let mut counter = 0usize;
        let mut p: Option<Lit> = None;
        let mut confl = confl;
        let mut idx = self.trail.len();
        loop {
            let clause = self.clauses[confl].clone();
            let start = if p.is_some() { 1 } else { 0 };
            for &q in &clause[start..] {
                let v = q.vi();
                if !seen[v] && self.level[v] > 0 {
                    seen[v] = true;
                    self.bump_activity(v);
                    if self.level[v] as usize == self.decision_level() {
                        counter += 1;
                    } else {
                        learnt.push(q);
                    }
                }
            }
            loop {
                idx -= 1;
                if seen[self.trail[idx].vi()] {
                    break;
                }
            }
            let pvar = self.trail[idx].vi();
            seen[pvar] = false;
            counter -= 1;
            p = Some(self.trail[idx]);
            if counter == 0 {
                break;
            }
            confl = self.reason[pvar].expect("current-level var with counter remaining must have a reason");
        }
        learnt[0] = p.expect("loop runs at least once").negate();
        let btlevel = learnt[1..].iter().map(|&l| self.level[l.vi()] as usize).max().unwrap_or(0);
        (learnt, btlevel)
    }

    fn cancel_until(&mut self, level: usize) {
        if self.decision_level() > level {
            for i in (self.trail_lim[level]..self.trail.len()).rev() {
                let v = self.trail[i].vi();
                self.polarity[v] = self.assign[v].expect("trail entries are assigned");
                self.assign[v] = None;
                self.reason[v] = None;
            }
            self.q_head = self.trail_lim[level];
            self.trail.truncate(self.trail_lim[level]);
            self.trail_lim.truncate(level);
        }
    }

    fn bump_activity(&mut self, v: VarId) {
        self.activity[v] += self.var_inc;
        if self.activity[v] > 1e100 {
            for a in self.activity.iter_mut() {
                *a *= 1e-100;
            }
            self.var_inc *= 1e-100;
        }
    }

    fn decay_activity(&mut self) {
        self.var_inc /= self.var_decay;
    }

    fn pick_branch_var(&self) -> Option<VarId> {
        (1..=self.num_vars)
            .filter(|&v| self.assign[v].is_none())
            .max_by(|&a, &b| self.activity[a].partial_cmp(&self.activity[b]).unwrap())
    }

    /// Finds one satisfying assignment, or `None` if the formula (as
    /// amended by prior `ban_model` calls) is unsatisfiable.
    pub fn solve_once(&mut self) -> Option<Assignment> {
        if !self.ok {
            return None;
        }
        loop {
            if let Some(confl) = self.propagate() {
                if self.decision_level() == 0 {
                    self.ok = false;
                    return None;
                }
                let (learnt, btlevel) = self.analyze(confl);
                self.cancel_until(btlevel);
                if learnt.len() == 1 {
                    self.enqueue(learnt[0], None);
                } else {
                    let cref = self.add_clause(learnt.clone());
                    self.enqueue(learnt[0], Some(cref));
                }
                self.decay_activity();
            } else {
                match self.pick_branch_var() {
                    None => return Some(self.extract_assignment()),
                    Some(v) => {
                        let lit = v.lit(self.polarity[v]);
                        self.trail_lim.push(self.trail.len());
                        self.enqueue(lit, None);
                    }
                }
            }
        }
    }

    fn extract_assignment(&self) -> Assignment {
        let mut a = Assignment::new(self.num_vars);
        for v in 1..=self.num_vars {
            if let Some(val) = self.assign[v] {
                a.set(v, val);
            }
        }
        a
    }

    /// Adds a clause ruling out `model` and backtracks to the root,
    /// letting the next `solve_once` call find a different model.
    pub fn ban_model(&mut self, model: &Assignment) {
        self.cancel_until(0);
        if !self.ok {
            return;
        }
        let blocking: Vec<Lit> = (1..=self.num_vars).filter_map(|v| model.get(v).map(|val| v.lit(!val))).collect();
        match blocking.len() {
            0 => self.ok = false,
            1 => {
                if !self.enqueue(blocking[0], None) {
                    self.ok = false;
                }
            }
            _ => {
                self.add_clause(blocking);
            }
        }
    }
}

/// Expands one XOR clause into the `2^(k-1)` plain clauses that rule out
/// every assignment giving it an even (unsatisfying) parity, without
/// introducing auxiliary variables. `lits` carries each literal's DIMACS
/// sign; a literal is "satisfied" when the variable's value matches that
/// sign, and the clause holds when an odd number of literals are satisfied.
fn expand_xor(lits: &[i64]) -> Vec<Vec<i64>> {
    let k = lits.len();
    if k == 0 {
        return vec![Vec::new()];
    }
    let mut clauses = Vec::with_capacity(1 << (k - 1));
    for pattern in 0..(1usize << (k - 1)) {
        let mut parity = false;
        let mut clause = Vec::with_capacity(k);
        for (i, &lit) in lits.iter().enumerate().take(k - 1) {
            let b = (pattern >> i) & 1 == 1;
            parity ^= b;
            clause.push(if b { -lit } else { lit });
        }
        let last = lits[k - 1];
        clause.push(if parity { -last } else { last });
        clauses.push(clause);
    }
    clauses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnf::Clause;

    fn cnf_from_clauses(n: usize, clauses: Vec<(Vec<i64>, bool)>) -> Cnf {
        let mut cnf = Cnf::new(1, false, false, true);
        cnf.declared_var_count = n;
        for (lits, xor) in clauses {
            let mut c = Clause::new(xor);
            for l in lits {
                c.insert_literal(l);
            }
            cnf.add_clause(c);
        }
        cnf.set_apparent_vars();
        cnf
    }

    #[test]
    fn finds_model_for_simple_disjunction() {
        let cnf = cnf_from_clauses(2, vec![(vec![1, 2], false)]);
        let mut solver = SatSeed::from_cnf(&cnf);
        let model = solver.solve_once().expect("satisfiable");
        assert!(model.get(1) == Some(true) || model.get(2) == Some(true));
    }

    #[test]
    fn conflicting_units_are_unsat() {
        let cnf = cnf_from_clauses(1, vec![(vec![1], false), (vec![-1], false)]);
        let mut solver = SatSeed::from_cnf(&cnf);
        assert!(solver.solve_once().is_none());
    }

    #[test]
    fn unit_xor_clause_forces_true() {
        let cnf = cnf_from_clauses(1, vec![(vec![1], true)]);
        let mut solver = SatSeed::from_cnf(&cnf);
        let model = solver.solve_once().expect("satisfiable");
        assert_eq!(model.get(1), Some(true));
    }

    #[test]
    fn two_var_xor_requires_exactly_one() {
        let cnf = cnf_from_clauses(2, vec![(vec![1, 2], true)]);
        let mut solver = SatSeed::from_cnf(&cnf);
        let model = solver.solve_once().expect("satisfiable");
        assert_ne!(model.get(1), model.get(2));
    }

    #[test]
    fn ban_model_finds_a_distinct_model() {
        let cnf = cnf_from_clauses(2, vec![(vec![1, 2], false)]);
        let mut solver = SatSeed::from_cnf(&cnf);
        let first = solver.solve_once().expect("satisfiable");
        solver.ban_model(&first);
        let second = solver.solve_once().expect("a second model exists");
        assert_ne!(first, second);
    }

    #[test]
    fn exhausting_all_models_reports_unsat() {
        // exactly three models satisfy (x1 v x2); the fourth call must fail.
        let cnf = cnf_from_clauses(2, vec![(vec![1, 2], false)]);
        let mut solver = SatSeed::from_cnf(&cnf);
        let mut seen = Vec::new();
        for _ in 0..3 {
            let m = solver.solve_once().expect("model remains");
            solver.ban_model(&m);
            seen.push(m);
        }
        assert!(solver.solve_once().is_none());
        assert_eq!(seen.len(), 3);
    }
}
