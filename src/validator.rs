//! Independent verification of a reported maximizer or model against the
//! CNF it came from, grounded on the teacher's own `ValidatorIF`
//! (`inject_assigmnent`/`validate`), adapted from the old per-solver
//! assignment-injection model to a plain `Assignment` check since this
//! crate has no incremental solver state to inject into.
use crate::cnf::{Clause, Cnf};
use crate::types::{Assignment, VarId};

fn clause_satisfied(clause: &Clause, assignment: &Assignment) -> bool {
    if clause.xor_flag {
        let mut parity = false;
        for &lit in &clause.literals {
            let var = lit.unsigned_abs() as VarId;
            let sign = lit > 0;
            if assignment.get(var) == Some(sign) {
                parity = !parity;
            }
        }
        parity
    } else {
        clause.literals.iter().any(|&lit| {
            let var = lit.unsigned_abs() as VarId;
            let sign = lit > 0;
            assignment.get(var) == Some(sign)
        })
    }
}

/// API for checking a reported model/maximizer against a CNF.
pub trait ValidatorIF {
    /// Returns the first clause violated by `assignment`, as its signed
    /// literals, or `None` if every clause is satisfied (`assignment` is a
    /// model of the formula, at least over the variables it covers).
    fn validate(&self, assignment: &Assignment) -> Option<Vec<i64>>;
}

impl ValidatorIF for Cnf {
    fn validate(&self, assignment: &Assignment) -> Option<Vec<i64>> {
        for clause in &self.clauses {
            if !clause_satisfied(clause, assignment) {
                let mut lits: Vec<i64> = clause.literals.iter().copied().collect();
                lits.sort_unstable();
                return Some(lits);
            }
        }
        None
    }
}

/// Pass/fail convenience wrapper for callers (`dpve`'s `--mv`, `dpve_verify`)
/// that don't need the violated clause itself.
pub fn validates(cnf: &Cnf, assignment: &Assignment) -> bool {
    cnf.validate(assignment).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_clause_cnf() -> Cnf {
        let mut cnf = Cnf::new(0, false, false, true);
        let mut c1 = Clause::new(false);
        c1.insert_literal(1);
        c1.insert_literal(2);
        cnf.add_clause(c1);
        let mut c2 = Clause::new(false);
        c2.insert_literal(-1);
        c2.insert_literal(3);
        cnf.add_clause(c2);
        cnf.set_apparent_vars();
        cnf
    }

    #[test]
    fn accepts_a_genuine_model() {
        let cnf = two_clause_cnf();
        let mut a = Assignment::new(3);
        a.set(1, true);
        a.set(2, false);
        a.set(3, true);
        assert!(validates(&cnf, &a));
        assert_eq!(cnf.validate(&a), None);
    }

    #[test]
    fn rejects_a_violated_clause() {
        let cnf = two_clause_cnf();
        let mut a = Assignment::new(3);
        a.set(1, true);
        a.set(2, false);
        a.set(3, false);
        assert!(!validates(&cnf, &a));
        let violated = cnf.validate(&a).unwrap();
        assert_eq!(violated, vec![-1, 3]);
    }

    #[test]
    fn xor_clause_checked_by_parity() {
        let mut cnf = Cnf::new(0, false, false, true);
        let mut c = Clause::new(true);
        c.insert_literal(1);
        c.insert_literal(2);
        cnf.add_clause(c);
        cnf.set_apparent_vars();

        let mut odd = Assignment::new(2);
        odd.set(1, true);
        odd.set(2, false);
        assert!(validates(&cnf, &odd));

        let mut even = Assignment::new(2);
        even.set(1, true);
        even.set(2, true);
        assert!(!validates(&cnf, &even));
    }
}
