//! Component C: the diagram facade. Wraps [`manager::Manager`] with a
//! uniform handle type covering both decision-diagram variants the
//! original wraps two backends (CUDD, Sylvan) to provide: boolean BDDs and
//! Number-leaved ADDs. A `Dd` is a cheap, cheaply-copyable handle into a
//! shared manager — equality and identity are by canonical node id.
pub mod manager;

use crate::number::Number;
use manager::{DdVar, Manager, NodeId};
use std::cell::RefCell;
use std::rc::Rc;

pub type ManagerHandle = Rc<RefCell<Manager>>;

/// Which of the two diagram kinds a handle refers to. Both share one
/// arena; the tag only changes which operations are legal (asserted, not
/// statically enforced — matching the original's runtime-asserted variant
/// dispatch, per DESIGN.md).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Repr {
    Bdd(NodeId),
    Add(NodeId),
}

#[derive(Clone)]
pub struct Dd {
    manager: ManagerHandle,
    repr: Repr,
}

impl PartialEq for Dd {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.manager, &other.manager) && self.repr == other.repr
    }
}

impl Dd {
    fn wrap_add(manager: &ManagerHandle, node: NodeId) -> Self {
        Dd { manager: manager.clone(), repr: Repr::Add(node) }
    }
    fn wrap_bdd(manager: &ManagerHandle, node: NodeId) -> Self {
        Dd { manager: manager.clone(), repr: Repr::Bdd(node) }
    }

    fn node(&self) -> NodeId {
        match self.repr {
            Repr::Bdd(n) | Repr::Add(n) => n,
        }
    }

    pub fn is_bdd(&self) -> bool {
        matches!(self.repr, Repr::Bdd(_))
    }

    // -- constants -----------------------------------------------------
    pub fn zero(manager: &ManagerHandle) -> Self {
        Dd::wrap_add(manager, manager.borrow().add_zero())
    }
    pub fn one(manager: &ManagerHandle) -> Self {
        Dd::wrap_add(manager, manager.borrow().add_one())
    }
    pub fn bdd_zero(manager: &ManagerHandle) -> Self {
        Dd::wrap_bdd(manager, manager.borrow().bdd_zero())
    }
    pub fn bdd_one(manager: &ManagerHandle) -> Self {
        Dd::wrap_bdd(manager, manager.borrow().bdd_one())
    }
    pub fn constant(manager: &ManagerHandle, value: Number) -> Self {
        let node = manager.borrow_mut().const_add(value);
        Dd::wrap_add(manager, node)
    }

    // -- variables -------------------------------------------------------
    pub fn var_add(manager: &ManagerHandle, v: DdVar, polarity: bool) -> Self {
        let node = manager.borrow_mut().var_add(v, polarity);
        Dd::wrap_add(manager, node)
    }
    pub fn var_bdd(manager: &ManagerHandle, v: DdVar, polarity: bool) -> Self {
        let node = manager.borrow_mut().var_bdd(v, polarity);
        Dd::wrap_bdd(manager, node)
    }

    // -- boolean ops (BDD) -------------------------------------------------
    pub fn bdd_and(&self, other: &Dd) -> Dd {
        let out = self.manager.borrow_mut().bdd_and(self.node(), other.node());
        Dd::wrap_bdd(&self.manager, out)
    }
    pub fn bdd_or(&self, other: &Dd) -> Dd {
        let out = self.manager.borrow_mut().bdd_or(self.node(), other.node());
        Dd::wrap_bdd(&self.manager, out)
    }
    pub fn bdd_not(&self) -> Dd {
        let out = self.manager.borrow_mut().bdd_not(self.node());
        Dd::wrap_bdd(&self.manager, out)
    }
    pub fn bdd_exists(&self, vars: &[DdVar]) -> Dd {
        let out = self.manager.borrow_mut().bdd_exists(self.node(), vars);
        Dd::wrap_bdd(&self.manager, out)
    }
    pub fn bdd_and_exists(&self, other: &Dd, vars: &[DdVar]) -> Dd {
        let out = self.manager.borrow_mut().bdd_and_exists(self.node(), other.node(), vars);
        Dd::wrap_bdd(&self.manager, out)
    }
    pub fn is_true(&self) -> bool {
        self.manager.borrow().is_bdd_true(self.node())
    }

    // -- algebraic ops (ADD) -----------------------------------------------
    pub fn product(&self, other: &Dd) -> Dd {
        let out = self.manager.borrow_mut().product(self.node(), other.node());
        Dd::wrap_add(&self.manager, out)
    }
    pub fn sum(&self, other: &Dd) -> Dd {
        let out = self.manager.borrow_mut().sum(self.node(), other.node());
        Dd::wrap_add(&self.manager, out)
    }
    pub fn max(&self, other: &Dd) -> Dd {
        let out = self.manager.borrow_mut().max(self.node(), other.node());
        Dd::wrap_add(&self.manager, out)
    }
    pub fn xor(&self, other: &Dd) -> Dd {
        let out = self.manager.borrow_mut().xor(self.node(), other.node());
        Dd::wrap_add(&self.manager, out)
    }
    pub fn bool_diff(&self, other: &Dd) -> Dd {
        let out = self.manager.borrow_mut().bool_diff(self.node(), other.node());
        Dd::wrap_add(&self.manager, out)
    }
    pub fn compose(&self, v: DdVar, value: bool) -> Dd {
        let out = self.manager.borrow_mut().restrict(self.node(), v, value);
        Dd { manager: self.manager.clone(), repr: match self.repr {
            Repr::Bdd(_) => Repr::Bdd(out),
            Repr::Add(_) => Repr::Add(out),
        } }
    }

    /// Converts a satisfied BDD to the corresponding 0/1 (or 0/-inf) ADD,
    /// remapping the two boolean constant leaves to their mode-specific
    /// ADD counterparts (§4.G).
    pub fn to_add(&self) -> Dd {
        debug_assert!(self.is_bdd());
        self.reinterpret_as_add()
    }

    fn reinterpret_as_add(&self) -> Dd {
        // A BDD built from var_bdd/and/or only ever bottoms out at the
        // manager's bdd_zero/bdd_one leaves; remap those two leaves to
        // add_zero/add_one (identity outside log mode) via a one-pass walk.
        let mut mgr = self.manager.borrow_mut();
        let remapped = mgr.remap_bdd_leaves_to_add(self.node());
        drop(mgr);
        Dd::wrap_add(&self.manager, remapped)
    }

    pub fn is_zero(&self) -> bool {
        let m = self.manager.borrow();
        match m.leaf_value(self.node()) {
            Some(n) => n.is_zero() || *n == Number::log_zero(),
            None => false,
        }
    }

    // -- abstraction --------------------------------------------------
    pub fn abstract_weighted_atomic(&self, vars: &[(DdVar, Number, Number, bool)]) -> Dd {
        let out = self.manager.borrow_mut().abstract_weighted_atomic(self.node(), vars);
        Dd::wrap_add(&self.manager, out)
    }

    pub fn log_threshold(&self, bound: f64) -> Dd {
        let out = self.manager.borrow_mut().log_threshold(self.node(), bound);
        Dd::wrap_add(&self.manager, out)
    }

    /// `if cond then then_branch else else_branch`, pointwise over Number
    /// leaves. See `Manager::select`.
    pub fn select(cond: &Dd, then_branch: &Dd, else_branch: &Dd) -> Dd {
        let out = cond
            .manager
            .borrow_mut()
            .select(cond.node(), then_branch.node(), else_branch.node());
        Dd::wrap_add(&cond.manager, out)
    }

    // -- evaluation / introspection ---------------------------------------
    pub fn eval(&self, ddvar_assignment: &[bool]) -> Number {
        self.manager.borrow().eval(self.node(), ddvar_assignment)
    }
    pub fn eval_partial(&self, ddvar_assignment: &[Option<bool>]) -> bool {
        self.manager.borrow().eval_partial(self.node(), ddvar_assignment)
    }
    pub fn extract_const(&self) -> Number {
        self.manager
            .borrow()
            .leaf_value(self.node())
            .cloned()
            .expect("extract_const called on a non-constant Dd")
    }
    pub fn support(&self) -> Vec<DdVar> {
        self.manager.borrow().support(self.node())
    }
    pub fn node_count(&self) -> usize {
        self.manager.borrow().node_count(self.node())
    }
    pub fn level_of(&self, v: DdVar) -> usize {
        self.manager.borrow().level_of(v)
    }

    pub fn maybe_reorder(&self, also: &[&Dd]) {
        let mut roots: Vec<NodeId> = vec![self.node()];
        roots.extend(also.iter().map(|d| d.node()));
        self.manager.borrow_mut().maybe_reorder(&roots);
    }
}

/// Lifts a literal weight (always parsed/stored in linear space, §4.B) into
/// a leaf matching the manager's counting mode: the weight itself in linear
/// mode, or its base-10 logarithm in log mode, so it combines correctly with
/// `var_add`'s `{0,-inf}`/`{0,1}` leaves under `product`/`sum`.
pub fn weight_const(manager: &ManagerHandle, weight: Number) -> Dd {
    if manager.borrow().log_counting {
        Dd::constant(manager, Number::Float(weight.log10()))
    } else {
        Dd::constant(manager, weight)
    }
}

/// Component H/C: constructs a CNF clause's ADD directly from per-literal
/// `(ddVar, polarity, assignment)` triples (§4.G "Clause-ADD construction")
/// without going through the SAT-filter's BDD.
pub fn clause_add(
    manager: &ManagerHandle,
    literals: &[(DdVar, bool, Option<bool>)],
    xor_flag: bool,
) -> Dd {
    let mut acc = Dd::zero(manager);
    for &(ddvar, sign, assigned) in literals {
        match assigned {
            Some(val) => {
                let satisfied = val == sign;
                if xor_flag {
                    if satisfied {
                        acc = acc.xor(&Dd::one(manager));
                    }
                } else if satisfied {
                    return Dd::one(manager);
                }
                // unsatisfied, non-xor literal contributes nothing
            }
            None => {
                let lit = Dd::var_add(manager, ddvar, sign);
                acc = if xor_flag { acc.xor(&lit) } else { acc.max(&lit) };
            }
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::manager::DynOrder;
    use super::*;

    fn fresh(log: bool, weighted: bool) -> ManagerHandle {
        Rc::new(RefCell::new(Manager::new(4, log, weighted, true, 0, 0, 1, 0, DynOrder::Off)))
    }

    #[test]
    fn clause_two_var_unassigned() {
        let m = fresh(false, false);
        let lits = [(0usize, true, None), (1usize, false, None)];
        let d = clause_add(&m, &lits, false);
        assert_eq!(d.eval(&[false, true]), Number::zero(true));
        assert_eq!(d.eval(&[true, true]), Number::one(true));
        assert_eq!(d.eval(&[false, false]), Number::one(true));
    }

    #[test]
    fn xor_clause_parity() {
        let m = fresh(false, false);
        let lits = [(0usize, true, None), (1usize, true, None)];
        let d = clause_add(&m, &lits, true);
        assert_eq!(d.eval(&[true, false]), Number::one(true));
        assert_eq!(d.eval(&[true, true]), Number::zero(true));
    }

    #[test]
    fn bool_diff_is_threshold_indicator() {
        let m = fresh(false, false);
        let a = Dd::constant(&m, Number::parse("3/10", true).unwrap());
        let b = Dd::constant(&m, Number::parse("7/10", true).unwrap());
        let diff = a.bool_diff(&b);
        assert!(diff.is_zero());
        let diff2 = b.bool_diff(&a);
        assert!(!diff2.is_zero());
    }
}
