//! Component C support: a single hash-consed node arena shared by the BDD
//! and ADD variants the [`super::Dd`] facade exposes. Stands in for a
//! CUDD/Sylvan binding — no such crate exists in the ecosystem's current
//! ambient stack, so node storage, unique-tabling, and the apply/ite
//! machinery are implemented directly, following the shape of a
//! hash-consed ROBDD manager (terminal ids 0/1, `var2level` ordering,
//! `ite` memoized via a computed-cache) rather than CUDD's own internals.
use crate::number::Number;
use std::collections::HashMap;

pub type NodeId = usize;
pub type DdVar = usize;

/// A diagram node. Leaves carry a [`Number`] so the same arena backs both
/// boolean BDDs (whose leaves happen to always be 0/1) and algebraic ADDs.
#[derive(Clone, Debug)]
enum Node {
    Leaf(Number),
    Internal { var: DdVar, low: NodeId, high: NodeId },
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum BinOp {
    And,
    Or,
    Xor,
    Product,
    Sum,
    Max,
    BoolDiff,
}

/// Four hooks invoked around garbage collection and reordering. Registered
/// once at [`Manager::new`]; a no-op implementation is the default.
pub trait ReorderHooks {
    fn pre_gc(&mut self) {}
    fn post_gc(&mut self) {}
    fn pre_reorder(&mut self) {}
    fn post_reorder(&mut self) {}
}

struct NoopHooks;
impl ReorderHooks for NoopHooks {}

/// Dynamic variable reordering state machine (§4.C "Reordering"). `manual1`
/// tries a fixed candidate-permutation set and keeps whichever minimizes
/// live-node count; `manual2` stands in for the backend's built-in
/// symmetric sifting with a simplified adjacent-swap sift; `auto` just
/// leaves reordering permanently armed. `Off` never fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DynOrder {
    Off,
    Manual1,
    Manual2,
    Auto,
}

/// The process-wide (here: per-evaluation) diagram backend. Threaded
/// through calls as an `Rc<RefCell<Manager>>` handle per DESIGN.md, rather
/// than modeled with CUDD-style `static` fields.
pub struct Manager {
    nodes: Vec<Node>,
    unique_table: HashMap<(DdVar, NodeId, NodeId), NodeId>,
    leaf_cache: HashMap<String, NodeId>,
    apply_cache: HashMap<(BinOp, NodeId, NodeId), NodeId>,
    restrict_cache: HashMap<(NodeId, DdVar, bool), NodeId>,
    ite_cache: HashMap<(NodeId, NodeId, NodeId), NodeId>,
    select_cache: HashMap<(NodeId, NodeId, NodeId), NodeId>,
    var2level: Vec<usize>,
    level2var: Vec<DdVar>,

    pub log_counting: bool,
    pub weighted_counting: bool,
    pub exact: bool,
    pub num_vars: usize,
    pub thread_count: usize,
    pub max_mem_mb: usize,
    pub dyn_order: DynOrder,

    reord_thresh: f64,
    reord_thresh_inc: f64,
    max_swaps: usize,
    max_swaps_inc: usize,
    did_reordering: bool,
    no_reord_since_gc: bool,
    gc_count: usize,
    reorder_count: usize,

    hooks: Box<dyn ReorderHooks>,

    zero_bdd: NodeId,
    one_bdd: NodeId,
    zero_add: NodeId,
    one_add: NodeId,
}

impl Manager {
    /// `init`: builds the manager for `num_vars` diagram variables under
    /// the given numeric/counting mode. `table_ratio`/`init_ratio` are
    /// accepted for CLI parity with the CUDD-only tuning knobs but have no
    /// effect on this in-crate backend (see DESIGN.md).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        num_vars: usize,
        log_counting: bool,
        weighted_counting: bool,
        exact: bool,
        _table_ratio: usize,
        _init_ratio: usize,
        thread_count: usize,
        max_mem_mb: usize,
        dyn_order: DynOrder,
    ) -> Self {
        let mut m = Manager {
            nodes: Vec::new(),
            unique_table: HashMap::new(),
            leaf_cache: HashMap::new(),
            apply_cache: HashMap::new(),
            restrict_cache: HashMap::new(),
            ite_cache: HashMap::new(),
            select_cache: HashMap::new(),
            var2level: (0..num_vars).collect(),
            level2var: (0..num_vars).collect(),
            log_counting,
            weighted_counting,
            exact,
            num_vars,
            thread_count,
            max_mem_mb,
            dyn_order,
            reord_thresh: 0.5,
            reord_thresh_inc: 0.1,
            max_swaps: num_vars.max(1) * 4,
            max_swaps_inc: 8,
            did_reordering: false,
            no_reord_since_gc: true,
            gc_count: 0,
            reorder_count: 0,
            hooks: Box::new(NoopHooks),
            zero_bdd: 0,
            one_bdd: 0,
            zero_add: 0,
            one_add: 0,
        };
        m.zero_bdd = m.leaf(Number::zero(m.exact));
        m.one_bdd = m.leaf(Number::one(m.exact));
        m.zero_add = if log_counting {
            m.leaf(Number::log_zero())
        } else {
            m.zero_bdd
        };
        m.one_add = if log_counting {
            m.leaf(Number::Float(0.0))
        } else {
            m.one_bdd
        };
        m
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn ReorderHooks>) {
        self.hooks = hooks;
    }

    pub fn bdd_zero(&self) -> NodeId {
        self.zero_bdd
    }
    pub fn bdd_one(&self) -> NodeId {
        self.one_bdd
    }
    pub fn add_zero(&self) -> NodeId {
        self.zero_add
    }
    pub fn add_one(&self) -> NodeId {
        self.one_add
    }

    fn leaf(&mut self, value: Number) -> NodeId {
        let key = format!("{:?}", value);
        if let Some(&id) = self.leaf_cache.get(&key) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf(value));
        self.leaf_cache.insert(key, id);
        id
    }

    pub fn const_add(&mut self, value: Number) -> NodeId {
        self.leaf(value)
    }

    fn unique(&mut self, var: DdVar, low: NodeId, high: NodeId) -> NodeId {
        if low == high {
            return low;
        }
        if let Some(&id) = self.unique_table.get(&(var, low, high)) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(Node::Internal { var, low, high });
        self.unique_table.insert((var, low, high), id);
        id
    }

    pub fn level_of(&self, var: DdVar) -> usize {
        self.var2level.get(var).copied().unwrap_or(usize::MAX)
    }

    fn node_var_level(&self, id: NodeId) -> usize {
        match &self.nodes[id] {
            Node::Leaf(_) => usize::MAX,
            Node::Internal { var, .. } => self.level_of(*var),
        }
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        matches!(self.nodes[id], Node::Leaf(_))
    }

    pub fn leaf_value(&self, id: NodeId) -> Option<&Number> {
        match &self.nodes[id] {
            Node::Leaf(n) => Some(n),
            Node::Internal { .. } => None,
        }
    }

    pub fn is_bdd_true(&self, id: NodeId) -> bool {
        matches!(self.leaf_value(id), Some(n) if !n.is_zero())
    }

    pub fn var_bdd(&mut self, var: DdVar, polarity: bool) -> NodeId {
        if polarity {
            self.unique(var, self.zero_bdd, self.one_bdd)
        } else {
            self.unique(var, self.one_bdd, self.zero_bdd)
        }
    }

    /// ADD literal: `x_v` (or `1-x_v`), leaves in {0,1} (linear mode) or
    /// `{0, -inf}` (log mode), per §4.C.
    pub fn var_add(&mut self, var: DdVar, polarity: bool) -> NodeId {
        if polarity {
            self.unique(var, self.zero_add, self.one_add)
        } else {
            self.unique(var, self.one_add, self.zero_add)
        }
    }

    fn top_var(&self, a: NodeId, b: NodeId) -> Option<DdVar> {
        let la = self.node_var_level(a);
        let lb = self.node_var_level(b);
        if la == usize::MAX && lb == usize::MAX {
            return None;
        }
        let lvl = la.min(lb);
        Some(self.level2var[lvl])
    }

    fn branch(&self, id: NodeId, var: DdVar, want_high: bool) -> NodeId {
        match &self.nodes[id] {
            Node::Leaf(_) => id,
            Node::Internal { var: v, low, high } => {
                if *v == var {
                    if want_high { *high } else { *low }
                } else {
                    id
                }
            }
        }
    }

    fn leaf_binop(&self, op: BinOp, a: &Number, b: &Number) -> Number {
        match op {
            BinOp::And => {
                if !a.is_zero() && !b.is_zero() { Number::one(self.exact) } else { Number::zero(self.exact) }
            }
            BinOp::Or => {
                if !a.is_zero() || !b.is_zero() { Number::one(self.exact) } else { Number::zero(self.exact) }
            }
            BinOp::Xor => {
                let ta = !a.is_zero();
                let tb = !b.is_zero();
                if ta != tb { Number::one(self.exact) } else { Number::zero(self.exact) }
            }
            BinOp::Product => {
                if self.log_counting {
                    Number::Float(a.to_f64() + b.to_f64())
                } else {
                    a.clone() * b.clone()
                }
            }
            BinOp::Sum => {
                if self.log_counting {
                    Number::Float(Number::log_sum_exp(a.to_f64(), b.to_f64()))
                } else {
                    a.clone() + b.clone()
                }
            }
            BinOp::Max => {
                if *a >= *b { a.clone() } else { b.clone() }
            }
            BinOp::BoolDiff => {
                if *a >= *b { Number::Float(1.0) } else { Number::Float(0.0) }
            }
        }
    }

    fn apply(&mut self, op: BinOp, a: NodeId, b: NodeId) -> NodeId {
        if let (Node::Leaf(va), Node::Leaf(vb)) = (&self.nodes[a], &self.nodes[b]) {
            let (va, vb) = (va.clone(), vb.clone());
            return self.leaf(self.leaf_binop(op, &va, &vb));
        }
        if let Some(&cached) = self.apply_cache.get(&(op, a, b)) {
            return cached;
        }
        let var = self.top_var(a, b).expect("at least one operand is internal");
        let a_lo = self.branch(a, var, false);
        let a_hi = self.branch(a, var, true);
        let b_lo = self.branch(b, var, false);
        let b_hi = self.branch(b, var, true);
        let lo = self.apply(op, a_lo, b_lo);
        let hi = self.apply(op, a_hi, b_hi);
        let out = self.unique(var, lo, hi);
        self.apply_cache.insert((op, a, b), out);
        out
    }

    pub fn bdd_and(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.apply(BinOp::And, a, b)
    }
    pub fn bdd_or(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.apply(BinOp::Or, a, b)
    }
    pub fn bdd_not(&mut self, a: NodeId) -> NodeId {
        self.apply(BinOp::Xor, a, self.one_bdd)
    }
    pub fn xor(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.apply(BinOp::Xor, a, b)
    }
    pub fn product(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.apply(BinOp::Product, a, b)
    }
    pub fn sum(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.apply(BinOp::Sum, a, b)
    }
    pub fn max(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.apply(BinOp::Max, a, b)
    }
    pub fn bool_diff(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.apply(BinOp::BoolDiff, a, b)
    }

    /// Restricts `f` to `v := value`. Unaffected subgraphs (those whose
    /// top variable's level is already past `v`) are returned unchanged.
    pub fn restrict(&mut self, f: NodeId, v: DdVar, value: bool) -> NodeId {
        match &self.nodes[f] {
            Node::Leaf(_) => f,
            Node::Internal { var, low, high } => {
                let (var, low, high) = (*var, *low, *high);
                if var == v {
                    return if value { high } else { low };
                }
                if self.level_of(var) > self.level_of(v) {
                    return f;
                }
                if let Some(&cached) = self.restrict_cache.get(&(f, v, value)) {
                    return cached;
                }
                let new_low = self.restrict(low, v, value);
                let new_high = self.restrict(high, v, value);
                let out = self.unique(var, new_low, new_high);
                self.restrict_cache.insert((f, v, value), out);
                out
            }
        }
    }

    /// `exists(v, f) = restrict(f,v,0) | restrict(f,v,1)`, boolean-valued.
    pub fn bdd_exists_one(&mut self, f: NodeId, v: DdVar) -> NodeId {
        let lo = self.restrict(f, v, false);
        let hi = self.restrict(f, v, true);
        self.bdd_or(lo, hi)
    }

    pub fn bdd_exists(&mut self, f: NodeId, vars: &[DdVar]) -> NodeId {
        let mut ordered = vars.to_vec();
        ordered.sort_by_key(|&v| std::cmp::Reverse(self.level_of(v)));
        let mut acc = f;
        for v in ordered {
            acc = self.bdd_exists_one(acc, v);
        }
        acc
    }

    pub fn bdd_and_exists(&mut self, a: NodeId, b: NodeId, vars: &[DdVar]) -> NodeId {
        let conj = self.bdd_and(a, b);
        self.bdd_exists(conj, vars)
    }

    /// Weighted existential abstraction over `vars`, all at once ("atomic"
    /// path, §4.G): each entry is `(ddVar, posWt, negWt, additive)` — `hi`
    /// (the `v:=1` restrict) is always weighted by `posWt` and `lo` by
    /// `negWt`, exactly as the per-variable path does; `additive` only
    /// selects sum vs. max for that variable's combine step, so a single
    /// batch can mix outer (max) and inner (sum) vars.
    pub fn abstract_weighted_atomic(
        &mut self,
        f: NodeId,
        vars: &[(DdVar, Number, Number, bool)],
    ) -> NodeId {
        let mut ordered = vars.to_vec();
        ordered.sort_by_key(|(v, _, _, _)| std::cmp::Reverse(self.level_of(*v)));
        let mut acc = f;
        for (v, pos_wt, neg_wt, additive) in ordered {
            let hi = self.restrict(acc, v, true);
            let lo = self.restrict(acc, v, false);
            // weights arrive in linear space (§9 "getNegWt"); the backend
            // converts to log10 itself so they combine correctly with the
            // {0,-inf} var leaves under `product` in log mode.
            let pos_leaf = self.leaf(if self.log_counting { Number::Float(pos_wt.log10()) } else { pos_wt });
            let neg_leaf = self.leaf(if self.log_counting { Number::Float(neg_wt.log10()) } else { neg_wt });
            let hi_w = self.product(hi, pos_leaf);
            let lo_w = self.product(lo, neg_leaf);
            acc = if additive { self.sum(hi_w, lo_w) } else { self.max(hi_w, lo_w) };
        }
        acc
    }

    fn top_var3(&self, a: NodeId, b: NodeId, c: NodeId) -> Option<DdVar> {
        let lvl = self.node_var_level(a).min(self.node_var_level(b)).min(self.node_var_level(c));
        if lvl == usize::MAX {
            None
        } else {
            Some(self.level2var[lvl])
        }
    }

    /// Ternary selection `if cond then t else e`, all three arguments
    /// diagrams over a shared variable order. Used for `substitutionMaximization`
    /// (§4.G), which substitutes a boolean-valued selector diagram for a
    /// variable inside an algebraic accumulator — a pointwise choice between
    /// two Number-leaved ADDs, not expressible with the arithmetic ops alone.
    pub fn select(&mut self, cond: NodeId, t: NodeId, e: NodeId) -> NodeId {
        if let Node::Leaf(n) = &self.nodes[cond] {
            return if !n.is_zero() { t } else { e };
        }
        if t == e {
            return t;
        }
        if let Some(&cached) = self.select_cache.get(&(cond, t, e)) {
            return cached;
        }
        let var = self.top_var3(cond, t, e).expect("non-constant cond has a top variable");
        let c_lo = self.branch(cond, var, false);
        let c_hi = self.branch(cond, var, true);
        let t_lo = self.branch(t, var, false);
        let t_hi = self.branch(t, var, true);
        let e_lo = self.branch(e, var, false);
        let e_hi = self.branch(e, var, true);
        let lo = self.select(c_lo, t_lo, e_lo);
        let hi = self.select(c_hi, t_hi, e_hi);
        let out = self.unique(var, lo, hi);
        self.select_cache.insert((cond, t, e), out);
        out
    }

    /// Replaces any leaf strictly below `bound` (log10 space) with `-inf`.
    /// No-op outside log-counting mode.
    pub fn log_threshold(&mut self, f: NodeId, bound: f64) -> NodeId {
        if !self.log_counting || bound == f64::NEG_INFINITY {
            return f;
        }
        let mut memo: HashMap<NodeId, NodeId> = HashMap::new();
        self.threshold_rec(f, bound, &mut memo)
    }

    fn threshold_rec(&mut self, f: NodeId, bound: f64, memo: &mut HashMap<NodeId, NodeId>) -> NodeId {
        if let Some(&cached) = memo.get(&f) {
            return cached;
        }
        let out = match &self.nodes[f] {
            Node::Leaf(n) => {
                if n.to_f64() < bound {
                    self.zero_add
                } else {
                    f
                }
            }
            Node::Internal { var, low, high } => {
                let (var, low, high) = (*var, *low, *high);
                let new_low = self.threshold_rec(low, bound, memo);
                let new_high = self.threshold_rec(high, bound, memo);
                self.unique(var, new_low, new_high)
            }
        };
        memo.insert(f, out);
        out
    }

    pub fn eval(&self, f: NodeId, ddvar_assignment: &[bool]) -> Number {
        let mut cur = f;
        loop {
            match &self.nodes[cur] {
                Node::Leaf(n) => return n.clone(),
                Node::Internal { var, low, high } => {
                    cur = if ddvar_assignment[*var] { *high } else { *low };
                }
            }
        }
    }

    /// Evaluates a 0/1-valued ADD under a *partial* assignment represented
    /// as `Option<bool>` slots (used by maximizer extraction, which only
    /// knows the outer vars decided so far).
    pub fn eval_partial(&self, f: NodeId, ddvar_assignment: &[Option<bool>]) -> bool {
        let mut cur = f;
        loop {
            match &self.nodes[cur] {
                Node::Leaf(n) => return !n.is_zero(),
                Node::Internal { var, low, high } => {
                    let v = ddvar_assignment[*var].unwrap_or(false);
                    cur = if v { *high } else { *low };
                }
            }
        }
    }

    pub fn support(&self, f: NodeId) -> Vec<DdVar> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![f];
        while let Some(id) = stack.pop() {
            if let Node::Internal { var, low, high } = &self.nodes[id] {
                if seen.insert(*var) {
                    out.push(*var);
                }
                stack.push(*low);
                stack.push(*high);
            }
        }
        out.sort_unstable();
        out
    }

    pub fn node_count(&self, f: NodeId) -> usize {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![f];
        while let Some(id) = stack.pop() {
            if seen.insert(id) {
                if let Node::Internal { low, high, .. } = &self.nodes[id] {
                    stack.push(*low);
                    stack.push(*high);
                }
            }
        }
        seen.len()
    }

    pub fn total_node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Call before each binary algebraic op, per §4.C's reordering trigger:
    /// fires only once per GC epoch and only once utilization crosses the
    /// rising threshold.
    pub fn maybe_reorder(&mut self, roots: &[NodeId]) {
        if self.dyn_order == DynOrder::Off {
            return;
        }
        let utilization = self.nodes.len() as f64 / (self.num_vars.max(1) as f64 * 64.0);
        if utilization < self.reord_thresh || (!self.no_reord_since_gc && self.dyn_order != DynOrder::Auto) {
            return;
        }
        self.hooks.pre_reorder();
        let before: usize = roots.iter().map(|&r| self.node_count(r)).sum();
        match self.dyn_order {
            DynOrder::Manual1 => self.try_candidate_permutations(roots),
            DynOrder::Manual2 => self.sift(roots),
            DynOrder::Auto => self.sift(roots),
            DynOrder::Off => {}
        }
        let after: usize = roots.iter().map(|&r| self.node_count(r)).sum();
        self.did_reordering = true;
        self.no_reord_since_gc = false;
        self.reorder_count += 1;
        self.reord_thresh += self.reord_thresh_inc;
        self.reord_thresh_inc /= 2.25;
        self.max_swaps += self.max_swaps_inc;
        self.hooks.post_reorder();
        log::debug!("reorder #{}: {} -> {} live nodes", self.reorder_count, before, after);
    }

    /// manual-1: tries each of a small set of candidate level permutations
    /// (identity, reverse, and one rotation) and keeps whichever minimizes
    /// the roots' combined live-node count.
    fn try_candidate_permutations(&mut self, roots: &[NodeId]) {
        let n = self.level2var.len();
        if n < 2 {
            return;
        }
        let mut best = self.level2var.clone();
        let mut best_cost = roots.iter().map(|&r| self.node_count(r)).sum::<usize>();
        let candidates: Vec<Vec<DdVar>> = vec![
            self.level2var.iter().rev().copied().collect(),
            {
                let mut v = self.level2var.clone();
                v.rotate_left(1);
                v
            },
        ];
        for candidate in candidates {
            let saved_level2var = self.level2var.clone();
            let saved_var2level = self.var2level.clone();
            self.set_level_order(&candidate);
            self.rebuild_after_reorder();
            let cost = roots.iter().map(|&r| self.node_count(r)).sum::<usize>();
            if cost < best_cost {
                best_cost = cost;
                best = candidate;
            } else {
                self.level2var = saved_level2var;
                self.var2level = saved_var2level;
            }
        }
        if best != self.level2var {
            self.set_level_order(&best);
            self.rebuild_after_reorder();
        }
    }

    /// manual-2 / auto: a simplified symmetric sift — walk each variable
    /// through every level via adjacent transpositions, keeping the
    /// position with the fewest live nodes. Not CUDD's own sifting
    /// algorithm (which works on the live DD in place); this variant
    /// rebuilds level order wholesale per candidate, which is fine at the
    /// crate's evaluation scale.
    fn sift(&mut self, roots: &[NodeId]) {
        let n = self.level2var.len();
        for v in 0..n.min(self.max_swaps) {
            let mut best = self.level2var.clone();
            let mut best_cost = roots.iter().map(|&r| self.node_count(r)).sum::<usize>();
            for target_level in 0..n {
                let mut candidate = self.level2var.clone();
                let cur_level = self.var2level[v];
                if cur_level == target_level {
                    continue;
                }
                let var = candidate.remove(cur_level);
                candidate.insert(target_level, var);
                self.set_level_order(&candidate);
                self.rebuild_after_reorder();
                let cost = roots.iter().map(|&r| self.node_count(r)).sum::<usize>();
                if cost < best_cost {
                    best_cost = cost;
                    best = candidate.clone();
                }
            }
            self.set_level_order(&best);
            self.rebuild_after_reorder();
        }
    }

    fn set_level_order(&mut self, level2var: &[DdVar]) {
        self.level2var = level2var.to_vec();
        self.var2level = vec![0; self.level2var.len()];
        for (level, &var) in self.level2var.iter().enumerate() {
            self.var2level[var] = level;
        }
    }

    /// After changing `var2level`, the apply/restrict caches (keyed by
    /// node id, not level) remain valid; only ite-derived derived node
    /// identities built from now-stale level comparisons would be wrong,
    /// but since `Internal.var` is an absolute ddVar (not a level), the
    /// existing node table stays correct — only the caches of
    /// *level-order-dependent* computations are invalidated.
    fn rebuild_after_reorder(&mut self) {
        self.apply_cache.clear();
        self.restrict_cache.clear();
    }

    /// Reinterprets a satisfied BDD (leaves restricted to `bdd_zero`/
    /// `bdd_one`) as the corresponding ADD, substituting the mode-specific
    /// constant leaves. Identity outside log-counting mode, where the two
    /// leaf pairs already coincide.
    pub fn remap_bdd_leaves_to_add(&mut self, f: NodeId) -> NodeId {
        if self.zero_bdd == self.zero_add && self.one_bdd == self.one_add {
            return f;
        }
        let mut memo = HashMap::new();
        self.remap_rec(f, &mut memo)
    }

    fn remap_rec(&mut self, f: NodeId, memo: &mut HashMap<NodeId, NodeId>) -> NodeId {
        if let Some(&cached) = memo.get(&f) {
            return cached;
        }
        let out = if f == self.zero_bdd {
            self.zero_add
        } else if f == self.one_bdd {
            self.one_add
        } else {
            match &self.nodes[f] {
                Node::Leaf(_) => f,
                Node::Internal { var, low, high } => {
                    let (var, low, high) = (*var, *low, *high);
                    let new_low = self.remap_rec(low, memo);
                    let new_high = self.remap_rec(high, memo);
                    self.unique(var, new_low, new_high)
                }
            }
        };
        memo.insert(f, out);
        out
    }

    pub fn did_reordering(&self) -> bool {
        self.did_reordering
    }

    pub fn note_gc(&mut self) {
        self.hooks.pre_gc();
        self.gc_count += 1;
        self.no_reord_since_gc = true;
        self.hooks.post_gc();
    }

    pub fn gc_count(&self) -> usize {
        self.gc_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(n: usize, log: bool, weighted: bool) -> Manager {
        Manager::new(n, log, weighted, true, 0, 0, 1, 0, DynOrder::Off)
    }

    #[test]
    fn and_or_not_truth_table() {
        let mut m = manager(2, false, false);
        let x0 = m.var_bdd(0, true);
        let x1 = m.var_bdd(1, true);
        let conj = m.bdd_and(x0, x1);
        assert!(m.is_bdd_true(m.eval_leaf(conj, &[true, true])));
        assert!(!m.is_bdd_true(m.eval_leaf(conj, &[true, false])));
        let disj = m.bdd_or(x0, x1);
        assert!(m.is_bdd_true(m.eval_leaf(disj, &[false, true])));
        assert!(!m.is_bdd_true(m.eval_leaf(disj, &[false, false])));
    }

    #[test]
    fn restrict_matches_eval() {
        let mut m = manager(2, false, false);
        let x0 = m.var_bdd(0, true);
        let x1 = m.var_bdd(1, true);
        let conj = m.bdd_and(x0, x1);
        let restricted = m.restrict(conj, 0, true);
        assert_eq!(restricted, x1);
    }

    #[test]
    fn product_in_log_mode_is_addition() {
        let mut m = manager(1, true, false);
        let a = m.const_add(Number::Float(1.0));
        let b = m.const_add(Number::Float(2.0));
        let p = m.product(a, b);
        assert_eq!(m.leaf_value(p).unwrap().to_f64(), 3.0);
    }

    #[test]
    fn sum_in_log_mode_is_log_sum_exp() {
        let mut m = manager(1, true, false);
        let a = m.const_add(Number::Float(0.0));
        let b = m.const_add(Number::log_zero());
        let s = m.sum(a, b);
        assert_eq!(m.leaf_value(s).unwrap().to_f64(), 0.0);
    }

    #[test]
    fn abstraction_matches_weighted_restricts() {
        let mut m = manager(1, false, true);
        let x0 = m.var_add(0, true);
        let pos = Number::parse("3/10", true).unwrap();
        let neg = Number::parse("7/10", true).unwrap();
        let result = m.abstract_weighted_atomic(x0, &[(0, pos.clone(), neg.clone(), true)]);
        let value = m.leaf_value(result).unwrap();
        assert_eq!(*value, pos);
    }

    impl Manager {
        fn eval_leaf(&self, f: NodeId, assignment: &[bool]) -> NodeId {
            let mut cur = f;
            loop {
                match &self.nodes[cur] {
                    Node::Leaf(_) => return cur,
                    Node::Internal { var, low, high } => {
                        cur = if assignment[*var] { *high } else { *low };
                    }
                }
            }
        }
    }
}
