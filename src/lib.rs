/*!
# dpve — a decision-diagram-based propositional valuation engine

`dpve` reads a CNF in DIMACS-derived form together with a join tree (either
produced by an external planner on stdin or supplied programmatically) and
evaluates it bottom-up over a shared binary/algebraic decision diagram
manager. Depending on the flags given it reports an unweighted or weighted
model count, a projected count, or an exist-random max-sum valuation, with an
optional maximizer (witness assignment) extracted alongside the numeric
result.

## Usage

`dpve` is a standalone program, taking a CNF file and a join tree on stdin:

```plain
$ cat sample.jt | dpve sample.cnf --wc
sample.cnf                                           12 vars,    18 clauses
s SATISFIABLE
c type wmc
c log10-estimate -0.522878745280337
c value 3.0e-1
```

`dpve_verify` independently checks a reported maximizer or model against the
original CNF.

## Crate layout

- [`number`] — the exact/float numeric tower (Component A)
- [`cnf`] — CNF parsing, weights, and variable-order heuristics (Component B)
- [`graph`] — the primal graph and min-fill/MCS helpers used by the CNF
  heuristics
- [`dd`] — the shared decision-diagram manager and its `Dd` facade
  (Component C)
- [`jointree`] — the join-tree model and its stdin ingester (Components D–E)
- [`satfilter`] — the two-pass BDD pruning filter (Component F)
- [`executor`] — the bottom-up ADD evaluator (Component G)
- [`join_priority`] — the child-combination scheduling policy shared by
  `satfilter` and `executor`
- [`sat`] — a compact CDCL solver used to seed the pruning bound
  (Component I)
- [`dpve`] — the orchestration driver tying the above together
  (Component H)
- [`config`] — CLI configuration, raw and resolved
- [`validator`] — independent verification of a reported maximizer or model
- [`types`] — shared small types: literals, assignments, heuristic ids
- [`error`] — the crate's error taxonomy
*/
pub mod cnf;
pub mod config;
pub mod dd;
pub mod dpve;
pub mod error;
pub mod executor;
pub mod graph;
pub mod join_priority;
pub mod jointree;
pub mod number;
pub mod sat;
pub mod satfilter;
pub mod types;
pub mod validator;
