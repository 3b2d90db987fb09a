// src/solver/registry.rs

//! Equation registry and dependency solver.
//!
//! Each computed variable is registered with the codes it reads and a pure
//! evaluation function. `solve` orders the requested targets in two phases
//! (fixed priority list, then Kahn's topological order), appends any variables
//! caught in a dependency cycle, and re-evaluates the whole sequence until the
//! largest change between passes drops below the tolerance or the pass budget
//! is spent.

use crate::model::parameters::ParameterSet;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// Value injected for a dependency that has neither an input, a computed
/// value nor a registered default.
pub const MISSING_DEPENDENCY_DEFAULT: f64 = 0.0;

/// A named calculation with declared inputs.
///
/// `Send + Sync` so one registry can be shared read-only by concurrent runs.
pub trait Equation: Send + Sync {
    fn code(&self) -> &str;
    fn dependencies(&self) -> &[String];
    fn evaluate(&self, values: &ParameterSet) -> f64;
}

type EvalFn = Box<dyn Fn(&ParameterSet) -> f64 + Send + Sync>;

/// An equation backed by a closure.
pub struct FnEquation {
    code: String,
    dependencies: Vec<String>,
    eval: EvalFn,
}

impl FnEquation {
    pub fn new<F>(code: &str, dependencies: &[&str], eval: F) -> Self
    where
        F: Fn(&ParameterSet) -> f64 + Send + Sync + 'static,
    {
        Self {
            code: code.to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            eval: Box::new(eval),
        }
    }
}

impl Equation for FnEquation {
    fn code(&self) -> &str {
        &self.code
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn evaluate(&self, values: &ParameterSet) -> f64 {
        (self.eval)(values)
    }
}

impl std::fmt::Debug for FnEquation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnEquation")
            .field("code", &self.code)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// The order in which a target set is evaluated on every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOrder {
    /// Priority codes, then acyclic codes in topological order, then `cyclic`.
    pub sequence: Vec<String>,
    /// Codes whose in-degree never reached zero.
    pub cyclic: Vec<String>,
}

/// Result of a `solve` call. `values` holds every requested target.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub values: ParameterSet,
    pub iterations: usize,
    pub converged: bool,
    pub max_change: f64,
    /// Codes filled in with a default because nothing else provided them.
    pub injected: Vec<String>,
    /// Non-finite results that were discarded.
    pub warnings: Vec<String>,
}

#[derive(Default)]
pub struct EquationRegistry {
    equations: Vec<Box<dyn Equation>>,
    index: HashMap<String, usize>,
    priority: Vec<String>,
    defaults: HashMap<String, f64>,
}

impl EquationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `code` computed by `eval` from `dependencies`.
    /// Re-registering a code replaces the previous equation in place.
    pub fn register<F>(&mut self, code: &str, dependencies: &[&str], eval: F)
    where
        F: Fn(&ParameterSet) -> f64 + Send + Sync + 'static,
    {
        self.register_equation(Box::new(FnEquation::new(code, dependencies, eval)));
    }

    pub fn register_equation(&mut self, equation: Box<dyn Equation>) {
        let code = equation.code().to_string();
        match self.index.get(&code) {
            Some(&i) => self.equations[i] = equation,
            None => {
                self.index.insert(code, self.equations.len());
                self.equations.push(equation);
            }
        }
    }

    /// Codes always scheduled ahead of the topological order.
    pub fn set_priority(&mut self, codes: &[&str]) {
        self.priority = codes.iter().map(|c| c.to_string()).collect();
    }

    pub fn set_default(&mut self, code: &str, value: f64) {
        self.defaults.insert(code.to_string(), value);
    }

    pub fn default_for(&self, code: &str) -> f64 {
        self.defaults
            .get(code)
            .copied()
            .unwrap_or(MISSING_DEPENDENCY_DEFAULT)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.equations.iter().map(|e| e.code())
    }

    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    /// Orders the registered members of `targets`.
    ///
    /// Ties are broken by registration order so the sequence is deterministic.
    pub fn evaluation_order(&self, targets: &[&str]) -> EvaluationOrder {
        let wanted: HashSet<&str> = targets.iter().copied().collect();
        let nodes: Vec<usize> = (0..self.equations.len())
            .filter(|&i| wanted.contains(self.equations[i].code()))
            .collect();
        let node_codes: HashSet<&str> = nodes.iter().map(|&i| self.equations[i].code()).collect();

        let mut sequence: Vec<String> = Vec::with_capacity(nodes.len());
        let mut done: HashSet<&str> = HashSet::new();

        // Phase 1: priority list
        for code in &self.priority {
            if node_codes.contains(code.as_str()) && done.insert(code.as_str()) {
                sequence.push(code.clone());
            }
        }

        // Phase 2: Kahn over what is left
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        for &i in &nodes {
            let code = self.equations[i].code();
            if done.contains(code) {
                continue;
            }
            let deps: BTreeSet<&str> = self.equations[i]
                .dependencies()
                .iter()
                .map(|d| d.as_str())
                .filter(|d| node_codes.contains(d) && !done.contains(d) && *d != code)
                .collect();
            in_degree.insert(code, deps.len());
        }

        let mut queue: VecDeque<&str> = nodes
            .iter()
            .map(|&i| self.equations[i].code())
            .filter(|c| in_degree.get(c) == Some(&0))
            .collect();

        while let Some(code) = queue.pop_front() {
            if !done.insert(code) {
                continue;
            }
            sequence.push(code.to_string());
            for &i in &nodes {
                let consumer = self.equations[i].code();
                if done.contains(consumer) {
                    continue;
                }
                let reads = self.equations[i]
                    .dependencies()
                    .iter()
                    .any(|d| d == code);
                if !reads {
                    continue;
                }
                if let Some(deg) = in_degree.get_mut(consumer) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        queue.push_back(consumer);
                    }
                }
            }
        }

        // Phase 3: whatever never reached zero sits in (or behind) a cycle
        let cyclic: Vec<String> = nodes
            .iter()
            .map(|&i| self.equations[i].code())
            .filter(|c| !done.contains(c))
            .map(str::to_string)
            .collect();
        sequence.extend(cyclic.iter().cloned());

        EvaluationOrder { sequence, cyclic }
    }

    /// Resolves every code in `targets` starting from `initial`.
    ///
    /// Never fails: missing dependencies are injected with defaults, non-finite
    /// results are discarded, and when the pass budget runs out the last values
    /// are kept.
    pub fn solve(
        &self,
        initial: &ParameterSet,
        targets: &[&str],
        max_iterations: usize,
        tolerance: f64,
    ) -> SolveOutcome {
        let order = self.evaluation_order(targets);
        let iterate = !order.cyclic.is_empty();
        let passes = max_iterations.max(1);

        let mut values = initial.clone();
        let mut injected: BTreeSet<String> = BTreeSet::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut iterations = 0;
        let mut converged = false;
        let mut max_change = f64::INFINITY;

        for pass in 1..=passes {
            let mut pass_change = 0.0_f64;

            for code in &order.sequence {
                let equation = &self.equations[self.index[code.as_str()]];

                for dep in equation.dependencies() {
                    if values.get(dep).is_none() {
                        let fallback = self.default_for(dep);
                        debug!(variable = %code, dependency = %dep, fallback, "injecting missing dependency");
                        values.set(dep, fallback);
                        injected.insert(dep.clone());
                    }
                }

                let new_value = equation.evaluate(&values);
                if !new_value.is_finite() {
                    let message = format!("{code}: non-finite result {new_value} discarded on pass {pass}");
                    warn!("{}", message);
                    warnings.push(message);
                    if values.get(code).is_none() {
                        values.set(code, self.default_for(code));
                        injected.insert(code.clone());
                    }
                    pass_change = f64::INFINITY;
                    continue;
                }

                let change = match values.get(code) {
                    Some(old) if old.is_finite() => (new_value - old).abs(),
                    _ => f64::INFINITY,
                };
                pass_change = pass_change.max(change);
                values.set(code, new_value);
            }

            iterations = pass;
            max_change = pass_change;
            if !iterate || pass_change < tolerance {
                converged = true;
                break;
            }
        }

        if iterate {
            if converged {
                debug!(iterations, cyclic = ?order.cyclic, "circular variables converged");
            } else {
                warn!(
                    iterations,
                    max_change,
                    cyclic = ?order.cyclic,
                    "circular variables did not converge, keeping last values"
                );
            }
        }

        for target in targets {
            if values.get(target).is_none() {
                values.set(target, self.default_for(target));
                injected.insert(target.to_string());
            }
        }

        SolveOutcome {
            values,
            iterations,
            converged,
            max_change,
            injected: injected.into_iter().collect(),
            warnings,
        }
    }
}

impl std::fmt::Debug for EquationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EquationRegistry")
            .field("codes", &self.codes().collect::<Vec<_>>())
            .field("priority", &self.priority)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_registry() -> EquationRegistry {
        // Registered consumer-first so the topological sort has work to do
        let mut reg = EquationRegistry::new();
        reg.register("C", &["B"], |p| p.get_or("B", 0.0) * 2.0);
        reg.register("B", &["A"], |p| p.get_or("A", 0.0) + 1.0);
        reg.register("A", &["X"], |p| p.get_or("X", 0.0) * 10.0);
        reg
    }

    #[test]
    fn test_topological_order_follows_dependencies() {
        let reg = chain_registry();
        let order = reg.evaluation_order(&["A", "B", "C"]);
        assert_eq!(order.sequence, vec!["A", "B", "C"]);
        assert!(order.cyclic.is_empty());
    }

    #[test]
    fn test_acyclic_solve_takes_one_pass() {
        let reg = chain_registry();
        let mut initial = ParameterSet::new();
        initial.set("X", 1.0);
        let out = reg.solve(&initial, &["A", "B", "C"], 10, 1e-9);
        assert!(out.converged);
        assert_eq!(out.iterations, 1);
        assert_eq!(out.values.get("C"), Some(22.0));
    }

    #[test]
    fn test_priority_codes_are_scheduled_first() {
        let mut reg = chain_registry();
        reg.register("P", &[], |_| 5.0);
        reg.set_priority(&["P", "B"]);
        let order = reg.evaluation_order(&["A", "B", "C", "P"]);
        assert_eq!(order.sequence[0], "P");
        assert_eq!(order.sequence[1], "B");
    }

    #[test]
    fn test_targets_restrict_the_graph() {
        let reg = chain_registry();
        let order = reg.evaluation_order(&["C"]);
        assert_eq!(order.sequence, vec!["C"]);
    }

    #[test]
    fn test_cycle_is_appended_and_converges() {
        let mut reg = EquationRegistry::new();
        reg.register("X", &["Y"], |p| 0.5 * p.get_or("Y", 0.0) + 1.0);
        reg.register("Y", &["X"], |p| 0.5 * p.get_or("X", 0.0));
        reg.register("Z", &[], |_| 3.0);

        let order = reg.evaluation_order(&["X", "Y", "Z"]);
        assert_eq!(order.sequence, vec!["Z", "X", "Y"]);
        assert_eq!(order.cyclic, vec!["X", "Y"]);

        let out = reg.solve(&ParameterSet::new(), &["X", "Y", "Z"], 100, 1e-10);
        assert!(out.converged);
        assert!((out.values.get_or("X", 0.0) - 4.0 / 3.0).abs() < 1e-8);
        assert!((out.values.get_or("Y", 0.0) - 2.0 / 3.0).abs() < 1e-8);
    }

    #[test]
    fn test_divergent_cycle_stops_at_budget_and_keeps_values() {
        let mut reg = EquationRegistry::new();
        reg.register("X", &["Y"], |p| p.get_or("Y", 0.0) + 1.0);
        reg.register("Y", &["X"], |p| p.get_or("X", 0.0) + 1.0);
        let out = reg.solve(&ParameterSet::new(), &["X", "Y"], 7, 1e-6);
        assert!(!out.converged);
        assert_eq!(out.iterations, 7);
        assert!(out.values.get("X").is_some());
        assert!(out.values.get("Y").is_some());
    }

    #[test]
    fn test_missing_dependency_is_injected_with_default() {
        let mut reg = EquationRegistry::new();
        reg.register("R", &["IN"], |p| p.get_or("IN", -1.0) * 2.0);
        reg.set_default("IN", 4.0);
        let out = reg.solve(&ParameterSet::new(), &["R"], 5, 1e-6);
        assert_eq!(out.values.get("R"), Some(8.0));
        assert_eq!(out.injected, vec!["IN".to_string()]);
    }

    #[test]
    fn test_non_finite_result_is_discarded() {
        let mut reg = EquationRegistry::new();
        reg.register("R", &["D"], |p| 1.0 / p.get_or("D", 0.0));
        let mut initial = ParameterSet::new();
        initial.set("D", 0.0);
        initial.set("R", 0.25);
        let out = reg.solve(&initial, &["R"], 5, 1e-6);
        assert_eq!(out.values.get("R"), Some(0.25));
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_every_target_is_returned_even_without_budget() {
        let mut reg = EquationRegistry::new();
        reg.register("X", &["Y"], |p| p.get_or("Y", 0.0));
        reg.register("Y", &["X"], |p| p.get_or("X", 0.0));
        reg.set_default("UNKNOWN", 9.0);
        let out = reg.solve(&ParameterSet::new(), &["X", "Y", "UNKNOWN"], 0, 1e-6);
        assert!(out.iterations <= 1);
        for code in ["X", "Y", "UNKNOWN"] {
            assert!(out.values.get(code).is_some(), "{code} missing");
        }
        assert_eq!(out.values.get("UNKNOWN"), Some(9.0));
    }

    #[test]
    fn test_reregistering_replaces_equation() {
        let mut reg = EquationRegistry::new();
        reg.register("A", &[], |_| 1.0);
        reg.register("A", &[], |_| 2.0);
        assert_eq!(reg.len(), 1);
        let out = reg.solve(&ParameterSet::new(), &["A"], 1, 1e-6);
        assert_eq!(out.values.get("A"), Some(2.0));
    }
}
