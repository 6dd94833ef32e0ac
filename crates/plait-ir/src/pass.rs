//! Passes and their composition.
//!
//! A [`Pass`] transforms a graph in place and reports whether it changed
//! anything. Passes keep no state between runs; they touch the graph only
//! through its mutation API.

use crate::error::IrResult;
use crate::graph::Graph;

pub trait Pass {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Run over `graph`, returning whether anything changed.
    fn run(&self, graph: &mut Graph) -> IrResult<bool>;
}

impl<P: Pass + ?Sized> Pass for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(&self, graph: &mut Graph) -> IrResult<bool> {
        (**self).run(graph)
    }
}

// ============================================================================
// FnPass
// ============================================================================

/// A pass backed by a closure.
pub struct FnPass<F> {
    name: String,
    f: F,
}

impl<F> FnPass<F>
where
    F: Fn(&mut Graph) -> IrResult<bool>,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Pass for FnPass<F>
where
    F: Fn(&mut Graph) -> IrResult<bool>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, graph: &mut Graph) -> IrResult<bool> {
        (self.f)(graph)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// An ordered sequence of passes run over the same graph.
///
/// Every step runs even if an earlier one reported no change; the result is
/// the OR of all steps.
pub struct Pipeline {
    name: String,
    steps: Vec<Box<dyn Pass>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn add_step(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.steps.push(Box::new(pass));
        self
    }

    pub fn with_step(mut self, pass: impl Pass + 'static) -> Self {
        self.add_step(pass);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names of the steps, in run order.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|step| step.name())
    }
}

impl Pass for Pipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, graph: &mut Graph) -> IrResult<bool> {
        tracing::debug!(pipeline = %self.name, steps = self.steps.len(), "running pipeline");
        let mut changed = false;
        for step in &self.steps {
            let step_changed = step.run(graph)?;
            tracing::debug!(pass = step.name(), changed = step_changed, "pass finished");
            changed |= step_changed;
        }
        Ok(changed)
    }
}

// ============================================================================
// UntilStable
// ============================================================================

/// Re-runs a pass while it keeps reporting change.
pub struct UntilStable<P> {
    name: String,
    pass: P,
}

impl<P: Pass> UntilStable<P> {
    pub fn new(pass: P) -> Self {
        Self {
            name: format!("until-stable({})", pass.name()),
            pass,
        }
    }

    pub fn inner(&self) -> &P {
        &self.pass
    }
}

impl<P: Pass> Pass for UntilStable<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, graph: &mut Graph) -> IrResult<bool> {
        let mut changed = false;
        let mut iterations = 0usize;
        while self.pass.run(graph)? {
            changed = true;
            iterations += 1;
        }
        tracing::debug!(pass = self.pass.name(), iterations, "reached a fixed point");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::NodeRef;
    use crate::test_dialect::{TestAdd, float_tensor, test_registry};

    fn add_graph() -> (Graph, NodeRef) {
        let mut graph = Graph::new("add", test_registry());
        let x = graph.new_argument(float_tensor(&[2])).unwrap();
        let y = graph.new_argument(float_tensor(&[2])).unwrap();
        let sum = graph
            .builder::<TestAdd>()
            .unwrap()
            .operand(x)
            .operand(y)
            .insert(&mut graph)
            .unwrap();
        graph.add_output(Some(sum)).unwrap();
        (graph, sum)
    }

    #[test]
    fn empty_pipeline_leaves_graph_alone() {
        let (mut graph, sum) = add_graph();
        let before = graph.to_string();
        let changed = Pipeline::new("empty").run(&mut graph).unwrap();
        assert!(!changed);
        assert_eq!(graph.live_nodes().count(), 1);
        assert_eq!(graph.outputs(), &[Some(sum)]);
        assert_eq!(graph.to_string(), before);
    }

    #[test]
    fn pipeline_runs_every_step_in_order() {
        let (mut graph, _) = add_graph();
        let log = Rc::new(RefCell::new(Vec::new()));
        let step = |name: &'static str, changed: bool| {
            let log = log.clone();
            FnPass::new(name, move |_: &mut Graph| {
                log.borrow_mut().push(name);
                Ok(changed)
            })
        };

        let pipeline = Pipeline::new("p")
            .with_step(step("a", true))
            .with_step(step("b", false))
            .with_step(step("c", false));
        assert!(pipeline.run(&mut graph).unwrap());
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(pipeline.step_names().collect::<Vec<_>>(), vec!["a", "b", "c"]);

        let quiet = Pipeline::new("q").with_step(step("d", false));
        assert!(!quiet.run(&mut graph).unwrap());
    }

    #[test]
    fn pipeline_stops_at_first_error() {
        let (mut graph, _) = add_graph();
        let ran = Rc::new(Cell::new(false));
        let ran_after = ran.clone();
        let pipeline = Pipeline::new("p")
            .with_step(FnPass::new("fail", |graph: &mut Graph| {
                graph.set_insertion_point_before(Some(graph.output_node()))?;
                Ok(true)
            }))
            .with_step(FnPass::new("after", move |_: &mut Graph| {
                ran_after.set(true);
                Ok(false)
            }));
        assert!(pipeline.run(&mut graph).is_err());
        assert!(!ran.get());
    }

    #[test]
    fn until_stable_reaches_a_fixed_point() {
        let (mut graph, _) = add_graph();
        let budget = Rc::new(Cell::new(3));
        let counter = budget.clone();
        let pass = UntilStable::new(FnPass::new("countdown", move |_: &mut Graph| {
            let left = counter.get();
            if left == 0 {
                return Ok(false);
            }
            counter.set(left - 1);
            Ok(true)
        }));

        assert!(pass.run(&mut graph).unwrap());
        assert_eq!(budget.get(), 0);
        // A second run, and the inner pass on its own, see nothing to do.
        assert!(!pass.run(&mut graph).unwrap());
        assert!(!pass.inner().run(&mut graph).unwrap());
        assert_eq!(pass.name(), "until-stable(countdown)");
    }
}
