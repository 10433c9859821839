//! Pass trait and pass manager.

use crate::ir::Function;

/// Trait for function-level passes.
///
/// A pass transforms one function's operation graph in place. `run()` returns
/// `Ok(true)` if the graph changed, so callers can detect fixed points.
pub trait Pass: Send + Sync {
    /// Error type produced by this pass.
    type Error: From<crate::Error>;

    /// Get the pass name (used for logging and debugging).
    fn name(&self) -> &str;

    /// Run the pass on the given function.
    fn run(&self, func: &mut Function) -> std::result::Result<bool, Self::Error>;
}

/// Runs passes in registration order over one function at a time.
///
/// Functions own disjoint graphs, so independent manager instances may run on
/// different functions in parallel; no state is shared between runs.
pub struct PassManager<E> {
    passes: Vec<Box<dyn Pass<Error = E>>>,
}

impl<E: From<crate::Error>> PassManager<E> {
    /// Create an empty pass manager.
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Add a pass. Passes run in the order they were added.
    pub fn add_pass(&mut self, pass: impl Pass<Error = E> + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Run all passes over the function.
    ///
    /// Returns `Ok(true)` if any pass changed the graph.
    pub fn run(&self, func: &mut Function) -> std::result::Result<bool, E> {
        let mut changed = false;
        for pass in &self.passes {
            let _span = tracing::debug_span!("pass", name = pass.name()).entered();
            changed |= pass.run(func)?;
        }
        Ok(changed)
    }
}

impl<E: From<crate::Error>> Default for PassManager<E> {
    fn default() -> Self {
        Self::new()
    }
}
