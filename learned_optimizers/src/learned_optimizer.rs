use optimizers::{Optimizer, ParamTree, Result};

/// An optimizer parameterized by meta parameters `theta`.
///
/// Meta training searches for the `theta` whose inner optimizer performs best,
/// the inner optimizer is rebuilt from `theta` every time it changes.
pub trait LearnedOptimizer {
    type Opt: Optimizer;

    /// Samples the initial meta parameters.
    ///
    /// # Arguments
    /// * `seed` - The seed for stochastic initializations.
    fn init(&self, seed: u64) -> ParamTree;

    /// Builds the inner optimizer described by `theta`.
    ///
    /// # Arguments
    /// * `theta` - The meta parameters.
    ///
    /// # Returns
    /// The inner optimizer or an error if `theta` doesn't have the expected leaves.
    fn opt_fn(&self, theta: &ParamTree) -> Result<Self::Opt>;

    fn name(&self) -> &'static str;
}
