use log::info;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{Result, TaskErr, family::TaskFamily, task::Task};

/// Runs a forward and a backward pass of `task` on a single batch.
///
/// # Arguments
/// * `task` - The task under test.
///
/// # Returns
/// An error if any step fails or the gradient doesn't match the parameters.
pub fn smoketest_task<T: Task>(task: &T) -> Result<()> {
    let seed = 0;
    let name = task.name();
    let (params, state) = task.init(seed);

    info!(task = name; "getting data");
    let datasets = task.datasets();
    let batch = match &datasets {
        Some(datasets) => {
            let mut batches = datasets.train.iter(seed);
            batches.next().unwrap_or_default()
        }
        None => T::Batch::default(),
    };

    info!(task = name; "starting forward");
    task.loss(&params, state.as_ref(), seed, &batch)?;

    info!(task = name; "starting backward");
    let out = task.loss_and_grad(&params, state.as_ref(), seed, &batch)?;
    params.check_compatible(&out.grad)?;

    info!(task = name; "done");
    Ok(())
}

/// Samples two tasks from `family` and smoke tests both.
///
/// # Returns
/// An error if any of the sampled tasks fails or if a task has datasets while
/// the family doesn't.
pub fn smoketest_task_family<F: TaskFamily>(family: &F) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0);

    for _ in 0..2 {
        let cfg = family.sample(rng.random());
        let task = family.task_fn(&cfg);
        smoketest_task(&task)?;

        if task.datasets().is_some() && family.datasets().is_none() {
            return Err(TaskErr::MissingFamilyDatasets {
                task: task.name().to_string(),
            });
        }
    }

    Ok(())
}
