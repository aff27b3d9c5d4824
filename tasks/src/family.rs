use std::fmt;

use crate::{datasets::Datasets, task::Task};

/// A parametric distribution over tasks.
pub trait TaskFamily {
    type Cfg: Clone + fmt::Debug + Send + Sync;
    type Task: Task;

    /// Samples the configuration of a new task.
    fn sample(&self, seed: u64) -> Self::Cfg;

    /// Builds the task described by `cfg`.
    fn task_fn(&self, cfg: &Self::Cfg) -> Self::Task;

    fn eval_task_fn(&self, cfg: &Self::Cfg) -> Self::Task {
        self.task_fn(cfg)
    }

    fn sample_task(&self, seed: u64) -> Self::Task {
        let cfg = self.sample(seed);
        self.task_fn(&cfg)
    }

    fn datasets(&self) -> Option<Datasets<<Self::Task as Task>::Batch>> {
        None
    }

    /// The datasets of the tasks built by `eval_task_fn`.
    fn eval_datasets(&self) -> Option<Datasets<<Self::Task as Task>::Batch>> {
        self.datasets()
    }

    fn name(&self) -> &str;
}

/// A family that always yields the same task.
#[derive(Debug, Clone)]
pub struct SingleTaskFamily<T> {
    task: T,
    eval_task: T,
    name: Option<String>,
}

impl<T: Task + Clone> SingleTaskFamily<T> {
    /// Creates a new `SingleTaskFamily`.
    ///
    /// # Arguments
    /// * `task` - The task returned by `task_fn`.
    /// * `name` - The name of the family, defaults to the task name.
    /// * `eval_task` - The task returned by `eval_task_fn`, defaults to `task`.
    pub fn new(task: T, name: Option<String>, eval_task: Option<T>) -> Self {
        let eval_task = eval_task.unwrap_or_else(|| task.clone());

        Self {
            task,
            eval_task,
            name,
        }
    }
}

impl<T: Task + Clone> TaskFamily for SingleTaskFamily<T> {
    type Cfg = ();
    type Task = T;

    fn sample(&self, _seed: u64) -> Self::Cfg {}

    fn task_fn(&self, _cfg: &Self::Cfg) -> Self::Task {
        self.task.clone()
    }

    fn eval_task_fn(&self, _cfg: &Self::Cfg) -> Self::Task {
        self.eval_task.clone()
    }

    fn datasets(&self) -> Option<Datasets<T::Batch>> {
        self.task.datasets()
    }

    fn eval_datasets(&self) -> Option<Datasets<T::Batch>> {
        self.eval_task.datasets()
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.task.name())
    }
}
