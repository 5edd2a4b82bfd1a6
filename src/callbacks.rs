//! Lifecycle callbacks.
//!
//! Four independent, append-only lists. The dispatcher decides *when* each
//! stage runs; this module only runs a stage's callbacks in registration
//! order and reports the first failure.

use std::fmt;

use crate::error::{BoxError, Error};
use crate::handler::IntoOutcome;

/// A named point in the dispatch lifecycle where callbacks run.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Stage {
    /// After the route is resolved, before the handler runs.
    Before,
    /// After the handler returned successfully.
    After,
    /// When routing, the handler, or a before/after callback failed.
    Error,
    /// Last, on every dispatch.
    Finish,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Before, Stage::After, Stage::Error, Stage::Finish];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After  => "after",
            Self::Error  => "error",
            Self::Finish => "finish",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Before => 0,
            Self::After  => 1,
            Self::Error  => 2,
            Self::Finish => 3,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform stored shape: only the error stage ever receives `Some`.
type BoxedCallback = Box<dyn Fn(Option<&Error>) -> Result<(), BoxError> + Send + Sync>;

/// Ordered callbacks per [`Stage`].
#[derive(Default)]
pub struct CallbackRegistry {
    stages: [Vec<BoxedCallback>; 4],
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback that takes no arguments.
    ///
    /// Registered on the error stage it simply ignores the error; use
    /// [`register_error`](Self::register_error) to receive it.
    pub fn register<F, R>(&mut self, stage: Stage, callback: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.stages[stage.index()].push(Box::new(move |_| callback().into_outcome()));
    }

    /// Append an error-stage callback that receives the captured error.
    pub fn register_error<F, R>(&mut self, callback: F)
    where
        F: Fn(&Error) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.stages[Stage::Error.index()].push(Box::new(move |err| match err {
            Some(err) => callback(err).into_outcome(),
            None => Ok(()),
        }));
    }

    /// Run every callback of `stage` in registration order.
    ///
    /// The first failure stops the stage and is returned as
    /// [`Error::Callback`]; nothing is caught here.
    pub fn invoke(&self, stage: Stage, error: Option<&Error>) -> Result<(), Error> {
        for callback in &self.stages[stage.index()] {
            callback(error).map_err(|source| Error::Callback { stage, source })?;
        }
        Ok(())
    }

    pub fn len(&self, stage: Stage) -> usize {
        self.stages[stage.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(Vec::is_empty)
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("CallbackRegistry");
        for stage in Stage::ALL {
            d.field(stage.as_str(), &self.len(stage));
        }
        d.finish()
    }
}
