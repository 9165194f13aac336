use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::{Error, Result};

type PipeFn = Rc<dyn Fn(&str) -> String>;

/// Named string transforms applied to bound values before they reach the
/// view, e.g. `title::$vm.model.name::upper`.
#[derive(Clone, Default)]
pub struct PipeRegistry {
    pipes: HashMap<String, PipeFn>,
}

impl fmt::Debug for PipeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.pipes.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("PipeRegistry").field("pipes", &names).finish()
    }
}

impl PipeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pipe` under `name`, replacing any previous pipe of that
    /// name.
    pub fn register<F>(&mut self, name: impl Into<String>, pipe: F) -> &mut Self
    where
        F: Fn(&str) -> String + 'static,
    {
        self.pipes.insert(name.into(), Rc::new(pipe));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pipes.contains_key(name)
    }

    /// Runs the pipe registered under `name`. An unknown name is a wiring
    /// bug and fails with [`Error::UnknownPipe`].
    pub fn apply(&self, name: &str, input: &str) -> Result<String> {
        let pipe = self
            .pipes
            .get(name)
            .ok_or_else(|| Error::UnknownPipe(name.to_string()))?;
        Ok(pipe(input))
    }
}
