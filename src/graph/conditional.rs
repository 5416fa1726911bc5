//! Conditional routing: `(state) -> key`, optionally remapped via `path_map`.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

pub type ConditionalRouterFn<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

#[derive(Clone)]
pub struct ConditionalRouter<S> {
    pub path: ConditionalRouterFn<S>,
    pub path_map: Option<HashMap<String, String>>,
}

impl<S> ConditionalRouter<S> {
    pub fn new(path: ConditionalRouterFn<S>, path_map: Option<HashMap<String, String>>) -> Self {
        Self { path, path_map }
    }

    pub fn resolve(&self, state: &S) -> String
    where
        S: Clone + Send + Sync + Debug + 'static,
    {
        let key = (self.path)(state);
        match &self.path_map {
            Some(map) => map.get(&key).cloned().unwrap_or(key),
            None => key,
        }
    }
}

/// Either a fixed next node (unconditional edge) or a router resolved at
/// runtime from state.
#[derive(Clone)]
pub enum NextEntry<S> {
    Unconditional(String),
    Conditional(ConditionalRouter<S>),
}
