//! # Function Registry
//!
//! Maps a logical function name to the handler that implements it. Built
//! once at startup through [`RegistryBuilder`] and immutable afterwards, so
//! concurrent lookups need no locking.

use async_trait::async_trait;
use serde_json::Value;
use shared_types::{MessageHeader, MessageValue};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Inbound request details handed to a handler alongside its input.
#[derive(Debug, Clone)]
pub struct InboundContext {
    /// Name the handler was resolved under.
    pub function_name: String,
    /// Header of the triggering envelope.
    pub header: MessageHeader,
    /// Value of the triggering envelope.
    pub value: MessageValue,
}

/// A business handler invoked by the dispatcher.
///
/// Returning `Err` produces an `ERROR_RESPONSE` envelope carrying the error
/// message; retries, if any, are the handler's own business.
#[async_trait]
pub trait FunctionHandler: Send + Sync {
    async fn call(&self, input: Value, context: InboundContext) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F, Fut> FunctionHandler for F
where
    F: Fn(Value, InboundContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn call(&self, input: Value, context: InboundContext) -> anyhow::Result<Value> {
        (self)(input, context).await
    }
}

/// Shared handler reference stored in the registry.
pub type DynFunctionHandler = Arc<dyn FunctionHandler>;

/// Errors raised while building a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("function {0} registered more than once")]
    Duplicate(String),
    #[error("function name must not be empty")]
    EmptyName,
}

/// Immutable function-name to handler map.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    handlers: HashMap<String, DynFunctionHandler>,
}

impl FunctionRegistry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Resolve a function name.
    pub fn get(&self, name: &str) -> Option<DynFunctionHandler> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

/// Collects handlers before freezing them into a [`FunctionRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<String, DynFunctionHandler>,
    errors: Vec<RegistryError>,
}

impl RegistryBuilder {
    /// Register a handler under `name`.
    pub fn register<H>(self, name: impl Into<String>, handler: H) -> Self
    where
        H: FunctionHandler + 'static,
    {
        self.register_arc(name, Arc::new(handler))
    }

    /// Register an already shared handler.
    pub fn register_arc(mut self, name: impl Into<String>, handler: DynFunctionHandler) -> Self {
        let name = name.into();
        if name.trim().is_empty() {
            self.errors.push(RegistryError::EmptyName);
        } else if self.handlers.contains_key(&name) {
            self.errors.push(RegistryError::Duplicate(name));
        } else {
            self.handlers.insert(name, handler);
        }
        self
    }

    /// Freeze the registry. Fails on the first registration error.
    pub fn build(self) -> Result<FunctionRegistry, RegistryError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        Ok(FunctionRegistry {
            handlers: self.handlers,
        })
    }
}
