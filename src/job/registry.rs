//! Job Handler Registry
//!
//! Maps string-based handler identifiers (e.g. "send_email") to factories
//! producing the code that performs the work. Handlers are looked up by exact
//! key at execution time; an unknown identifier is a `HandlerNotFound` error.

use crate::error::{Error, Result};

use async_trait::async_trait;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Distinguished abstain condition: a handler's setup or perform raises this
/// to skip the job without marking it failed. Not an error in the failure
/// taxonomy — `Job::perform` swallows it and reports `false`.
#[derive(Debug, thiserror::Error)]
#[error("handler chose not to perform")]
pub struct DontPerform;

/// The work-performer behind a handler identifier.
///
/// `perform` is the required work entry; `setup` and `teardown` are optional
/// lifecycle hooks invoked around it. All three receive the job's single
/// argument record.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn setup(&self, _args: &serde_json::Value) -> anyhow::Result<()> {
        Ok(())
    }

    async fn perform(&self, args: &serde_json::Value) -> anyhow::Result<()>;

    async fn teardown(&self, _args: &serde_json::Value) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Factory producing one handler instance; invoked once per reserved job and
/// cached on the `Job` value.
pub type HandlerFactory = Arc<dyn Fn() -> Arc<dyn JobHandler> + Send + Sync>;

type PerformFn = Arc<
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send
        + Sync,
>;

/// Closure-backed handler for callers that don't need setup/teardown.
struct FnHandler {
    perform: PerformFn,
}

#[async_trait]
impl JobHandler for FnHandler {
    async fn perform(&self, args: &serde_json::Value) -> anyhow::Result<()> {
        (self.perform)(args.clone()).await
    }
}

/// Registry holding the mapping between handler names and their factories.
pub struct HandlerRegistry {
    factories: DashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            factories: DashMap::new(),
        })
    }

    /// Register a factory under a handler identifier.
    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn JobHandler> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
        tracing::info!("Registered job handler: {}", name);
    }

    /// Register a bare async closure as the work entry.
    pub fn register_fn<F, Fut>(&self, name: &str, perform: F)
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let perform: PerformFn = Arc::new(move |args| Box::pin(perform(args)));
        let handler: Arc<dyn JobHandler> = Arc::new(FnHandler { perform });
        self.register(name, move || handler.clone());
    }

    /// Instantiate the handler registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn JobHandler>> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory.value()()),
            None => Err(Error::HandlerNotFound(name.to_string())),
        }
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn handler_count(&self) -> usize {
        self.factories.len()
    }

    /// Returns a list of all registered handler names.
    pub fn list_handlers(&self) -> Vec<String> {
        self.factories
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }
}
