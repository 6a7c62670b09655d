use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt as _;
use serde_json::json;

use super::error::{BoxError, Error, Result};

/// Opaque result body, only ever logged.
pub type Payload = serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    pub success: bool,
    pub payload: Payload,
}

impl OperationResult {
    #[must_use]
    pub fn succeeded(payload: Payload) -> Self {
        Self {
            success: true,
            payload,
        }
    }

    #[must_use]
    pub fn failed(payload: Payload) -> Self {
        Self {
            success: false,
            payload,
        }
    }

    #[must_use]
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = vec![err.to_string()];
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        Self::failed(json!({ "error": chain.join(": ") }))
    }
}

/// One named unit of backend work, invoked against a per-user context `C`.
///
/// Returning `Err` (or panicking) is allowed: [`safe_invoke`] turns it into a failed result.
#[async_trait]
pub trait Operation<C: Sync + ?Sized>: Send + Sync {
    async fn invoke(&self, ctx: &C) -> std::result::Result<OperationResult, BoxError>;
}

/// Adapts a context-free async closure into an [`Operation`].
pub struct FnOperation<F>(F);

#[must_use]
pub fn from_fn<F>(f: F) -> FnOperation<F> {
    FnOperation(f)
}

#[async_trait]
impl<C, F, Fut> Operation<C> for FnOperation<F>
where
    C: Sync + ?Sized,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<OperationResult, BoxError>> + Send,
{
    async fn invoke(&self, _ctx: &C) -> std::result::Result<OperationResult, BoxError> {
        (self.0)().await
    }
}

/// Invokes `op` once and always yields a typed result; errors and panics become failures.
pub async fn safe_invoke<C: Sync + ?Sized>(op: &dyn Operation<C>, ctx: &C) -> OperationResult {
    match AssertUnwindSafe(op.invoke(ctx)).catch_unwind().await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => OperationResult::from_error(err.as_ref()),
        Err(panic) => {
            let msg = if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic.downcast_ref::<&str>() {
                (*s).to_string()
            } else {
                "unknown panic".to_string()
            };
            OperationResult::failed(json!({ "error": format!("operation panicked: {msg}") }))
        }
    }
}

pub struct RegisteredOperation<C: ?Sized> {
    name: Arc<str>,
    operation: Arc<dyn Operation<C>>,
}

impl<C: ?Sized> Clone for RegisteredOperation<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            operation: self.operation.clone(),
        }
    }
}

impl<C: Sync + ?Sized> RegisteredOperation<C> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    pub async fn invoke(&self, ctx: &C) -> OperationResult {
        safe_invoke(self.operation.as_ref(), ctx).await
    }
}

impl<C: ?Sized> std::fmt::Debug for RegisteredOperation<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredOperation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Closed set of operations a workload supports, in registration order.
pub struct OperationRegistry<C: ?Sized> {
    entries: Vec<RegisteredOperation<C>>,
}

impl<C: ?Sized> Default for OperationRegistry<C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<C: Sync + ?Sized + 'static> OperationRegistry<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<O>(&mut self, name: impl Into<Arc<str>>, operation: O) -> Result<()>
    where
        O: Operation<C> + 'static,
    {
        let name = name.into();
        if self.entries.iter().any(|e| e.name == name) {
            return Err(Error::DuplicateOperation(name.to_string()));
        }
        self.entries.push(RegisteredOperation {
            name,
            operation: Arc::new(operation),
        });
        Ok(())
    }

    /// Builder form of [`OperationRegistry::register`].
    pub fn with<O>(mut self, name: impl Into<Arc<str>>, operation: O) -> Result<Self>
    where
        O: Operation<C> + 'static,
    {
        self.register(name, operation)?;
        Ok(self)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Active operations for a run: the registry filtered to `selection`, or everything when
    /// no selection is given. Registration order is kept regardless of selection order.
    pub fn select(&self, selection: Option<&[String]>) -> Result<Vec<RegisteredOperation<C>>> {
        let selected: Vec<RegisteredOperation<C>> = match selection {
            None => self.entries.clone(),
            Some(names) => {
                for name in names {
                    if !self.entries.iter().any(|e| e.name.as_ref() == name) {
                        return Err(Error::UnknownOperation {
                            name: name.clone(),
                            known: self.names().collect::<Vec<_>>().join(", "),
                        });
                    }
                }
                self.entries
                    .iter()
                    .filter(|e| names.iter().any(|n| n.as_str() == e.name.as_ref()))
                    .cloned()
                    .collect()
            }
        };

        if selected.is_empty() {
            return Err(Error::NoOperations);
        }
        Ok(selected)
    }
}
