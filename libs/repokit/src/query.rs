//! Query lookup boundary.
//!
//! The core never parses or executes queries itself. It decides *which*
//! methods are query methods, hands each one to the configured
//! [`QueryLookupStrategy`] exactly once at proxy-construction time, and
//! stores the resolved query objects in the proxy's dispatch table.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::TargetError;
use crate::information::{RepositoryInformation, RepositoryMethod};
use crate::invoke::{CallOutcome, CallValue};

/// An executable query resolved from a repository method.
pub trait RepositoryQuery: Send + Sync {
    /// Execute with the invocation's original arguments.
    fn execute(&self, args: Vec<CallValue>) -> CallOutcome;
}

/// Lookup mode forwarded to the strategy, selecting how it should obtain a
/// query for a method.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryLookupKey {
    /// Only use a query declared up front; never derive one.
    UseDeclared,
    /// Always derive a query from the method itself.
    Create,
    /// Prefer a declared query, derive one otherwise.
    #[default]
    CreateIfNotFound,
}

/// Pluggable resolver turning a classified query method into an executable
/// query object.
pub trait QueryLookupStrategy: Send + Sync {
    /// Resolve `method` under the given lookup mode.
    ///
    /// `Ok(None)` means the strategy does not recognize the method as a
    /// query; classification then falls back to a custom method.
    ///
    /// # Errors
    /// A strategy error is a construction-time configuration defect and
    /// aborts proxy construction.
    fn resolve_query(
        &self,
        method: &RepositoryMethod,
        information: &RepositoryInformation,
        key: QueryLookupKey,
    ) -> Result<Option<Arc<dyn RepositoryQuery>>, TargetError>;
}

/// Strategy that recognizes nothing. Useful for repositories whose entire
/// surface is CRUD plus custom methods, and in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullQueryLookup;

impl QueryLookupStrategy for NullQueryLookup {
    fn resolve_query(
        &self,
        _method: &RepositoryMethod,
        _information: &RepositoryInformation,
        _key: QueryLookupKey,
    ) -> Result<Option<Arc<dyn RepositoryQuery>>, TargetError> {
        Ok(None)
    }
}
