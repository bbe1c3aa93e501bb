//! Invocation plumbing: type-erased call values, collaborator traits, and
//! the interceptor chain.
//!
//! Arguments and return values cross the dispatch boundary as
//! `Box<dyn Any + Send>` - the same store-erased/downcast-on-read scheme the
//! type-keyed registries use. Targets return a [`CallOutcome`] whose error
//! side is their *own* boxed error; the dispatch layer re-raises it through
//! [`InvocationError::Target`] so callers never see an extra wrapper.

use std::any::Any;
use std::sync::Arc;

use crate::descriptor::{MethodDecl, MethodSig};
use crate::error::{InvocationError, TargetError};
use crate::information::RepositoryMethod;

/// A type-erased argument or return value.
pub type CallValue = Box<dyn Any + Send>;

/// What a forwarded target produced: its return value, or its own error.
pub type CallOutcome = Result<CallValue, TargetError>;

/// Result of an invocation routed through the proxy.
pub type InvokeResult = Result<CallValue, InvocationError>;

/// One method call travelling through the interceptor chain.
pub struct MethodInvocation {
    method: Arc<RepositoryMethod>,
    args: Vec<CallValue>,
}

impl MethodInvocation {
    #[must_use]
    pub fn new(method: Arc<RepositoryMethod>, args: Vec<CallValue>) -> Self {
        Self { method, args }
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> &Arc<RepositoryMethod> {
        &self.method
    }

    #[inline]
    #[must_use]
    pub fn args(&self) -> &[CallValue] {
        &self.args
    }

    /// Split into the method handle and the arguments, for forwarding.
    #[must_use]
    pub fn into_parts(self) -> (Arc<RepositoryMethod>, Vec<CallValue>) {
        (self.method, self.args)
    }
}

/// The generic CRUD support target (the "base class" instance), bound to a
/// repository's resolved domain/id types by the factory that created it.
pub trait CrudTarget: Send + Sync {
    /// Invoke the resolved base-class method with the original arguments.
    fn invoke(&self, method: &MethodDecl, args: Vec<CallValue>) -> CallOutcome;
}

/// A caller-supplied implementation backing custom methods.
///
/// The advertised method set participates in classification; `invoke` is
/// consulted only for methods it advertises.
pub trait CustomImplementation: Send + Sync {
    /// The resolved signatures this implementation provides.
    fn methods(&self) -> Vec<MethodSig>;

    /// Invoke the named method with the original arguments.
    fn invoke(&self, method: &str, args: Vec<CallValue>) -> CallOutcome;
}

/// Continuation handed to interceptors: proceed towards dispatch.
pub trait Invoker {
    fn proceed(&self, invocation: MethodInvocation) -> InvokeResult;
}

/// Wrapping advice around dispatch, attached by proxy post-processors.
///
/// Interceptors run in attachment order, each deciding whether and how to
/// call `next`; the dispatch interceptor always sits at the end of the chain.
pub trait CallInterceptor: Send + Sync {
    fn invoke(&self, invocation: MethodInvocation, next: &dyn Invoker) -> InvokeResult;
}

/// Downcast a call value to a concrete type.
///
/// # Errors
/// Returns the value unchanged when it is not a `T`.
pub fn downcast<T: 'static>(value: CallValue) -> Result<T, CallValue> {
    value.downcast::<T>().map(|boxed| *boxed)
}
