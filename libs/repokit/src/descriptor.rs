//! Declaration model for repository interfaces.
//!
//! Rust has no runtime view of generic signatures, so the shape of a
//! repository interface is captured as explicit descriptor data: which type
//! variables an interface declares, which parameterized parents it extends,
//! and which methods it carries. The resolver and classifier operate on this
//! data instead of reflective `Class`/`Method` handles.
//!
//! Descriptors are built once per interface with the `with_*` builders and
//! shared as `Arc`s; they are immutable after construction.

use std::fmt;
use std::sync::Arc;

/// Stable key for a concrete Rust type - uses fully-qualified `type_name::<T>()`,
/// which works for `T = dyn Trait` as well as plain structs.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct TypeKey(&'static str);

impl TypeKey {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeKey(std::any::type_name::<T>())
    }

    /// The fully-qualified type name backing this key.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A type position in a declaration: a concrete type, or a type variable
/// bound by the declaring interface (or, for base-class methods, by the
/// marker interface).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TypeRef {
    Concrete(TypeKey),
    Var(&'static str),
}

impl TypeRef {
    /// Shorthand for a concrete type reference.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeRef::Concrete(TypeKey::of::<T>())
    }

    /// Shorthand for a type-variable reference.
    #[inline]
    #[must_use]
    pub fn var(name: &'static str) -> Self {
        TypeRef::Var(name)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Concrete(key) => fmt::Display::fmt(key, f),
            TypeRef::Var(name) => f.write_str(name),
        }
    }
}

/// A method as declared on an interface or base class.
///
/// Parameter positions may reference type variables; return types play no
/// role in signature matching and are not modeled.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodDecl {
    name: &'static str,
    params: Vec<TypeRef>,
}

impl MethodDecl {
    #[must_use]
    pub fn new(name: &'static str, params: Vec<TypeRef>) -> Self {
        Self { name, params }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &[TypeRef] {
        &self.params
    }

    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// A fully resolved method signature: name plus concrete parameter types.
///
/// This is the shape custom implementations advertise, after every type
/// variable has been substituted away.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodSig {
    name: &'static str,
    params: Vec<TypeKey>,
}

impl MethodSig {
    #[must_use]
    pub fn new(name: &'static str, params: Vec<TypeKey>) -> Self {
        Self { name, params }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &[TypeKey] {
        &self.params
    }

    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// An `extends` edge: a parent interface together with the type arguments
/// supplied for the parent's type variables. Arguments may themselves be
/// variables of the declaring (child) interface.
#[derive(Clone, Debug)]
pub struct ExtendsClause {
    parent: Arc<InterfaceDecl>,
    args: Vec<TypeRef>,
}

impl ExtendsClause {
    #[inline]
    #[must_use]
    pub fn parent(&self) -> &Arc<InterfaceDecl> {
        &self.parent
    }

    #[inline]
    #[must_use]
    pub fn args(&self) -> &[TypeRef] {
        &self.args
    }
}

/// Declaration of a repository (or marker, or fragment) interface.
#[derive(Clone, Debug)]
pub struct InterfaceDecl {
    name: &'static str,
    vars: Vec<&'static str>,
    extends: Vec<ExtendsClause>,
    methods: Vec<Arc<MethodDecl>>,
}

impl InterfaceDecl {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            vars: Vec::new(),
            extends: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Declare a type variable on this interface (e.g. `T`, `ID`).
    #[must_use]
    pub fn with_var(mut self, name: &'static str) -> Self {
        self.vars.push(name);
        self
    }

    /// Extend a parent interface with the given type arguments.
    #[must_use]
    pub fn with_extends(mut self, parent: Arc<InterfaceDecl>, args: Vec<TypeRef>) -> Self {
        self.extends.push(ExtendsClause { parent, args });
        self
    }

    /// Declare a method on this interface.
    #[must_use]
    pub fn with_method(mut self, method: MethodDecl) -> Self {
        self.methods.push(Arc::new(method));
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn vars(&self) -> &[&'static str] {
        &self.vars
    }

    #[inline]
    #[must_use]
    pub fn extends(&self) -> &[ExtendsClause] {
        &self.extends
    }

    #[inline]
    #[must_use]
    pub fn methods(&self) -> &[Arc<MethodDecl>] {
        &self.methods
    }

    /// Validate this declaration and every ancestor reachable through
    /// `extends`.
    ///
    /// Checks: no duplicate type variables, no duplicate (name, arity) method
    /// declarations on one interface, extends argument counts matching the
    /// parent's variable counts, and no references to variables the declaring
    /// interface does not bind.
    ///
    /// # Errors
    /// Returns the first [`DescriptorError`] found.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let mut visited = std::collections::HashSet::new();
        self.validate_inner(&mut visited)
    }

    fn validate_inner(
        &self,
        visited: &mut std::collections::HashSet<&'static str>,
    ) -> Result<(), DescriptorError> {
        if !visited.insert(self.name) {
            return Ok(());
        }

        for (idx, &var) in self.vars.iter().enumerate() {
            if self.vars[..idx].contains(&var) {
                return Err(DescriptorError::DuplicateTypeVariable {
                    interface: self.name,
                    var,
                });
            }
        }

        for (idx, method) in self.methods.iter().enumerate() {
            let dup = self.methods[..idx]
                .iter()
                .any(|m| m.name() == method.name() && m.arity() == method.arity());
            if dup {
                return Err(DescriptorError::DuplicateMethod {
                    interface: self.name,
                    method: method.name(),
                    arity: method.arity(),
                });
            }
            for param in method.params() {
                self.check_var_bound(*param)?;
            }
        }

        for clause in &self.extends {
            if clause.args.len() != clause.parent.vars.len() {
                return Err(DescriptorError::ExtendsArityMismatch {
                    interface: self.name,
                    parent: clause.parent.name,
                    expected: clause.parent.vars.len(),
                    actual: clause.args.len(),
                });
            }
            for arg in &clause.args {
                self.check_var_bound(*arg)?;
            }
            clause.parent.validate_inner(visited)?;
        }

        Ok(())
    }

    fn check_var_bound(&self, type_ref: TypeRef) -> Result<(), DescriptorError> {
        if let TypeRef::Var(var) = type_ref {
            if !self.vars.contains(&var) {
                return Err(DescriptorError::UnboundTypeVariable {
                    interface: self.name,
                    var,
                });
            }
        }
        Ok(())
    }
}

/// Declaration of the generic CRUD support implementation (the "base class").
///
/// Parameter positions may reference the *marker interface's* type variables
/// by name; the signature matcher substitutes the repository's resolved
/// domain/id types for them.
#[derive(Clone, Debug)]
pub struct BaseClassDecl {
    name: &'static str,
    methods: Vec<Arc<MethodDecl>>,
}

impl BaseClassDecl {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            methods: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: MethodDecl) -> Self {
        self.methods.push(Arc::new(method));
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn methods(&self) -> &[Arc<MethodDecl>] {
        &self.methods
    }
}

/// Malformed declaration, detected before any proxy is built.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("interface '{interface}' declares type variable '{var}' more than once")]
    DuplicateTypeVariable {
        interface: &'static str,
        var: &'static str,
    },

    #[error("interface '{interface}' declares method '{method}' with arity {arity} more than once")]
    DuplicateMethod {
        interface: &'static str,
        method: &'static str,
        arity: usize,
    },

    #[error("interface '{interface}' extends '{parent}' with {actual} type argument(s), expected {expected}")]
    ExtendsArityMismatch {
        interface: &'static str,
        parent: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("'{interface}' references type variable '{var}' it does not declare")]
    UnboundTypeVariable {
        interface: &'static str,
        var: &'static str,
    },
}
