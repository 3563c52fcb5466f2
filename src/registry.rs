//! The set registry.
//!
//! Build one at startup, register sets into it, then build pipelines from it:
//!
//! ```rust
//! use std::sync::Arc;
//! use tsu_sets::{MiddlewareRef, Registry, from_fn};
//!
//! # fn main() -> Result<(), tsu_sets::Error> {
//! let registry = Arc::new(Registry::new());
//!
//! registry.create_set("auth", from_fn(|req, _res| {
//!     req.extensions_mut().insert("alice");
//! }));
//! registry.create_set("api", vec![MiddlewareRef::from("auth")]);
//!
//! let pipeline = registry.apply_middleware("api", from_fn(|_req, res| {
//!     res.text(200, "hello");
//! }))?;
//! assert_eq!(pipeline.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! Main-chain sets and error sets live in separate tables because their
//! handlers have different signatures. Names in one table never resolve
//! against the other.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::Error;
use crate::error_handler::{ErrorHandlerOptions, default_error_handler};
use crate::handler::{BoxedErrorHandler, BoxedMiddleware, Terminal};
use crate::pipeline::Pipeline;
use crate::resolve::{SetTable, resolve};
use crate::set::{ErrorHandlerRef, HandlerRef, MiddlewareRef};

/// Name of the set [`Registry::apply`] uses.
pub const DEFAULT_SET: &str = "default";

/// Name of the error set a pipeline consults when a handler fails.
pub const ERROR_HANDLER_SET: &str = "errorHandler";

/// Named middleware sets and error-handler sets.
///
/// Registration replaces: creating a set under an existing name drops the
/// old list entirely. There is no removal; register an empty list instead.
///
/// Shared as `Arc<Registry>`. Pipelines keep a reference so the error set is
/// looked up when an error happens, not when the pipeline is built.
pub struct Registry {
    sets: RwLock<SetTable<BoxedMiddleware>>,
    error_sets: RwLock<SetTable<BoxedErrorHandler>>,
}

impl Registry {
    /// A registry with an empty `"default"` set and the default error handler
    /// registered as `"errorHandler"`.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.create_set(DEFAULT_SET, MiddlewareRef::List(Vec::new()));
        registry.create_error_set(
            ERROR_HANDLER_SET,
            default_error_handler(ErrorHandlerOptions::default()),
        );
        registry
    }

    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            sets: RwLock::new(SetTable::new()),
            error_sets: RwLock::new(SetTable::new()),
        }
    }

    /// Registers a middleware set under `name`, replacing any previous one.
    ///
    /// A bare handler or name is stored as a one-element list.
    pub fn create_set(&self, name: impl Into<String>, set: impl Into<MiddlewareRef>) {
        let name = name.into();
        let items = set.into().into_list();
        debug!(set = %name, entries = items.len(), "middleware set registered");
        self.sets.write().insert(name, items);
    }

    /// The set stored under `name`, exactly as registered (names unresolved).
    pub fn get_set(&self, name: &str) -> Option<Vec<MiddlewareRef>> {
        self.sets.read().get(name).cloned()
    }

    /// Registers an error-handler set under `name`, replacing any previous one.
    pub fn create_error_set(&self, name: impl Into<String>, set: impl Into<ErrorHandlerRef>) {
        let name = name.into();
        let items = set.into().into_list();
        debug!(set = %name, entries = items.len(), "error set registered");
        self.error_sets.write().insert(name, items);
    }

    pub fn get_error_set(&self, name: &str) -> Option<Vec<ErrorHandlerRef>> {
        self.error_sets.read().get(name).cloned()
    }

    /// Registered middleware set names, sorted.
    pub fn set_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sets.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Flattens a middleware reference into the handlers it names, in order.
    pub fn resolve(&self, reference: &MiddlewareRef) -> Result<Vec<BoxedMiddleware>, Error> {
        resolve(&*self.sets.read(), reference)
    }

    /// Flattens an error-handler reference against the error table.
    pub fn resolve_errors(&self, reference: &ErrorHandlerRef) -> Result<Vec<BoxedErrorHandler>, Error> {
        resolve(&*self.error_sets.read(), reference)
    }

    /// The current error chain. An unregistered `"errorHandler"` set counts
    /// as empty; anything it references must still resolve.
    pub(crate) fn error_chain(&self) -> Result<Vec<BoxedErrorHandler>, Error> {
        let sets = self.error_sets.read();
        if !sets.contains_key(ERROR_HANDLER_SET) {
            return Ok(Vec::new());
        }
        resolve(&*sets, &HandlerRef::name(ERROR_HANDLER_SET))
    }

    /// Builds a pipeline running `middleware` and then `terminal`.
    pub fn apply_middleware(
        self: &Arc<Self>,
        middleware: impl Into<MiddlewareRef>,
        terminal: impl Terminal,
    ) -> Result<Pipeline, Error> {
        Pipeline::build(Arc::clone(self), Some(middleware.into()), terminal)
    }

    /// Builds a pipeline running the `"default"` set and then `terminal`.
    pub fn apply(self: &Arc<Self>, terminal: impl Terminal) -> Result<Pipeline, Error> {
        Pipeline::build(Arc::clone(self), None, terminal)
    }
}

impl Default for Registry {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_fn;

    fn noop() -> MiddlewareRef {
        from_fn(|_req, _res| {}).into()
    }

    #[test]
    fn new_registers_default_and_error_sets() {
        let registry = Registry::new();
        assert_eq!(registry.get_set(DEFAULT_SET).map(|s| s.len()), Some(0));
        assert_eq!(registry.get_error_set(ERROR_HANDLER_SET).map(|s| s.len()), Some(1));
    }

    #[test]
    fn empty_registers_nothing() {
        let registry = Registry::empty();
        assert!(registry.get_set(DEFAULT_SET).is_none());
        assert!(registry.get_error_set(ERROR_HANDLER_SET).is_none());
        assert!(registry.error_chain().unwrap().is_empty());
    }

    #[test]
    fn bare_handler_is_stored_as_one_element_list() {
        let registry = Registry::empty();
        registry.create_set("single", from_fn(|_req, _res| {}));
        assert_eq!(registry.get_set("single").unwrap().len(), 1);
    }

    #[test]
    fn get_set_returns_names_unresolved() {
        let registry = Registry::empty();
        registry.create_set("outer", vec!["inner".into(), noop()]);

        let stored = registry.get_set("outer").unwrap();
        assert!(matches!(&stored[0], HandlerRef::Name(n) if n == "inner"));
        assert!(matches!(&stored[1], HandlerRef::Handler(_)));
    }

    #[test]
    fn create_set_replaces_instead_of_appending() {
        let registry = Registry::empty();
        registry.create_set("default", vec![noop(), noop()]);
        registry.create_set("default", vec![noop()]);
        assert_eq!(registry.get_set("default").unwrap().len(), 1);
    }

    #[test]
    fn unknown_set_is_absent() {
        assert!(Registry::new().get_set("never-registered").is_none());
    }

    #[test]
    fn sets_may_name_sets_registered_later() {
        let registry = Registry::empty();
        registry.create_set("outer", vec!["inner".into(), noop()]);
        assert!(matches!(
            registry.resolve(&"outer".into()),
            Err(Error::UnknownSet(name)) if name == "inner"
        ));

        registry.create_set("inner", vec![noop(), noop()]);
        assert_eq!(registry.resolve(&"outer".into()).unwrap().len(), 3);
    }

    #[test]
    fn set_names_are_sorted() {
        let registry = Registry::new();
        registry.create_set("b", noop());
        registry.create_set("a", noop());
        assert_eq!(registry.set_names(), ["a", "b", "default"]);
    }

    #[test]
    fn error_sets_can_reference_error_sets() {
        let registry = Registry::new();
        registry.create_error_set("audit", crate::handler::error_fn(|_req, _res, _err| {}));
        registry.create_error_set(
            ERROR_HANDLER_SET,
            vec![ErrorHandlerRef::from("audit"), default_error_handler(ErrorHandlerOptions::new()).into()],
        );
        assert_eq!(registry.error_chain().unwrap().len(), 2);
    }
}
