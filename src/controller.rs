//! Controllers and verb dispatch.
//!
//! A controller publishes an explicit verb table mapping each verb it
//! handles to an action. Dispatch looks the request's verb up in that table;
//! a miss is a client error carrying the verb and the controller name, which
//! the HTTP layer renders as `405 Method Not Allowed`.
//!
//! ```text
//! Books::verbs()  ->  VerbTable { GET -> get, POST -> post }
//! Request "get"   ->  Verb::Get -> get(&mut books, &req, params).await
//! Request "PATCH" ->  AppError::MethodNotAllowed { verb: "PATCH", controller: "books" }
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::error::AppError;
use crate::method::Verb;
use crate::request::Request;

/// Boxed future returned by an action. Borrows the controller and request.
pub type ActionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'a>>;

/// A controller action: receives the controller, the request and the
/// caller-supplied positional parameters.
pub type Action<C> = for<'a> fn(&'a mut C, &'a Request, Vec<Value>) -> ActionFuture<'a, <C as Controller>::Output>;

/// Application controller. Implementations are constructed per request.
pub trait Controller: Send + Sized + 'static {
    /// What actions produce. Returned to the caller unchanged.
    type Output: Send;

    /// Identifying name, reported when a verb has no action.
    fn name(&self) -> &str;

    /// Verb → action mapping for this controller.
    fn verbs() -> VerbTable<Self>;
}

/// Explicit verb → action table. Build it once per controller type.
pub struct VerbTable<C: Controller> {
    actions: BTreeMap<Verb, Action<C>>,
}

impl<C: Controller> VerbTable<C> {
    pub fn new() -> Self {
        Self { actions: BTreeMap::new() }
    }

    /// Register an action for a verb. A later registration for the same verb
    /// replaces the earlier one.
    pub fn on(mut self, verb: Verb, action: Action<C>) -> Self {
        self.actions.insert(verb, action);
        self
    }

    pub fn get(self, action: Action<C>) -> Self {
        self.on(Verb::Get, action)
    }

    pub fn post(self, action: Action<C>) -> Self {
        self.on(Verb::Post, action)
    }

    pub fn put(self, action: Action<C>) -> Self {
        self.on(Verb::Put, action)
    }

    pub fn patch(self, action: Action<C>) -> Self {
        self.on(Verb::Patch, action)
    }

    pub fn delete(self, action: Action<C>) -> Self {
        self.on(Verb::Delete, action)
    }

    pub fn lookup(&self, verb: &Verb) -> Option<Action<C>> {
        self.actions.get(verb).copied()
    }

    /// Registered verbs in wire form, for the `Allow` header.
    pub fn allowed(&self) -> Vec<String> {
        self.actions.keys().map(|v| v.as_str().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl<C: Controller> Default for VerbTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Dispatcher;

impl Dispatcher {
    /// Invoke the action registered for the request's verb and return its
    /// output untouched. Unknown verbs yield `AppError::MethodNotAllowed`.
    pub async fn dispatch<C: Controller>(
        controller: &mut C,
        request: &Request,
        params: Vec<Value>,
    ) -> Result<C::Output, AppError> {
        let verb = request.verb()?;
        let table = C::verbs();
        let Some(action) = table.lookup(&verb) else {
            tracing::debug!(controller = %controller.name(), verb = %verb, "no action for verb");
            return Err(AppError::MethodNotAllowed {
                verb: verb.as_str().to_string(),
                controller: controller.name().to_string(),
                allowed: table.allowed(),
            });
        };
        tracing::debug!(
            controller = %controller.name(),
            action = %verb.action_name(),
            params = params.len(),
            "dispatch"
        );
        action(controller, request, params).await
    }
}
