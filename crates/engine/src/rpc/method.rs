use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::engine::Engine;
use crate::rpc::{RpcError, RpcRequest, RpcResponse, methods};

/// A named operation callable through the RPC endpoint.
pub trait RpcMethod {
    fn name(&self) -> &'static str;

    /// Runs the call against the engine and returns its result value.
    fn process(&self, request: &RpcRequest, engine: &mut Engine) -> Result<Value, RpcError>;

    fn execute(&self, request: &RpcRequest, engine: &mut Engine) -> Result<RpcResponse, RpcError> {
        let result = self.process(request, engine)?;
        Ok(RpcResponse::new(request.id().clone(), result))
    }
}

/// Method lookup by name.
///
/// Methods are handed out as `Rc` so a caller can keep one while lending the
/// engine that owns the registry to it.
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<&'static str, Rc<dyn RpcMethod>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_methods() -> Self {
        let mut registry = Self::new();
        methods::register_builtin(&mut registry);
        registry
    }

    /// Adds `method`, replacing any method registered under the same name.
    pub fn register(&mut self, method: Rc<dyn RpcMethod>) {
        self.methods.insert(method.name(), method);
    }

    pub fn lookup(&self, name: &str) -> Result<Rc<dyn RpcMethod>, RpcError> {
        self.methods.get(name).map(Rc::clone).ok_or_else(|| RpcError::no_such_method(name))
    }

    /// Registered method names in lexical order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.methods.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry").field("methods", &self.names()).finish()
    }
}
