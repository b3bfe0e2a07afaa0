use serde::Deserialize;
use serde_json::Value;

use crate::rpc::RpcError;

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Deserialize)]
struct WireRequest {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

/// A parsed remote procedure call.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    id: Value,
    method: String,
    params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(id: Value, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self { id, method: method.into(), params }
    }

    /// Parses a request body.
    ///
    /// Absent or `null` params mean no params, anything else but an array is
    /// rejected. A `jsonrpc` member, when present, must be `"2.0"`.
    pub fn from_slice(body: &[u8]) -> Result<Self, RpcError> {
        let wire: WireRequest = serde_json::from_slice(body)?;

        if let Some(version) = wire.jsonrpc.as_deref()
            && version != JSONRPC_VERSION
        {
            return Err(RpcError::invalid_request(format!("unsupported jsonrpc version {version}")));
        }
        if wire.method.is_empty() {
            return Err(RpcError::invalid_request("empty method name"));
        }

        let params = match wire.params {
            Value::Null => Vec::new(),
            Value::Array(params) => params,
            other => return Err(RpcError::invalid_request(format!("params must be an array, got {other}"))),
        };

        Ok(Self { id: wire.id, method: wire.method, params })
    }

    pub fn id(&self) -> &Value {
        &self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn param(&self, index: usize) -> Option<&Value> {
        self.params.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_call_without_params() {
        let request = RpcRequest::from_slice(br#"{"jsonrpc":"2.0","id":"qwer","method":"aria2.tellActive"}"#).unwrap();
        assert_eq!(request.method(), "aria2.tellActive");
        assert_eq!(request.id(), &json!("qwer"));
        assert!(request.params().is_empty());
    }

    #[test]
    fn parse_call_with_params() {
        let body =
            br#"{"jsonrpc":"2.0","id":1,"method":"aria2.addUri","params":[["http://host/file"],{"dir":"/tmp"}]}"#;
        let request = RpcRequest::from_slice(body).unwrap();
        assert_eq!(request.params().len(), 2);
        assert_eq!(request.param(0), Some(&json!(["http://host/file"])));
        assert_eq!(request.param(2), None);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let result = RpcRequest::from_slice(b"{\"method\":");
        assert!(matches!(result, Err(RpcError::Parse { .. })));
    }

    #[test]
    fn missing_method_is_parse_error() {
        let result = RpcRequest::from_slice(br#"{"jsonrpc":"2.0","id":1}"#);
        assert!(matches!(result, Err(RpcError::Parse { .. })));
    }

    #[test]
    fn rejects_object_params_and_wrong_version() {
        let result = RpcRequest::from_slice(br#"{"id":1,"method":"m","params":{"a":1}}"#);
        assert!(matches!(result, Err(RpcError::InvalidRequest { .. })));

        let result = RpcRequest::from_slice(br#"{"jsonrpc":"1.0","id":1,"method":"m"}"#);
        assert!(matches!(result, Err(RpcError::InvalidRequest { .. })));

        let result = RpcRequest::from_slice(br#"{"id":1,"method":""}"#);
        assert!(matches!(result, Err(RpcError::InvalidRequest { .. })));
    }
}
