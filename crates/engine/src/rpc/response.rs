use std::io;
use std::io::Write;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde_json::Value;

use crate::rpc::RpcError;

/// The successful result of a call, tagged with the id of the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    id: Value,
    jsonrpc: &'static str,
    result: Value,
}

impl RpcResponse {
    pub fn new(id: Value, result: Value) -> Self {
        Self { id, jsonrpc: "2.0", result }
    }

    pub fn id(&self) -> &Value {
        &self.id
    }

    pub fn result(&self) -> &Value {
        &self.result
    }

    /// Renders the response body, gzip compressed when `gzip` is set.
    pub fn serialize(&self, gzip: bool) -> Result<Bytes, RpcError> {
        let json = serde_json::to_vec(self).map_err(io::Error::from)?;
        if !gzip {
            return Ok(Bytes::from(json));
        }

        let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
        encoder.write_all(&json)?;
        Ok(Bytes::from(encoder.finish()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use serde_json::json;
    use std::io::Read;

    #[test]
    fn plain_json() {
        let response = RpcResponse::new(json!("qwer"), json!(["2089b05ecca3d829"]));
        let bytes = response.serialize(false).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"id": "qwer", "jsonrpc": "2.0", "result": ["2089b05ecca3d829"]}));
    }

    #[test]
    fn gzip_json() {
        let response = RpcResponse::new(json!(7), json!("OK"));
        let bytes = response.serialize(true).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);

        let mut json = String::new();
        GzDecoder::new(&bytes[..]).read_to_string(&mut json).unwrap();
        assert_eq!(json, r#"{"id":7,"jsonrpc":"2.0","result":"OK"}"#);
    }
}
