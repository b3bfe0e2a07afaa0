//! Built-in methods.
//!
//! Numbers in results are rendered as decimal strings so clients never lose
//! precision on 64 bit lengths.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{Map, Value, json};
use tracing::info;

use crate::download::{Download, Gid};
use crate::engine::Engine;
use crate::rpc::{MethodRegistry, RpcError, RpcMethod, RpcRequest};

pub(crate) fn register_builtin(registry: &mut MethodRegistry) {
    registry.register(Rc::new(AddUri));
    registry.register(Rc::new(Remove));
    registry.register(Rc::new(Pause));
    registry.register(Rc::new(Unpause));
    registry.register(Rc::new(TellStatus));
    registry.register(Rc::new(TellActive));
    registry.register(Rc::new(TellWaiting));
    registry.register(Rc::new(TellStopped));
    registry.register(Rc::new(GetGlobalStat));
    registry.register(Rc::new(GetVersion));
    registry.register(Rc::new(Shutdown));
    registry.register(Rc::new(ListMethods));
}

fn string_list(request: &RpcRequest, index: usize) -> Result<Vec<String>, RpcError> {
    let Some(Value::Array(values)) = request.param(index) else {
        return Err(RpcError::invalid_params(format!("param #{index} must be an array of strings")));
    };
    values
        .iter()
        .map(|value| {
            value
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| RpcError::invalid_params(format!("param #{index} must be an array of strings")))
        })
        .collect()
}

fn gid_param(request: &RpcRequest, index: usize) -> Result<Gid, RpcError> {
    let Some(value) = request.param(index).and_then(Value::as_str) else {
        return Err(RpcError::invalid_params("GID is not provided"));
    };
    value.parse().map_err(RpcError::invalid_params)
}

fn options_param(request: &RpcRequest, index: usize) -> Result<BTreeMap<String, String>, RpcError> {
    match request.param(index) {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(options)) => options
            .iter()
            .map(|(name, value)| match value {
                Value::String(value) => Ok((name.clone(), value.clone())),
                other => Err(RpcError::invalid_params(format!("option {name} must be a string, got {other}"))),
            })
            .collect(),
        Some(other) => Err(RpcError::invalid_params(format!("options must be an object, got {other}"))),
    }
}

fn keys_param(request: &RpcRequest, index: usize) -> Result<Option<Vec<String>>, RpcError> {
    match request.param(index) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => string_list(request, index).map(Some),
    }
}

fn offset_param(request: &RpcRequest, index: usize) -> Result<i64, RpcError> {
    request
        .param(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| RpcError::invalid_params(format!("param #{index} must be an integer")))
}

fn num_param(request: &RpcRequest, index: usize) -> Result<usize, RpcError> {
    request
        .param(index)
        .and_then(Value::as_u64)
        .and_then(|num| usize::try_from(num).ok())
        .ok_or_else(|| RpcError::invalid_params(format!("param #{index} must be a non-negative integer")))
}

fn status_of(download: &Download, keys: Option<&[String]>) -> Value {
    let uris: Vec<Value> = download.uris().iter().map(|uri| json!({ "uri": uri, "status": "used" })).collect();
    let path = download.options().get("out").cloned().unwrap_or_default();

    let mut status = Map::new();
    status.insert("gid".into(), json!(download.gid().to_string()));
    status.insert("status".into(), json!(download.status().as_str()));
    status.insert("totalLength".into(), json!(download.total_length().to_string()));
    status.insert("completedLength".into(), json!(download.completed_length().to_string()));
    status.insert("uploadLength".into(), json!("0"));
    status.insert("downloadSpeed".into(), json!(download.download_speed().to_string()));
    status.insert("uploadSpeed".into(), json!("0"));
    status.insert("connections".into(), json!("0"));
    status.insert("dir".into(), json!(download.options().get("dir").cloned().unwrap_or_default()));
    status.insert(
        "files".into(),
        json!([{
            "index": "1",
            "path": path,
            "length": download.total_length().to_string(),
            "completedLength": download.completed_length().to_string(),
            "selected": "true",
            "uris": uris,
        }]),
    );

    match keys {
        Some(keys) => {
            Value::Object(status.into_iter().filter(|(name, _)| keys.iter().any(|key| key == name)).collect())
        }
        None => Value::Object(status),
    }
}

fn status_list<'a>(downloads: impl IntoIterator<Item = &'a Download>, keys: Option<&[String]>) -> Value {
    Value::Array(downloads.into_iter().map(|download| status_of(download, keys)).collect())
}

fn not_found(gid: Gid) -> RpcError {
    RpcError::execution(format!("GID#{gid} not found"))
}

/// `aria2.addUri(uris[, options])`, returns the new GID.
#[derive(Debug)]
pub struct AddUri;

impl RpcMethod for AddUri {
    fn name(&self) -> &'static str {
        "aria2.addUri"
    }

    fn process(&self, request: &RpcRequest, engine: &mut Engine) -> Result<Value, RpcError> {
        let uris = string_list(request, 0)?;
        if uris.is_empty() {
            return Err(RpcError::invalid_params("URI is not provided"));
        }
        let options = options_param(request, 1)?;
        let gid = engine.downloads_mut().add(uris, options);
        info!(gid = %gid, "download added");
        Ok(json!(gid.to_string()))
    }
}

/// `aria2.remove(gid)`
#[derive(Debug)]
pub struct Remove;

impl RpcMethod for Remove {
    fn name(&self) -> &'static str {
        "aria2.remove"
    }

    fn process(&self, request: &RpcRequest, engine: &mut Engine) -> Result<Value, RpcError> {
        let gid = gid_param(request, 0)?;
        if !engine.downloads_mut().remove(gid) {
            return Err(RpcError::execution(format!("Active Download not found for GID#{gid}")));
        }
        Ok(json!(gid.to_string()))
    }
}

/// `aria2.pause(gid)`
#[derive(Debug)]
pub struct Pause;

impl RpcMethod for Pause {
    fn name(&self) -> &'static str {
        "aria2.pause"
    }

    fn process(&self, request: &RpcRequest, engine: &mut Engine) -> Result<Value, RpcError> {
        let gid = gid_param(request, 0)?;
        if !engine.downloads_mut().pause(gid) {
            return Err(RpcError::execution(format!("GID#{gid} cannot be paused now")));
        }
        Ok(json!(gid.to_string()))
    }
}

/// `aria2.unpause(gid)`
#[derive(Debug)]
pub struct Unpause;

impl RpcMethod for Unpause {
    fn name(&self) -> &'static str {
        "aria2.unpause"
    }

    fn process(&self, request: &RpcRequest, engine: &mut Engine) -> Result<Value, RpcError> {
        let gid = gid_param(request, 0)?;
        if !engine.downloads_mut().unpause(gid) {
            return Err(RpcError::execution(format!("GID#{gid} cannot be unpaused now")));
        }
        Ok(json!(gid.to_string()))
    }
}

/// `aria2.tellStatus(gid[, keys])`
#[derive(Debug)]
pub struct TellStatus;

impl RpcMethod for TellStatus {
    fn name(&self) -> &'static str {
        "aria2.tellStatus"
    }

    fn process(&self, request: &RpcRequest, engine: &mut Engine) -> Result<Value, RpcError> {
        let gid = gid_param(request, 0)?;
        let keys = keys_param(request, 1)?;
        let download = engine.downloads().get(gid).ok_or_else(|| not_found(gid))?;
        Ok(status_of(download, keys.as_deref()))
    }
}

/// `aria2.tellActive([keys])`
#[derive(Debug)]
pub struct TellActive;

impl RpcMethod for TellActive {
    fn name(&self) -> &'static str {
        "aria2.tellActive"
    }

    fn process(&self, request: &RpcRequest, engine: &mut Engine) -> Result<Value, RpcError> {
        let keys = keys_param(request, 0)?;
        Ok(status_list(engine.downloads().active(), keys.as_deref()))
    }
}

/// `aria2.tellWaiting(offset, num[, keys])`
#[derive(Debug)]
pub struct TellWaiting;

impl RpcMethod for TellWaiting {
    fn name(&self) -> &'static str {
        "aria2.tellWaiting"
    }

    fn process(&self, request: &RpcRequest, engine: &mut Engine) -> Result<Value, RpcError> {
        let offset = offset_param(request, 0)?;
        let num = num_param(request, 1)?;
        let keys = keys_param(request, 2)?;
        Ok(status_list(engine.downloads().waiting(offset, num), keys.as_deref()))
    }
}

/// `aria2.tellStopped(offset, num[, keys])`
#[derive(Debug)]
pub struct TellStopped;

impl RpcMethod for TellStopped {
    fn name(&self) -> &'static str {
        "aria2.tellStopped"
    }

    fn process(&self, request: &RpcRequest, engine: &mut Engine) -> Result<Value, RpcError> {
        let offset = offset_param(request, 0)?;
        let num = num_param(request, 1)?;
        let keys = keys_param(request, 2)?;
        Ok(status_list(engine.downloads().stopped(offset, num), keys.as_deref()))
    }
}

/// `aria2.getGlobalStat()`
#[derive(Debug)]
pub struct GetGlobalStat;

impl RpcMethod for GetGlobalStat {
    fn name(&self) -> &'static str {
        "aria2.getGlobalStat"
    }

    fn process(&self, _request: &RpcRequest, engine: &mut Engine) -> Result<Value, RpcError> {
        let stat = engine.downloads().global_stat();
        Ok(json!({
            "downloadSpeed": stat.download_speed.to_string(),
            "uploadSpeed": stat.upload_speed.to_string(),
            "numActive": stat.num_active.to_string(),
            "numWaiting": stat.num_waiting.to_string(),
            "numStopped": stat.num_stopped.to_string(),
        }))
    }
}

/// `aria2.getVersion()`
#[derive(Debug)]
pub struct GetVersion;

impl RpcMethod for GetVersion {
    fn name(&self) -> &'static str {
        "aria2.getVersion"
    }

    fn process(&self, _request: &RpcRequest, _engine: &mut Engine) -> Result<Value, RpcError> {
        Ok(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "enabledFeatures": ["GZip"],
        }))
    }
}

/// `aria2.shutdown()`, stops the engine once the running commands notice.
#[derive(Debug)]
pub struct Shutdown;

impl RpcMethod for Shutdown {
    fn name(&self) -> &'static str {
        "aria2.shutdown"
    }

    fn process(&self, _request: &RpcRequest, engine: &mut Engine) -> Result<Value, RpcError> {
        engine.request_halt();
        Ok(json!("OK"))
    }
}

/// `system.listMethods()`
#[derive(Debug)]
pub struct ListMethods;

impl RpcMethod for ListMethods {
    fn name(&self) -> &'static str {
        "system.listMethods"
    }

    fn process(&self, _request: &RpcRequest, engine: &mut Engine) -> Result<Value, RpcError> {
        Ok(json!(engine.methods().names()))
    }
}
