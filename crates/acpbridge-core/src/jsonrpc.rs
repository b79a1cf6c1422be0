//! JSON-RPC 2.0 envelope types shared by both wire protocols (CPP and ACP).
//!
//! Request ids may be strings or integers on the wire and must round-trip
//! exactly, so [`RequestId`] is kept as a `serde_json::Value`-shaped enum
//! rather than coerced to one Rust numeric type.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{rpc_code, Error};

/// A JSON-RPC request/response identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(rpc_code::PARSE_ERROR, "Parse error")
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(rpc_code::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(rpc_code::INTERNAL_ERROR, message.into())
    }
}

impl From<&Error> for RpcError {
    fn from(err: &Error) -> Self {
        Self::new(err.rpc_code(), err.to_string())
    }
}

/// An outbound or inbound JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// An outbound or inbound JSON-RPC notification (no id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// An outbound or inbound JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: JsonRpcVersion,
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: RequestId, error: RpcError) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> std::result::Result<Value, Error> {
        if let Some(err) = self.error {
            Err(Error::Rpc {
                code: err.code,
                message: err.message,
                data: err.data,
            })
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

/// Marker unit type that always (de)serializes as the literal string `"2.0"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s != "2.0" {
            return Err(serde::de::Error::custom(format!("unsupported jsonrpc version: {s}")));
        }
        Ok(JsonRpcVersion)
    }
}

/// Classification of a decoded JSON-RPC payload.
#[derive(Debug, Clone)]
pub enum Inbound {
    Request(Request),
    Notification(Notification),
    Response(Response),
}

/// Classifies a raw JSON value as a request, notification, or response.
///
/// A payload is a response if it carries `id` together with `result` or
/// `error` and no `method`; a request if it carries both `id` and `method`;
/// a notification if it carries `method` but no `id`. Anything else is a
/// parse error.
pub fn classify(value: Value) -> std::result::Result<Inbound, Error> {
    let has_method = value.get("method").is_some();
    let has_id = value.get("id").is_some();
    let has_result_or_error = value.get("result").is_some() || value.get("error").is_some();

    if has_method && has_id {
        let req: Request = serde_json::from_value(value)?;
        Ok(Inbound::Request(req))
    } else if has_method {
        let notif: Notification = serde_json::from_value(value)?;
        Ok(Inbound::Notification(notif))
    } else if has_id && has_result_or_error {
        let resp: Response = serde_json::from_value(value)?;
        Ok(Inbound::Response(resp))
    } else {
        Err(Error::Framing("payload is neither a request, notification, nor response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_round_trips_string_and_number() {
        let n: RequestId = serde_json::from_str("42").unwrap();
        assert_eq!(n, RequestId::Number(42));
        assert_eq!(serde_json::to_string(&n).unwrap(), "42");

        let s: RequestId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(s, RequestId::String("abc".into()));
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"abc\"");
    }

    #[test]
    fn classify_distinguishes_all_three_shapes() {
        let req = serde_json::json!({"jsonrpc":"2.0","id":1,"method":"ping","params":{}});
        assert!(matches!(classify(req).unwrap(), Inbound::Request(_)));

        let notif = serde_json::json!({"jsonrpc":"2.0","method":"session/update","params":{}});
        assert!(matches!(classify(notif).unwrap(), Inbound::Notification(_)));

        let resp = serde_json::json!({"jsonrpc":"2.0","id":1,"result":{"ok":true}});
        assert!(matches!(classify(resp).unwrap(), Inbound::Response(_)));

        let junk = serde_json::json!({"jsonrpc":"2.0"});
        assert!(classify(junk).is_err());
    }

    #[test]
    fn response_into_result_propagates_rpc_error() {
        let resp = Response::failure(RequestId::Number(1), RpcError::method_not_found("foo"));
        let err = resp.into_result().unwrap_err();
        match err {
            Error::Rpc { code, .. } => assert_eq!(code, rpc_code::METHOD_NOT_FOUND),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
