//! Resource client: typed auth and property calls over the gateway.
//!
//! DESIGN
//! ======
//! Each function takes the shared `Gateway` and returns typed data. The
//! API sometimes wraps payloads in a `data` envelope and sometimes does
//! not; unwrapping happens here, never in the gateway.

pub mod auth;
pub mod property;

use serde_json::Value;

/// `body.data` when present and non-null, otherwise `body` itself.
pub(crate) fn unwrap_data(mut body: Value) -> Value {
    let inner = body.get_mut("data").map(Value::take);
    match inner {
        Some(inner) if !inner.is_null() => inner,
        _ => body,
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
