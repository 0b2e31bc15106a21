//! Response processors shared by concrete operations.
//!
//! Two flavours: JSON documents and raw bytes (attachments and other
//! opaque payloads). Both turn a non-2xx status into `CouchError::Http`.

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{CouchError, Result};
use crate::execution::http::HttpResponse;
use crate::types::HttpInfo;

/// Decode a 2xx response body as JSON.
///
/// Non-2xx statuses become `Http { status, body }`; a 2xx body that does not
/// decode into `T` becomes `UnexpectedJson`.
pub fn process_json_response<T: DeserializeOwned>(
    result: Result<HttpResponse>,
) -> Result<(T, HttpInfo)> {
    let response = result?;
    let info = response.info();
    if !response.is_success() {
        return Err(CouchError::Http {
            status: response.status,
            body: response.body_text(),
        });
    }
    match serde_json::from_slice::<T>(&response.body) {
        Ok(value) => Ok((value, info)),
        Err(error) => {
            tracing::debug!(
                target: "couchline::operation",
                status = response.status,
                error = %error,
                "response body did not decode"
            );
            Err(CouchError::UnexpectedJson {
                status: response.status,
                body: response.body_text(),
            })
        }
    }
}

/// Hand back the raw body of a 2xx response.
pub fn process_data_response(result: Result<HttpResponse>) -> Result<(Bytes, HttpInfo)> {
    let response = result?;
    let info = response.info();
    if response.is_success() {
        Ok((response.body, info))
    } else {
        Err(CouchError::Http {
            status: response.status,
            body: response.body_text(),
        })
    }
}
