//! Maps status code + body to a decoded value or an `ApiError`.

use pm_types::ApiError;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error as _;
use std::io;

/// `{ "data": T }` wrapper used by single-job responses.
#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
struct ValidationBody {
    #[serde(default)]
    errors: BTreeMap<String, Vec<String>>,
}

/// Success code an operation expects, and whether a 422 is meaningful for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expect {
    Read,
    Create,
    Delete,
}

impl Expect {
    fn status(self) -> StatusCode {
        match self {
            Expect::Read => StatusCode::OK,
            Expect::Create => StatusCode::CREATED,
            Expect::Delete => StatusCode::NO_CONTENT,
        }
    }
}

/// Decode a success body into `T`, or classify the failure.
pub(crate) fn decode<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
    expect: Expect,
) -> Result<T, ApiError> {
    if status != expect.status() {
        return Err(failure(status, body, expect));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::MalformedResponse(e.to_string()))
}

/// Accept a bodiless success; the body is ignored.
pub(crate) fn expect_empty(status: StatusCode, body: &[u8], expect: Expect) -> Result<(), ApiError> {
    if status != expect.status() {
        return Err(failure(status, body, expect));
    }
    Ok(())
}

fn failure(status: StatusCode, body: &[u8], expect: Expect) -> ApiError {
    if status == StatusCode::NOT_FOUND {
        return ApiError::NotFound;
    }
    if status == StatusCode::UNPROCESSABLE_ENTITY && expect == Expect::Create {
        return match serde_json::from_slice::<ValidationBody>(body) {
            Ok(v) => ApiError::ValidationFailed(v.errors),
            Err(e) => ApiError::MalformedResponse(e.to_string()),
        };
    }
    ApiError::UnexpectedResponse {
        status: status.as_u16(),
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

/// Classify a `reqwest` failure. Short reads, responses cut off before the head and
/// dropped connections become `TransientRead`; timeouts and connect failures stay `Transport`.
pub(crate) fn transport_error(err: reqwest::Error) -> ApiError {
    if is_transient(&err) {
        ApiError::TransientRead(err.to_string())
    } else {
        ApiError::Transport(err.to_string())
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return false;
    }
    // Bodies are read as raw bytes, so a decode error here means the body stream broke.
    if err.is_body() || err.is_decode() {
        return true;
    }
    let mut source = err.source();
    while let Some(cause) = source {
        if cause
            .downcast_ref::<reqwest::Error>()
            .is_some_and(|e| e.is_body() || e.is_decode())
        {
            return true;
        }
        // Connection closed before a full response head arrived, e.g. a stale keep-alive.
        if cause
            .downcast_ref::<hyper::Error>()
            .is_some_and(|e| e.is_incomplete_message())
        {
            return true;
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm_types::Job;

    #[test]
    fn matching_status_decodes_body() {
        let body = br#"{"data":{"uuid":"X","status":"queued"}}"#;
        let env: DataEnvelope<Job> = decode(StatusCode::OK, body, Expect::Read).unwrap();
        assert_eq!(env.data.uuid, "X");
    }

    #[test]
    fn not_found_for_any_operation() {
        for expect in [Expect::Read, Expect::Create, Expect::Delete] {
            let err = expect_empty(StatusCode::NOT_FOUND, b"", expect).unwrap_err();
            assert!(matches!(err, ApiError::NotFound), "{:?}", expect);
        }
    }

    #[test]
    fn validation_failure_on_create() {
        let body = br#"{"errors":{"code":["required"],"vars":["invalid","too big"]}}"#;
        let err = decode::<DataEnvelope<Job>>(StatusCode::UNPROCESSABLE_ENTITY, body, Expect::Create)
            .unwrap_err();
        let fields = err.field_errors().unwrap();
        assert_eq!(fields["code"], vec!["required"]);
        assert_eq!(fields["vars"], vec!["invalid", "too big"]);
        assert!(err.to_string().contains("code (required)"));
    }

    #[test]
    fn unprocessable_on_read_is_unexpected() {
        let err = decode::<DataEnvelope<Job>>(StatusCode::UNPROCESSABLE_ENTITY, b"{}", Expect::Read)
            .unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedResponse { status: 422, .. }));
    }

    #[test]
    fn other_status_keeps_raw_body() {
        let err = decode::<DataEnvelope<Job>>(
            StatusCode::INTERNAL_SERVER_ERROR,
            b"<html>oops</html>",
            Expect::Read,
        )
        .unwrap_err();
        match err {
            ApiError::UnexpectedResponse { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "<html>oops</html>");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn success_status_with_bad_body_is_malformed() {
        let err = decode::<DataEnvelope<Job>>(StatusCode::CREATED, b"not json", Expect::Create)
            .unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn wrong_success_code_is_unexpected() {
        let err = expect_empty(StatusCode::OK, b"", Expect::Delete).unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedResponse { status: 200, .. }));
    }
}
