//! Error taxonomy shared by every `JobApi` implementation.

use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("api token may not be empty")]
    EmptyCredential,
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("job request code may not be empty")]
    EmptyCode,
    #[error("job was not found by given uuid")]
    NotFound,
    #[error(
        "failed to save job, the following fields are invalid: {}",
        format_field_errors(.0)
    )]
    ValidationFailed(BTreeMap<String, Vec<String>>),
    #[error("unexpected response {status}: {body}")]
    UnexpectedResponse { status: u16, body: String },
    #[error("malformed response body: {0}")]
    MalformedResponse(String),
    #[error("transport error: {0}")]
    Transport(String),
    /// Short read or dropped connection; only the poll loop treats it as retryable.
    #[error("transient read error: {0}")]
    TransientRead(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::TransientRead(_))
    }

    /// Per-field messages of a 422 response, if this is one.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            ApiError::ValidationFailed(fields) => Some(fields),
            _ => None,
        }
    }
}

fn format_field_errors(fields: &BTreeMap<String, Vec<String>>) -> String {
    fields
        .iter()
        .map(|(field, msgs)| format!("{} ({})", field, msgs.join(", ")))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_each_field() {
        let mut fields = BTreeMap::new();
        fields.insert("code".to_string(), vec!["required".to_string()]);
        fields.insert(
            "vars.page".to_string(),
            vec!["must be a string".to_string(), "too long".to_string()],
        );
        let msg = ApiError::ValidationFailed(fields).to_string();
        assert!(msg.contains("code (required)"));
        assert!(msg.contains("vars.page (must be a string, too long)"));
    }

    #[test]
    fn only_transient_read_is_transient() {
        assert!(ApiError::TransientRead("eof".into()).is_transient());
        assert!(!ApiError::Transport("refused".into()).is_transient());
        assert!(!ApiError::NotFound.is_transient());
    }
}
