//! Upstream commerce API client.
//!
//! # Architecture
//!
//! - The WordPress/WooCommerce GraphQL endpoint is the source of truth for
//!   accounts and tokens - nothing is stored locally
//! - Request and response envelopes come from `graphql_client`; mutations are
//!   plain documents in [`mutations`] since the schema is not vendored
//! - HTTP goes through `reqwest` 0.13 directly
//!
//! # Example
//!
//! ```rust,ignore
//! use imported_storefront::commerce::CommerceClient;
//!
//! let client = CommerceClient::new(&config.commerce)?;
//! let payload = client.login("shopper", &SecretString::from("secret")).await?;
//! ```

mod client;
pub mod mutations;
mod types;

pub use client::CommerceClient;

use thiserror::Error;

/// Errors that can occur when talking to the commerce API.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("Upstream returned {status}: {}", .message.as_deref().unwrap_or("(no message)"))]
    Status {
        /// HTTP status from the upstream.
        status: reqwest::StatusCode,
        /// First GraphQL error message in the body, if the body had one.
        message: Option<String>,
    },

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The response carried neither errors nor the expected data.
    #[error("Missing data: {0}")]
    MissingData(&'static str),
}

impl CommerceError {
    /// Whether the upstream answered and refused the operation, as opposed to
    /// the request never completing or the answer being unreadable.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::GraphQL(_))
    }

    /// The message the upstream gave for a rejection.
    #[must_use]
    pub fn upstream_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            Self::GraphQL(errors) => errors
                .iter()
                .map(|e| e.message.as_str())
                .find(|m| !m.trim().is_empty()),
            _ => None,
        }
    }
}

/// A GraphQL error returned by the commerce API.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

impl From<graphql_client::Error> for GraphQLError {
    fn from(e: graphql_client::Error) -> Self {
        Self {
            message: e.message,
            locations: e.locations.map_or_else(Vec::new, |locs| {
                locs.into_iter()
                    .map(|l| GraphQLErrorLocation {
                        line: i64::from(l.line),
                        column: i64::from(l.column),
                    })
                    .collect()
            }),
            path: e.path.map_or_else(Vec::new, |p| {
                p.into_iter()
                    .map(|fragment| match fragment {
                        graphql_client::PathFragment::Key(s) => serde_json::Value::String(s),
                        graphql_client::PathFragment::Index(i) => {
                            serde_json::Value::Number(i.into())
                        }
                    })
                    .collect()
            }),
        }
    }
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();

            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }

            if !e.path.is_empty() {
                let path_str = e
                    .path
                    .iter()
                    .map(|p| match p {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                parts.push(format!("path: {path_str}"));
            }

            if let Some(loc) = e.locations.first() {
                parts.push(format!("at line {}:{}", loc.line, loc.column));
            }

            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str) -> GraphQLError {
        GraphQLError {
            message: message.to_string(),
            locations: vec![],
            path: vec![],
        }
    }

    #[test]
    fn test_graphql_error_formatting() {
        let err = CommerceError::GraphQL(vec![error("Invalid username."), error("Try again")]);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Invalid username.; Try again"
        );
    }

    #[test]
    fn test_graphql_error_path_and_location() {
        let err = CommerceError::GraphQL(vec![GraphQLError {
            message: String::new(),
            locations: vec![GraphQLErrorLocation { line: 3, column: 5 }],
            path: vec![
                serde_json::Value::String("login".to_string()),
                serde_json::Value::Number(0.into()),
            ],
        }]);
        assert_eq!(err.to_string(), "GraphQL errors: path: login.0 at line 3:5");
    }

    #[test]
    fn test_graphql_error_empty_vec() {
        let err = CommerceError::GraphQL(vec![]);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: (no error details provided)"
        );
        assert_eq!(err.upstream_message(), None);
    }

    #[test]
    fn test_upstream_message_skips_blank() {
        let err = CommerceError::GraphQL(vec![error(" "), error("Incorrect password.")]);
        assert_eq!(err.upstream_message(), Some("Incorrect password."));
        assert!(err.is_rejection());
    }

    #[test]
    fn test_status_error() {
        let err = CommerceError::Status {
            status: reqwest::StatusCode::FORBIDDEN,
            message: Some("Sorry, you are not allowed to do that.".to_string()),
        };
        assert!(err.is_rejection());
        assert_eq!(
            err.upstream_message(),
            Some("Sorry, you are not allowed to do that.")
        );
        assert_eq!(
            err.to_string(),
            "Upstream returned 403 Forbidden: Sorry, you are not allowed to do that."
        );
    }

    #[test]
    fn test_missing_data_is_not_rejection() {
        let err = CommerceError::MissingData("login");
        assert!(!err.is_rejection());
        assert_eq!(err.to_string(), "Missing data: login");
    }
}
