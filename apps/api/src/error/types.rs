use std::collections::BTreeMap;

use keystone_core::{DenyReason, FieldErrors};
use serde::Serialize;
use ts_rs::TS;

const VALIDATION_MESSAGE: &str = "The given data was invalid.";

/// API error payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/error-response.ts"
)]
pub struct ErrorResponse {
    /// One of `validation-error`, `forbidden`, `not-found`, `unauthorized` or `error`.
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub errors: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub reason: Option<String>,
}

impl ErrorResponse {
    pub(super) fn new(status: &'static str, message: String) -> Self {
        Self {
            status,
            message,
            errors: None,
            reason: None,
        }
    }

    pub(super) fn validation(errors: &FieldErrors) -> Self {
        Self {
            status: "validation-error",
            message: VALIDATION_MESSAGE.to_owned(),
            errors: Some(
                errors
                    .iter()
                    .map(|(field, message)| (field.to_owned(), message.to_owned()))
                    .collect(),
            ),
            reason: None,
        }
    }

    // Unprivileged actors only ever receive NOT_AUTHORIZED from the service layer.
    pub(super) fn forbidden(reason: DenyReason) -> Self {
        Self {
            status: "forbidden",
            message: reason.message().to_owned(),
            errors: None,
            reason: Some(reason.as_str().to_owned()),
        }
    }
}
