//! Request/response messages exchanged with the control surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    HideClass {
        #[serde(rename = "className")]
        class_name: String,
    },
    ShowClass {
        #[serde(rename = "className")]
        class_name: String,
    },
    HideId {
        id: String,
    },
    ShowId {
        id: String,
    },
    GetClasses,
    GetIds,
    GetHiddenClasses,
    GetHiddenIds,
    PreviewClass {
        #[serde(rename = "className")]
        class_name: String,
    },
    PreviewId {
        id: String,
    },
    RemovePreview {
        #[serde(
            rename = "className",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        class_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl Request {
    /// Decodes a raw message, separating unknown actions from malformed ones.
    /// An `action` tag naming no variant is reported by serde as an unknown
    /// variant; every other decode failure is a malformed request.
    pub fn decode(raw: &Value) -> Result<Self, ErrorCode> {
        // serde also accepts a variant index as the tag; only names are valid.
        if !raw.get("action").is_some_and(Value::is_string) {
            return Err(ErrorCode::InvalidRequest);
        }
        let request = Request::deserialize(raw).map_err(|err| {
            if err.to_string().starts_with("unknown variant") {
                ErrorCode::UnknownAction
            } else {
                ErrorCode::InvalidRequest
            }
        })?;
        request.validate()?;
        Ok(request)
    }

    pub fn action(&self) -> &'static str {
        match self {
            Request::HideClass { .. } => "hideClass",
            Request::ShowClass { .. } => "showClass",
            Request::HideId { .. } => "hideId",
            Request::ShowId { .. } => "showId",
            Request::GetClasses => "getClasses",
            Request::GetIds => "getIds",
            Request::GetHiddenClasses => "getHiddenClasses",
            Request::GetHiddenIds => "getHiddenIds",
            Request::PreviewClass { .. } => "previewClass",
            Request::PreviewId { .. } => "previewId",
            Request::RemovePreview { .. } => "removePreview",
        }
    }

    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Request::HideClass { .. }
                | Request::ShowClass { .. }
                | Request::HideId { .. }
                | Request::ShowId { .. }
        )
    }

    /// Class names and ids never contain whitespace and are never empty.
    fn validate(&self) -> Result<(), ErrorCode> {
        let valid = |value: &str| !value.is_empty() && !value.chars().any(char::is_whitespace);
        let ok = match self {
            Request::HideClass { class_name }
            | Request::ShowClass { class_name }
            | Request::PreviewClass { class_name } => valid(class_name),
            Request::HideId { id } | Request::ShowId { id } | Request::PreviewId { id } => {
                !id.is_empty()
            }
            Request::RemovePreview { class_name, .. } => {
                class_name.as_deref().map(valid).unwrap_or(true)
            }
            Request::GetClasses
            | Request::GetIds
            | Request::GetHiddenClasses
            | Request::GetHiddenIds => true,
        };
        if ok {
            Ok(())
        } else {
            Err(ErrorCode::InvalidRequest)
        }
    }
}

/// Wire error codes carried by failed responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnknownAction,
    InvalidRequest,
    PersistenceUnavailable,
    AgentStopped,
}

/// Response shapes. Serialized without a tag; the field set identifies the
/// shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    #[serde(rename_all = "camelCase")]
    Failed { success: bool, error: ErrorCode },
    #[serde(rename_all = "camelCase")]
    ClassesUpdated {
        success: bool,
        hidden_classes: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    IdsUpdated { success: bool, hidden_ids: Vec<String> },
    #[serde(rename_all = "camelCase")]
    HiddenClasses { hidden_classes: Vec<String> },
    #[serde(rename_all = "camelCase")]
    HiddenIds { hidden_ids: Vec<String> },
    Classes { classes: Vec<String> },
    Ids { ids: Vec<String> },
    Ack { success: bool },
}

impl Response {
    pub fn failure(error: ErrorCode) -> Self {
        Response::Failed {
            success: false,
            error,
        }
    }

    pub fn ack() -> Self {
        Response::Ack { success: true }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Response::Failed { .. } => false,
            Response::ClassesUpdated { success, .. }
            | Response::IdsUpdated { success, .. }
            | Response::Ack { success } => *success,
            Response::HiddenClasses { .. }
            | Response::HiddenIds { .. }
            | Response::Classes { .. }
            | Response::Ids { .. } => true,
        }
    }

    pub fn error(&self) -> Option<ErrorCode> {
        match self {
            Response::Failed { error, .. } => Some(*error),
            _ => None,
        }
    }
}
