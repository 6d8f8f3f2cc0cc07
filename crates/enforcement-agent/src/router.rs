//! Command router: decodes control-surface messages and dispatches them to
//! the agent.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agent::EnforcementAgent;
use crate::protocol::{ErrorCode, Request, Response};

#[derive(Clone)]
pub struct CommandRouter {
    agent: EnforcementAgent,
}

impl CommandRouter {
    pub fn new(agent: EnforcementAgent) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &EnforcementAgent {
        &self.agent
    }

    /// Entry point for raw JSON messages. Every message gets a response.
    pub async fn handle_value(&self, raw: &Value) -> Response {
        match Request::decode(raw) {
            Ok(request) => self.handle(request).await,
            Err(code) => {
                warn!(target: "hider.agent", ?code, "rejected request");
                self.agent.metrics_sink().record_command(false);
                Response::failure(code)
            }
        }
    }

    /// Same as [`handle_value`](Self::handle_value) for one line of text.
    pub async fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Value>(line) {
            Ok(raw) => self.handle_value(&raw).await,
            Err(err) => {
                warn!(target: "hider.agent", %err, "request is not JSON");
                self.agent.metrics_sink().record_command(false);
                Response::failure(ErrorCode::InvalidRequest)
            }
        }
    }

    /// Rule changes are logged at info, reads and previews at debug.
    pub async fn handle(&self, request: Request) -> Response {
        let action = request.action();
        let mutating = request.is_mutating();
        let response = self.dispatch(request).await;
        let success = response.is_success();
        if mutating {
            info!(target: "hider.agent", action, success, "rule change handled");
        } else {
            debug!(target: "hider.agent", action, success, "command handled");
        }
        self.agent.metrics_sink().record_command(response.is_success());
        response
    }

    async fn dispatch(&self, request: Request) -> Response {
        let agent = &self.agent;
        match request {
            Request::HideClass { class_name } => match agent.hide_class(&class_name).await {
                Ok(hidden_classes) => Response::ClassesUpdated {
                    success: true,
                    hidden_classes,
                },
                Err(err) => Response::failure(err.error_code()),
            },
            Request::ShowClass { class_name } => match agent.show_class(&class_name).await {
                Ok(hidden_classes) => Response::ClassesUpdated {
                    success: true,
                    hidden_classes,
                },
                Err(err) => Response::failure(err.error_code()),
            },
            Request::HideId { id } => match agent.hide_id(&id).await {
                Ok(hidden_ids) => Response::IdsUpdated {
                    success: true,
                    hidden_ids,
                },
                Err(err) => Response::failure(err.error_code()),
            },
            Request::ShowId { id } => match agent.show_id(&id).await {
                Ok(hidden_ids) => Response::IdsUpdated {
                    success: true,
                    hidden_ids,
                },
                Err(err) => Response::failure(err.error_code()),
            },
            Request::GetClasses => Response::Classes {
                classes: agent.list_classes(),
            },
            Request::GetIds => Response::Ids {
                ids: agent.list_ids(),
            },
            Request::GetHiddenClasses => Response::HiddenClasses {
                hidden_classes: agent.hidden_classes(),
            },
            Request::GetHiddenIds => Response::HiddenIds {
                hidden_ids: agent.hidden_ids(),
            },
            Request::PreviewClass { class_name } => {
                agent.preview_class(&class_name);
                Response::ack()
            }
            Request::PreviewId { id } => {
                agent.preview_id(&id);
                Response::ack()
            }
            Request::RemovePreview { class_name, id } => {
                agent.remove_preview(class_name.as_deref(), id.as_deref());
                Response::ack()
            }
        }
    }
}
