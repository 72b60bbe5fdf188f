use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::{canonical_site, clock, ConfigPatch, Decision, PolicyConfig, PolicyEngine};

/// Messages the page/tab surface sends to the engine
///
/// One JSON document per line on the daemon's stdin. The message names
/// match the original extension protocol.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    StartSession { site: String },
    EndSession { site: String },
    CheckBlocked { site: String },
    AddOverride { code: String },
    UpdateSettings { settings: ConfigPatch },
    GetSettings,
    GetStats,
    EmergencyBlockAll,
    ClearEmergency,
}

/// Replies the engine sends back, one per request
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Ack,
    Blocked {
        site: String,
        blocked: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Override {
        granted: bool,
    },
    Settings {
        settings: PolicyConfig,
    },
    Stats {
        minutes: BTreeMap<String, u64>,
    },
    Error {
        message: String,
    },
}

impl Response {
    fn error(e: anyhow::Error) -> Self {
        Response::Error {
            message: format!("{:#}", e),
        }
    }
}

/// Dispatch one surface request onto the engine
pub async fn dispatch(engine: &PolicyEngine, request: Request) -> Response {
    let now = clock::now();

    match request {
        Request::StartSession { site } => match canonical_site(&site) {
            Ok(site) => {
                engine.start_session(&site, now).await;
                Response::Ack
            }
            Err(e) => Response::error(e),
        },

        Request::EndSession { site } => match canonical_site(&site) {
            Ok(site) => match engine.stop_session(&site, now).await {
                Ok(()) => Response::Ack,
                Err(e) => Response::error(e),
            },
            Err(e) => Response::error(e),
        },

        Request::CheckBlocked { site } => match canonical_site(&site) {
            Ok(site) => {
                let decision = engine.query_decision(&site, now).await;
                let reason = match decision {
                    Decision::Blocked(reason) => Some(reason.to_string()),
                    Decision::Allowed => None,
                };
                Response::Blocked {
                    site,
                    blocked: decision.is_blocked(),
                    reason,
                }
            }
            Err(e) => Response::error(e),
        },

        Request::AddOverride { code } => Response::Override {
            granted: engine.submit_override(&code, now).await,
        },

        Request::UpdateSettings { settings } => match engine.update_configuration(settings).await {
            Ok(_) => Response::Ack,
            Err(e) => Response::error(e),
        },

        Request::GetSettings => Response::Settings {
            settings: engine.configuration().await,
        },

        Request::GetStats => Response::Stats {
            minutes: engine.weekly_stats(now).await,
        },

        Request::EmergencyBlockAll => {
            engine.emergency_block_all().await;
            Response::Ack
        }

        Request::ClearEmergency => {
            engine.clear_emergency().await;
            Response::Ack
        }
    }
}
