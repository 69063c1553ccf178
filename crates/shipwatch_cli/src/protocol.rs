use serde::{Deserialize, Serialize};
use shipwatch::{CorrectionRequest, CorrectionResponse, HealthResponse, PollResponse, ShipWatch};
use tracing::{debug, warn};

/// One line of stdin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Health,
    NextEvent,
    Correct(CorrectionRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// One line of stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Health(HealthResponse),
    Poll(PollResponse),
    Correction(CorrectionResponse),
    Error(ErrorResponse),
}

impl Response {
    fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorResponse {
            error: message.into(),
        })
    }
}

/// Decodes and answers a single request line. Never fails: problems are
/// reported in the response.
pub async fn handle_line(service: &ShipWatch, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            debug!(error = %err, "rejected malformed request");
            return Response::error(format!("invalid request: {err}"));
        }
    };

    match request {
        Request::Health => Response::Health(service.health()),
        Request::NextEvent => Response::Poll(service.poll()),
        Request::Correct(correction) => match service.submit_correction(&correction).await {
            Ok(response) => Response::Correction(response),
            Err(err) => {
                warn!(
                    wrong_ship = %correction.wrong_ship,
                    correct_ship = %correction.correct_ship,
                    error = %err,
                    "correction failed"
                );
                Response::error(err.to_string())
            }
        },
    }
}
