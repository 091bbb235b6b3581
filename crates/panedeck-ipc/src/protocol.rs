//! JSON-lines frames exchanged with the session backend.
//!
//! Every frame is one JSON object on its own line, discriminated by `event`.

use panedeck_core::session::{InboundEvent, OutboundEvent, RequestId, SessionId};
use serde::{Deserialize, Serialize};

/// Frame written by the client. `id` correlates the backend's `ack`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub id: RequestId,
    #[serde(flatten)]
    pub event: ClientEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    Create {
        cols: u16,
        rows: u16,
        mode: String,
    },
    Attach {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        cols: u16,
        rows: u16,
    },
    Input {
        data: String,
        #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
    Resize {
        cols: u16,
        rows: u16,
    },
    End {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
    Detach {
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
}

impl ClientFrame {
    pub fn new(id: RequestId, event: OutboundEvent) -> Self {
        let event = match event {
            OutboundEvent::Create { cols, rows, mode } => ClientEvent::Create { cols, rows, mode },
            OutboundEvent::Attach {
                session_id,
                cols,
                rows,
            } => ClientEvent::Attach {
                session_id,
                cols,
                rows,
            },
            OutboundEvent::Input { data, session_id } => ClientEvent::Input { data, session_id },
            OutboundEvent::Resize { cols, rows } => ClientEvent::Resize { cols, rows },
            OutboundEvent::End { session_id } => ClientEvent::End { session_id },
            OutboundEvent::Detach { session_id } => ClientEvent::Detach { session_id },
        };
        Self { id, event }
    }
}

/// Frame written by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerFrame {
    Ack {
        id: RequestId,
        success: bool,
        #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Output {
        data: OutputPayload,
    },
    ConnectError {
        message: String,
    },
    Ended,
}

/// Output arrives either as bare text or tagged with its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputPayload {
    Text(String),
    Tagged {
        data: String,
        #[serde(rename = "sessionId", default)]
        session_id: Option<SessionId>,
    },
}

impl From<ServerFrame> for InboundEvent {
    fn from(frame: ServerFrame) -> Self {
        match frame {
            ServerFrame::Ack {
                id,
                success,
                session_id,
                error,
            } => {
                let result = match (success, session_id) {
                    (true, Some(session_id)) => Ok(session_id),
                    (true, None) => Err("ack without session id".to_string()),
                    (false, _) => Err(error.unwrap_or_else(|| "request failed".to_string())),
                };
                InboundEvent::Ack {
                    request: id,
                    result,
                }
            }
            ServerFrame::Output { data } => match data {
                OutputPayload::Text(data) => InboundEvent::Output {
                    data,
                    session_id: None,
                },
                OutputPayload::Tagged { data, session_id } => {
                    InboundEvent::Output { data, session_id }
                }
            },
            ServerFrame::ConnectError { message } => InboundEvent::ConnectError { message },
            ServerFrame::Ended => InboundEvent::Ended,
        }
    }
}

/// Parses one line from the backend. Blank lines yield `None`.
pub fn parse_server_line(line: &str) -> Option<serde_json::Result<ServerFrame>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_frames_are_flat_objects() {
        let frame = ClientFrame::new(
            3,
            OutboundEvent::Attach {
                session_id: "S".into(),
                cols: 80,
                rows: 24,
            },
        );
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({ "id": 3, "event": "attach", "sessionId": "S", "cols": 80, "rows": 24 })
        );

        let input = ClientFrame::new(
            4,
            OutboundEvent::Input {
                data: "ls\r".into(),
                session_id: None,
            },
        );
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({ "id": 4, "event": "input", "data": "ls\r" })
        );
    }

    #[test]
    fn client_frame_parses_back() {
        let raw = json!({ "id": 1, "event": "create", "cols": 100, "rows": 40, "mode": "terminal" });
        let frame: ClientFrame = serde_json::from_value(raw).unwrap();
        assert_eq!(
            frame.event,
            ClientEvent::Create {
                cols: 100,
                rows: 40,
                mode: "terminal".into()
            }
        );
    }

    #[test]
    fn acks_map_to_results() {
        let ok: ServerFrame =
            serde_json::from_value(json!({ "event": "ack", "id": 1, "success": true, "sessionId": "S" }))
                .unwrap();
        assert_eq!(
            InboundEvent::from(ok),
            InboundEvent::Ack {
                request: 1,
                result: Ok("S".into())
            }
        );

        let failed: ServerFrame = serde_json::from_value(
            json!({ "event": "ack", "id": 2, "success": false, "error": "Session not found" }),
        )
        .unwrap();
        assert_eq!(
            InboundEvent::from(failed),
            InboundEvent::Ack {
                request: 2,
                result: Err("Session not found".into())
            }
        );
    }

    #[test]
    fn output_accepts_plain_and_tagged_payloads() {
        let plain = parse_server_line(r#"{"event":"output","data":"hi\r\n"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            InboundEvent::from(plain),
            InboundEvent::Output {
                data: "hi\r\n".into(),
                session_id: None
            }
        );

        let tagged = parse_server_line(r#"{"event":"output","data":{"data":"x","sessionId":"T"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            InboundEvent::from(tagged),
            InboundEvent::Output {
                data: "x".into(),
                session_id: Some("T".into())
            }
        );
    }

    #[test]
    fn lifecycle_frames() {
        let ended = parse_server_line("{\"event\":\"ended\"}\n").unwrap().unwrap();
        assert_eq!(InboundEvent::from(ended), InboundEvent::Ended);
        let err = parse_server_line(r#"{"event":"connect_error","message":"refused"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            InboundEvent::from(err),
            InboundEvent::ConnectError {
                message: "refused".into()
            }
        );
        assert!(parse_server_line("   ").is_none());
        assert!(parse_server_line("{\"event\":\"bogus\"}").unwrap().is_err());
    }
}
