//! Frame types and framing for the line-delimited JSON protocol.
//!
//! Every frame is a single JSON object terminated by a newline. Requests
//! carry a client-chosen `id` and an `op` naming the operation; responses
//! echo the `id` and report `ok`, a numeric `code` and either `data` or an
//! `error` message.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::codec::LinesCodec;

use crate::commands::{Command, ERR_INVALID_PAYLOAD};

/// Longest accepted frame, newline excluded.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Code reported on every successful response.
pub const CODE_OK: u32 = 0;

/// Build the codec used on both ends of a connection.
#[must_use]
pub fn codec() -> LinesCodec { LinesCodec::new_with_max_length(MAX_FRAME_LEN) }

/// A decoded request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Correlation identifier echoed in the response.
    pub id: u64,
    /// Requested operation.
    pub command: Command,
}

impl Request {
    /// Decode a request from one frame.
    ///
    /// The `id` is read first so that a request with a valid id but a bad
    /// operation still receives a correlated error.
    ///
    /// # Errors
    /// Returns the failure [`Response`] to send when the frame is not a JSON
    /// object, lacks an unsigned `id`, or does not describe a known operation.
    pub fn parse(line: &str) -> Result<Self, Response> {
        let mut value: Value = serde_json::from_str(line).map_err(|err| {
            Response::failure(0, ERR_INVALID_PAYLOAD, format!("malformed frame: {err}"))
        })?;
        let Some(object) = value.as_object_mut() else {
            return Err(Response::failure(
                0,
                ERR_INVALID_PAYLOAD,
                "frame must be a JSON object",
            ));
        };
        let id = object
            .remove("id")
            .and_then(|id| id.as_u64())
            .ok_or_else(|| {
                Response::failure(0, ERR_INVALID_PAYLOAD, "frame needs an unsigned integer id")
            })?;
        let command = Command::from_value(value).map_err(|err| {
            Response::failure(id, ERR_INVALID_PAYLOAD, format!("invalid request: {err}"))
        })?;
        Ok(Self { id, command })
    }
}

/// A response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Identifier of the request being answered; zero when it was unreadable.
    pub id: u64,
    /// Whether the operation succeeded.
    pub ok: bool,
    /// [`CODE_OK`] or one of the `ERR_*` codes in [`crate::commands`].
    pub code: u32,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Operation result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    /// Successful response carrying `data`.
    #[must_use]
    pub const fn success(id: u64, data: Value) -> Self {
        Self {
            id,
            ok: true,
            code: CODE_OK,
            error: None,
            data: Some(data),
        }
    }

    /// Failed response with `code` and a client-facing message.
    #[must_use]
    pub fn failure(id: u64, code: u32, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            code,
            error: Some(message.into()),
            data: None,
        }
    }

    /// Encode as a single line, without the terminating newline.
    #[must_use]
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"id":{},"ok":false,"code":{},"error":"internal error"}}"#,
                self.id,
                crate::commands::ERR_INTERNAL_SERVER
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{
        db::TopicQuery,
        models::{EngagementKind, TargetType, TopicSort},
    };

    #[rstest]
    fn parses_toggle() {
        let req = Request::parse(
            r#"{"id":7,"op":"toggle","target_type":"reply","target_id":3,"kind":"like"}"#,
        )
        .expect("parse");
        assert_eq!(req.id, 7);
        assert_eq!(
            req.command,
            Command::Toggle {
                target_type: TargetType::Reply,
                target_id: 3,
                kind: EngagementKind::Like,
            }
        );
    }

    #[rstest]
    fn list_topics_fills_defaults() {
        let req = Request::parse(r#"{"id":1,"op":"list_topics","sort":"most_liked"}"#)
            .expect("parse");
        assert_eq!(
            req.command,
            Command::ListTopics(TopicQuery {
                sort: TopicSort::MostLiked,
                ..TopicQuery::default()
            })
        );
    }

    #[rstest]
    #[case("not json", 0)]
    #[case("[1,2]", 0)]
    #[case(r#"{"op":"list_categories"}"#, 0)]
    #[case(r#"{"id":-4,"op":"list_categories"}"#, 0)]
    #[case(r#"{"id":9,"op":"launch_rockets"}"#, 9)]
    #[case(r#"{"id":9,"op":"get_topic"}"#, 9)]
    #[case(r#"{"id":9,"op":"toggle","target_type":"user","target_id":1,"kind":"like"}"#, 9)]
    fn rejects_bad_frames(#[case] line: &str, #[case] id: u64) {
        let resp = Request::parse(line).expect_err("must fail");
        assert_eq!(resp.id, id);
        assert!(!resp.ok);
        assert_eq!(resp.code, ERR_INVALID_PAYLOAD);
    }

    #[rstest]
    fn success_line_omits_error() {
        let line = Response::success(3, json!({"active": true})).to_line();
        let value: Value = serde_json::from_str(&line).expect("json");
        assert_eq!(
            value,
            json!({"id": 3, "ok": true, "code": 0, "data": {"active": true}})
        );
    }

    #[rstest]
    fn failure_line_omits_data() {
        let line = Response::failure(4, 6, "gone").to_line();
        let value: Value = serde_json::from_str(&line).expect("json");
        assert_eq!(value, json!({"id": 4, "ok": false, "code": 6, "error": "gone"}));
    }
}
