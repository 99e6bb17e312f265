//! Newline-delimited JSON messages exchanged with a runner
//!
//! Each message is a single JSON object terminated by `\n`. The supervisor
//! only ever sends [`MessageType::KillProcessRequest`].

use serde::{Deserialize, Serialize};
use std::io;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};

static NEXT_MESSAGE_ID: AtomicI64 = AtomicI64::new(1);

/// Process-unique message identifier
#[must_use]
pub fn next_message_id() -> i64 {
    NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    KillProcessRequest,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillProcessRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: i64,
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_process_request: Option<KillProcessRequest>,
}

impl Message {
    /// Ask the runner to shut itself down.
    #[must_use]
    pub fn kill_process_request() -> Self {
        Self {
            message_id: next_message_id(),
            message_type: MessageType::KillProcessRequest,
            kill_process_request: Some(KillProcessRequest {}),
        }
    }
}

/// Write one message as a JSON line and flush.
pub async fn write_message<W>(writer: &mut W, message: &Message) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

/// Parse one JSON line.
pub fn decode_message(line: &str) -> Result<Message, serde_json::Error> {
    serde_json::from_str(line.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_are_unique() {
        let a = next_message_id();
        let b = next_message_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_kill_request_wire_shape() {
        let message = Message::kill_process_request();
        let mut buf = Vec::new();
        write_message(&mut buf, &message).await.unwrap();

        assert_eq!(buf.last(), Some(&b'\n'));
        assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 1);

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["messageType"], "KillProcessRequest");
        assert_eq!(value["messageId"], message.message_id);
        assert!(value["killProcessRequest"].is_object());
    }

    #[test]
    fn test_unknown_message_type_decodes() {
        let message =
            decode_message(r#"{"messageId": 3, "messageType": "ExecutionStarting"}"#).unwrap();
        assert_eq!(message.message_type, MessageType::Unknown);
        assert!(message.kill_process_request.is_none());
    }
}
