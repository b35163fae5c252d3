//! Thread types.

use super::message::Message;

/// A discussion thread, reconstructed from the monthly thread files and the
/// per-subject message chains.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Thread {
    /// Subject hash, the thread's primary key across the archive.
    pub subject_hash: String,

    /// Id of the most recent message in the thread.
    pub last_message_id: u64,

    /// Id of the oldest message in the thread.
    /// Equal to `last_message_id` until details are resolved, or for
    /// single-message threads.
    pub first_message_id: u64,

    /// Number of messages sharing this subject hash.
    pub message_count: u64,

    /// Display subject with reply/forward prefixes stripped.
    pub subject: String,

    /// `true` if the subject bytes needed the fallback-charset decode.
    pub charset_converted: bool,

    /// Oldest message, loaded when details are requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message: Option<Message>,

    /// Most recent message, loaded when details are requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,

    /// Display name of the thread starter, from the first message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}
