//! Message store: raw message files, MIME decoding, attachment cache.

pub mod attachments;
pub mod mime;
pub mod reader;
