//! Message envelopes exchanged between clients and the message server.
//!
//! Every envelope carries a unique [`MessageId`](crate::identifiers::MessageId)
//! and a UTC timestamp. Responses additionally carry the id of the request
//! they answer as their correlation id.

mod command;
mod request;
mod response;

pub use command::Command;
pub use request::Request;
pub use response::Response;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Header key naming the envelope kind.
pub const HEADER_MESSAGE_TYPE: &str = "MessageType";

/// Header key naming the concrete payload type of a response.
pub const HEADER_TYPE: &str = "Type";

/// String-keyed header sent alongside every message body.
pub type Header = BTreeMap<String, String>;

/// Kind of envelope carried by a multipart message, as named in its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// UTF-8 text, forwarded verbatim.
    String,
    /// A [`Request`].
    Request,
    /// A [`Command`].
    Command,
    /// A [`Response`].
    Response,
}

impl MessageType {
    /// Returns the header value for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Request => "Request",
            Self::Command => "Command",
            Self::Response => "Response",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "String" => Ok(Self::String),
            "Request" => Ok(Self::Request),
            "Command" => Ok(Self::Command),
            "Response" => Ok(Self::Response),
            other => Err(other.to_string()),
        }
    }
}

/// Builds the header sent with a response.
#[must_use]
pub fn response_header(type_name: &str) -> Header {
    let mut header = Header::new();
    header.insert(
        HEADER_MESSAGE_TYPE.to_string(),
        MessageType::Response.as_str().to_string(),
    );
    header.insert(HEADER_TYPE.to_string(), type_name.to_string());
    header
}
