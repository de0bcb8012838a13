use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{HeaderSerializer, MessageSerializer};
use crate::error::CodecError;
use crate::messages::Header;

/// JSON serializer for any serde message type and for headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl<T> MessageSerializer<T> for JsonSerializer
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(CodecError::serialization)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::deserialization)
    }
}

impl HeaderSerializer for JsonSerializer {
    fn serialize(&self, header: &Header) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(header).map_err(CodecError::serialization)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Header, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::deserialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::ClientId;
    use crate::messages::{HEADER_MESSAGE_TYPE, Request};

    #[test]
    fn test_request_body() {
        let request = Request::connect(ClientId::new("C1").unwrap(), "tok");
        let bytes = MessageSerializer::<Request>::serialize(&JsonSerializer, &request).unwrap();
        let parsed: Request = MessageSerializer::deserialize(&JsonSerializer, &bytes).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_header() {
        let mut header = Header::new();
        header.insert(HEADER_MESSAGE_TYPE.to_string(), "Request".to_string());
        let bytes = HeaderSerializer::serialize(&JsonSerializer, &header).unwrap();
        assert_eq!(bytes, br#"{"MessageType":"Request"}"#);
        assert_eq!(HeaderSerializer::deserialize(&JsonSerializer, &bytes).unwrap(), header);
    }

    #[test]
    fn test_garbage_is_deserialization_error() {
        let result: Result<Request, _> =
            MessageSerializer::deserialize(&JsonSerializer, b"\x00\x01");
        let err = result.unwrap_err();
        assert_eq!(err.kind(), "DeserializationError");
    }
}
