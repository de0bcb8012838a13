//! Client-side helpers shared by the integration tests.

#![allow(dead_code)]

use sirocco_core::codec::{
    CompressionCodec, Compressor, HeaderSerializer, JsonSerializer, MessageSerializer,
};
use sirocco_core::messages::{HEADER_MESSAGE_TYPE, Header, Request, Response};
use sirocco_network::transport::Multipart;
use sirocco_network::{Codecs, ServerConfig};
use std::sync::Arc;
use std::time::Duration;

pub fn memory_config(server_id: &str) -> ServerConfig {
    ServerConfig {
        server_id: server_id.to_string(),
        recv_endpoint: "mem://requests".to_string(),
        send_endpoint: "mem://responses".to_string(),
        drain_timeout: Duration::from_millis(500),
        ..ServerConfig::default()
    }
}

pub fn codecs() -> Codecs {
    Codecs::json(CompressionCodec::Gzip)
}

/// Encodes and decodes frames the way a client would.
pub struct ClientCodec {
    compressor: Arc<dyn Compressor>,
}

impl ClientCodec {
    pub fn new(compression: CompressionCodec) -> Self {
        Self {
            compressor: compression.compressor(),
        }
    }

    pub fn request(&self, request: &Request) -> Multipart {
        let body = MessageSerializer::<Request>::serialize(&JsonSerializer, request).unwrap();
        self.frames("Request", &body)
    }

    pub fn frames(&self, message_type: &str, body: &[u8]) -> Multipart {
        let mut header = Header::new();
        header.insert(HEADER_MESSAGE_TYPE.to_string(), message_type.to_string());
        let header = HeaderSerializer::serialize(&JsonSerializer, &header).unwrap();
        vec![
            self.compressor.compress(&header).unwrap(),
            self.compressor.compress(body).unwrap(),
        ]
    }

    pub fn response(&self, frames: &Multipart) -> (Header, Response) {
        assert_eq!(frames.len(), 2, "response must carry header and body");
        let header = self.compressor.decompress(&frames[0], usize::MAX).unwrap();
        let header = HeaderSerializer::deserialize(&JsonSerializer, &header).unwrap();
        let body = self.compressor.decompress(&frames[1], usize::MAX).unwrap();
        let response = MessageSerializer::<Response>::deserialize(&JsonSerializer, &body).unwrap();
        (header, response)
    }
}
