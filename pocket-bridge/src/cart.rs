//! Pocket cartridge container format (`.ewp`)
//!
//! A cart is a sequence of chunks, nothing more. Each chunk is a 4-byte
//! header followed by its payload:
//!
//! ```text
//! [Chunk header: 4 bytes]
//! - chunk_type: u8
//! - length: u16 (LE)
//! - reserved: u8 (always 0)
//!
//! [Payload: length bytes]
//! ```
//!
//! The runtime source (with the generated bridge section spliced in) ships
//! as a `Code` chunk; the cart manifest ships as a `Meta` chunk.

use thiserror::Error;

/// Cart parsing/building error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Byte stream ended inside a chunk header or payload
    #[error("unexpected end of cart data")]
    UnexpectedEof,
    /// Chunk type byte with no mapped type
    #[error("unknown chunk type {0}")]
    UnknownChunkType(u8),
    /// Payload too large for the 16-bit length field
    #[error("chunk payload of {0} bytes exceeds the {max}-byte limit", max = u16::MAX)]
    ChunkTooLarge(usize),
    /// Reserved header byte was not zero
    #[error("reserved header byte is {0}, expected 0")]
    BadReserved(u8),
    /// Cart with no chunks
    #[error("cart contains no chunks")]
    Empty,
}

/// Chunk type tags (wire contract)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkType {
    /// Runtime Lua source
    Code = 1,
    /// Cart manifest (TOML text)
    Meta = 2,
}

impl ChunkType {
    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(ChunkType::Code),
            2 => Some(ChunkType::Meta),
            _ => None,
        }
    }
}

/// Size of a chunk header in bytes
pub const CHUNK_HEADER_SIZE: usize = 4;

/// One cart chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_type: ChunkType,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(chunk_type: ChunkType, data: Vec<u8>) -> Self {
        Self { chunk_type, data }
    }
}

/// A complete cartridge
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cart {
    pub chunks: Vec<Chunk>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk
    pub fn push(&mut self, chunk_type: ChunkType, data: Vec<u8>) {
        self.chunks.push(Chunk::new(chunk_type, data));
    }

    /// First chunk of a given type
    pub fn find(&self, chunk_type: ChunkType) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.chunk_type == chunk_type)
    }

    /// Serialize the cart
    pub fn to_bytes(&self) -> Result<Vec<u8>, CartError> {
        if self.chunks.is_empty() {
            return Err(CartError::Empty);
        }
        let mut bytes = Vec::new();
        for chunk in &self.chunks {
            if chunk.data.len() > usize::from(u16::MAX) {
                return Err(CartError::ChunkTooLarge(chunk.data.len()));
            }
            bytes.push(chunk.chunk_type.id());
            bytes.extend_from_slice(&(chunk.data.len() as u16).to_le_bytes());
            bytes.push(0); // reserved
            bytes.extend_from_slice(&chunk.data);
        }
        Ok(bytes)
    }

    /// Parse and validate a cart
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CartError> {
        let mut chunks = Vec::new();
        let mut cursor = 0usize;

        while cursor < bytes.len() {
            if bytes.len() - cursor < CHUNK_HEADER_SIZE {
                return Err(CartError::UnexpectedEof);
            }
            let chunk_type = ChunkType::from_id(bytes[cursor])
                .ok_or(CartError::UnknownChunkType(bytes[cursor]))?;
            let length =
                usize::from(u16::from_le_bytes([bytes[cursor + 1], bytes[cursor + 2]]));
            if bytes[cursor + 3] != 0 {
                return Err(CartError::BadReserved(bytes[cursor + 3]));
            }
            cursor += CHUNK_HEADER_SIZE;

            if bytes.len() - cursor < length {
                return Err(CartError::UnexpectedEof);
            }
            chunks.push(Chunk::new(
                chunk_type,
                bytes[cursor..cursor + length].to_vec(),
            ));
            cursor += length;
        }

        if chunks.is_empty() {
            return Err(CartError::Empty);
        }
        Ok(Self { chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cart() -> Cart {
        let mut cart = Cart::new();
        cart.push(ChunkType::Code, b"print('hi')".to_vec());
        cart.push(ChunkType::Meta, b"title = \"Test\"".to_vec());
        cart
    }

    #[test]
    fn test_cart_roundtrip() {
        let cart = sample_cart();
        let bytes = cart.to_bytes().unwrap();
        let parsed = Cart::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, cart);
    }

    #[test]
    fn test_chunk_header_layout() {
        let mut cart = Cart::new();
        cart.push(ChunkType::Code, vec![0xAA; 0x1234]);
        let bytes = cart.to_bytes().unwrap();

        assert_eq!(bytes[0], 1); // type tag
        assert_eq!(&bytes[1..3], &[0x34, 0x12]); // length, little-endian
        assert_eq!(bytes[3], 0); // reserved
        assert_eq!(bytes.len(), CHUNK_HEADER_SIZE + 0x1234);
    }

    #[test]
    fn test_unknown_chunk_type_fails() {
        let bytes = [9u8, 0, 0, 0];
        assert_eq!(
            Cart::from_bytes(&bytes).unwrap_err(),
            CartError::UnknownChunkType(9)
        );
    }

    #[test]
    fn test_truncated_cart_fails() {
        let cart = sample_cart();
        let bytes = cart.to_bytes().unwrap();
        assert_eq!(
            Cart::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err(),
            CartError::UnexpectedEof
        );
        assert_eq!(Cart::from_bytes(&bytes[..2]).unwrap_err(), CartError::UnexpectedEof);
    }

    #[test]
    fn test_empty_cart_fails() {
        assert_eq!(Cart::new().to_bytes().unwrap_err(), CartError::Empty);
        assert_eq!(Cart::from_bytes(&[]).unwrap_err(), CartError::Empty);
    }

    #[test]
    fn test_oversized_chunk_fails() {
        let mut cart = Cart::new();
        cart.push(ChunkType::Code, vec![0; 70_000]);
        assert_eq!(
            cart.to_bytes().unwrap_err(),
            CartError::ChunkTooLarge(70_000)
        );
    }

    #[test]
    fn test_find_chunk() {
        let cart = sample_cart();
        assert!(cart.find(ChunkType::Meta).is_some());
        assert_eq!(cart.find(ChunkType::Code).unwrap().data, b"print('hi')");
    }
}
