//! JSON encoding of entities into pooled buffers.

use crate::buffer::{BufferPool, PooledBuffer};
use crate::error::StoreResult;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Serialises responses and parses request bodies.
#[derive(Debug, Clone)]
pub struct JsonCodec {
    buffers: Arc<BufferPool>,
}

impl JsonCodec {
    pub fn new(buffers: Arc<BufferPool>) -> Self {
        Self { buffers }
    }

    pub fn buffers(&self) -> &Arc<BufferPool> {
        &self.buffers
    }

    /// Encode `value` into a buffer taken from the pool.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> StoreResult<PooledBuffer<'_>> {
        let mut buf = self.buffers.acquire();
        serde_json::to_writer(&mut *buf, value)?;
        Ok(buf)
    }

    /// Like [`encode`](Self::encode), indented for terminals.
    pub fn encode_pretty<T: Serialize + ?Sized>(&self, value: &T) -> StoreResult<PooledBuffer<'_>> {
        let mut buf = self.buffers.acquire();
        serde_json::to_writer_pretty(&mut *buf, value)?;
        Ok(buf)
    }

    /// Parse a request body.
    pub fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> StoreResult<T> {
        Ok(serde_json::from_slice(body)?)
    }
}
