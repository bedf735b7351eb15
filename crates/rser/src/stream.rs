//! Reassembling framed messages from a chunked byte stream.

use crate::config::CodecConfig;
use crate::decoder::{RserDecoder, StreamHeaderStatus};
use crate::error::StreamError;
use crate::symbols::SymbolRegistry;
use crate::value::Value;

/// Buffers incoming chunks and yields complete messages.
///
/// The stream header is checked once, before the first message. Every
/// message is decoded with a fresh decoder, so references never cross
/// message boundaries.
///
/// ```
/// use rser::stream::FrameAccumulator;
/// use rser::{codec, CodecConfig, SymbolRegistry, Value};
///
/// let config = CodecConfig::default();
/// let mut symbols = SymbolRegistry::new();
/// let mut bytes = codec::encode_stream_header(&config);
/// bytes.extend(codec::encode_message(&Value::from(42), &symbols, &config).unwrap());
///
/// let mut frames = FrameAccumulator::new(config);
/// let (head, tail) = bytes.split_at(3);
/// frames.push(head);
/// assert_eq!(frames.next_message(&mut symbols).unwrap(), None);
/// frames.push(tail);
/// assert_eq!(frames.next_message(&mut symbols).unwrap(), Some(Value::from(42)));
/// ```
#[derive(Debug)]
pub struct FrameAccumulator {
    buf: Vec<u8>,
    pos: usize,
    header_seen: bool,
    config: CodecConfig,
}

impl FrameAccumulator {
    pub fn new(config: CodecConfig) -> Self {
        Self {
            buf: Vec::with_capacity(config.initial_capacity),
            pos: 0,
            header_seen: false,
            config,
        }
    }

    /// Appends a chunk received from the transport.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes received but not consumed yet.
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn header_seen(&self) -> bool {
        self.header_seen
    }

    /// Decodes the next complete message, or returns `Ok(None)` until
    /// enough bytes have arrived.
    pub fn next_message(
        &mut self,
        symbols: &mut SymbolRegistry,
    ) -> Result<Option<Value>, StreamError> {
        if !self.header_seen && !self.read_stream_header(symbols)? {
            return Ok(None);
        }
        let (value, consumed) = {
            let mut decoder = RserDecoder::new(&self.buf[self.pos..], symbols, &self.config);
            match decoder.decode_message()? {
                Some(value) => (value, decoder.offset()),
                None => return Ok(None),
            }
        };
        self.pos += consumed;
        tracing::debug!(consumed, buffered = self.buffered(), "stream message");
        self.compact();
        Ok(Some(value))
    }

    /// Decodes every complete message currently buffered.
    pub fn drain_messages(
        &mut self,
        symbols: &mut SymbolRegistry,
    ) -> Result<Vec<Value>, StreamError> {
        let mut values = Vec::new();
        while let Some(value) = self.next_message(symbols)? {
            values.push(value);
        }
        Ok(values)
    }

    fn read_stream_header(&mut self, symbols: &mut SymbolRegistry) -> Result<bool, StreamError> {
        let (status, consumed) = {
            let mut decoder = RserDecoder::new(&self.buf[self.pos..], symbols, &self.config);
            let status = decoder.maybe_decode_stream_header(self.config.version);
            (status, decoder.offset())
        };
        match status {
            StreamHeaderStatus::Incomplete => Ok(false),
            StreamHeaderStatus::Incompatible => Err(StreamError::Incompatible),
            StreamHeaderStatus::Valid => {
                self.pos += consumed;
                self.header_seen = true;
                tracing::debug!(version = self.config.version, "stream header accepted");
                Ok(true)
            }
        }
    }

    fn compact(&mut self) {
        if self.pos == self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        } else if self.pos > self.buf.len() / 2 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }
}
