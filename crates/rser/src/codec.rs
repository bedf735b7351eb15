//! One-shot helpers and `RserCodec`, a combined encoder/decoder pair.

use rser_buffers::Writer;

use crate::config::CodecConfig;
use crate::decoder::{RserDecoder, StreamHeaderStatus};
use crate::encoder::{ReferencePlan, RserEncoder};
use crate::error::{ConfigError, DecodeError, DecodeErrorKind, EncodeError, StreamError};
use crate::symbols::SymbolRegistry;
use crate::value::Value;

/// Encodes the stream header announcing `config.version`.
pub fn encode_stream_header(config: &CodecConfig) -> Vec<u8> {
    let symbols = SymbolRegistry::new();
    let plan = ReferencePlan::default();
    let mut encoder = RserEncoder::new(Writer::with_alloc_size(16), &symbols, &plan, config);
    encoder.encode_stream_header(config.version);
    encoder.into_sink().flush()
}

/// Message header tag plus the widest tagged length (int32).
const MAX_MESSAGE_HEADER_LEN: usize = 6;

/// Encodes `value` as one framed message: header with the payload length,
/// then the payload.
pub fn encode_message(
    value: &Value,
    symbols: &SymbolRegistry,
    config: &CodecConfig,
) -> Result<Vec<u8>, EncodeError> {
    let plan = ReferencePlan::discover(value);
    let (mut writer, len) = write_message(value, symbols, &plan, config)?;
    let bytes = writer.flush();
    tracing::debug!(
        payload = len,
        total = bytes.len(),
        references = plan.referenced_count(),
        "encoded message"
    );
    Ok(bytes)
}

/// Writes the framed message into a writer sized from the counting pass,
/// so emission never reallocates.
fn write_message(
    value: &Value,
    symbols: &SymbolRegistry,
    plan: &ReferencePlan,
    config: &CodecConfig,
) -> Result<(Writer, usize), EncodeError> {
    let len = RserEncoder::encoded_len(value, symbols, plan, config)?;
    let writer = Writer::with_alloc_size(len + MAX_MESSAGE_HEADER_LEN);
    let mut encoder = RserEncoder::new(writer, symbols, plan, config);
    encoder.encode_message_header(len)?;
    encoder.encode_value(value)?;
    Ok((encoder.into_sink(), len))
}

/// Decodes one framed message that must be fully contained in `bytes`.
///
/// Truncated input is an error. Bytes after the message are ignored.
pub fn decode_message(
    bytes: &[u8],
    symbols: &mut SymbolRegistry,
    config: &CodecConfig,
) -> Result<Value, DecodeError> {
    let mut decoder = RserDecoder::new(bytes, symbols, config);
    let len = decoder.decode_message_header()?;
    let value = decoder.decode_message_payload(len)?;
    tracing::debug!(
        payload = len,
        references = decoder.declared_references(),
        "decoded message"
    );
    Ok(value)
}

/// Checks that `bytes` start with a complete, compatible stream header and
/// returns its length.
pub fn decode_stream_header(bytes: &[u8], config: &CodecConfig) -> Result<usize, StreamError> {
    let mut symbols = SymbolRegistry::new();
    let mut decoder = RserDecoder::new(bytes, &mut symbols, config);
    match decoder.maybe_decode_stream_header(config.version) {
        StreamHeaderStatus::Valid => Ok(decoder.offset()),
        StreamHeaderStatus::Incompatible => Err(StreamError::Incompatible),
        StreamHeaderStatus::Incomplete => Err(StreamError::Decode(DecodeError::new(
            bytes.len(),
            DecodeErrorKind::EndOfBuffer {
                needed: 1,
                available: 0,
            },
        ))),
    }
}

/// Config and symbol registry bundled for repeated use.
///
/// ```
/// use rser::{RserCodec, Value};
///
/// let mut codec = RserCodec::default();
/// let bytes = codec.encode(&Value::from("hi")).unwrap();
/// assert_eq!(codec.decode(&bytes).unwrap(), Value::from("hi"));
/// ```
#[derive(Debug, Default)]
pub struct RserCodec {
    config: CodecConfig,
    symbols: SymbolRegistry,
}

impl RserCodec {
    pub fn new(config: CodecConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            symbols: SymbolRegistry::new(),
        })
    }

    pub fn with_symbols(mut self, symbols: SymbolRegistry) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn symbols(&self) -> &SymbolRegistry {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolRegistry {
        &mut self.symbols
    }

    pub fn stream_header(&self) -> Vec<u8> {
        encode_stream_header(&self.config)
    }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        encode_message(value, &self.symbols, &self.config)
    }

    pub fn decode(&mut self, bytes: &[u8]) -> Result<Value, DecodeError> {
        decode_message(bytes, &mut self.symbols, &self.config)
    }
}
