//! Gzip and zlib compression with base64 output.

use super::{coerce_bytes, Function};
use crate::context::{FunctionContext, CONTENT_TYPE_TEXT};
use crate::core::{FunctionOutput, Payload};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use tracing::debug;

/// Supported compression algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    /// Gzip framing (RFC 1952).
    Gzip,
    /// Zlib framing (RFC 1950).
    Zlib,
}

impl FromStr for CompressionAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(Self::Gzip),
            "zlib" => Ok(Self::Zlib),
            other => Err(format!("'{other}' is not a compression algorithm (expected gzip or zlib)")),
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gzip => write!(f, "gzip"),
            Self::Zlib => write!(f, "zlib"),
        }
    }
}

impl CompressionAlgorithm {
    /// Compresses `data` with this algorithm.
    pub fn compress(self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Self::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
        }
    }
}

/// Compresses the coerced input and returns it as base64 text.
///
/// Sets the response content type to `text/plain`.
#[derive(Debug, Clone)]
pub struct CompressFunction {
    algorithm: CompressionAlgorithm,
}

impl CompressFunction {
    /// Creates a compressor for `algorithm`.
    #[must_use]
    pub const fn new(algorithm: CompressionAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Returns the algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }
}

#[async_trait]
impl Function for CompressFunction {
    fn name(&self) -> &str {
        match self.algorithm {
            CompressionAlgorithm::Gzip => "CompressWithGZIP",
            CompressionAlgorithm::Zlib => "CompressWithZLIB",
        }
    }

    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        debug!(pipeline_id = %ctx.pipeline_id(), algorithm = %self.algorithm, "compressing data");

        let bytes = match coerce_bytes(ctx, &data) {
            Ok(bytes) => bytes,
            Err(err) => return FunctionOutput::fail(err),
        };

        match self.algorithm.compress(&bytes) {
            Ok(compressed) => {
                ctx.pipeline().set_response_content_type(CONTENT_TYPE_TEXT);
                FunctionOutput::proceed(BASE64.encode(compressed))
            }
            Err(err) => FunctionOutput::fail(ctx.error(format!(
                "failed to compress data with {}: {err}",
                self.algorithm
            ))),
        }
    }
}
