//! AES-256-GCM protection of pipeline data.
//!
//! Encrypted output is `base64(nonce || ciphertext)` with a random 96-bit
//! nonce per message. The key is either configured inline as hex or read
//! from the secret provider on every call.

use super::{coerce_bytes, Function};
use crate::context::{FunctionContext, CONTENT_TYPE_TEXT};
use crate::core::{FunctionOutput, Payload};
use crate::errors::FunctionError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use tracing::debug;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;
/// GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// Direction of an [`AesProtection`] function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesMode {
    /// Encrypt the input.
    Encrypt,
    /// Decrypt the input.
    Decrypt,
}

/// Where the encryption key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum EncryptionKey {
    /// A hex-encoded key.
    Hex(String),
    /// A key stored in the secret provider.
    Secret {
        /// Secret name.
        name: String,
        /// Key inside the secret holding the hex-encoded key.
        value_key: String,
    },
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex(_) => f.write_str("Hex(<redacted>)"),
            Self::Secret { name, value_key } => f
                .debug_struct("Secret")
                .field("name", name)
                .field("value_key", value_key)
                .finish(),
        }
    }
}

/// Encrypts or decrypts data with AES-256-GCM.
#[derive(Debug, Clone)]
pub struct AesProtection {
    mode: AesMode,
    key: EncryptionKey,
}

impl AesProtection {
    /// Creates an encrypting function.
    #[must_use]
    pub const fn encrypt(key: EncryptionKey) -> Self {
        Self {
            mode: AesMode::Encrypt,
            key,
        }
    }

    /// Creates a decrypting function.
    #[must_use]
    pub const fn decrypt(key: EncryptionKey) -> Self {
        Self {
            mode: AesMode::Decrypt,
            key,
        }
    }

    /// Returns the direction.
    #[must_use]
    pub const fn mode(&self) -> AesMode {
        self.mode
    }

    /// Resolves the key bytes.
    ///
    /// 64-byte keys (AES key followed by a MAC key) are accepted and
    /// truncated to their AES half.
    fn key_bytes(&self, ctx: &FunctionContext) -> Result<Vec<u8>, FunctionError> {
        let hex_key = match &self.key {
            EncryptionKey::Hex(hex_key) => hex_key.clone(),
            EncryptionKey::Secret { name, value_key } => {
                let provider = ctx
                    .pipeline()
                    .secrets()
                    .ok_or_else(|| ctx.error("no secret provider configured"))?;
                let mut secrets = provider
                    .get_secrets(name, &[value_key.as_str()])
                    .map_err(|err| ctx.error(err.to_string()))?;
                debug!(
                    pipeline_id = %ctx.pipeline_id(),
                    secret_name = %name,
                    secret_value_key = %value_key,
                    "using encryption key from secret store"
                );
                secrets.remove(value_key).ok_or_else(|| {
                    ctx.error(format!("unable to find encryption key in secret data for name={name}"))
                })?
            }
        };

        let mut key = hex::decode(hex_key.trim())
            .map_err(|err| ctx.error(format!("encryption key is not valid hex: {err}")))?;
        match key.len() {
            0 => Err(ctx.error("AES256 encryption key not set")),
            KEY_SIZE => Ok(key),
            len if len == KEY_SIZE * 2 => {
                key.truncate(KEY_SIZE);
                Ok(key)
            }
            len => Err(ctx.error(format!(
                "AES256 encryption key length should be {KEY_SIZE} or {} bytes, got {len}",
                KEY_SIZE * 2
            ))),
        }
    }

    fn seal(ctx: &FunctionContext, key: &[u8], plaintext: &[u8]) -> Result<String, FunctionError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|err| ctx.error(format!("failed to create cipher: {err}")))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|err| ctx.error(format!("encryption failed: {err}")))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    fn open(ctx: &FunctionContext, key: &[u8], encoded: &[u8]) -> Result<Vec<u8>, FunctionError> {
        let sealed = BASE64
            .decode(encoded)
            .map_err(|err| ctx.error(format!("encrypted data is not valid base64: {err}")))?;
        if sealed.len() <= NONCE_SIZE {
            return Err(ctx.error("encrypted data is too short"));
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|err| ctx.error(format!("failed to create cipher: {err}")))?;
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| ctx.error("incorrect decryption"))
    }
}

#[async_trait]
impl Function for AesProtection {
    fn name(&self) -> &str {
        match self.mode {
            AesMode::Encrypt => "Encrypt",
            AesMode::Decrypt => "Decrypt",
        }
    }

    async fn execute(&self, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        debug!(pipeline_id = %ctx.pipeline_id(), mode = ?self.mode, "AES256 protection");

        let result = coerce_bytes(ctx, &data).and_then(|bytes| {
            let key = self.key_bytes(ctx)?;
            match self.mode {
                AesMode::Encrypt => Self::seal(ctx, &key, &bytes).map(Payload::Text),
                AesMode::Decrypt => Self::open(ctx, &key, &bytes).map(Payload::Bytes),
            }
        });

        match result {
            Ok(payload) => {
                ctx.pipeline().set_response_content_type(CONTENT_TYPE_TEXT);
                FunctionOutput::Proceed(payload)
            }
            Err(err) => FunctionOutput::fail(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{InMemorySecretProvider, PipelineContext};
    use crate::functions::test_support::{function_ctx, function_ctx_with};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Arc;

    const KEY: &str = "217A24432646294A404E635266556A586E3272357538782F413F442A472D4B61";
    const CLEAR: &str = "This is the test string used for testing";

    async fn run(function: &AesProtection, ctx: &FunctionContext, data: Payload) -> FunctionOutput {
        function.execute(ctx, data).await
    }

    #[tokio::test]
    async fn test_encrypt_then_decrypt() {
        let ctx = function_ctx("Encrypt");
        let encrypt = AesProtection::encrypt(EncryptionKey::Hex(KEY.into()));
        let decrypt = AesProtection::decrypt(EncryptionKey::Hex(KEY.into()));

        let FunctionOutput::Proceed(sealed) = run(&encrypt, &ctx, CLEAR.into()).await else {
            panic!("encryption failed");
        };
        assert!(matches!(sealed, Payload::Text(_)));
        assert_eq!(
            ctx.pipeline().response_content_type().as_deref(),
            Some(CONTENT_TYPE_TEXT)
        );

        let output = run(&decrypt, &ctx, sealed).await;
        assert_eq!(output, FunctionOutput::proceed(CLEAR.as_bytes().to_vec()));
    }

    #[tokio::test]
    async fn test_nonce_differs_per_message() {
        let ctx = function_ctx("Encrypt");
        let encrypt = AesProtection::encrypt(EncryptionKey::Hex(KEY.into()));
        let first = run(&encrypt, &ctx, CLEAR.into()).await;
        let second = run(&encrypt, &ctx, CLEAR.into()).await;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_key_from_secret_provider() {
        let secrets = InMemorySecretProvider::new();
        secrets.store("aes", HashMap::from([("key".to_string(), KEY.repeat(2))]));
        let pipeline = Arc::new(PipelineContext::new(None).with_secrets(Arc::new(secrets)));
        let ctx = function_ctx_with(pipeline, "Encrypt");
        let key = EncryptionKey::Secret {
            name: "aes".into(),
            value_key: "key".into(),
        };

        let FunctionOutput::Proceed(sealed) =
            run(&AesProtection::encrypt(key.clone()), &ctx, CLEAR.into()).await
        else {
            panic!("encryption failed");
        };
        let output = run(&AesProtection::decrypt(key), &ctx, sealed).await;
        assert_eq!(output, FunctionOutput::proceed(CLEAR.as_bytes().to_vec()));
    }

    #[tokio::test]
    async fn test_missing_secret_provider_fails() {
        let key = EncryptionKey::Secret {
            name: "aes".into(),
            value_key: "key".into(),
        };
        let output = run(&AesProtection::encrypt(key), &function_ctx("Encrypt"), CLEAR.into()).await;
        let FunctionOutput::Fail(err) = output else {
            panic!("expected failure");
        };
        assert!(err.message.contains("no secret provider"));
    }

    #[tokio::test]
    async fn test_wrong_key_length_fails() {
        let encrypt = AesProtection::encrypt(EncryptionKey::Hex("abcd".into()));
        let output = run(&encrypt, &function_ctx("Encrypt"), CLEAR.into()).await;
        assert!(matches!(output, FunctionOutput::Fail(_)));
    }

    #[tokio::test]
    async fn test_tampered_data_fails() {
        let ctx = function_ctx("Decrypt");
        let decrypt = AesProtection::decrypt(EncryptionKey::Hex(KEY.into()));
        let tampered = BASE64.encode([7u8; 40]);
        let FunctionOutput::Fail(err) = run(&decrypt, &ctx, tampered.into()).await else {
            panic!("expected failure");
        };
        assert!(err.message.contains("incorrect decryption"));
    }

    #[test]
    fn test_hex_key_is_redacted_in_debug() {
        let function = AesProtection::encrypt(EncryptionKey::Hex(KEY.into()));
        assert!(!format!("{function:?}").contains(KEY));
    }
}
