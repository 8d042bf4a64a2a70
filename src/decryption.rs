//! Decryption interceptor for bank responses.
//!
//! Banks return their JSON payloads wrapped in a JOSE/JWE compact envelope
//! (RSA-OAEP-256 key management, A128CBC-HS256 content encryption). The
//! envelope must be decrypted transparently before any schema-level parsing
//! happens, so every transport call funnels through [`process_response`].

use crate::errors::AppError;
use josekit::jwe::{JweHeader, RSA_OAEP_256};
use serde::de::DeserializeOwned;

/// Header the bank uses to echo back the call-scoped correlation id.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

const PLAINTEXT_PREVIEW_CHARS: usize = 200;

/// Decrypts and deserializes one bank response.
///
/// A non-success status is never decrypted: it maps directly to
/// [`AppError::UpstreamApi`] with the original status code and any
/// correlation id the endpoint returned. On a success status the body is
/// treated as a JWE compact envelope; envelope or JSON failures map to
/// [`AppError::Decryption`] carrying the status, correlation id and a
/// preview of the (possibly partial) plaintext. No retry happens here.
pub async fn process_response<T: DeserializeOwned>(
    response: reqwest::Response,
    decryption_key_pem: &str,
    operation: &str,
) -> Result<T, AppError> {
    let status = response.status();
    let correlation_id = response
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            AppError::Timeout {
                operation: operation.to_string(),
            }
        } else {
            AppError::UpstreamApi {
                status: Some(status.as_u16()),
                correlation_id: correlation_id.clone(),
                message: format!("Failed reading response body: {}", e),
            }
        }
    })?;

    if !status.is_success() {
        return Err(AppError::UpstreamApi {
            status: Some(status.as_u16()),
            correlation_id,
            message: format!("{} returned {}: {}", operation, status, preview(&body)),
        });
    }

    let plaintext = decrypt_envelope(&body, decryption_key_pem).map_err(|e| {
        AppError::Decryption {
            status: status.as_u16(),
            correlation_id: correlation_id.clone(),
            message: format!("{}: {}", operation, e),
        }
    })?;

    serde_json::from_str(&plaintext).map_err(|e| AppError::Decryption {
        status: status.as_u16(),
        correlation_id,
        message: format!(
            "{}: decrypted payload did not match the expected schema: {} (payload: {})",
            operation,
            e,
            preview(&plaintext)
        ),
    })
}

/// Decrypts a JWE compact envelope to its UTF-8 plaintext.
pub fn decrypt_envelope(envelope: &str, private_key_pem: &str) -> Result<String, String> {
    let decrypter = RSA_OAEP_256
        .decrypter_from_pem(private_key_pem)
        .map_err(|e| format!("Invalid decryption key: {}", e))?;

    let (payload, _header) = josekit::jwe::deserialize_compact(envelope.trim(), &decrypter)
        .map_err(|e| format!("JWE decode failed: {}", e))?;

    String::from_utf8(payload).map_err(|e| format!("Plaintext is not valid UTF-8: {}", e))
}

/// Encrypts a plaintext payload into a JWE compact envelope with the bank's
/// parameters. Inverse of [`decrypt_envelope`]; used by tests and stub
/// upstreams.
pub fn encrypt_payload(plaintext: &str, public_key_pem: &str) -> Result<String, String> {
    let mut header = JweHeader::new();
    header.set_content_encryption("A128CBC-HS256");

    let encrypter = RSA_OAEP_256
        .encrypter_from_pem(public_key_pem)
        .map_err(|e| format!("Invalid encryption key: {}", e))?;

    josekit::jwe::serialize_compact(plaintext.as_bytes(), &header, &encrypter)
        .map_err(|e| format!("JWE encode failed: {}", e))
}

fn preview(text: &str) -> String {
    let mut p: String = text.chars().take(PLAINTEXT_PREVIEW_CHARS).collect();
    if p.len() < text.len() {
        p.push_str("...");
    }
    p
}
