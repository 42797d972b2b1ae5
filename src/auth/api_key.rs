//! API keys consist of an ID and a random string. These are combined into a hash, which is
//! stored and used to look up the key. The random string is never stored, which makes it
//! impossible to reconstruct a key from a stored row.

use base64::{display::Base64Display, engine::GeneralPurpose, Engine};
use sha3::Digest;
use uuid::Uuid;

use super::AuthError;

/// A generated API key
#[derive(Debug, Clone)]
pub struct ApiKeyData {
    /// The ID of the key
    pub api_key_id: Uuid,
    /// The hash of the key.
    pub hash: Vec<u8>,
    /// The full representation of the key, which the user passes in to the API.
    /// This is not stored.
    pub key: String,
}

const B64_ENGINE: GeneralPurpose = base64::engine::general_purpose::URL_SAFE_NO_PAD;

impl ApiKeyData {
    /// Create a new API key
    pub fn new() -> ApiKeyData {
        let id = Uuid::now_v7();
        let base64_id = Base64Display::new(id.as_bytes(), &B64_ENGINE);
        let random_id = Uuid::new_v4();
        let random = Base64Display::new(random_id.as_bytes(), &B64_ENGINE);
        let key = format!("{base64_id}.{random}");
        let hash = hash_key(&key);

        ApiKeyData {
            api_key_id: id,
            key,
            hash,
        }
    }
}

impl Default for ApiKeyData {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_key(key: &str) -> Vec<u8> {
    let mut hasher = sha3::Sha3_512::default();
    hasher.update(key.as_bytes());
    hasher.finalize().to_vec()
}

/// Parse an API key into the constituent ID and hash.
pub fn decode_key(key: &str) -> Result<(Uuid, Vec<u8>), AuthError> {
    // Should be a pair of UUIDs base64 encoded and joined with '.'
    if key.len() != 45 {
        return Err(AuthError::ApiKeyFormat);
    }

    let id_portion = key.split_once('.').ok_or(AuthError::ApiKeyFormat)?.0;
    let api_key_bytes = B64_ENGINE
        .decode(id_portion.as_bytes())
        .map_err(|_| AuthError::ApiKeyFormat)?;
    let api_key_id = Uuid::from_slice(&api_key_bytes).map_err(|_| AuthError::ApiKeyFormat)?;

    Ok((api_key_id, hash_key(key)))
}
