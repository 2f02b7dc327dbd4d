//! Payload and cookie authentication.
//!
//! Stored payloads are laid out as `version || tag || json`, where the tag is
//! an HMAC-SHA256 over the version byte, the session ID and the JSON body.
//! Binding the ID into the tag means a payload copied onto another row fails
//! verification.
//!
//! Cookie values are `id.signature`, with the signature an HMAC-SHA256 over
//! the cookie name and the ID. Both keys are derived from the configured
//! secret under distinct labels, so a cookie signature can never be replayed
//! as a payload tag.

use std::collections::BTreeMap;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Session values: string keys mapped to arbitrary JSON values.
pub type SessionValues = BTreeMap<String, serde_json::Value>;

/// Current payload layout version.
const PAYLOAD_VERSION: u8 = 1;

/// Length of an HMAC-SHA256 tag.
const TAG_LEN: usize = 32;

/// Random bytes per session ID (256 bits).
const SESSION_ID_BYTES: usize = 32;

/// Encoded length of a session ID.
const SESSION_ID_LEN: usize = 43;

const COOKIE_KEY_LABEL: &[u8] = b"cellar/cookie-signing/v1";
const PAYLOAD_KEY_LABEL: &[u8] = b"cellar/payload-auth/v1";

/// Generate a new random session ID.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Whether `id` has the shape of an ID produced by [`generate_session_id`].
pub fn is_well_formed_id(id: &str) -> bool {
    id.len() == SESSION_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Leading characters of a session ID, enough to correlate log lines
/// without logging a usable credential.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Signs cookies and authenticates stored payloads.
#[derive(Clone)]
pub struct SessionCodec {
    cookie_key: [u8; TAG_LEN],
    payload_key: [u8; TAG_LEN],
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec").finish_non_exhaustive()
    }
}

impl SessionCodec {
    /// Derive codec keys from secret key material.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            cookie_key: derive_key(secret, COOKIE_KEY_LABEL),
            payload_key: derive_key(secret, PAYLOAD_KEY_LABEL),
        }
    }

    /// Serialize and authenticate session values for storage.
    pub fn encode(&self, id: &str, values: &SessionValues) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(values)?;
        let tag = self.payload_mac(id, &body).finalize().into_bytes();

        let mut out = Vec::with_capacity(1 + TAG_LEN + body.len());
        out.push(PAYLOAD_VERSION);
        out.extend_from_slice(&tag);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Verify and deserialize a stored payload.
    ///
    /// The tag is checked before the body is parsed.
    pub fn decode(&self, id: &str, bytes: &[u8]) -> Result<SessionValues> {
        let (&version, rest) = bytes
            .split_first()
            .ok_or_else(|| Error::MalformedPayload("empty payload".into()))?;
        if version != PAYLOAD_VERSION {
            return Err(Error::MalformedPayload(format!(
                "unsupported payload version {}",
                version
            )));
        }
        if rest.len() < TAG_LEN {
            return Err(Error::AuthenticationFailed);
        }

        let (tag, body) = rest.split_at(TAG_LEN);
        self.payload_mac(id, body)
            .verify_slice(tag)
            .map_err(|_| Error::AuthenticationFailed)?;

        serde_json::from_slice(body).map_err(|e| Error::MalformedPayload(e.to_string()))
    }

    /// Produce the cookie value for a session ID.
    pub fn sign_cookie(&self, cookie_name: &str, id: &str) -> String {
        let tag = self.cookie_tag(cookie_name, id);
        format!("{}.{}", id, URL_SAFE_NO_PAD.encode(tag))
    }

    /// Recover the session ID from a cookie value.
    ///
    /// Returns `None` for anything that was not produced by
    /// [`sign_cookie`](Self::sign_cookie) with the same key and cookie name.
    pub fn verify_cookie(&self, cookie_name: &str, value: &str) -> Option<String> {
        let (id, signature) = value.rsplit_once('.')?;
        if !is_well_formed_id(id) {
            return None;
        }
        let provided = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let expected = self.cookie_tag(cookie_name, id);

        if bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            Some(id.to_string())
        } else {
            None
        }
    }

    fn payload_mac(&self, id: &str, body: &[u8]) -> HmacSha256 {
        let mut mac = new_mac(&self.payload_key);
        mac.update(&[PAYLOAD_VERSION]);
        mac.update(id.as_bytes());
        mac.update(&[0]);
        mac.update(body);
        mac
    }

    fn cookie_tag(&self, cookie_name: &str, id: &str) -> [u8; TAG_LEN] {
        let mut mac = new_mac(&self.cookie_key);
        mac.update(cookie_name.as_bytes());
        mac.update(&[0]);
        mac.update(id.as_bytes());
        finalize_tag(mac)
    }
}

fn new_mac(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC can take key of any size")
}

fn derive_key(secret: &[u8], label: &[u8]) -> [u8; TAG_LEN] {
    let mut mac = new_mac(secret);
    mac.update(label);
    finalize_tag(mac)
}

fn finalize_tag(mac: HmacSha256) -> [u8; TAG_LEN] {
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    tag
}
