//! Cookie-backed client sessions.
//!
//! The cookie value is `<hmac>.<client id>.<assigned-at unix seconds>.<escaped url>`,
//! where the HMAC-SHA256 (hex) covers everything after the first dot.

use std::fmt;

use chrono::{DateTime, Utc};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use sha2::Sha256;
use tether_core::{BackendId, BackendRegistry, ClientAssignment, ClientSession};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Bytes a cookie value may not carry, plus '%' itself.
const COOKIE_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b',')
    .add(b';')
    .add(b'\\')
    .add(b'%');

/// Reads and writes the signed session cookie.
#[derive(Clone)]
pub struct SessionCodec {
    cookie_name: String,
    mac: HmacSha256,
}

impl fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCodec")
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    /// Codec for a cookie called `cookie_name`, signed with `secret`.
    pub fn new(cookie_name: impl Into<String>, secret: &[u8]) -> Result<Self, InvalidLength> {
        Ok(Self {
            cookie_name: cookie_name.into(),
            mac: HmacSha256::new_from_slice(secret)?,
        })
    }

    /// Recover the caller's session from a `Cookie` header.
    ///
    /// A missing, malformed or badly signed cookie yields a fresh client; a
    /// cookie naming a backend outside `registry` keeps the client id but
    /// drops the binding.
    pub fn session(&self, cookie_header: Option<&str>, registry: &BackendRegistry) -> ClientSession {
        let Some((client_id, assignment)) = cookie_header
            .and_then(|header| find_cookie(header, &self.cookie_name))
            .and_then(|value| self.verified_payload(value))
            .and_then(decode)
        else {
            return ClientSession::fresh(new_client_id());
        };

        match assignment {
            Some(assignment) if registry.get(&assignment.backend_id).is_some() => {
                ClientSession::with_assignment(assignment)
            }
            _ => ClientSession::fresh(client_id),
        }
    }

    /// `Set-Cookie` value persisting `assignment`.
    pub fn set_cookie(&self, assignment: &ClientAssignment) -> String {
        let payload = format!(
            "{}.{}.{}",
            assignment.client_id,
            assignment.assigned_at.timestamp(),
            utf8_percent_encode(assignment.backend_id.as_str(), COOKIE_UNSAFE)
        );
        format!(
            "{}={}.{}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_name,
            self.sign(&payload),
            payload
        )
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verified_payload<'a>(&self, value: &'a str) -> Option<&'a str> {
        let (signature, payload) = value.split_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(payload)
    }
}

/// Random v4 UUID in simple (undashed) form.
pub fn new_client_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

// Returns the client id and, when the rest parses, its assignment.
fn decode(payload: &str) -> Option<(String, Option<ClientAssignment>)> {
    let mut parts = payload.splitn(3, '.');
    let client_id = parts
        .next()
        .filter(|id| Uuid::try_parse(id).is_ok())?
        .to_string();

    let assignment = parts
        .next()
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .zip(
            parts
                .next()
                .and_then(|url| percent_decode_str(url).decode_utf8().ok()),
        )
        .map(|(assigned_at, url)| {
            ClientAssignment::new(client_id.clone(), BackendId::new(url), assigned_at)
        });

    Some((client_id, assignment))
}
