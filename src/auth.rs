//! RFC 7617 HTTP Basic Authentication credentials.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use http::HeaderValue;

/// Build a Basic `Authorization` header value (RFC 7617).
///
/// The returned value is marked sensitive so it is excluded from header
/// debug output.
pub fn basic_credentials(username: &str, password: &str) -> HeaderValue {
    let encoded = BASE64.encode(format!("{username}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
        .expect("base64 output is a valid header value");
    value.set_sensitive(true);
    value
}

/// Recover the (username, password) pair from a Basic `Authorization` value.
///
/// Returns `None` for non-Basic schemes or malformed encodings. The NTLM
/// negotiator uses this to pick the credential pair off a decorated request.
pub fn parse_basic_credentials(value: &HeaderValue) -> Option<(String, String)> {
    let encoded = value.to_str().ok()?.strip_prefix("Basic ")?.trim();
    let decoded = String::from_utf8(BASE64.decode(encoded).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}
