//! Client configuration and timeout grammar.

use std::time::Duration;

use crate::error::{Error, Result};

/// Immutable construction input for [`crate::Client`].
///
/// Empty strings mean "unset": an empty `user_agent` leaves caller headers
/// alone, and basic-auth credentials are only applied when `username` AND
/// `password` are both non-empty. `timeout` is required and must parse under
/// the duration grammar (see [`parse_duration`]); there is no implicit
/// default.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// User-Agent header stamped onto every request (empty = unset).
    pub user_agent: String,
    /// Disable server certificate verification. The client will accept any
    /// certificate, including expired, self-signed, and hostname-mismatched
    /// ones. This removes a core TLS security guarantee.
    pub insecure_skip_verify: bool,
    /// Total request timeout, e.g. `"30s"`, `"2m"`. `"0"` disables the bound.
    pub timeout: String,
    /// Wrap the transport in the NTLM negotiator.
    pub use_ntlm: bool,
    /// Basic-auth user (optional, only effective together with `password`).
    pub username: String,
    /// Basic-auth password (optional, only effective together with `username`).
    pub password: String,
}

/// Parse a duration string such as `"30s"`, `"2m"`, `"1h30m"`, or `"1.5s"`.
///
/// The grammar is an optional sign followed by one or more decimal numbers,
/// each with a unit suffix: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`.
/// `"0"` is accepted without a unit. A bare number, an empty string, an
/// unknown unit, or a negative total is an [`Error::InvalidTimeout`].
pub fn parse_duration(s: &str) -> Result<Duration> {
    let mut rest = s;
    let mut negative = false;
    if let Some(r) = rest.strip_prefix('-') {
        negative = true;
        rest = r;
    } else if let Some(r) = rest.strip_prefix('+') {
        rest = r;
    }

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(Error::invalid_timeout(s, "empty duration string"));
    }

    let mut total_nanos = 0.0f64;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        if number.is_empty() || number == "." {
            return Err(Error::invalid_timeout(s, "expected a number"));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| Error::invalid_timeout(s, format!("bad number {number:?}")))?;

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "\u{b5}s" | "\u{3bc}s" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            "" => return Err(Error::invalid_timeout(s, "missing unit")),
            other => {
                return Err(Error::invalid_timeout(s, format!("unknown unit {other:?}")))
            }
        };
        total_nanos += value * scale;
        rest = next;
    }

    if negative {
        return Err(Error::invalid_timeout(
            s,
            "negative durations are not usable as a timeout",
        ));
    }
    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(Error::invalid_timeout(s, "duration overflows"));
    }
    Ok(Duration::from_nanos(total_nanos as u64))
}
