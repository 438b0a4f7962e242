//! NTLM message construction and parsing (MS-NLMP).
//!
//! Covers the three-message handshake the negotiating transport drives:
//! NEGOTIATE (type 1) out, CHALLENGE (type 2) in, AUTHENTICATE (type 3)
//! out with an NTLMv2 response. Session security (signing/sealing) is not
//! implemented; the handshake here only authenticates the connection.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;

use crate::error::{Error, Result};

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const NEGOTIATE_OEM: u32 = 0x0000_0002;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
const NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;

const NEGOTIATE_FLAGS: u32 =
    NEGOTIATE_UNICODE | NEGOTIATE_OEM | REQUEST_TARGET | NEGOTIATE_NTLM | NEGOTIATE_ALWAYS_SIGN;

/// Seconds between the Windows epoch (1601-01-01) and the Unix epoch.
const FILETIME_UNIX_OFFSET: u64 = 11_644_473_600;

/// Parsed CHALLENGE (type 2) message.
#[derive(Debug)]
pub struct Challenge {
    /// The 8-byte server challenge the NTLMv2 proof is computed over.
    pub server_challenge: [u8; 8],
    /// Negotiate flags echoed by the server.
    pub flags: u32,
    /// Target info block, echoed verbatim into the AUTHENTICATE blob.
    pub target_info: Vec<u8>,
}

/// Build a NEGOTIATE (type 1) message with empty domain and workstation.
pub fn negotiate_message() -> Vec<u8> {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(SIGNATURE);
    msg.extend_from_slice(&1u32.to_le_bytes());
    msg.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
    // Empty domain and workstation security buffers, offset past the header.
    for _ in 0..2 {
        msg.extend_from_slice(&0u16.to_le_bytes());
        msg.extend_from_slice(&0u16.to_le_bytes());
        msg.extend_from_slice(&32u32.to_le_bytes());
    }
    msg
}

/// Parse a CHALLENGE (type 2) message.
pub fn parse_challenge(data: &[u8]) -> Result<Challenge> {
    if data.len() < 32 {
        return Err(Error::ntlm("challenge message too short"));
    }
    if &data[..8] != SIGNATURE {
        return Err(Error::ntlm("missing NTLMSSP signature"));
    }
    if read_u32(data, 8)? != 2 {
        return Err(Error::ntlm("not a challenge (type 2) message"));
    }

    let flags = read_u32(data, 20)?;
    let mut server_challenge = [0u8; 8];
    server_challenge.copy_from_slice(&data[24..32]);

    let target_info = if flags & NEGOTIATE_TARGET_INFO != 0 && data.len() >= 48 {
        read_security_buffer(data, 40)?
    } else {
        Vec::new()
    };

    Ok(Challenge {
        server_challenge,
        flags,
        target_info,
    })
}

/// Build an AUTHENTICATE (type 3) message carrying an NTLMv2 response.
///
/// `username` may be of the form `DOMAIN\user`; the domain part is then
/// carried in the message's domain field. UPN form (`user@domain`) is sent
/// as-is in the user field.
pub fn authenticate_message(challenge: &Challenge, username: &str, password: &str) -> Vec<u8> {
    let (domain, user) = split_domain(username);
    let client_nonce: [u8; 8] = rand::random();
    let timestamp = target_info_timestamp(&challenge.target_info).unwrap_or_else(filetime_now);
    authenticate_message_at(challenge, &domain, &user, password, client_nonce, timestamp)
}

/// Deterministic AUTHENTICATE construction, separated out for testing.
fn authenticate_message_at(
    challenge: &Challenge,
    domain: &str,
    user: &str,
    password: &str,
    client_nonce: [u8; 8],
    timestamp: u64,
) -> Vec<u8> {
    let key = ntowf_v2(user, password, domain);

    // temp blob: versions, timestamp, client nonce, server target info.
    let mut temp = Vec::with_capacity(32 + challenge.target_info.len());
    temp.push(1); // responder version
    temp.push(1); // hi responder version
    temp.extend_from_slice(&[0u8; 6]);
    temp.extend_from_slice(&timestamp.to_le_bytes());
    temp.extend_from_slice(&client_nonce);
    temp.extend_from_slice(&[0u8; 4]);
    temp.extend_from_slice(&challenge.target_info);
    temp.extend_from_slice(&[0u8; 4]);

    let mut proof_input = Vec::with_capacity(8 + temp.len());
    proof_input.extend_from_slice(&challenge.server_challenge);
    proof_input.extend_from_slice(&temp);
    let nt_proof = hmac_md5(&key, &proof_input);

    let mut nt_response = Vec::with_capacity(16 + temp.len());
    nt_response.extend_from_slice(&nt_proof);
    nt_response.extend_from_slice(&temp);

    let domain_bytes = utf16le(domain);
    let user_bytes = utf16le(user);

    // Header: signature, type, then six security buffers (lm, nt, domain,
    // user, workstation, session key) followed by the flags.
    const HEADER_LEN: usize = 64;
    let mut header = Vec::with_capacity(HEADER_LEN);
    let mut payload = Vec::new();
    header.extend_from_slice(SIGNATURE);
    header.extend_from_slice(&3u32.to_le_bytes());
    push_security_buffer(&mut header, &mut payload, HEADER_LEN, &[]); // LM response
    push_security_buffer(&mut header, &mut payload, HEADER_LEN, &nt_response);
    push_security_buffer(&mut header, &mut payload, HEADER_LEN, &domain_bytes);
    push_security_buffer(&mut header, &mut payload, HEADER_LEN, &user_bytes);
    push_security_buffer(&mut header, &mut payload, HEADER_LEN, &[]); // workstation
    push_security_buffer(&mut header, &mut payload, HEADER_LEN, &[]); // session key
    header.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
    debug_assert_eq!(header.len(), HEADER_LEN);

    header.extend_from_slice(&payload);
    header
}

/// NTOWFv2 key derivation (MS-NLMP 3.3.2).
fn ntowf_v2(user: &str, password: &str, domain: &str) -> [u8; 16] {
    let nt_hash = Md4::digest(utf16le(password));
    let identity = utf16le(&format!("{}{}", user.to_uppercase(), domain));
    hmac_md5(nt_hash.as_slice(), &identity)
}

fn hmac_md5(key: &[u8], data: &[u8]) -> [u8; 16] {
    let mut mac = Hmac::<Md5>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

/// Split `DOMAIN\user` into its parts; anything else has no domain.
fn split_domain(username: &str) -> (String, String) {
    match username.split_once('\\') {
        Some((domain, user)) => (domain.to_string(), user.to_string()),
        None => (String::new(), username.to_string()),
    }
}

/// Current time as a Windows FILETIME (100ns ticks since 1601-01-01).
fn filetime_now() -> u64 {
    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (unix.as_secs() + FILETIME_UNIX_OFFSET) * 10_000_000
}

/// Extract the server timestamp AV pair (id 0x0007) from a target info block.
fn target_info_timestamp(target_info: &[u8]) -> Option<u64> {
    let mut at = 0;
    while at + 4 <= target_info.len() {
        let id = u16::from_le_bytes([target_info[at], target_info[at + 1]]);
        let len = u16::from_le_bytes([target_info[at + 2], target_info[at + 3]]) as usize;
        at += 4;
        if at + len > target_info.len() {
            return None;
        }
        if id == 0 {
            return None; // MsvAvEOL
        }
        if id == 0x0007 && len == 8 {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&target_info[at..at + 8]);
            return Some(u64::from_le_bytes(raw));
        }
        at += len;
    }
    None
}

fn push_security_buffer(header: &mut Vec<u8>, payload: &mut Vec<u8>, base: usize, data: &[u8]) {
    let len = data.len() as u16;
    let offset = (base + payload.len()) as u32;
    header.extend_from_slice(&len.to_le_bytes());
    header.extend_from_slice(&len.to_le_bytes());
    header.extend_from_slice(&offset.to_le_bytes());
    payload.extend_from_slice(data);
}

fn read_u32(data: &[u8], at: usize) -> Result<u32> {
    let bytes = data
        .get(at..at + 4)
        .ok_or_else(|| Error::ntlm("message truncated"))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_security_buffer(data: &[u8], at: usize) -> Result<Vec<u8>> {
    let header = data
        .get(at..at + 8)
        .ok_or_else(|| Error::ntlm("message truncated"))?;
    let len = u16::from_le_bytes([header[0], header[1]]) as usize;
    let offset = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if len == 0 {
        return Ok(Vec::new());
    }
    data.get(offset..offset + len)
        .map(|b| b.to_vec())
        .ok_or_else(|| Error::ntlm("security buffer out of bounds"))
}
