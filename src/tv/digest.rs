//! HTTP digest authentication (RFC 2617, MD5) for the JointSpace API.
//!
//! Paired TVs answer every unauthenticated request with `401` and a
//! `WWW-Authenticate: Digest ...` challenge. The challenge is cached by
//! the client and reused with an increasing nonce count until the TV
//! issues a new one.

use rand::Rng;

use crate::error::{AmbiError, Result};

/// A parsed `WWW-Authenticate: Digest` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    /// True when the server offered `qop=auth`.
    pub qop_auth: bool,
}

impl DigestChallenge {
    /// Parse the value of a `WWW-Authenticate` header.
    ///
    /// # Errors
    /// Returns [`AmbiError::Auth`] if the scheme is not `Digest` or the
    /// mandatory `realm`/`nonce` parameters are missing.
    pub fn parse(header: &str) -> Result<Self> {
        let header = header.trim();
        let rest = header
            .strip_prefix("Digest")
            .or_else(|| header.strip_prefix("digest"))
            .ok_or_else(|| AmbiError::Auth(format!("unsupported scheme in '{header}'")))?;

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut qop_auth = false;

        for (key, value) in split_params(rest) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "qop" => qop_auth = value.split(',').any(|q| q.trim() == "auth"),
                _ => {}
            }
        }

        Ok(Self {
            realm: realm.ok_or_else(|| AmbiError::Auth("challenge without realm".into()))?,
            nonce: nonce.ok_or_else(|| AmbiError::Auth("challenge without nonce".into()))?,
            opaque,
            qop_auth,
        })
    }

    /// Build the `Authorization` header value for one request.
    pub fn authorization(
        &self,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        nc: u32,
        cnonce: &str,
    ) -> String {
        let ha1 = md5_hex(&format!("{username}:{}:{password}", self.realm));
        let ha2 = md5_hex(&format!("{method}:{uri}"));
        let nc = format!("{nc:08x}");

        let mut header = if self.qop_auth {
            let response = md5_hex(&format!("{ha1}:{}:{nc}:{cnonce}:auth:{ha2}", self.nonce));
            format!(
                "Digest username=\"{username}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", \
                 response=\"{response}\", algorithm=MD5, qop=auth, nc={nc}, cnonce=\"{cnonce}\"",
                self.realm, self.nonce
            )
        } else {
            let response = md5_hex(&format!("{ha1}:{}:{ha2}", self.nonce));
            format!(
                "Digest username=\"{username}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", \
                 response=\"{response}\", algorithm=MD5",
                self.realm, self.nonce
            )
        };

        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(", opaque=\"{opaque}\""));
        }
        header
    }
}

/// Fresh client nonce: 16 random hex digits.
pub fn new_cnonce() -> String {
    format!("{:016x}", rand::thread_rng().gen::<u64>())
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Split `k1="v, 1", k2=v2` into pairs, honouring quoted commas.
fn split_params(s: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            key.push(c);
            chars.next();
        }
        if chars.next().is_none() {
            break;
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }
        out.push((key.trim().to_string(), value.trim().to_string()));
    }
    out
}
