//! Link tokens.
//!
//! A token is a convenience handle, not a secret: anyone holding the link can
//! load the cart. Tokens are drawn from `[A-Za-z0-9]`, so they are safe to
//! embed in a URL path segment without escaping.

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

/// Default token length.
///
/// 62^8 is roughly 2.2e14 distinct tokens, so 10,000 live links collide with
/// probability around 2e-7.
pub const DEFAULT_TOKEN_LENGTH: usize = 8;

/// Shortest token the generator will produce.
pub const MIN_TOKEN_LENGTH: usize = 8;

/// Longest token accepted by [`Token::parse`].
const MAX_TOKEN_LENGTH: usize = 64;

/// Opaque handle identifying one stored cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token(String);

impl Token {
    /// Parse a token taken from a URL or query string.
    ///
    /// Returns `None` for empty, oversized or non-alphanumeric input.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty()
            || raw.len() > MAX_TOKEN_LENGTH
            || !raw.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Token {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid token: {value:?}"))
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

/// Produces fresh random tokens.
#[derive(Debug, Clone, Copy)]
pub struct TokenGenerator {
    length: usize,
}

impl TokenGenerator {
    /// Create a generator; lengths below [`MIN_TOKEN_LENGTH`] are raised to it.
    pub fn new(length: usize) -> Self {
        Self {
            length: length.clamp(MIN_TOKEN_LENGTH, MAX_TOKEN_LENGTH),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Mint a new token. Never fails.
    pub fn generate(&self) -> Token {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        Token(token)
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LENGTH)
    }
}
