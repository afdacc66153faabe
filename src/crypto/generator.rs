//! Random secret generation for new entries.
//!
//! Characters are drawn from the OS RNG with `gen_range`, so every symbol
//! of the alphabet is equally likely.  Each required character class gets
//! one guaranteed character, and the result is shuffled so those do not
//! sit at fixed positions.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use zeroize::Zeroizing;

use crate::errors::{Result, VaultError};

/// Shortest secret `generate_secret` will produce.
pub const MIN_SECRET_LEN: usize = 8;

/// Longest secret `generate_secret` will produce.
pub const MAX_SECRET_LEN: usize = 1024;

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!#$%&*+-./:;=?@^_~";
const HEX: &[u8] = b"0123456789abcdef";

/// Alphabet a secret is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// Letters and digits.
    #[default]
    Alphanumeric,
    /// Letters, digits and punctuation.
    Symbols,
    /// Lowercase hexadecimal.  Class requirements do not apply.
    Hex,
}

/// Shape of a generated secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretPolicy {
    pub length: usize,
    pub charset: Charset,
    pub require_uppercase: bool,
    pub require_digit: bool,
    pub require_symbol: bool,
}

impl Default for SecretPolicy {
    fn default() -> Self {
        Self {
            length: 24,
            charset: Charset::Symbols,
            require_uppercase: true,
            require_digit: true,
            require_symbol: true,
        }
    }
}

impl SecretPolicy {
    fn alphabet(&self) -> Vec<u8> {
        match self.charset {
            Charset::Alphanumeric => [LOWER, UPPER, DIGITS].concat(),
            Charset::Symbols => [LOWER, UPPER, DIGITS, SYMBOLS].concat(),
            Charset::Hex => HEX.to_vec(),
        }
    }

    fn required_classes(&self) -> Vec<&'static [u8]> {
        if self.charset == Charset::Hex {
            return Vec::new();
        }
        let mut classes = Vec::new();
        if self.require_uppercase {
            classes.push(UPPER);
        }
        if self.require_digit {
            classes.push(DIGITS);
        }
        if self.require_symbol && self.charset == Charset::Symbols {
            classes.push(SYMBOLS);
        }
        classes
    }
}

/// Draw a fresh secret that satisfies `policy`.
pub fn generate_secret(policy: &SecretPolicy) -> Result<Zeroizing<String>> {
    if !(MIN_SECRET_LEN..=MAX_SECRET_LEN).contains(&policy.length) {
        return Err(VaultError::InvalidEntry(format!(
            "generated secrets must be {MIN_SECRET_LEN} to {MAX_SECRET_LEN} characters (got {})",
            policy.length
        )));
    }
    if policy.require_symbol && policy.charset != Charset::Symbols {
        return Err(VaultError::InvalidEntry(
            "symbols were required but the character set has none".into(),
        ));
    }

    let alphabet = policy.alphabet();
    let mut rng = OsRng;
    let mut chars = Zeroizing::new(Vec::with_capacity(policy.length));

    for class in policy.required_classes() {
        chars.push(class[rng.gen_range(0..class.len())]);
    }
    while chars.len() < policy.length {
        chars.push(alphabet[rng.gen_range(0..alphabet.len())]);
    }
    chars.shuffle(&mut rng);

    let secret: String = chars.iter().map(|&b| char::from(b)).collect();
    Ok(Zeroizing::new(secret))
}
