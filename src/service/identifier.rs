//! Principal names and passwords for newly issued credentials.
//!
//! Both draw from `[a-z0-9_]` and begin with a lowercase letter, which every
//! supported engine accepts unquoted and which is safe to splice into SQL.

use crate::error::CredsError;
use rand::RngCore;
use rand::rngs::OsRng;
use uuid::Uuid;

pub const USERNAME_LENGTH: usize = 30;
pub const PASSWORD_LENGTH: usize = 30;
pub const DISPLAY_NAME_LIMIT: usize = 10;

const FIRST_LETTER_BYTES: &[u8] = b"abcdefghijklmnopqrstuvwxyz"; // 26 possibilities
const FIRST_LETTER_IDX_MASK: u8 = (1 << 5) - 1;
const LETTER_BYTES: &[u8] = b"abcdefghijklmnopqrstuvwxyz_1234567890"; // 37 possibilities
const LETTER_IDX_MASK: u8 = (1 << 6) - 1;

const RANDOM_CHUNK: usize = 64;

/// `<display>_<uuid>` where `display` is the sanitized, truncated caller
/// name, cut to at most `max_len` characters.
pub fn new_username(display_name_hint: &str, max_len: usize) -> String {
    let mut display: String = display_name_hint
        .chars()
        .take(DISPLAY_NAME_LIMIT)
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '_') => c,
            _ => '_',
        })
        .collect();
    if !display.starts_with(|c: char| c.is_ascii_lowercase()) {
        display.insert(0, 'v');
    }

    let mut username = format!("{display}_{}", Uuid::new_v4().simple());
    username.truncate(max_len);
    username
}

pub fn new_password() -> Result<String, CredsError> {
    new_password_from(&mut OsRng)
}

/// Rejection-sample random bytes onto the password alphabet. Bytes whose
/// masked index falls outside the alphabet are discarded rather than
/// reduced, so every character is uniformly distributed.
pub fn new_password_from<R: RngCore + ?Sized>(rng: &mut R) -> Result<String, CredsError> {
    let mut reader = ByteReader::new(rng);
    let mut result = String::with_capacity(PASSWORD_LENGTH);

    while result.is_empty() {
        let idx = usize::from(reader.next_byte()? & FIRST_LETTER_IDX_MASK);
        if let Some(&c) = FIRST_LETTER_BYTES.get(idx) {
            result.push(char::from(c));
        }
    }
    while result.len() < PASSWORD_LENGTH {
        let idx = usize::from(reader.next_byte()? & LETTER_IDX_MASK);
        if let Some(&c) = LETTER_BYTES.get(idx) {
            result.push(char::from(c));
        }
    }
    Ok(result)
}

struct ByteReader<'a, R: ?Sized> {
    rng: &'a mut R,
    buf: [u8; RANDOM_CHUNK],
    pos: usize,
}

impl<'a, R: RngCore + ?Sized> ByteReader<'a, R> {
    fn new(rng: &'a mut R) -> Self {
        Self {
            rng,
            buf: [0; RANDOM_CHUNK],
            pos: RANDOM_CHUNK,
        }
    }

    fn next_byte(&mut self) -> Result<u8, CredsError> {
        if self.pos == RANDOM_CHUNK {
            self.rng.try_fill_bytes(&mut self.buf)?;
            self.pos = 0;
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }
}
