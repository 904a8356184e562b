//! Join credential validation.
//!
//! The checks run in a fixed order and stop at the first failure, so a
//! client always learns about the earliest problem with its `join`:
//!
//! 1. username is text, 1–32 chars, printable ASCII without `|`
//! 2. password is text, 1–128 chars, printable ASCII without `|`
//! 3. the reserved username `bot` only from loopback
//!
//! Whether the password matches a known user is decided by the caller,
//! which owns the session registry.

use lightcycle_protocol::{is_valid_text, ErrorCode, Field};

/// Longest accepted username, in characters.
pub const MAX_USERNAME_LEN: usize = 32;

/// Longest accepted password, in characters.
pub const MAX_PASSWORD_LEN: usize = 128;

/// Username only local clients may use.
pub const RESERVED_USERNAME: &str = "bot";

/// A syntactically valid username/password pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Validates the raw `join` fields.
    ///
    /// Numeric fields are rejected: a username like `42` arrives as a
    /// number, and the wire format gives no way to tell it apart from one.
    pub fn validate(
        username: Option<&Field>,
        password: Option<&Field>,
        is_loopback: bool,
    ) -> Result<Self, ErrorCode> {
        let username = username
            .and_then(Field::as_text)
            .ok_or(ErrorCode::InvalidUsername)?;
        match username.chars().count() {
            0 => return Err(ErrorCode::UsernameTooShort),
            n if n > MAX_USERNAME_LEN => return Err(ErrorCode::UsernameTooLong),
            _ => {}
        }
        if !is_valid_text(username, 1) {
            return Err(ErrorCode::UsernameInvalidSymbols);
        }

        let password = password
            .and_then(Field::as_text)
            .ok_or(ErrorCode::InvalidPassword)?;
        match password.chars().count() {
            0 => return Err(ErrorCode::PasswordTooShort),
            n if n > MAX_PASSWORD_LEN => return Err(ErrorCode::PasswordTooLong),
            _ => {}
        }
        if !is_valid_text(password, 1) {
            return Err(ErrorCode::InvalidPassword);
        }

        if username == RESERVED_USERNAME && !is_loopback {
            return Err(ErrorCode::ReservedUsername);
        }

        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}
