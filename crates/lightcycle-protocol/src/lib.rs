//! Wire protocol for lightcycle.
//!
//! - **Codec** ([`encode`], [`decode`], [`Field`], [`RawPacket`]): the
//!   line-delimited, `|`-separated format.
//! - **Packets** ([`ClientPacket`], [`ServerPacket`]): the typed schema
//!   for each tag.
//! - **Types** ([`PlayerId`], [`ArenaId`], [`Direction`], [`ErrorCode`]).
//! - **Text rules** ([`is_valid_text`], [`escape_text`]) shared by the
//!   codec and by username/chat validation.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientPacket) → Session / Matchmaker
//! ```

mod codec;
mod error;
mod packet;
mod text;
mod types;

pub use codec::{
    decode, decode_line, encode, encode_into, Field, Number, RawPacket, FIELD_SEPARATOR,
    PACKET_TERMINATOR,
};
pub use error::ProtocolError;
pub use packet::{ClientPacket, ServerPacket};
pub use text::{escape_text, is_printable, is_valid_text};
pub use types::{ArenaId, Direction, ErrorCode, PlayerId};
