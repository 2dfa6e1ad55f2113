//! Protocol Module
//!
//! The memcached text protocol, client side.
//!
//! ## Framing
//! Every request and every reply line ends in CRLF and tokens are separated by
//! single spaces. Only storage requests and `VALUE` replies carry a binary data
//! block, whose length is announced on the preceding line.
//!
//! ### Replies per command family
//! - storage (`set`/`add`/`replace`/`append`/`prepend`/`cas`):
//!   `STORED` | `NOT_STORED` | `EXISTS` | `NOT_FOUND`
//! - retrieval (`gets`): `VALUE` blocks, then `END`
//! - `delete`: `DELETED` | `NOT_FOUND`
//! - `incr`/`decr`: `<value>` | `NOT_FOUND`
//! - `touch`: `TOUCHED` | `NOT_FOUND`
//! - `stats`: `STAT <name> <value>` lines, then `END`
//! - any command: `ERROR` | `CLIENT_ERROR <msg>` | `SERVER_ERROR <msg>`
//!
//! The text protocol has no way to resynchronise after a framing error, so a
//! reply that does not fit this grammar poisons the connection it arrived on.

mod codec;
mod command;
mod response;

pub use codec::{
    encode_command, parse_u64, parse_value_header, read_arith_reply, read_delete_reply,
    read_line, read_ok_reply, read_stats, read_storage_reply, read_touch_reply, read_values,
    read_version, write_command, Stats, CRLF, MAX_VALUE_SIZE,
};
pub use command::{Command, StorageVerb};
pub use response::{error_from_line, Status, ValueHeader};
