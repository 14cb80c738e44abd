//! Protocol Module
//!
//! Wire format of the TCP change feed.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Kind (1) │ Len (4)  │     Payload (JSON event)    │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//! Length is big-endian. The payload is the JSON form of a
//! [`ChangeEvent`](crate::notify::ChangeEvent); the kind byte must agree
//! with the event it carries.
//!
//! ### Kinds
//! - 0x01: WRITTEN
//! - 0x02: REMOVED
//! - 0x03: IMPORTED
//! - 0x04: CLEARED

mod codec;
mod frame;

pub use codec::{decode_event, encode_event, read_event, write_event, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use frame::FrameKind;
