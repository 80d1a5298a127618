// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code.
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-protocol: the line-oriented text codec shared by `fleetd` and `fleetctl`.

pub mod alias;
pub mod decode;
pub mod encode;
pub mod error;
pub mod lexer;

pub use decode::decode;
pub use encode::{encode_action, encode_event, encode_result};
pub use error::DecodeError;
pub use lexer::{lex, LexError, Word};
