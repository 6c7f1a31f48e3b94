//! Wire codec for the property bus.
//!
//! Bidirectional translation between the property model and the textual
//! JSON protocol:
//!
//! - **Encoding** ([`encode`]): define/set/delete/message notifications,
//!   one JSON object per message, built through a pooled string escaper
//!   and a single process-wide output buffer.
//! - **Decoding** ([`token`], [`decode`]): a character-driven finite-state
//!   tokenizer feeding an explicit stack of parse contexts; requests are
//!   dispatched only when their top-level object closes. Grammar errors
//!   are absorbing - the connection is abandoned, never resynchronized.
//! - **WebSocket framing** ([`ws`]): the optional frame sublayer used when
//!   clients connect over an HTTP upgrade.
//!
//! Config persistence reuses this codec unchanged: profile files hold the
//! same `newXVector` grammar the network carries.

pub mod decode;
pub mod encode;
pub mod error;
pub mod escape;
pub mod message;
pub mod token;
pub mod ws;

pub use decode::RequestDecoder;
pub use encode::Encoder;
pub use error::{Result, WireError};
pub use escape::Escaper;
pub use message::Request;
pub use token::{Token, Tokenizer, TokenizerState};
