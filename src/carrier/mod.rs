//! Everything that talks to the telephony carrier: the media-stream frame
//! codec (§4.2) and the call-control REST client (§4.3).

pub mod client;
pub mod framer;

pub use client::CarrierClient;
pub use framer::{CarrierFrame, StreamFormat};
