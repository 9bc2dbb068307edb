//! Pure audio transforms used to bridge carrier telephony audio and the
//! voice-AI session: G.711 µ-law expansion, endianness conversion, linear
//! resampling, and fixed-size chunking.
//!
//! Everything here is synchronous and allocation-only — no I/O, no blocking
//! syscalls — so it can run inline in the hot audio-pump path.

pub mod codec;

pub use codec::{chunk, resample, swap_endianness16, ulaw_to_pcm16le};
