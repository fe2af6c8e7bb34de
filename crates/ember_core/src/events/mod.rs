//! # Event Bus
//!
//! A growable [`RingBuffer`] and the broadcast [`EventChannel`] built on it.
//!
//! Producers push into a channel; every [`Reader`] sees each event pushed
//! after its creation exactly once. Channels are usually stored as World
//! resources so that decoupled systems can talk without knowing each other.

mod channel;
pub mod ring_buffer;

pub use channel::{EventChannel, EventIter, Reader};
pub use ring_buffer::RingBuffer;
