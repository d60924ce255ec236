//! Console output capture
//!
//! The host publishes child-process output on a [`ConsoleBus`]. While a
//! build is in flight its [`ConsoleCapture`] holds a subscription and
//! appends every chunk to the buffer for its channel, in delivery order.

pub mod bus;
pub mod capture;

pub use bus::{
    Channel, ConsoleBus, ConsoleBusError, ConsoleBusResult, ConsoleChunk, SharedConsoleBus,
};
pub use capture::{normalize_newline, ConsoleCapture};
