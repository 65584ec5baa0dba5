//! Event producers: one blocking OS thread per hardware source.
//!
//! Each producer owns its device exclusively, runs for the process
//! lifetime, and only ever pushes `RawEvent`s into the shared queue.
//! A producer that hits a fatal device error logs and stops; it is not
//! restarted, and the rest of the daemon keeps running.

pub mod keyboard;
pub mod mode_poll;
pub mod power;
pub mod vendor;
