//! Ports - 抽象化レイヤー
//!
//! Seams between the worker and its environment: wall-clock time and the
//! response channel towards the coordinator.

pub mod clock;
pub mod response_port;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::response_port::ResponsePort;
