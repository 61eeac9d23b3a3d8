//! # Events Module
//!
//! Progress reporting from the engine to any front end. The engine
//! pushes typed events through a channel; consumers (CLI progress bars,
//! a GUI, tests) subscribe with a receiver. Reporting is optional: with
//! no receiver attached, sends are silently dropped.

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::{
    DuplicateEvent, EngineEvent, Event, ProcessEvent, ProcessProgress, ScanEvent,
};
