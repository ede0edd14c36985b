//! Side channels out of the processing loop.
//!
//! - [`RerollHost`] - status updates and the stop signal to the owning application
//! - [`SlotNotifier`] - best-effort rank forwarding to the slot display process
//! - [`DecisionLog`] - record of confirmed stops
//!
//! None of these may stall or end the loop; failures are logged and dropped.

mod event_log;
mod host;
mod slots;

pub use event_log::{DecisionEvent, DecisionLog, JsonlDecisionLog, CONFIRMED_AFTER_DELAY};
pub use host::{ChannelHost, RerollHost, UiUpdate};
pub use slots::{
    decode_ranks, encode_ranks, SlotListener, SlotNotifier, DEFAULT_SLOTS_PORT, DEFAULT_TOP_K,
};
