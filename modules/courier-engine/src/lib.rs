//! The courier core: two state machines and the seams they depend on.
//!
//! `RegistrationFlow` walks a participant from first contact to a committed
//! record (phone → language → country), with durable session state.
//! `Broadcaster` walks an operator from audience selection through a
//! confirmation gate to sequential delivery with per-recipient failure
//! isolation. Both speak typed `Reply` values; rendering, command parsing,
//! and the channel transport live outside this crate.

pub mod audience;
pub mod broadcast;
pub mod registration;
pub mod reply;
pub mod report;
pub mod repos;
pub mod testing;
pub mod traits;

pub use broadcast::Broadcaster;
pub use registration::RegistrationFlow;
pub use reply::Reply;
pub use report::{DeliveryProgress, DeliveryReport};
pub use repos::MemoryStore;
pub use traits::{
    BroadcastMonitor, MessageSender, OperatorNotifier, ParticipantRepo, SendFailure, SessionRepo,
};
