//! Push delivery for Rally.
//!
//! - `transport`: one message to one device token (FCM HTTP v1)
//! - `targets`: the registry of device tokens per user
//! - `dispatcher`: fan-out to every token of a user, with cleanup of
//!   tokens the provider reports as unregistered

pub mod dispatcher;
pub mod targets;
pub mod transport;

pub use dispatcher::{PushNotifier, UserNotifier};
pub use targets::{MemoryTargetStore, PgTargetStore, Registration, TargetStore};
pub use transport::{FcmTransport, PushError, PushTransport};
