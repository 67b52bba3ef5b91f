//! Core types for named-data networking: hierarchical names, interest and data
//! packets, and publisher identities.

/// Hierarchical names and their components.
pub mod name;
/// Interest and data packets.
pub mod packet;
/// Publisher identities within an announcement space.
pub mod publisher;

pub use name::{Component, Name, NameError};
pub use packet::{Data, Interest, Signature};
pub use publisher::PublisherId;
