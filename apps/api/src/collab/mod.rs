//! Real-time collaboration: a thin relay between sockets editing the same resume.
//!
//! Events are forwarded to the other members of a room as they arrive. There is
//! no ordering beyond the transport, no deduplication and no merge; the last
//! REST save wins.

pub mod events;
pub mod hub;
pub mod socket;
