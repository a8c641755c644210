//! Domain model: aggregates, value objects, events and the pure helpers
//! every catalog surface shares.
pub mod aggregates;
pub mod decode;
pub mod events;
pub mod pricing;
pub mod slug;
pub mod value_objects;
