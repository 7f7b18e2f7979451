//! Test doubles shared by unit tests and, behind the `test-util` feature,
//! by downstream crates exercising code that owns a sender.

mod in_memory_broker;
mod recording_writer;

pub use in_memory_broker::{InMemoryBroker, PublishedMessage};
pub use recording_writer::RecordingWriter;
