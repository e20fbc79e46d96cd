//! Event types published to a presentation layer.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a renderer
//! in another process (or language) can consume them as JSON.

pub mod events;
