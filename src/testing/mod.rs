//! Testability helpers shared by unit and integration tests.
//!
//! Synthetic, seeded signals (sines, noise, click tracks) plus WAV writers,
//! so tests never depend on audio assets on disk, and multipart bodies for
//! driving the HTTP router.

pub mod http;
pub mod signals;
