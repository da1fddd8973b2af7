//! Clipchat core library — bridge, medium, protocol, and server
//! used by the CLI.
//!
//! The gateway exposes an OpenAI-compatible chat-completions endpoint whose
//! "inference" is a human operator relaying text through the system clipboard.

pub mod bridge;
pub mod config;
pub mod medium;
pub mod protocol;
pub mod server;
