//! Terminal UI for interactive chat sessions.
//!
//! - [`chat_loop`]: terminal setup, key handling, and the frame loop that
//!   applies stream events from [`crate::core::chat_stream`].
//! - [`renderer`] and [`markdown`]: transcript and input composition.
//! - [`theme`]: style policy.

pub mod chat_loop;
pub mod markdown;
pub mod renderer;
pub mod theme;
