//! The agent loop — the heart of CountBot.
//!
//! Each user message runs a **Stream → Dispatch → Observe** cycle:
//!
//! 1. **Build context** (system prompt + history + the user turn)
//! 2. **Stream** the model's answer, forwarding visible text as it arrives
//! 3. **If tool calls**: run each through the registry with retries, append results, loop back to step 2
//! 4. **If text only**: finish, persist the exchange and record provenance
//!
//! The loop stops early when the iteration or tool-call budget runs out,
//! the provider stream fails, or the caller cancels.

pub mod context;
pub mod loop_runner;
pub mod turn;

#[cfg(test)]
mod test_helpers;

pub use context::{ContextBuilder, ContextInput, DefaultContextBuilder};
pub use loop_runner::{AgentLoop, DIRECT_SESSION, MessageRequest};
pub use turn::{TurnAccumulator, parse_arguments};
