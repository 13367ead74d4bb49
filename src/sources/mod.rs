//! External collaborators of the resolution core.
//!
//! Price feeds, reasoning models and decision sinks sit behind traits so
//! the dispatcher can be wired with live clients or test fakes.

pub mod price;
pub mod reasoning;
pub mod sink;

#[cfg(test)]
pub mod testing;

pub use price::{EvmRpcPriceSource, FeedTable, PriceSource};
pub use reasoning::{GenerationRequest, OllamaReasoner, OllamaSettings, ReasoningModel};
pub use sink::{DecisionSink, LedgerFileSink, StdoutSink};
