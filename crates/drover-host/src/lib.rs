//! Drover host contracts
//!
//! The traits the execution engine consumes without knowing their
//! implementations: the script host (an embedded evaluator for
//! script-valued commands, hooks, and predicates) and the agent transport
//! (RPC dispatch of shell commands to named remote workers), plus the
//! in-process agent registry the transport resolves names against.

mod agent;
mod context;
mod error;
mod script;

pub use agent::{AgentInfo, AgentRegistry, AgentTransport, RemoteExit};
pub use context::CallContext;
pub use error::HostError;
pub use script::{CallOutcome, NullScriptHost, ScriptHost};
