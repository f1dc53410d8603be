use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::HostError;

/// Result of a remote command execution.
///
/// The engine treats `exit_code == 0` as success and wraps the triple as
/// the task's output value.
#[derive(Debug, Clone)]
pub struct RemoteExit {
  pub stdout: String,
  pub stderr: String,
  pub exit_code: i32,
}

/// RPC dispatch of a shell command to a named remote worker.
#[async_trait]
pub trait AgentTransport: Send + Sync {
  async fn execute(
    &self,
    agent: &str,
    command: &str,
    ctx: &CallContext,
  ) -> Result<RemoteExit, HostError>;
}

/// Registration record for a remote worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInfo {
  pub address: String,
}

/// Name → address mapping for remote workers.
///
/// Heartbeat-based staleness is the registry service's concern; this type
/// only holds the mapping a transport resolves against.
#[derive(Debug, Default)]
pub struct AgentRegistry {
  agents: Mutex<HashMap<String, AgentInfo>>,
}

impl AgentRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register or replace an agent.
  pub fn register(&self, name: impl Into<String>, address: impl Into<String>) {
    let mut agents = self.agents.lock().expect("agent registry poisoned");
    agents.insert(
      name.into(),
      AgentInfo {
        address: address.into(),
      },
    );
  }

  pub fn deregister(&self, name: &str) -> bool {
    let mut agents = self.agents.lock().expect("agent registry poisoned");
    agents.remove(name).is_some()
  }

  pub fn resolve(&self, name: &str) -> Result<AgentInfo, HostError> {
    let agents = self.agents.lock().expect("agent registry poisoned");
    agents.get(name).cloned().ok_or(HostError::UnknownAgent {
      name: name.to_string(),
    })
  }

  /// Snapshot of all registrations, sorted by name.
  pub fn list(&self) -> Vec<(String, AgentInfo)> {
    let agents = self.agents.lock().expect("agent registry poisoned");
    let mut entries: Vec<_> = agents.iter().map(|(n, a)| (n.clone(), a.clone())).collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
  }
}
