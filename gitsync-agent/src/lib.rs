//! SSH signing-agent lifecycle.
//!
//! [`AgentSession::start`] launches `ssh-agent`, [`AgentSession::env`] hands
//! its two tokens to subprocesses, and [`AgentSession::stop`] (or dropping the
//! session) shuts it down.

mod error;
mod session;

pub use error::AgentError;
pub use session::{parse_agent_output, AgentEnv, AgentSession, AUTH_SOCK_VAR, PID_VAR};
