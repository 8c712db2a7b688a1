use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Output};

use crate::error::AgentError;

pub const PID_VAR: &str = "SSH_AGENT_PID";
pub const AUTH_SOCK_VAR: &str = "SSH_AUTH_SOCK";

const AGENT_PROGRAM: &str = "ssh-agent";
const ADD_PROGRAM: &str = "ssh-add";

/// The two tokens a subprocess needs to talk to a running agent.
///
/// Cheap to clone; shared read-only by every git invocation of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEnv {
    pub pid: String,
    pub auth_sock: String,
}

impl AgentEnv {
    pub fn vars(&self) -> [(&'static str, &str); 2] {
        [(PID_VAR, self.pid.as_str()), (AUTH_SOCK_VAR, self.auth_sock.as_str())]
    }

    /// Apply both tokens to `cmd`.
    pub fn apply(&self, cmd: &mut Command) {
        for (key, value) in self.vars() {
            cmd.env(key, value);
        }
    }
}

/// Extract the agent tokens from `ssh-agent -s` output.
///
/// ```text
/// SSH_AUTH_SOCK=/tmp/ssh-XXXX/agent.41; export SSH_AUTH_SOCK;
/// SSH_AGENT_PID=42; export SSH_AGENT_PID;
/// echo Agent pid 42;
/// ```
pub fn parse_agent_output(stdout: &str) -> Result<AgentEnv, AgentError> {
    let assignments: HashMap<&str, &str> = stdout
        .split(|c: char| c == ';' || c == '\n')
        .filter_map(|part| part.trim().split_once('='))
        .filter(|(key, _)| {
            !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
        .collect();

    let pid = assignments
        .get(PID_VAR)
        .filter(|v| !v.is_empty())
        .ok_or(AgentError::MissingToken(PID_VAR))?;
    let auth_sock = assignments
        .get(AUTH_SOCK_VAR)
        .filter(|v| !v.is_empty())
        .ok_or(AgentError::MissingToken(AUTH_SOCK_VAR))?;

    Ok(AgentEnv {
        pid: (*pid).to_string(),
        auth_sock: (*auth_sock).to_string(),
    })
}

/// A live `ssh-agent` process owned by one run.
///
/// Stopped explicitly with [`AgentSession::stop`]; if the session is dropped
/// while still running (early return, panic unwind) the agent is killed then.
#[derive(Debug)]
pub struct AgentSession {
    env: AgentEnv,
    running: bool,
}

impl AgentSession {
    /// Launch `ssh-agent -s` and capture its tokens.
    pub fn start() -> Result<Self, AgentError> {
        let output = run(Command::new(AGENT_PROGRAM).arg("-s"), AGENT_PROGRAM)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let env = parse_agent_output(&stdout)?;
        tracing::info!(pid = %env.pid, "ssh-agent started");
        Ok(Self { env, running: true })
    }

    pub fn env(&self) -> &AgentEnv {
        &self.env
    }

    /// Load a private key into the agent.
    pub fn add_key(&self, key: &Path) -> Result<(), AgentError> {
        let mut cmd = Command::new(ADD_PROGRAM);
        cmd.arg(key);
        self.env.apply(&mut cmd);
        let output = cmd.output().map_err(|e| AgentError::AddKey {
            path: key.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(AgentError::AddKey {
                path: key.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        tracing::debug!(key = %key.display(), "key added to ssh-agent");
        Ok(())
    }

    /// Shut the agent down (`ssh-agent -k`).
    pub fn stop(mut self) -> Result<(), AgentError> {
        self.running = false;
        self.kill()
    }

    fn kill(&self) -> Result<(), AgentError> {
        let mut cmd = Command::new(AGENT_PROGRAM);
        cmd.arg("-k");
        self.env.apply(&mut cmd);
        run(&mut cmd, AGENT_PROGRAM)?;
        tracing::info!(pid = %self.env.pid, "ssh-agent stopped");
        Ok(())
    }
}

impl Drop for AgentSession {
    fn drop(&mut self) {
        if self.running {
            self.running = false;
            if let Err(err) = self.kill() {
                tracing::warn!(error = %err, pid = %self.env.pid, "failed to stop ssh-agent");
            }
        }
    }
}

fn run(cmd: &mut Command, program: &str) -> Result<Output, AgentError> {
    let output = cmd.output().map_err(|source| AgentError::Spawn {
        program: program.to_string(),
        source,
    })?;
    if !output.status.success() {
        return Err(AgentError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOURNE_OUTPUT: &str = "SSH_AUTH_SOCK=/tmp/ssh-abc123/agent.41; export SSH_AUTH_SOCK;\n\
                                 SSH_AGENT_PID=42; export SSH_AGENT_PID;\n\
                                 echo Agent pid 42;\n";

    #[test]
    fn parses_bourne_shell_output() {
        let env = parse_agent_output(BOURNE_OUTPUT).expect("parse");
        assert_eq!(env.pid, "42");
        assert_eq!(env.auth_sock, "/tmp/ssh-abc123/agent.41");
    }

    #[test]
    fn missing_pid_is_reported() {
        let err = parse_agent_output("SSH_AUTH_SOCK=/tmp/sock; export SSH_AUTH_SOCK;").unwrap_err();
        assert!(matches!(err, AgentError::MissingToken(PID_VAR)), "got: {err}");
    }

    #[test]
    fn missing_socket_is_reported() {
        let err = parse_agent_output("SSH_AGENT_PID=7; export SSH_AGENT_PID;").unwrap_err();
        assert!(matches!(err, AgentError::MissingToken(AUTH_SOCK_VAR)), "got: {err}");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_agent_output("Could not open a connection").is_err());
    }

    #[test]
    fn env_applies_both_tokens() {
        let env = parse_agent_output(BOURNE_OUTPUT).expect("parse");
        let mut cmd = Command::new("true");
        env.apply(&mut cmd);
        let vars: HashMap<_, _> = cmd
            .get_envs()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.map(|v| v.to_string_lossy().into_owned())))
            .collect();
        assert_eq!(vars.get(PID_VAR), Some(&Some("42".to_string())));
        assert_eq!(
            vars.get(AUTH_SOCK_VAR),
            Some(&Some("/tmp/ssh-abc123/agent.41".to_string()))
        );
    }

    fn ssh_agent_available() -> bool {
        Command::new(AGENT_PROGRAM)
            .arg("-s")
            .env_remove(AUTH_SOCK_VAR)
            .output()
            .map(|o| {
                // Probe started a real agent; shut it down again.
                if let Ok(env) = parse_agent_output(&String::from_utf8_lossy(&o.stdout)) {
                    let mut kill = Command::new(AGENT_PROGRAM);
                    kill.arg("-k");
                    env.apply(&mut kill);
                    let _ = kill.output();
                }
                o.status.success()
            })
            .unwrap_or(false)
    }

    #[test]
    fn real_agent_starts_and_stops() {
        if !ssh_agent_available() {
            eprintln!("ssh-agent not installed; skipping");
            return;
        }
        let session = AgentSession::start().expect("start");
        let sock = session.env().auth_sock.clone();
        assert!(Path::new(&sock).exists(), "agent socket should exist");
        session.stop().expect("stop");
    }

    #[test]
    fn adding_a_missing_key_fails_and_drop_still_stops_agent() {
        if !ssh_agent_available() {
            eprintln!("ssh-agent not installed; skipping");
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let session = AgentSession::start().expect("start");
        let err = session.add_key(&dir.path().join("id_missing")).unwrap_err();
        assert!(matches!(err, AgentError::AddKey { .. }), "got: {err}");
        drop(session);
    }
}
