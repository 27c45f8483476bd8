//! Supervised-child descriptor: what to run and how to keep it running.

use std::path::{Path, PathBuf};
use std::time::Duration;

use aiota_core::RestartOn;
use aiota_core::config::RestartSection;

use crate::error::SupervisorResult;

/// Where a child's stdout or stderr goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Inherit,
    Null,
    /// Appended to, created if missing.
    File(PathBuf),
}

/// Restart parameters for one supervised child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Restarts allowed over the handle's lifetime.
    pub max_restarts: u32,
    /// Runs shorter than this are reported as spinning.
    pub min_uptime: Duration,
    /// Delay before every restart.
    pub spin_sleep: Duration,
    /// How long a stopped child gets between SIGTERM and SIGKILL.
    pub kill_grace: Duration,
    /// Signal the child's whole process group instead of its pid alone.
    pub kill_tree: bool,
    pub restart_on: RestartOn,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            min_uptime: Duration::from_millis(2000),
            spin_sleep: Duration::from_millis(1000),
            kill_grace: Duration::from_secs(5),
            kill_tree: true,
            restart_on: RestartOn::Always,
        }
    }
}

impl RestartPolicy {
    /// Build a policy from the `[controller.restart]` section of aiota.toml.
    pub fn from_section(section: &RestartSection) -> SupervisorResult<Self> {
        Ok(Self {
            max_restarts: section.max_restarts,
            min_uptime: section.min_uptime()?,
            spin_sleep: section.spin_sleep()?,
            kill_grace: section.kill_grace()?,
            kill_tree: section.kill_tree,
            restart_on: section.restart_on,
        })
    }
}

/// Everything the supervisor needs to (re)start one child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDescriptor {
    /// Logical role ("controller").
    pub role: String,
    pub cwd: PathBuf,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Extra environment on top of the inherited one.
    pub env: Vec<(String, String)>,
    pub restart: RestartPolicy,
    pub stdout: Output,
    pub stderr: Output,
}

impl ChildDescriptor {
    pub fn new(role: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            role: role.into(),
            cwd: PathBuf::from("."),
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            restart: RestartPolicy::default(),
            stdout: Output::Inherit,
            stderr: Output::Inherit,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }

    pub fn with_stdout(mut self, output: Output) -> Self {
        self.stdout = output;
        self
    }

    pub fn with_stderr(mut self, output: Output) -> Self {
        self.stderr = output;
        self
    }

    /// Send stdout to `<dir>/<role>.out` and stderr to `<dir>/<role>.err`.
    pub fn log_to(self, dir: &Path) -> Self {
        let out = dir.join(format!("{}.out", self.role));
        let err = dir.join(format!("{}.err", self.role));
        self.with_stdout(Output::File(out))
            .with_stderr(Output::File(err))
    }

    /// Value of an environment entry set on this descriptor.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_from_default_section() {
        let policy = RestartPolicy::from_section(&RestartSection::default()).unwrap();
        assert_eq!(policy, RestartPolicy::default());
    }

    #[test]
    fn policy_from_section_rejects_bad_duration() {
        let section = RestartSection {
            min_uptime: "whenever".to_string(),
            ..RestartSection::default()
        };
        assert!(RestartPolicy::from_section(&section).is_err());
    }

    #[test]
    fn log_to_names_files_after_role() {
        let desc = ChildDescriptor::new("controller", "/bin/true").log_to(Path::new("/var/log/aiota"));
        assert_eq!(
            desc.stdout,
            Output::File(PathBuf::from("/var/log/aiota/controller.out"))
        );
        assert_eq!(
            desc.stderr,
            Output::File(PathBuf::from("/var/log/aiota/controller.err"))
        );
    }

    #[test]
    fn later_env_entries_win() {
        let desc = ChildDescriptor::new("controller", "/bin/true")
            .with_env("A", "1")
            .with_env("A", "2");
        assert_eq!(desc.env_var("A"), Some("2"));
        assert_eq!(desc.env_var("B"), None);
    }
}
