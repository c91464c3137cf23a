//! Recovery target handling for restores.
//!
//! The restore position is a comma-separated list of directives:
//!
//! | Directive | Effect |
//! |---|---|
//! | `current` | replay all available WAL |
//! | `immediate` | stop as soon as the backup is consistent |
//! | `name=<n>` / `xid=<x>` / `lsn=<l>` / `time=<t>` | stop at the given target |
//! | `inclusive=<bool>` | include the target itself |
//! | `timeline=<tli>` | timeline to follow |
//! | `action=pause\|promote\|shutdown` | what to do once the target is reached |
//! | `primary` / `replica` | start as a primary or as a standby |
//!
//! An empty position is a plain full restore and leaves the copy untouched.

use super::{required_str, Stage, StageOutput};
use crate::config::ServerConfig;
use crate::context::{keys, ExecutionContext};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Errors from parsing a restore position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    /// The directive is not recognised.
    #[error("unknown position directive '{0}'")]
    UnknownDirective(String),

    /// A directive that needs a value was given none.
    #[error("position directive '{0}' needs a value")]
    MissingValue(String),

    /// A directive value could not be parsed.
    #[error("invalid value '{value}' for '{directive}'")]
    InvalidValue {
        /// The directive name.
        directive: String,
        /// The offending value.
        value: String,
    },

    /// A directive was given twice, or two targets were given.
    #[error("position directive '{0}' given more than once")]
    Duplicate(String),
}

/// Where recovery stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryTarget {
    /// Replay everything available.
    Current,
    /// Stop at the first consistent point.
    Immediate,
    /// A named restore point.
    Name(String),
    /// A transaction id.
    Xid(String),
    /// A WAL location.
    Lsn(String),
    /// A timestamp.
    Time(String),
}

impl RecoveryTarget {
    fn setting(&self) -> Option<(&'static str, &str)> {
        match self {
            Self::Current => None,
            Self::Immediate => Some(("recovery_target", "immediate")),
            Self::Name(v) => Some(("recovery_target_name", v)),
            Self::Xid(v) => Some(("recovery_target_xid", v)),
            Self::Lsn(v) => Some(("recovery_target_lsn", v)),
            Self::Time(v) => Some(("recovery_target_time", v)),
        }
    }
}

/// What the server does once the target is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Pause replay.
    Pause,
    /// End recovery and accept writes.
    Promote,
    /// Shut down.
    Shutdown,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pause => write!(f, "pause"),
            Self::Promote => write!(f, "promote"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

impl FromStr for RecoveryAction {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(Self::Pause),
            "promote" => Ok(Self::Promote),
            "shutdown" => Ok(Self::Shutdown),
            other => Err(PositionError::InvalidValue {
                directive: "action".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// A parsed restore position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoverySettings {
    /// Recovery target, if any.
    pub target: Option<RecoveryTarget>,
    /// Whether the target is inclusive.
    pub inclusive: Option<bool>,
    /// Timeline to recover along.
    pub timeline: Option<String>,
    /// Action once the target is reached.
    pub action: Option<RecoveryAction>,
    /// Start as a standby instead of a primary.
    pub standby: bool,
}

impl RecoverySettings {
    /// Parses a position expression. An empty string parses to defaults.
    pub fn parse(position: &str) -> Result<Self, PositionError> {
        let mut settings = Self::default();
        let mut role_seen = false;

        for directive in position.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            let (name, value) = match directive.split_once('=') {
                Some((n, v)) => (n.trim(), Some(v.trim())),
                None => (directive, None),
            };
            let need = |value: Option<&str>| -> Result<String, PositionError> {
                match value {
                    Some(v) if !v.is_empty() => Ok(v.to_string()),
                    _ => Err(PositionError::MissingValue(name.to_string())),
                }
            };

            match name {
                "current" | "immediate" | "name" | "xid" | "lsn" | "time" => {
                    if settings.target.is_some() {
                        return Err(PositionError::Duplicate(name.to_string()));
                    }
                    settings.target = Some(match name {
                        "current" => RecoveryTarget::Current,
                        "immediate" => RecoveryTarget::Immediate,
                        "name" => RecoveryTarget::Name(need(value)?),
                        "xid" => RecoveryTarget::Xid(need(value)?),
                        "lsn" => RecoveryTarget::Lsn(need(value)?),
                        _ => RecoveryTarget::Time(need(value)?),
                    });
                }
                "inclusive" => {
                    let raw = need(value)?;
                    let flag = match raw.as_str() {
                        "true" | "on" | "yes" | "1" => true,
                        "false" | "off" | "no" | "0" => false,
                        _ => {
                            return Err(PositionError::InvalidValue {
                                directive: name.to_string(),
                                value: raw,
                            })
                        }
                    };
                    set_once(&mut settings.inclusive, flag, name)?;
                }
                "timeline" => set_once(&mut settings.timeline, need(value)?, name)?,
                "action" => set_once(&mut settings.action, need(value)?.parse()?, name)?,
                "primary" | "replica" => {
                    if role_seen {
                        return Err(PositionError::Duplicate(name.to_string()));
                    }
                    role_seen = true;
                    settings.standby = name == "replica";
                }
                _ => return Err(PositionError::UnknownDirective(directive.to_string())),
            }
        }

        Ok(settings)
    }

    /// Returns the `postgresql.auto.conf` lines for these settings.
    #[must_use]
    pub fn conf_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some((key, value)) = self.target.as_ref().and_then(RecoveryTarget::setting) {
            lines.push(format!("{key} = '{}'", quote(value)));
        }
        if let Some(inclusive) = self.inclusive {
            lines.push(format!("recovery_target_inclusive = {}", if inclusive { "on" } else { "off" }));
        }
        if let Some(timeline) = &self.timeline {
            lines.push(format!("recovery_target_timeline = '{}'", quote(timeline)));
        }
        if let Some(action) = self.action {
            lines.push(format!("recovery_target_action = '{action}'"));
        }
        lines
    }

    /// Returns the signal file that puts the server into recovery.
    #[must_use]
    pub const fn signal_file(&self) -> &'static str {
        if self.standby {
            "standby.signal"
        } else {
            "recovery.signal"
        }
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, name: &str) -> Result<(), PositionError> {
    if slot.is_some() {
        return Err(PositionError::Duplicate(name.to_string()));
    }
    *slot = Some(value);
    Ok(())
}

fn quote(value: &str) -> String {
    value.replace('\'', "''")
}

/// Writes recovery configuration into the restored copy.
///
/// Reads `position` and `output`; does nothing for an empty position.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryTargetStage;

impl RecoveryTargetStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for RecoveryTargetStage {
    fn name(&self) -> &str {
        "recovery_target"
    }

    async fn setup(&self, _server: &ServerConfig, _backup_id: &str, ctx: &mut ExecutionContext) -> StageOutput {
        match required_str(ctx, keys::POSITION) {
            Ok(position) => RecoverySettings::parse(&position).map(|_| ()).into(),
            Err(output) => output,
        }
    }

    async fn execute(&self, server: &ServerConfig, backup_id: &str, ctx: &mut ExecutionContext) -> StageOutput {
        let position = match required_str(ctx, keys::POSITION) {
            Ok(p) => p,
            Err(output) => return output,
        };
        if position.trim().is_empty() {
            return StageOutput::skip("full restore");
        }
        let settings = match RecoverySettings::parse(&position) {
            Ok(s) => s,
            Err(e) => return StageOutput::fail(e.to_string()),
        };
        let output = match required_str(ctx, keys::OUTPUT) {
            Ok(o) => o,
            Err(output) => return output,
        };

        if let Err(e) = write_recovery(Path::new(&output), &settings).await {
            return StageOutput::fail(format!("cannot write recovery settings in {output}: {e}"));
        }

        info!(server = %server.name, backup = %backup_id, position = %position, "Recovery target configured");
        StageOutput::ok().with_metadata("signal", serde_json::json!(settings.signal_file()))
    }
}

async fn write_recovery(data_dir: &Path, settings: &RecoverySettings) -> std::io::Result<()> {
    let lines = settings.conf_lines();
    if !lines.is_empty() {
        let mut conf = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(data_dir.join("postgresql.auto.conf"))
            .await?;
        let mut body = lines.join("\n");
        body.push('\n');
        conf.write_all(body.as_bytes()).await?;
        conf.flush().await?;
    }
    tokio::fs::write(data_dir.join(settings.signal_file()), b"").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_empty() {
        assert_eq!(RecoverySettings::parse("").unwrap(), RecoverySettings::default());
    }

    #[test]
    fn test_parse_full() {
        let settings = RecoverySettings::parse("name=before_upgrade, inclusive=false, timeline=latest, action=promote, replica").unwrap();
        assert_eq!(
            settings,
            RecoverySettings {
                target: Some(RecoveryTarget::Name("before_upgrade".to_string())),
                inclusive: Some(false),
                timeline: Some("latest".to_string()),
                action: Some(RecoveryAction::Promote),
                standby: true,
            }
        );
        assert_eq!(
            settings.conf_lines(),
            vec![
                "recovery_target_name = 'before_upgrade'".to_string(),
                "recovery_target_inclusive = off".to_string(),
                "recovery_target_timeline = 'latest'".to_string(),
                "recovery_target_action = 'promote'".to_string(),
            ]
        );
        assert_eq!(settings.signal_file(), "standby.signal");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            RecoverySettings::parse("bogus").unwrap_err(),
            PositionError::UnknownDirective("bogus".to_string())
        );
        assert_eq!(RecoverySettings::parse("lsn=").unwrap_err(), PositionError::MissingValue("lsn".to_string()));
        assert_eq!(
            RecoverySettings::parse("immediate,xid=5").unwrap_err(),
            PositionError::Duplicate("xid".to_string())
        );
        assert!(matches!(
            RecoverySettings::parse("action=explode"),
            Err(PositionError::InvalidValue { .. })
        ));
        assert!(RecoverySettings::parse("primary,replica").is_err());
    }

    #[test]
    fn test_quoting() {
        let settings = RecoverySettings::parse("name=it's").unwrap();
        assert_eq!(settings.conf_lines(), vec!["recovery_target_name = 'it''s'".to_string()]);
    }

    #[test]
    fn test_current_has_no_target_line() {
        let settings = RecoverySettings::parse("current").unwrap();
        assert!(settings.conf_lines().is_empty());
        assert_eq!(settings.signal_file(), "recovery.signal");
    }

    #[tokio::test]
    async fn test_stage_writes_settings() {
        let dir = tempfile::tempdir().unwrap();
        let server = ServerConfig::new("pg");
        let mut ctx = ExecutionContext::new(true);
        ctx.insert(keys::POSITION, "lsn=0/3000060,action=pause").unwrap();
        ctx.insert(keys::OUTPUT, dir.path().to_string_lossy().to_string()).unwrap();

        let stage = RecoveryTargetStage::new();
        assert!(stage.setup(&server, "b1", &mut ctx).await.is_success());
        assert!(stage.execute(&server, "b1", &mut ctx).await.is_success());

        let conf = std::fs::read_to_string(dir.path().join("postgresql.auto.conf")).unwrap();
        assert_eq!(conf, "recovery_target_lsn = '0/3000060'\nrecovery_target_action = 'pause'\n");
        assert!(dir.path().join("recovery.signal").exists());
    }

    #[tokio::test]
    async fn test_stage_skips_full_restore() {
        let server = ServerConfig::new("pg");
        let mut ctx = ExecutionContext::new(true);
        ctx.insert(keys::POSITION, "").unwrap();

        let output = RecoveryTargetStage::new().execute(&server, "b1", &mut ctx).await;
        assert_eq!(output.status, crate::stages::StageStatus::Skip);
    }

    #[tokio::test]
    async fn test_stage_setup_rejects_bad_position() {
        let server = ServerConfig::new("pg");
        let mut ctx = ExecutionContext::new(true);
        ctx.insert(keys::POSITION, "sideways").unwrap();

        let output = RecoveryTargetStage::new().setup(&server, "b1", &mut ctx).await;
        assert!(output.is_failure());
        assert!(output.error_message().contains("sideways"));
    }
}
