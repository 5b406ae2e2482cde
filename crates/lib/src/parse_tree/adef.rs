//! Application definition trees, plus the app settings that `.sdef` files may override.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{Assignment, Entry, Location, Section, SimpleSection, Token, TokenList};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdefFile {
  pub path: PathBuf,
  pub sections: Vec<AdefSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AdefSection {
  Executables(Section<ExecutableDef>),
  Processes(Section<ProcessesSubsection>),
  /// `exe comp if agent if`, or `* if agent if` for pre-built interfaces.
  Bindings(Section<Entry>),
  /// `[alias] exe comp if`
  Extern(Section<Entry>),
  Requires(Section<AppRequiresSubsection>),
  Version(SimpleSection),
  Setting(AppSetting),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutableDef {
  pub name: Token,
  pub components: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessesSubsection {
  Run(Section<RunDef>),
  EnvVars(Section<Assignment>),
  Priority(SimpleSection),
  Limit(ProcessLimit),
  WatchdogAction(SimpleSection),
  WatchdogTimeout(SimpleSection),
}

/// `[name =] ( exe args... )`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDef {
  pub location: Location,
  pub name: Option<Token>,
  pub exe: Token,
  pub args: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppRequiresSubsection {
  /// Pre-built client interfaces: `[alias] api_file [options...]`.
  Api(Section<Entry>),
}

/// Limits that live on every process environment of an app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessLimit {
  FaultAction(SimpleSection),
  MaxCoreDumpFileBytes(SimpleSection),
  MaxFileBytes(SimpleSection),
  MaxFileDescriptors(SimpleSection),
  MaxLockedMemoryBytes(SimpleSection),
  MaxPriority(SimpleSection),
}

/// App-level settings. Appear in `.adef` files and as overrides in `.sdef` app sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppSetting {
  CpuShare(SimpleSection),
  Groups(TokenList),
  MaxFileSystemBytes(SimpleSection),
  MaxMemoryBytes(SimpleSection),
  MaxMQueueBytes(SimpleSection),
  MaxQueuedSignals(SimpleSection),
  MaxThreads(SimpleSection),
  MaxSecureStorageBytes(SimpleSection),
  Sandboxed(SimpleSection),
  Start(SimpleSection),
  WatchdogAction(SimpleSection),
  WatchdogTimeout(SimpleSection),
  /// `true`, `false`, or an md5 hash of the preloaded app.
  Preloaded(SimpleSection),
  Process(ProcessLimit),
}
