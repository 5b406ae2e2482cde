use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::{ApiFileId, BindingId, ComponentId, InterfaceId};
use crate::parse_tree::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum StartTrigger {
  #[default]
  Auto,
  Manual,
}

impl StartTrigger {
  pub fn parse(text: &str) -> Option<Self> {
    match text {
      "auto" => Some(Self::Auto),
      "manual" => Some(Self::Manual),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultAction {
  Ignore,
  Restart,
  RestartApp,
  StopApp,
  Reboot,
}

impl FaultAction {
  pub const NAMES: &'static [&'static str] = &["ignore", "restart", "restartApp", "stopApp", "reboot"];

  pub fn parse(text: &str) -> Option<Self> {
    match text {
      "ignore" => Some(Self::Ignore),
      "restart" => Some(Self::Restart),
      "restartApp" => Some(Self::RestartApp),
      "stopApp" => Some(Self::StopApp),
      "reboot" => Some(Self::Reboot),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WatchdogAction {
  Ignore,
  Restart,
  RestartApp,
  Stop,
  StopApp,
  Reboot,
}

impl WatchdogAction {
  pub const NAMES: &'static [&'static str] = &["ignore", "restart", "restartApp", "stop", "stopApp", "reboot"];

  pub fn parse(text: &str) -> Option<Self> {
    match text {
      "ignore" => Some(Self::Ignore),
      "restart" => Some(Self::Restart),
      "restartApp" => Some(Self::RestartApp),
      "stop" => Some(Self::Stop),
      "stopApp" => Some(Self::StopApp),
      "reboot" => Some(Self::Reboot),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WatchdogTimeout {
  Never,
  Millis(u64),
}

impl WatchdogTimeout {
  pub fn parse(text: &str) -> Option<Self> {
    if text == "never" {
      return Some(Self::Never);
    }
    text.parse().ok().map(Self::Millis)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
  Idle,
  Low,
  Medium,
  High,
  /// Real-time levels 1 to 32.
  Rt(u8),
}

impl Priority {
  pub fn parse(text: &str) -> Option<Self> {
    match text {
      "idle" => Some(Self::Idle),
      "low" => Some(Self::Low),
      "medium" => Some(Self::Medium),
      "high" => Some(Self::High),
      _ => {
        let level: u8 = text.strip_prefix("rt")?.parse().ok()?;
        (1..=32).contains(&level).then_some(Self::Rt(level))
      }
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Priority::Idle => write!(f, "idle"),
      Priority::Low => write!(f, "low"),
      Priority::Medium => write!(f, "medium"),
      Priority::High => write!(f, "high"),
      Priority::Rt(level) => write!(f, "rt{}", level),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppLimits {
  pub cpu_share: u64,
  pub max_file_system_bytes: u64,
  pub max_memory_bytes: u64,
  pub max_mqueue_bytes: u64,
  pub max_queued_signals: u64,
  pub max_threads: u64,
  pub max_secure_storage_bytes: u64,
}

impl Default for AppLimits {
  fn default() -> Self {
    Self {
      cpu_share: 1024,
      max_file_system_bytes: 128 * 1024,
      max_memory_bytes: 40_000 * 1024,
      max_mqueue_bytes: 512,
      max_queued_signals: 100,
      max_threads: 20,
      max_secure_storage_bytes: 8192,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessLimits {
  pub max_core_dump_file_bytes: u64,
  pub max_file_bytes: u64,
  pub max_file_descriptors: u64,
  pub max_locked_memory_bytes: u64,
}

impl Default for ProcessLimits {
  fn default() -> Self {
    Self {
      max_core_dump_file_bytes: 8192,
      max_file_bytes: 88 * 1024,
      max_file_descriptors: 256,
      max_locked_memory_bytes: 8 * 1024,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Process {
  pub name: String,
  pub exe_path: String,
  pub args: Vec<String>,
  pub location: Location,
}

/// Processes sharing one set of environment variables and limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessEnv {
  pub processes: Vec<Process>,
  pub env_vars: BTreeMap<String, String>,
  pub fault_action: Option<FaultAction>,
  pub priority: Option<Priority>,
  pub max_priority: Option<Priority>,
  pub watchdog_action: Option<WatchdogAction>,
  pub watchdog_timeout: Option<WatchdogTimeout>,
  pub limits: ProcessLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInterfaceInstance {
  pub interface: InterfaceId,
  /// `exe.component.interface`
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInterfaceInstance {
  pub interface: InterfaceId,
  /// Qualified name, assigned when the interface is bound.
  pub name: Option<String>,
  pub binding: Option<BindingId>,
}

/// One component inside one executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentInstance {
  pub component: ComponentId,
  pub server_apis: Vec<ServerInterfaceInstance>,
  pub client_apis: Vec<ClientInterfaceInstance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Executable {
  pub name: String,
  pub location: Location,
  /// Dependency order: every component comes after its sub-components.
  pub instances: Vec<ComponentInstance>,
}

impl Executable {
  pub fn new(name: impl Into<String>, location: Location) -> Self {
    Self {
      name: name.into(),
      location,
      instances: Vec::new(),
    }
  }
}

/// Path from an app down to one interface instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InterfaceRef {
  pub exe: usize,
  pub instance: usize,
  pub interface: usize,
}

/// A client interface the app binds to without any component declaring it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreBuiltInterface {
  pub name: String,
  pub api_file: ApiFileId,
  pub manual_start: bool,
  pub optional: bool,
  pub binding: Option<BindingId>,
  pub location: Location,
}

#[derive(Debug, Clone, Serialize)]
pub struct App {
  pub name: String,
  pub def_path: PathBuf,
  /// Where the system definition names this app.
  pub declared_at: Option<Location>,
  pub version: Option<String>,

  pub executables: Vec<Executable>,
  pub process_envs: Vec<ProcessEnv>,
  pub groups: Vec<String>,
  pub limits: AppLimits,

  pub is_sandboxed: bool,
  pub start_trigger: StartTrigger,
  pub watchdog_action: Option<WatchdogAction>,
  pub watchdog_timeout: Option<WatchdogTimeout>,
  pub is_preloaded: bool,
  pub preloaded_md5: Option<String>,

  /// Client interfaces other apps and users may bind, by external name.
  pub extern_client_interfaces: BTreeMap<String, InterfaceRef>,
  /// Server interfaces other apps and users may bind to, by external name.
  pub extern_server_interfaces: BTreeMap<String, InterfaceRef>,
  pub pre_built_client_interfaces: BTreeMap<String, PreBuiltInterface>,
}

impl App {
  pub fn new(name: impl Into<String>, def_path: PathBuf) -> Self {
    Self {
      name: name.into(),
      def_path,
      declared_at: None,
      version: None,
      executables: Vec::new(),
      process_envs: Vec::new(),
      groups: Vec::new(),
      limits: AppLimits::default(),
      is_sandboxed: true,
      start_trigger: StartTrigger::Auto,
      watchdog_action: None,
      watchdog_timeout: None,
      is_preloaded: false,
      preloaded_md5: None,
      extern_client_interfaces: BTreeMap::new(),
      extern_server_interfaces: BTreeMap::new(),
      pre_built_client_interfaces: BTreeMap::new(),
    }
  }

  pub fn executable(&self, name: &str) -> Option<(usize, &Executable)> {
    self.executables.iter().enumerate().find(|(_, e)| e.name == name)
  }

  pub fn client_instance(&self, r: InterfaceRef) -> &ClientInterfaceInstance {
    &self.executables[r.exe].instances[r.instance].client_apis[r.interface]
  }

  pub(crate) fn client_instance_mut(&mut self, r: InterfaceRef) -> &mut ClientInterfaceInstance {
    &mut self.executables[r.exe].instances[r.instance].client_apis[r.interface]
  }

  pub fn server_instance(&self, r: InterfaceRef) -> &ServerInterfaceInstance {
    &self.executables[r.exe].instances[r.instance].server_apis[r.interface]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn priorities() {
    assert_eq!(Priority::parse("rt1"), Some(Priority::Rt(1)));
    assert_eq!(Priority::parse("rt32"), Some(Priority::Rt(32)));
    assert_eq!(Priority::parse("rt33"), None);
    assert_eq!(Priority::parse("rt0"), None);
    assert_eq!(Priority::parse("medium"), Some(Priority::Medium));
    assert!(Priority::Low < Priority::Rt(1));
  }

  #[test]
  fn watchdog_timeouts() {
    assert_eq!(WatchdogTimeout::parse("never"), Some(WatchdogTimeout::Never));
    assert_eq!(WatchdogTimeout::parse("500"), Some(WatchdogTimeout::Millis(500)));
    assert_eq!(WatchdogTimeout::parse("-1"), None);
  }

  #[test]
  fn fault_action_has_no_plain_stop() {
    assert_eq!(FaultAction::parse("stop"), None);
    assert_eq!(WatchdogAction::parse("stop"), Some(WatchdogAction::Stop));
  }
}
