//! Build parameters shared by every modelling pass.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_TARGET, DEFAULT_WORKING_DIR, FRAMEWORK_ROOT_ENV, FRAMEWORK_TARGET_ENV};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildParams {
  /// Target device type, e.g. `localhost` or `wp85`.
  pub target: String,
  pub verbose: bool,
  /// Root of the build's working files.
  pub working_dir: PathBuf,
  /// Where component libraries go. Defaults to each component's working dir.
  pub lib_output_dir: Option<PathBuf>,
  /// Searched for components, apps, modules and source files.
  pub source_dirs: Vec<PathBuf>,
  /// Searched for `.api` files.
  pub interface_dirs: Vec<PathBuf>,
  pub lib_dirs: Vec<PathBuf>,
  pub c_flags: Vec<String>,
  pub cxx_flags: Vec<String>,
  pub ld_flags: Vec<String>,
  pub code_gen_only: bool,
  pub framework_root: Option<PathBuf>,
}

impl Default for BuildParams {
  fn default() -> Self {
    Self {
      target: DEFAULT_TARGET.to_string(),
      verbose: false,
      working_dir: PathBuf::from(DEFAULT_WORKING_DIR),
      lib_output_dir: None,
      source_dirs: Vec::new(),
      interface_dirs: Vec::new(),
      lib_dirs: Vec::new(),
      c_flags: Vec::new(),
      cxx_flags: Vec::new(),
      ld_flags: Vec::new(),
      code_gen_only: false,
      framework_root: None,
    }
  }
}

impl BuildParams {
  /// Defaults, with the framework root and target taken from the environment.
  pub fn from_env() -> Self {
    let mut params = Self::default();
    if let Some(root) = std::env::var_os(FRAMEWORK_ROOT_ENV).filter(|v| !v.is_empty()) {
      params.framework_root = Some(PathBuf::from(root));
    }
    if let Ok(target) = std::env::var(FRAMEWORK_TARGET_ENV)
      && !target.is_empty()
    {
      params.target = target;
    }
    params
  }

  pub fn with_target(mut self, target: impl Into<String>) -> Self {
    self.target = target.into();
    self
  }

  pub fn with_verbose(mut self, verbose: bool) -> Self {
    self.verbose = verbose;
    self
  }

  pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.working_dir = dir.into();
    self
  }

  pub fn with_lib_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.lib_output_dir = Some(dir.into());
    self
  }

  pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.source_dirs.push(dir.into());
    self
  }

  pub fn with_interface_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.interface_dirs.push(dir.into());
    self
  }

  pub fn with_lib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.lib_dirs.push(dir.into());
    self
  }

  pub fn with_framework_root(mut self, dir: impl Into<PathBuf>) -> Self {
    self.framework_root = Some(dir.into());
    self
  }

  pub fn with_code_gen_only(mut self, code_gen_only: bool) -> Self {
    self.code_gen_only = code_gen_only;
    self
  }

  /// Where the framework's own libraries live for the current target.
  pub fn framework_lib_dir(&self) -> Option<PathBuf> {
    self
      .framework_root
      .as_ref()
      .map(|root| root.join("build").join(&self.target).join("framework").join("lib"))
  }
}
