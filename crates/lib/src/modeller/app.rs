//! App modelling: `.adef` files, binary app archives and `.sdef` override sections.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};
use walkdir::WalkDir;

use super::api::{client_options, split_api_entry, usetypes_closure};
use super::binding::{ClientSlot, server_agent};
use super::instance::add_component_instance;
use super::{Modeller, summary};
use crate::consts::BIN_APPS_DIR;
use crate::error::{ModelError, SearchedDirs};
use crate::model::{
  App, Binding, ClientType, Executable, FaultAction, InterfaceRef, PreBuiltInterface, Priority, Process, ProcessEnv,
  StartTrigger, System, WatchdogAction, WatchdogTimeout,
};
use crate::parse_tree::{
  AdefSection, AppRequiresSubsection, AppSetting, AppSpec, Entry, ExecutableDef, Location, ProcessLimit,
  ProcessesSubsection, RunDef, Section, SimpleSection, Token, TokenKind,
};
use crate::paths::{self, has_suffix, remove_suffix};

/// Parses an integer, allowing a `K` suffix for multiples of 1024.
fn parse_integer(text: &str) -> Option<u64> {
  match text.strip_suffix('K') {
    Some(n) => n.parse::<u64>().ok()?.checked_mul(1024),
    None => text.parse().ok(),
  }
}

fn is_md5(text: &str) -> bool {
  text.len() == 32 && text.chars().all(|c| c.is_ascii_hexdigit())
}

impl<'p> Modeller<'p> {
  /// Resolves an app named in an `apps:` section and adds it to the system.
  ///
  /// The spec may name an `.adef` file, a `<name>.<target>.app` archive, or a
  /// bare name that is tried as both, in that order.
  pub fn resolve_app(&mut self, system: &mut System, spec: &AppSpec) -> Result<(), ModelError> {
    let location = &spec.spec.location;
    let text = self.expand(&spec.spec)?;
    let path = self.find_app(&text, location)?;
    let archive_suffix = self.archive_suffix();

    let file_name = paths::last_node(&path.to_string_lossy());
    let (name, adef_path) = if has_suffix(&file_name, ".adef") {
      (remove_suffix(&file_name, ".adef").to_string(), path)
    } else {
      let name = remove_suffix(&file_name, &archive_suffix).to_string();
      let adef = self.extract_bin_app(&path, &name, location)?;
      (name, adef)
    };

    if let Some(existing) = system.apps.get(&name) {
      return Err(ModelError::Duplicate {
        location: location.clone(),
        what: "app",
        name,
        previous: existing
          .declared_at
          .clone()
          .unwrap_or_else(|| Location::file(&existing.def_path)),
      });
    }

    let mut app = self.model_app(system, &adef_path, &name)?;
    app.declared_at = Some(location.clone());
    self.apply_overrides(&mut app, &spec.overrides)?;

    if self.params.verbose {
      summary::log_app(&self.model, system, &app);
    }
    system.apps.insert(name, app);
    Ok(())
  }

  fn archive_suffix(&self) -> String {
    format!(".{}.app", self.params.target)
  }

  fn find_app(&self, text: &str, location: &Location) -> Result<PathBuf, ModelError> {
    let dirs = &self.params.source_dirs;
    let archive_suffix = self.archive_suffix();

    let found = if has_suffix(text, ".adef") || has_suffix(text, &archive_suffix) {
      paths::find_file(text, dirs)
    } else {
      paths::find_file(&format!("{}.adef", text), dirs)
        .or_else(|| paths::find_file(&format!("{}{}", text, archive_suffix), dirs))
    };

    found.ok_or_else(|| ModelError::NotFound {
      location: location.clone(),
      what: "app",
      name: text.to_string(),
      searched: SearchedDirs(dirs.clone()),
    })
  }

  /// Unpacks a binary app archive and returns the `.adef` it carries.
  fn extract_bin_app(&self, archive: &Path, name: &str, location: &Location) -> Result<PathBuf, ModelError> {
    let dest = self.params.working_dir.join(BIN_APPS_DIR).join(name);
    fs::create_dir_all(&dest).map_err(|source| ModelError::Io {
      location: location.clone(),
      path: dest.clone(),
      source,
    })?;

    info!(archive = %archive.display(), dest = %dest.display(), "extracting binary app");
    let flags = if self.params.verbose { "xvf" } else { "xf" };
    let output = Command::new("tar")
      .arg(flags)
      .arg(archive)
      .arg("-C")
      .arg(&dest)
      .output()
      .map_err(|e| ModelError::Extraction {
        location: location.clone(),
        archive: archive.to_path_buf(),
        message: format!("failed to run tar: {}", e),
      })?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(ModelError::Extraction {
        location: location.clone(),
        archive: archive.to_path_buf(),
        message: format!("tar exited with {}: {}", output.status, stderr.trim()),
      });
    }

    find_bin_app_adef(&dest).ok_or_else(|| ModelError::NotFound {
      location: location.clone(),
      what: "app definition in archive",
      name: archive.display().to_string(),
      searched: SearchedDirs(vec![dest]),
    })
  }

  /// Models one `.adef` file. App-level bindings are added to `system`.
  pub fn model_app(&mut self, system: &mut System, adef_path: &Path, name: &str) -> Result<App, ModelError> {
    let adef_path = paths::canonical(adef_path);
    let adef = self.parser.parse_adef(&adef_path)?;
    debug!(app = %name, path = %adef_path.display(), "modelling app");

    let mut app = App::new(name, adef_path.clone());
    let dir = adef_path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut scope = self.enter_dir(&dir);
    scope.model_app_sections(system, &mut app, &adef.sections, &dir)?;
    drop(scope);

    Ok(app)
  }

  fn model_app_sections(
    &mut self,
    system: &mut System,
    app: &mut App,
    sections: &[AdefSection],
    dir: &Path,
  ) -> Result<(), ModelError> {
    // Executables first: everything else refers to them.
    for section in sections {
      if let AdefSection::Executables(s) = section {
        for def in &s.items {
          self.model_executable(app, def, dir)?;
        }
      }
    }

    // App-wide settings, so process sections start from the app's limits.
    let mut defaults = ProcessEnv::default();
    let mut replace_groups = false;
    for section in sections {
      match section {
        AdefSection::Setting(AppSetting::Process(limit)) => self.apply_process_limit(&mut defaults, limit)?,
        AdefSection::Setting(setting) => self.apply_app_setting(app, setting, &mut replace_groups)?,
        _ => {}
      }
    }

    for section in sections {
      match section {
        AdefSection::Requires(s) => {
          for sub in &s.items {
            match sub {
              AppRequiresSubsection::Api(s) => {
                for entry in &s.items {
                  self.add_pre_built_interface(app, entry, dir)?;
                }
              }
            }
          }
        }
        AdefSection::Processes(s) => self.model_processes(app, s, &defaults)?,
        AdefSection::Extern(s) => {
          for entry in &s.items {
            self.add_extern_interface(app, entry)?;
          }
        }
        AdefSection::Version(s) => app.version = Some(self.expand(&s.value)?),
        AdefSection::Executables(_) | AdefSection::Setting(_) | AdefSection::Bindings(_) => {}
      }
    }

    // Bindings last: they refer to extern and pre-built interfaces.
    for section in sections {
      if let AdefSection::Bindings(s) = section {
        for entry in &s.items {
          self.add_app_binding(system, app, entry)?;
        }
      }
    }
    Ok(())
  }

  fn model_executable(&mut self, app: &mut App, def: &ExecutableDef, dir: &Path) -> Result<(), ModelError> {
    let mut exe = Executable::new(def.name.text.clone(), def.name.location.clone());
    let pre_search = [dir.to_path_buf()];
    for token in &def.components {
      if let Some(id) = self.resolve_component(token, &pre_search)? {
        add_component_instance(&self.model, &mut exe, id)?;
      }
    }
    app.executables.push(exe);
    Ok(())
  }

  fn model_processes(
    &self,
    app: &mut App,
    section: &Section<ProcessesSubsection>,
    defaults: &ProcessEnv,
  ) -> Result<(), ModelError> {
    let mut env = defaults.clone();
    for sub in &section.items {
      match sub {
        ProcessesSubsection::Run(s) => {
          for run in &s.items {
            let process = self.model_process(app, run)?;
            env.processes.push(process);
          }
        }
        ProcessesSubsection::EnvVars(s) => {
          for var in &s.items {
            env.env_vars.insert(var.name.text.clone(), self.expand(&var.value)?);
          }
        }
        ProcessesSubsection::Priority(s) => {
          let text = self.expand(&s.value)?;
          env.priority = Some(Priority::parse(&text).ok_or_else(|| {
            ModelError::invalid(s.location(), "priority", &text, "expected idle, low, medium, high or rt1 to rt32")
          })?);
        }
        ProcessesSubsection::Limit(limit) => self.apply_process_limit(&mut env, limit)?,
        ProcessesSubsection::WatchdogAction(s) => env.watchdog_action = Some(self.watchdog_action(s)?),
        ProcessesSubsection::WatchdogTimeout(s) => env.watchdog_timeout = Some(self.watchdog_timeout(s)?),
      }
    }
    app.process_envs.push(env);
    Ok(())
  }

  fn model_process(&self, app: &App, run: &RunDef) -> Result<Process, ModelError> {
    let exe = self.expand(&run.exe)?;
    let exe_path = if app.executable(&exe).is_some() {
      format!("/bin/{}", exe)
    } else if exe.starts_with('/') {
      exe.clone()
    } else {
      return Err(ModelError::not_found(&run.exe.location, "executable", exe));
    };

    let name = match &run.name {
      Some(token) => token.text.clone(),
      None => paths::last_node(&exe),
    };
    let args = run.args.iter().map(|a| self.expand(a)).collect::<Result<_, _>>()?;

    Ok(Process {
      name,
      exe_path,
      args,
      location: run.location.clone(),
    })
  }

  /// `[alias] exe comp if` in an `extern:` section.
  fn add_extern_interface(&self, app: &mut App, entry: &Entry) -> Result<(), ModelError> {
    let (alias, exe, comp, iface) = match entry.tokens.as_slice() {
      [exe, comp, iface] => (None, exe, comp, iface),
      [alias, exe, comp, iface] => (Some(alias), exe, comp, iface),
      _ => return Err(ModelError::internal(&entry.location, "malformed extern interface")),
    };

    let (exe_idx, instance_idx) = self.find_instance(app, exe, comp)?;
    let name = alias.unwrap_or(iface).text.clone();
    let instance = &app.executables[exe_idx].instances[instance_idx];

    if let Some(pos) = instance
      .client_apis
      .iter()
      .position(|c| self.model.interface(c.interface).internal_name == iface.text)
    {
      let r = InterfaceRef {
        exe: exe_idx,
        instance: instance_idx,
        interface: pos,
      };
      app.extern_client_interfaces.insert(name, r);
      return Ok(());
    }

    if let Some(pos) = instance
      .server_apis
      .iter()
      .position(|s| self.model.interface(s.interface).internal_name == iface.text)
    {
      let r = InterfaceRef {
        exe: exe_idx,
        instance: instance_idx,
        interface: pos,
      };
      app.extern_server_interfaces.insert(name, r);
      return Ok(());
    }

    Err(ModelError::InterfaceNotFound {
      location: iface.location.clone(),
      owner: format!("component '{}' in executable '{}'", comp.text, exe.text),
      side: "client or server",
      interface: iface.text.clone(),
    })
  }

  /// Finds the executable and component instance a pair of tokens names.
  pub(crate) fn find_instance(&self, app: &App, exe: &Token, comp: &Token) -> Result<(usize, usize), ModelError> {
    let Some((exe_idx, executable)) = app.executable(&exe.text) else {
      return Err(ModelError::not_found(
        &exe.location,
        "executable",
        format!("{}.{}", app.name, exe.text),
      ));
    };

    let Some(instance_idx) = executable
      .instances
      .iter()
      .position(|i| self.model.component(i.component).name == comp.text)
    else {
      return Err(ModelError::not_found(
        &comp.location,
        "component instance",
        format!("{}.{}.{}", app.name, exe.text, comp.text),
      ));
    };

    Ok((exe_idx, instance_idx))
  }

  /// Finds a component instance's client-side interface by internal name.
  pub(crate) fn find_client_interface(
    &self,
    app: &App,
    exe: &Token,
    comp: &Token,
    iface: &Token,
  ) -> Result<InterfaceRef, ModelError> {
    let (exe_idx, instance_idx) = self.find_instance(app, exe, comp)?;
    let instance = &app.executables[exe_idx].instances[instance_idx];
    let Some(pos) = instance
      .client_apis
      .iter()
      .position(|c| self.model.interface(c.interface).internal_name == iface.text)
    else {
      return Err(ModelError::InterfaceNotFound {
        location: iface.location.clone(),
        owner: format!("component '{}' in executable '{}.{}'", comp.text, app.name, exe.text),
        side: "client-side",
        interface: iface.text.clone(),
      });
    };

    Ok(InterfaceRef {
      exe: exe_idx,
      instance: instance_idx,
      interface: pos,
    })
  }

  /// `requires: api:` entry of an `.adef`.
  fn add_pre_built_interface(&mut self, app: &mut App, entry: &Entry, dir: &Path) -> Result<(), ModelError> {
    let decl = split_api_entry(entry)?;
    let opts = client_options(&entry.location, decl.options)?;
    if opts.types_only {
      return Err(ModelError::invalid(
        &entry.location,
        "pre-built interface option",
        "[types-only]",
        "pre-built interfaces must be bindable",
      ));
    }

    let api = self.resolve_api(decl.path, &[dir.to_path_buf()])?;
    usetypes_closure(&self.model, api, &entry.location)?;
    let name = self.internal_name(decl.alias, api);

    app.pre_built_client_interfaces.insert(
      name.clone(),
      PreBuiltInterface {
        name,
        api_file: api,
        manual_start: opts.manual_start,
        optional: opts.optional,
        binding: None,
        location: entry.location.clone(),
      },
    );
    Ok(())
  }

  /// A `bindings:` entry of an `.adef`: `exe comp if agent if` or `* if agent if`.
  fn add_app_binding(&self, system: &mut System, app: &mut App, entry: &Entry) -> Result<(), ModelError> {
    let (slot, client_name, agent, server_if) = match entry.tokens.as_slice() {
      [star, iface, agent, server_if] if star.is(TokenKind::Star) => {
        if !app.pre_built_client_interfaces.contains_key(&iface.text) {
          return Err(ModelError::InterfaceNotFound {
            location: iface.location.clone(),
            owner: format!("app '{}'", app.name),
            side: "pre-built client-side",
            interface: iface.text.clone(),
          });
        }
        (ClientSlot::PreBuilt(iface.text.clone()), format!("*.{}", iface.text), agent, server_if)
      }
      [exe, comp, iface, agent, server_if] => {
        let r = self.find_client_interface(app, exe, comp, iface)?;
        let name = format!("{}.{}.{}", exe.text, comp.text, iface.text);
        (ClientSlot::Instance(r), name, agent, server_if)
      }
      _ => return Err(ModelError::internal(&entry.location, "malformed binding")),
    };

    let (server_type, server_agent) = server_agent(agent);
    let binding = Binding {
      client_type: ClientType::Internal,
      client_agent: app.name.clone(),
      client_interface: client_name.clone(),
      server_type,
      server_agent,
      server_interface: server_if.text.clone(),
      location: entry.location.clone(),
    };
    let (id, previous) = system.rebind(slot.binding(app), binding);
    slot.set_binding(app, client_name, id);
    if let Some(previous) = previous
      && self.params.verbose
    {
      debug!(
        app = %app.name,
        previous = %previous.location,
        "app binding overrides an earlier binding"
      );
    }
    Ok(())
  }

  /// Applies an `.sdef` app section's overrides. The first `groups` override replaces the app's groups.
  pub(crate) fn apply_overrides(&self, app: &mut App, overrides: &[AppSetting]) -> Result<(), ModelError> {
    let mut replace_groups = true;
    for setting in overrides {
      self.apply_app_setting(app, setting, &mut replace_groups)?;
    }
    Ok(())
  }

  fn apply_app_setting(&self, app: &mut App, setting: &AppSetting, replace_groups: &mut bool) -> Result<(), ModelError> {
    match setting {
      AppSetting::CpuShare(s) => app.limits.cpu_share = self.positive(s, "cpuShare")?,
      AppSetting::Groups(list) => {
        if *replace_groups {
          app.groups.clear();
          *replace_groups = false;
        }
        for token in &list.items {
          let group = self.expand(token)?;
          if !group.is_empty() && !app.groups.contains(&group) {
            app.groups.push(group);
          }
        }
      }
      AppSetting::MaxFileSystemBytes(s) => {
        app.limits.max_file_system_bytes = self.non_negative(s, "maxFileSystemBytes")?
      }
      AppSetting::MaxMemoryBytes(s) => app.limits.max_memory_bytes = self.positive(s, "maxMemoryBytes")?,
      AppSetting::MaxMQueueBytes(s) => app.limits.max_mqueue_bytes = self.non_negative(s, "maxMQueueBytes")?,
      AppSetting::MaxQueuedSignals(s) => app.limits.max_queued_signals = self.non_negative(s, "maxQueuedSignals")?,
      AppSetting::MaxThreads(s) => app.limits.max_threads = self.positive(s, "maxThreads")?,
      AppSetting::MaxSecureStorageBytes(s) => {
        app.limits.max_secure_storage_bytes = self.non_negative(s, "maxSecureStorageBytes")?
      }
      AppSetting::Sandboxed(s) => app.is_sandboxed = self.expand(&s.value)? != "false",
      AppSetting::Start(s) => {
        let text = self.expand(&s.value)?;
        app.start_trigger = StartTrigger::parse(&text)
          .ok_or_else(|| ModelError::invalid(s.location(), "start", &text, "expected auto or manual"))?;
      }
      AppSetting::WatchdogAction(s) => app.watchdog_action = Some(self.watchdog_action(s)?),
      AppSetting::WatchdogTimeout(s) => app.watchdog_timeout = Some(self.watchdog_timeout(s)?),
      AppSetting::Preloaded(s) => {
        let text = self.expand(&s.value)?;
        match text.as_str() {
          "true" => {
            app.is_preloaded = true;
            app.preloaded_md5 = None;
          }
          "false" => {
            app.is_preloaded = false;
            app.preloaded_md5 = None;
          }
          md5 if is_md5(md5) => {
            app.is_preloaded = true;
            app.preloaded_md5 = Some(md5.to_string());
          }
          _ => {
            return Err(ModelError::invalid(
              s.location(),
              "preloaded",
              text,
              "expected true, false or an md5 hash",
            ));
          }
        }
      }
      AppSetting::Process(limit) => {
        for env in &mut app.process_envs {
          self.apply_process_limit(env, limit)?;
        }
      }
    }
    Ok(())
  }

  fn apply_process_limit(&self, env: &mut ProcessEnv, limit: &ProcessLimit) -> Result<(), ModelError> {
    match limit {
      ProcessLimit::FaultAction(s) => {
        let text = self.expand(&s.value)?;
        env.fault_action = Some(FaultAction::parse(&text).ok_or_else(|| {
          ModelError::invalid(
            s.location(),
            "faultAction",
            &text,
            format!("expected one of {}", FaultAction::NAMES.join(", ")),
          )
        })?);
      }
      ProcessLimit::MaxCoreDumpFileBytes(s) => {
        env.limits.max_core_dump_file_bytes = self.non_negative(s, "maxCoreDumpFileBytes")?
      }
      ProcessLimit::MaxFileBytes(s) => env.limits.max_file_bytes = self.non_negative(s, "maxFileBytes")?,
      ProcessLimit::MaxFileDescriptors(s) => {
        env.limits.max_file_descriptors = self.positive(s, "maxFileDescriptors")?
      }
      ProcessLimit::MaxLockedMemoryBytes(s) => {
        env.limits.max_locked_memory_bytes = self.non_negative(s, "maxLockedMemoryBytes")?
      }
      ProcessLimit::MaxPriority(s) => {
        let text = self.expand(&s.value)?;
        env.max_priority = Some(Priority::parse(&text).ok_or_else(|| {
          ModelError::invalid(s.location(), "maxPriority", &text, "expected idle, low, medium, high or rt1 to rt32")
        })?);
      }
    }
    Ok(())
  }

  fn watchdog_action(&self, s: &SimpleSection) -> Result<WatchdogAction, ModelError> {
    let text = self.expand(&s.value)?;
    WatchdogAction::parse(&text).ok_or_else(|| {
      ModelError::invalid(
        s.location(),
        "watchdogAction",
        &text,
        format!("expected one of {}", WatchdogAction::NAMES.join(", ")),
      )
    })
  }

  fn watchdog_timeout(&self, s: &SimpleSection) -> Result<WatchdogTimeout, ModelError> {
    let text = self.expand(&s.value)?;
    WatchdogTimeout::parse(&text).ok_or_else(|| {
      ModelError::invalid(
        s.location(),
        "watchdogTimeout",
        &text,
        "expected a timeout in milliseconds or never",
      )
    })
  }

  fn positive(&self, s: &SimpleSection, setting: &'static str) -> Result<u64, ModelError> {
    let text = self.expand(&s.value)?;
    match parse_integer(&text) {
      Some(n) if n > 0 => Ok(n),
      _ => Err(ModelError::invalid(s.location(), setting, text, "expected a positive integer")),
    }
  }

  fn non_negative(&self, s: &SimpleSection, setting: &'static str) -> Result<u64, ModelError> {
    let text = self.expand(&s.value)?;
    parse_integer(&text)
      .ok_or_else(|| ModelError::invalid(s.location(), setting, text, "expected a non-negative integer"))
  }
}

/// The first `.adef` directly inside `dir`, by file name.
fn find_bin_app_adef(dir: &Path) -> Option<PathBuf> {
  WalkDir::new(dir)
    .min_depth(1)
    .max_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_map(|e| e.ok())
    .find(|e| e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == "adef"))
    .map(|e| e.into_path())
}
