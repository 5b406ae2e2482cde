//! Assembles a [`System`] from an `.sdef` file.
//!
//! `buildVars` take effect first so every later section sees them. The rest
//! run in a fixed order: search paths, apps, app binding checks, system
//! bindings, the completeness check, commands, then kernel modules.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{Modeller, summary};
use crate::error::ModelError;
use crate::model::{Command, System};
use crate::params::BuildParams;
use crate::parse_tree::{Assignment, CommandSpec, DefinitionParser, SdefSection, Token};
use crate::paths::{self, remove_suffix};

/// Models the system defined at `sdef_path`.
///
/// Search paths added by the `.sdef` are written back into `params`, even
/// when modelling fails part way.
pub fn model_system(
  sdef_path: &Path,
  params: &mut BuildParams,
  parser: &dyn DefinitionParser,
) -> Result<System, ModelError> {
  let mut modeller = Modeller::new(params.clone(), parser);
  let result = modeller.build_system(sdef_path);
  *params = modeller.into_params();
  result
}

impl<'p> Modeller<'p> {
  pub fn build_system(&mut self, sdef_path: &Path) -> Result<System, ModelError> {
    let sdef_path = paths::canonical(sdef_path);
    let sdef = self.parser.parse_sdef(&sdef_path)?;
    let name = remove_suffix(&paths::last_node(&sdef_path.to_string_lossy()), ".sdef").to_string();
    info!(system = %name, path = %sdef_path.display(), "modelling system");

    let dir = sdef_path.parent().map(Path::to_path_buf).unwrap_or_default();
    if !self.params.source_dirs.contains(&dir) {
      self.params.source_dirs.push(dir.clone());
    }

    let mut system = System::new(name, sdef_path.clone());
    let mut scope = self.enter_dir(&dir);
    scope.model_system_sections(&mut system, &sdef.sections, &dir)?;
    drop(scope);

    system.build_vars = self.vars.build_vars().clone();
    system.model = std::mem::take(&mut self.model);

    if self.params.verbose {
      summary::log_system(&system);
    }
    Ok(system)
  }

  fn model_system_sections(
    &mut self,
    system: &mut System,
    sections: &[SdefSection],
    dir: &Path,
  ) -> Result<(), ModelError> {
    for section in sections {
      if let SdefSection::BuildVars(s) = section {
        for var in &s.items {
          self.set_build_var(var)?;
        }
      }
    }

    for section in sections {
      match section {
        SdefSection::InterfaceSearch(list) => {
          for token in &list.items {
            if let Some(path) = self.search_dir(token, dir)?
              && !self.params.interface_dirs.contains(&path)
            {
              self.params.interface_dirs.push(path);
            }
          }
        }
        SdefSection::LibSearch(list) => {
          for token in &list.items {
            if let Some(path) = self.search_dir(token, dir)?
              && !self.params.lib_dirs.contains(&path)
            {
              self.params.lib_dirs.push(path);
            }
          }
        }
        _ => {}
      }
    }

    for section in sections {
      if let SdefSection::Apps(s) = section {
        for spec in &s.items {
          self.resolve_app(system, spec)?;
        }
      }
    }

    for section in sections {
      if let SdefSection::Bindings(s) = section {
        for entry in &s.items {
          self.resolve_binding(system, entry)?;
        }
      }
    }
    self.check_app_binding_servers(system)?;
    self.check_bindings_complete(system)?;

    for section in sections {
      if let SdefSection::Commands(s) = section {
        for command in &s.items {
          self.model_command(system, command)?;
        }
      }
    }

    for section in sections {
      if let SdefSection::KernelModules(list) = section {
        for token in &list.items {
          self.resolve_module(system, token)?;
        }
      }
    }
    Ok(())
  }

  fn set_build_var(&mut self, var: &Assignment) -> Result<(), ModelError> {
    let value = self.expand(&var.value)?;
    debug!(name = %var.name.text, value = %value, "setting build variable");
    self
      .vars
      .set(&var.name.text, value)
      .map_err(|source| ModelError::Variable {
        location: var.name.location.clone(),
        source,
      })
  }

  /// Expands a search path token. Relative paths are taken from the `.sdef` directory.
  fn search_dir(&self, token: &Token, dir: &Path) -> Result<Option<PathBuf>, ModelError> {
    let text = self.expand(token)?;
    if text.is_empty() {
      return Ok(None);
    }
    Ok(Some(dir.join(text)))
  }

  fn model_command(&self, system: &mut System, spec: &CommandSpec) -> Result<(), ModelError> {
    let name = self.expand(&spec.name)?;
    let exe_path = self.expand(&spec.exe_path)?;

    if !system.apps.contains_key(&spec.app.text) {
      return Err(ModelError::not_found(&spec.app.location, "app", spec.app.text.clone()));
    }
    if !exe_path.starts_with('/') {
      return Err(ModelError::invalid(
        &spec.exe_path.location,
        "command executable path",
        exe_path,
        "must be an absolute path inside the app",
      ));
    }
    if let Some(existing) = system.commands.get(&name) {
      return Err(ModelError::Duplicate {
        location: spec.location.clone(),
        what: "command",
        name,
        previous: existing.location.clone(),
      });
    }

    system.commands.insert(
      name.clone(),
      Command {
        name,
        app: spec.app.text.clone(),
        exe_path,
        location: spec.location.clone(),
      },
    );
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;
  use crate::model::App;
  use crate::parse_tree::memory::MemoryParser;
  use crate::parse_tree::{Location, TokenKind};

  fn tok(kind: TokenKind, text: &str, line: usize) -> Token {
    Token::new(kind, text, Location::new("sys.sdef", line, 3))
  }

  fn command(line: usize, name: &str, app: &str, exe: &str) -> CommandSpec {
    CommandSpec {
      location: Location::new("sys.sdef", line, 3),
      name: tok(TokenKind::Name, name, line),
      app: tok(TokenKind::Name, app, line),
      exe_path: tok(TokenKind::FilePath, exe, line),
    }
  }

  fn system() -> System {
    let mut system = System::new("sys", PathBuf::from("/sys.sdef"));
    system
      .apps
      .insert("tools".into(), App::new("tools", PathBuf::from("/apps/tools.adef")));
    system
  }

  #[test]
  fn commands_are_validated() {
    let parser = MemoryParser::new();
    let modeller = Modeller::new(BuildParams::default(), &parser);
    let mut system = system();

    modeller
      .model_command(&mut system, &command(3, "cm", "tools", "/bin/cm"))
      .unwrap();
    assert_eq!(system.commands["cm"].exe_path, "/bin/cm");

    let cases = [
      (command(4, "cm", "tools", "/bin/other"), ErrorKind::Duplicate),
      (command(5, "x", "ghost", "/bin/x"), ErrorKind::NotFound),
      (command(6, "y", "tools", "bin/y"), ErrorKind::Invalid),
    ];
    for (spec, kind) in cases {
      let err = modeller.model_command(&mut system, &spec).unwrap_err();
      assert_eq!(err.kind(), kind, "{err}");
    }
  }

  #[test]
  fn reserved_build_var_is_rejected() {
    let parser = MemoryParser::new();
    let mut modeller = Modeller::new(BuildParams::default(), &parser);
    let var = Assignment::new(
      tok(TokenKind::EnvVarName, "CURDIR", 2),
      tok(TokenKind::Text, "/elsewhere", 2),
    );
    let err = modeller.set_build_var(&var).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);
    assert_eq!(err.location().map(|l| l.line), Some(2));
  }

  #[test]
  fn build_vars_see_earlier_build_vars() {
    let parser = MemoryParser::new();
    let mut modeller = Modeller::new(BuildParams::default(), &parser);
    modeller
      .set_build_var(&Assignment::new(
        tok(TokenKind::EnvVarName, "BASE", 2),
        tok(TokenKind::Text, "/opt", 2),
      ))
      .unwrap();
    modeller
      .set_build_var(&Assignment::new(
        tok(TokenKind::EnvVarName, "TOOLS", 3),
        tok(TokenKind::Text, "\"${BASE}/tools\"", 3),
      ))
      .unwrap();
    modeller
      .set_build_var(&Assignment::new(
        tok(TokenKind::EnvVarName, "RAW", 4),
        tok(TokenKind::Text, "'$BASE'", 4),
      ))
      .unwrap();

    assert_eq!(modeller.vars().get("TOOLS").as_deref(), Some("/opt/tools"));
    assert_eq!(modeller.vars().get("RAW").as_deref(), Some("$BASE"));
  }
}
