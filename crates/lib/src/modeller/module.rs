//! Kernel modules named in `kernelModules:` sections.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::Modeller;
use crate::error::{ModelError, SearchedDirs};
use crate::model::{LoadTrigger, Module, System};
use crate::parse_tree::{Location, MdefSection, Token};
use crate::paths::{self, has_suffix, remove_suffix};

impl<'p> Modeller<'p> {
  /// Finds the `.mdef` a token names and adds the module to the system.
  ///
  /// A bare name gets `.mdef` appended. Modules are never looked up as archives.
  pub fn resolve_module(&mut self, system: &mut System, token: &Token) -> Result<(), ModelError> {
    let text = self.expand(token)?;
    if text.is_empty() {
      return Ok(());
    }

    let file = if has_suffix(&text, ".mdef") {
      text.clone()
    } else {
      format!("{}.mdef", text)
    };
    let Some(path) = paths::find_file(&file, &self.params.source_dirs) else {
      return Err(ModelError::NotFound {
        location: token.location.clone(),
        what: "kernel module",
        name: text,
        searched: SearchedDirs(self.params.source_dirs.clone()),
      });
    };

    let name = remove_suffix(&paths::last_node(&path.to_string_lossy()), ".mdef").to_string();
    if let Some(existing) = system.modules.get(&name) {
      return Err(ModelError::Duplicate {
        location: token.location.clone(),
        what: "kernel module",
        name,
        previous: existing.declared_at.clone(),
      });
    }

    let module = self.model_module(&path, &name, &token.location)?;
    system.modules.insert(name, module);
    Ok(())
  }

  pub fn model_module(&mut self, mdef_path: &Path, name: &str, declared_at: &Location) -> Result<Module, ModelError> {
    let mdef_path = paths::canonical(mdef_path);
    let mdef = self.parser.parse_mdef(&mdef_path)?;
    debug!(module = %name, path = %mdef_path.display(), "modelling kernel module");

    let dir = mdef_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut module = Module {
      name: name.to_string(),
      def_path: mdef_path.clone(),
      declared_at: declared_at.clone(),
      objects: Vec::new(),
      params: BTreeMap::new(),
      load: LoadTrigger::default(),
    };

    let scope = self.enter_dir(&dir);
    for section in &mdef.sections {
      match section {
        MdefSection::PreBuilt(list) => {
          for token in &list.items {
            if let Some(object) = scope.pre_built_object(token, &dir)? {
              module.objects.push(object);
            }
          }
        }
        MdefSection::Params(s) => {
          for param in &s.items {
            module.params.insert(param.name.text.clone(), scope.expand(&param.value)?);
          }
        }
        MdefSection::Load(s) => {
          let text = scope.expand(&s.value)?;
          module.load = match text.as_str() {
            "auto" => LoadTrigger::Auto,
            "manual" => LoadTrigger::Manual,
            _ => return Err(ModelError::invalid(s.location(), "load", text, "expected auto or manual")),
          };
        }
      }
    }
    drop(scope);

    Ok(module)
  }

  fn pre_built_object(&self, token: &Token, dir: &Path) -> Result<Option<PathBuf>, ModelError> {
    let text = self.expand(token)?;
    if text.is_empty() {
      return Ok(None);
    }
    if !has_suffix(&text, ".ko") {
      return Err(ModelError::invalid(
        &token.location,
        "pre-built kernel object",
        text,
        "expected a .ko file",
      ));
    }

    let path = dir.join(&text);
    if !path.is_file() {
      return Err(ModelError::NotFound {
        location: token.location.clone(),
        what: "kernel object",
        name: text,
        searched: SearchedDirs(vec![dir.to_path_buf()]),
      });
    }
    Ok(Some(paths::canonical(&path)))
  }
}
