//! Component modelling: one `Component.cdef` into one [`Component`].

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::{Modeller, summary};
use crate::consts::{FRAMEWORK_C_LIB, FRAMEWORK_JAVA_LIB};
use crate::error::{ModelError, SearchedDirs};
use crate::model::{
  Asset, AssetAction, AssetField, Component, ComponentId, FsObject, JavaPackage, ObjectFile, Permissions,
};
use crate::parse_tree::{
  AssetDef, AssetSubsection, BundlesSubsection, CdefSection, Entry, Location, ProvidesSubsection, RequiresSubsection,
  Token, TokenKind,
};
use crate::paths::{self, has_suffix, is_c_source, is_cxx_source, lib_short_name};
use crate::util::hash::path_hash;

const ASSET_TYPES: &[&str] = &["int", "float", "bool", "string"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FsKind {
  File,
  Dir,
}

/// Permissions, source and destination of a file-system entry.
struct FsEntry {
  permissions: Option<Permissions>,
  src: String,
  dest: String,
}

/// Appends the source's file name to destinations that name a directory.
fn dest_path(src: &str, dest: &str) -> PathBuf {
  if dest.ends_with('/') {
    PathBuf::from(format!("{}{}", dest, paths::last_node(src)))
  } else {
    PathBuf::from(dest)
  }
}

impl<'p> Modeller<'p> {
  /// Finds and models the component a token names.
  ///
  /// `pre_search_dirs` are tried before the source search dirs. Returns
  /// `Ok(None)` when the token expands to an empty string.
  pub fn resolve_component(
    &mut self,
    token: &Token,
    pre_search_dirs: &[PathBuf],
  ) -> Result<Option<ComponentId>, ModelError> {
    let name = self.expand(token)?;
    if name.is_empty() {
      return Ok(None);
    }

    let dirs: Vec<PathBuf> = pre_search_dirs
      .iter()
      .chain(self.params.source_dirs.iter())
      .cloned()
      .collect();

    let Some(dir) = paths::find_component(&name, &dirs) else {
      return Err(ModelError::NotFound {
        location: token.location.clone(),
        what: "component",
        name,
        searched: SearchedDirs(dirs),
      });
    };

    self.model_component(&dir).map(Some)
  }

  /// Models the component in `dir`, or hands back the one already modelled there.
  pub fn model_component(&mut self, dir: &Path) -> Result<ComponentId, ModelError> {
    let dir = paths::canonical(dir);
    if let Some(id) = self.model.component_by_dir(&dir) {
      trace!(dir = %dir.display(), "component already modelled");
      return Ok(id);
    }

    let component = Component::new(dir.clone());
    let cdef = self.parser.parse_cdef(&component.def_path)?;
    debug!(component = %component.name, dir = %dir.display(), "modelling component");
    let id = self.model.insert_component(component);

    let mut scope = self.enter_dir(&dir);
    for section in &cdef.sections {
      scope.model_component_section(id, section)?;
    }
    scope.finish_component(id);
    drop(scope);

    if self.params.verbose {
      summary::log_component(&self.model, id);
    }
    Ok(id)
  }

  fn model_component_section(&mut self, id: ComponentId, section: &CdefSection) -> Result<(), ModelError> {
    match section {
      CdefSection::Sources(list) => {
        for token in &list.items {
          self.add_source(id, token)?;
        }
        self.check_language_mix(id, list.location())
      }
      CdefSection::JavaPackage(list) => {
        for token in &list.items {
          self.add_java_package(id, token)?;
        }
        self.check_language_mix(id, list.location())
      }
      CdefSection::CFlags(list) => {
        let flags = self.expand_tokens(&list.items)?;
        self.model.component_mut(id).c_flags.extend(flags);
        Ok(())
      }
      CdefSection::CxxFlags(list) => {
        let flags = self.expand_tokens(&list.items)?;
        self.model.component_mut(id).cxx_flags.extend(flags);
        Ok(())
      }
      CdefSection::LdFlags(list) => {
        let flags = self.expand_tokens(&list.items)?;
        self.model.component_mut(id).ld_flags.extend(flags);
        Ok(())
      }
      CdefSection::Bundles(section) => {
        for sub in &section.items {
          match sub {
            BundlesSubsection::File(s) => {
              for entry in &s.items {
                self.add_bundled_item(id, entry, FsKind::File)?;
              }
            }
            BundlesSubsection::Dir(s) => {
              for entry in &s.items {
                self.add_bundled_item(id, entry, FsKind::Dir)?;
              }
            }
          }
        }
        Ok(())
      }
      CdefSection::Provides(section) => {
        for sub in &section.items {
          match sub {
            ProvidesSubsection::Api(s) => {
              for entry in &s.items {
                self.add_provided_api(id, entry)?;
              }
            }
          }
        }
        Ok(())
      }
      CdefSection::Requires(section) => {
        for sub in &section.items {
          self.model_requires_subsection(id, sub)?;
        }
        Ok(())
      }
      CdefSection::Assets(section) => {
        for asset in &section.items {
          self.add_asset(id, asset)?;
        }
        Ok(())
      }
    }
  }

  fn model_requires_subsection(&mut self, id: ComponentId, sub: &RequiresSubsection) -> Result<(), ModelError> {
    match sub {
      RequiresSubsection::Api(s) => {
        for entry in &s.items {
          self.add_required_api(id, entry)?;
        }
      }
      RequiresSubsection::File(s) => {
        for entry in &s.items {
          let item = self.fs_object(entry)?;
          self.model.component_mut(id).required_files.push(item);
        }
      }
      RequiresSubsection::Dir(s) => {
        for entry in &s.items {
          let item = self.fs_object(entry)?;
          self.model.component_mut(id).required_dirs.push(item);
        }
      }
      RequiresSubsection::Device(s) => {
        for entry in &s.items {
          let item = self.fs_object(entry)?;
          self.model.component_mut(id).required_devices.push(item);
        }
      }
      RequiresSubsection::Component(list) => {
        let dir = self.model.component(id).dir.clone();
        for token in &list.items {
          if let Some(sub_id) = self.resolve_component(token, std::slice::from_ref(&dir))? {
            let component = self.model.component_mut(id);
            if !component.sub_components.contains(&sub_id) {
              component.sub_components.push(sub_id);
            }
          }
        }
      }
      RequiresSubsection::Lib(list) => {
        for token in &list.items {
          self.add_required_lib(id, token)?;
        }
      }
    }
    Ok(())
  }

  fn expand_tokens(&self, tokens: &[Token]) -> Result<Vec<String>, ModelError> {
    tokens.iter().map(|t| self.expand(t)).collect()
  }

  fn add_source(&mut self, id: ComponentId, token: &Token) -> Result<(), ModelError> {
    let text = self.expand(token)?;
    if text.is_empty() {
      return Ok(());
    }

    let component = self.model.component(id);
    let dirs: Vec<PathBuf> = std::iter::once(component.dir.clone())
      .chain(self.params.source_dirs.iter().cloned())
      .collect();

    let Some(source) = paths::find_file(&text, &dirs) else {
      return Err(ModelError::NotFound {
        location: token.location.clone(),
        what: "source file",
        name: text,
        searched: SearchedDirs(dirs),
      });
    };

    let object = ObjectFile {
      object: self
        .params
        .working_dir
        .join(component.obj_dir())
        .join(format!("{}.o", path_hash(&source))),
      source,
    };

    if is_c_source(&text) {
      self.model.component_mut(id).c_object_files.push(object);
    } else if is_cxx_source(&text) {
      self.model.component_mut(id).cxx_object_files.push(object);
    } else {
      return Err(ModelError::invalid(
        &token.location,
        "source file",
        text,
        "unsupported file type, expected .c, .cpp, .cc, .cxx, .C or .c++",
      ));
    }
    Ok(())
  }

  fn add_java_package(&mut self, id: ComponentId, token: &Token) -> Result<(), ModelError> {
    let name = self.expand(token)?;
    if name.is_empty() {
      return Ok(());
    }
    let component = self.model.component_mut(id);
    let base_dir = component.dir.clone();
    component.java_packages.push(JavaPackage { name, base_dir });
    Ok(())
  }

  fn check_language_mix(&self, id: ComponentId, location: &Location) -> Result<(), ModelError> {
    let component = self.model.component(id);
    if component.has_incompatible_language_code() {
      return Err(ModelError::MixedLanguage {
        location: location.clone(),
        component: component.name.clone(),
      });
    }
    Ok(())
  }

  /// Splits `[permissions] source destination` and expands both paths.
  fn fs_entry(&self, entry: &Entry) -> Result<FsEntry, ModelError> {
    let mut tokens = entry.tokens.as_slice();
    let mut permissions = None;
    if let Some(first) = tokens.first()
      && first.is(TokenKind::FilePermissions)
    {
      let parsed = Permissions::parse(&first.text).ok_or_else(|| {
        ModelError::invalid(&first.location, "permissions", &first.text, "expected flags from [rwx]")
      })?;
      permissions = Some(parsed);
      tokens = &tokens[1..];
    }

    let [src, dest] = tokens else {
      return Err(ModelError::internal(
        &entry.location,
        format!("expected source and destination paths, found {} tokens", tokens.len()),
      ));
    };

    Ok(FsEntry {
      permissions,
      src: self.expand(src)?,
      dest: self.expand(dest)?,
    })
  }

  fn fs_object(&self, entry: &Entry) -> Result<FsObject, ModelError> {
    let item = self.fs_entry(entry)?;
    Ok(FsObject {
      dest: dest_path(&item.src, &item.dest),
      src: PathBuf::from(item.src),
      permissions: item.permissions.unwrap_or(Permissions::READ_ONLY),
      location: entry.location.clone(),
    })
  }

  fn add_bundled_item(&mut self, id: ComponentId, entry: &Entry, kind: FsKind) -> Result<(), ModelError> {
    let mut item = self.fs_object(entry)?;
    let component = self.model.component_mut(id);
    let src = component.dir.join(&item.src);

    let (what, ok) = match kind {
      FsKind::File => ("bundled file", src.is_file()),
      FsKind::Dir => ("bundled directory", src.is_dir()),
    };
    if !ok {
      if src.exists() {
        let reason = match kind {
          FsKind::File => "not a regular file",
          FsKind::Dir => "not a directory",
        };
        return Err(ModelError::invalid(&entry.location, what, src.display().to_string(), reason));
      }
      return Err(ModelError::not_found(&entry.location, what, src.display().to_string()));
    }

    item.src = paths::canonical(&src);
    match kind {
      FsKind::File => component.bundled_files.push(item),
      FsKind::Dir => component.bundled_dirs.push(item),
    }
    Ok(())
  }

  fn add_required_lib(&mut self, id: ComponentId, token: &Token) -> Result<(), ModelError> {
    let lib = self.expand(token)?;
    if lib.is_empty() {
      return Ok(());
    }

    let component_dir = self.model.component(id).dir.clone();
    let lib_output_dir = self.params.lib_output_dir.clone();

    if has_suffix(&lib, ".jar") {
      let dirs: Vec<PathBuf> = self
        .params
        .lib_dirs
        .iter()
        .cloned()
        .chain(std::iter::once(component_dir))
        .chain(lib_output_dir)
        .collect();
      let Some(path) = paths::find_file(&lib, &dirs) else {
        return Err(ModelError::NotFound {
          location: token.location.clone(),
          what: "library",
          name: lib,
          searched: SearchedDirs(dirs),
        });
      };
      let component = self.model.component_mut(id);
      component.java_libs.insert(path.display().to_string());
      component.implicit_dependencies.insert(path);
    } else if has_suffix(&lib, ".a") {
      self.model.component_mut(id).static_libs.insert(lib);
    } else if lib.contains(".so") {
      let dirs: Vec<PathBuf> = std::iter::once(component_dir).chain(lib_output_dir).collect();
      let short = lib_short_name(&lib);
      let component = self.model.component_mut(id);
      if let Some(path) = paths::find_file(&lib, &dirs) {
        if let Some(parent) = path.parent() {
          component.ld_flags.push(format!("-L{}", parent.display()));
        }
        component.implicit_dependencies.insert(path);
      }
      component.ld_flags.push(format!("-l{}", short));
    } else {
      self.model.component_mut(id).ld_flags.push(format!("-l{}", lib));
    }
    Ok(())
  }

  fn add_asset(&mut self, id: ComponentId, def: &AssetDef) -> Result<(), ModelError> {
    let mut asset = Asset {
      name: def.name.text.clone(),
      fields: Vec::new(),
    };

    for sub in &def.subsections {
      match sub {
        AssetSubsection::Settings(s) => {
          for entry in &s.items {
            asset.fields.push(asset_field(AssetAction::Setting, entry)?);
          }
        }
        AssetSubsection::Variables(s) => {
          for entry in &s.items {
            asset.fields.push(asset_field(AssetAction::Variable, entry)?);
          }
        }
        AssetSubsection::Commands(list) => {
          for token in &list.items {
            asset.fields.push(AssetField {
              action: AssetAction::Command,
              name: token.text.clone(),
              data_type: String::new(),
              default_value: None,
            });
          }
        }
      }
    }

    self.model.component_mut(id).assets.push(asset);
    Ok(())
  }

  /// Fills in the library and init function once every section is modelled.
  fn finish_component(&mut self, id: ComponentId) {
    let framework_lib_dir = self.params.framework_lib_dir();
    let working_dir = self.params.working_dir.clone();
    let lib_output_dir = self.params.lib_output_dir.clone();

    let component = self.model.component_mut(id);
    let lib_dir = lib_output_dir.unwrap_or_else(|| working_dir.join(&component.working_dir));

    if component.has_c_or_cpp_code() {
      component.lib = Some(lib_dir.join(format!("libComponent_{}.so", component.name)));
      component.init_func_name = Some(format!("_{}_COMPONENT_INIT", component.name));
      if let Some(dir) = framework_lib_dir {
        component.implicit_dependencies.insert(dir.join(FRAMEWORK_C_LIB));
      }
    } else if component.has_java_code() {
      component.lib = Some(lib_dir.join(format!("libComponent_{}.jar", component.name)));
      if let Some(dir) = framework_lib_dir {
        component.implicit_dependencies.insert(dir.join(FRAMEWORK_JAVA_LIB));
      }
    }
  }
}

/// `type name [default]`
fn asset_field(action: AssetAction, entry: &Entry) -> Result<AssetField, ModelError> {
  let (data_type, name, default) = match entry.tokens.as_slice() {
    [data_type, name] => (data_type, name, None),
    [data_type, name, default] => (data_type, name, Some(default)),
    tokens => {
      return Err(ModelError::internal(
        &entry.location,
        format!("expected 'type name [default]', found {} tokens", tokens.len()),
      ));
    }
  };

  if !ASSET_TYPES.contains(&data_type.text.as_str()) {
    return Err(ModelError::invalid(
      &data_type.location,
      "asset field type",
      &data_type.text,
      "expected one of int, float, bool or string",
    ));
  }

  Ok(AssetField {
    action,
    name: name.text.clone(),
    data_type: data_type.text.clone(),
    default_value: default.map(|t| crate::vars::unquote(&t.text).to_string()),
  })
}
