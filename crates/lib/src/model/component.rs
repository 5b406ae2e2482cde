use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{ApiFileId, ComponentId, InterfaceId};
use crate::consts::COMPONENT_DEF_FILE;
use crate::parse_tree::Location;
use crate::paths::last_node;

/// A source file and the object file it compiles to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectFile {
  pub source: PathBuf,
  /// Relative to the build's working directory.
  pub object: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JavaPackage {
  pub name: String,
  pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Permissions {
  pub read: bool,
  pub write: bool,
  pub execute: bool,
}

impl Permissions {
  pub const READ_ONLY: Permissions = Permissions {
    read: true,
    write: false,
    execute: false,
  };

  /// Parses `[rwx]`-style flags. Returns `None` on any other character.
  pub fn parse(text: &str) -> Option<Self> {
    let inner = text.strip_prefix('[')?.strip_suffix(']')?;
    let mut perms = Permissions::default();
    for c in inner.chars() {
      match c {
        'r' => perms.read = true,
        'w' => perms.write = true,
        'x' => perms.execute = true,
        _ => return None,
      }
    }
    Some(perms)
  }
}

impl fmt::Display for Permissions {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[")?;
    if self.read {
      write!(f, "r")?;
    }
    if self.write {
      write!(f, "w")?;
    }
    if self.execute {
      write!(f, "x")?;
    }
    write!(f, "]")
  }
}

/// A file, directory or device that is bundled into or required by an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FsObject {
  pub src: PathBuf,
  pub dest: PathBuf,
  pub permissions: Permissions,
  pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssetAction {
  Setting,
  Variable,
  Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetField {
  pub action: AssetAction,
  pub name: String,
  /// Empty for commands.
  pub data_type: String,
  pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
  pub name: String,
  pub fields: Vec<AssetField>,
}

/// A reusable unit of code, identified by its directory.
#[derive(Debug, Clone, Serialize)]
pub struct Component {
  pub name: String,
  pub dir: PathBuf,
  pub def_path: PathBuf,
  /// Relative to the build's working directory.
  pub working_dir: PathBuf,

  pub lib: Option<PathBuf>,
  pub init_func_name: Option<String>,

  pub c_object_files: Vec<ObjectFile>,
  pub cxx_object_files: Vec<ObjectFile>,
  pub java_packages: Vec<JavaPackage>,

  pub c_flags: Vec<String>,
  pub cxx_flags: Vec<String>,
  pub ld_flags: Vec<String>,
  pub static_libs: BTreeSet<String>,
  pub java_libs: BTreeSet<String>,

  pub bundled_files: Vec<FsObject>,
  pub bundled_dirs: Vec<FsObject>,
  pub required_files: Vec<FsObject>,
  pub required_dirs: Vec<FsObject>,
  pub required_devices: Vec<FsObject>,

  /// In declaration order.
  pub sub_components: Vec<ComponentId>,

  pub server_apis: Vec<InterfaceId>,
  pub client_apis: Vec<InterfaceId>,
  pub types_only_apis: Vec<InterfaceId>,
  pub server_usetypes_apis: BTreeSet<ApiFileId>,
  pub client_usetypes_apis: BTreeSet<ApiFileId>,

  /// Files outside the component whose change must trigger a rebuild.
  pub implicit_dependencies: BTreeSet<PathBuf>,
  pub assets: Vec<Asset>,
}

impl Component {
  pub fn new(dir: PathBuf) -> Self {
    let name = last_node(&dir.to_string_lossy());
    Self {
      def_path: dir.join(COMPONENT_DEF_FILE),
      working_dir: Path::new("component").join(&name),
      name,
      dir,
      lib: None,
      init_func_name: None,
      c_object_files: Vec::new(),
      cxx_object_files: Vec::new(),
      java_packages: Vec::new(),
      c_flags: Vec::new(),
      cxx_flags: Vec::new(),
      ld_flags: Vec::new(),
      static_libs: BTreeSet::new(),
      java_libs: BTreeSet::new(),
      bundled_files: Vec::new(),
      bundled_dirs: Vec::new(),
      required_files: Vec::new(),
      required_dirs: Vec::new(),
      required_devices: Vec::new(),
      sub_components: Vec::new(),
      server_apis: Vec::new(),
      client_apis: Vec::new(),
      types_only_apis: Vec::new(),
      server_usetypes_apis: BTreeSet::new(),
      client_usetypes_apis: BTreeSet::new(),
      implicit_dependencies: BTreeSet::new(),
      assets: Vec::new(),
    }
  }

  pub fn has_c_code(&self) -> bool {
    !self.c_object_files.is_empty()
  }

  pub fn has_cpp_code(&self) -> bool {
    !self.cxx_object_files.is_empty()
  }

  pub fn has_c_or_cpp_code(&self) -> bool {
    self.has_c_code() || self.has_cpp_code()
  }

  pub fn has_java_code(&self) -> bool {
    !self.java_packages.is_empty()
  }

  pub fn has_incompatible_language_code(&self) -> bool {
    self.has_c_or_cpp_code() && self.has_java_code()
  }

  /// Directory object files and (by default) the component library are built in.
  pub fn obj_dir(&self) -> PathBuf {
    self.working_dir.join("obj")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn name_and_working_dir_come_from_dir() {
    let component = Component::new(PathBuf::from("/src/components/printer"));
    assert_eq!(component.name, "printer");
    assert_eq!(component.working_dir, PathBuf::from("component/printer"));
    assert_eq!(component.obj_dir(), PathBuf::from("component/printer/obj"));
    assert_eq!(component.def_path, PathBuf::from("/src/components/printer/Component.cdef"));
  }

  #[test]
  fn permissions_parse() {
    let perms = Permissions::parse("[rw]").unwrap();
    assert!(perms.read && perms.write && !perms.execute);
    assert_eq!(perms.to_string(), "[rw]");
    assert!(Permissions::parse("[rq]").is_none());
    assert!(Permissions::parse("rw").is_none());
  }
}
