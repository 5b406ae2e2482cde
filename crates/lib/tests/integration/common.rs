//! Shared helpers for modelling whole systems from in-memory trees.

use std::path::{Path, PathBuf};

use sysdef_lib::parse_tree::{
  AdefFile, AdefSection, AppRequiresSubsection, AppSpec, CdefFile, CdefSection, Entry, ExecutableDef, Location,
  ProvidesSubsection, RequiresSubsection, SdefFile, SdefSection, Section, Token, TokenKind, TokenList,
};
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary directory. Definition files are created
/// empty on disk so their trees can be registered by canonical path.
pub struct TestEnv {
  pub temp: TempDir,
  pub root: PathBuf,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    Self { temp, root }
  }

  /// Create an empty file relative to the root and return its path.
  pub fn touch(&self, relative_path: &str) -> PathBuf {
    let path = self.root.join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, "").unwrap();
    path
  }

  pub fn component(&self, dir: &str, sections: Vec<CdefSection>) -> CdefFile {
    CdefFile {
      path: self.touch(&format!("{dir}/Component.cdef")),
      sections,
    }
  }

  pub fn adef(&self, name: &str, sections: Vec<AdefSection>) -> AdefFile {
    AdefFile {
      path: self.touch(&format!("{name}.adef")),
      sections,
    }
  }

  pub fn sdef(&self, name: &str, sections: Vec<SdefSection>) -> SdefFile {
    SdefFile {
      path: self.touch(&format!("{name}.sdef")),
      sections,
    }
  }
}

pub fn loc(file: &str, line: usize) -> Location {
  Location::new(file, line, 1)
}

pub fn tok(kind: TokenKind, text: &str) -> Token {
  Token::new(kind, text, loc("test.def", 1))
}

pub fn name(text: &str) -> Token {
  tok(TokenKind::Name, text)
}

pub fn path(text: &str) -> Token {
  tok(TokenKind::FilePath, text)
}

pub fn agent(text: &str) -> Token {
  tok(TokenKind::IpcAgent, text)
}

pub fn entry(file: &str, line: usize, tokens: Vec<Token>) -> Entry {
  Entry::new(loc(file, line), tokens)
}

pub fn list(keyword: &str, items: Vec<Token>) -> TokenList {
  TokenList::new(name(keyword), items)
}

/// `requires: api:` with one entry per interface declaration.
pub fn requires_api(decls: Vec<Vec<Token>>) -> CdefSection {
  let entries = decls
    .into_iter()
    .enumerate()
    .map(|(i, tokens)| entry("Component.cdef", i + 3, tokens))
    .collect();
  CdefSection::Requires(Section::new(
    name("requires"),
    vec![RequiresSubsection::Api(Section::new(name("api"), entries))],
  ))
}

pub fn requires_component(components: &[&str]) -> CdefSection {
  CdefSection::Requires(Section::new(
    name("requires"),
    vec![RequiresSubsection::Component(list(
      "component",
      components.iter().map(|c| path(c)).collect(),
    ))],
  ))
}

pub fn provides_api(decls: Vec<Vec<Token>>) -> CdefSection {
  let entries = decls
    .into_iter()
    .enumerate()
    .map(|(i, tokens)| entry("Component.cdef", i + 3, tokens))
    .collect();
  CdefSection::Provides(Section::new(
    name("provides"),
    vec![ProvidesSubsection::Api(Section::new(name("api"), entries))],
  ))
}

pub fn executables(exes: &[(&str, &[&str])]) -> AdefSection {
  AdefSection::Executables(Section::new(
    name("executables"),
    exes
      .iter()
      .map(|(exe, components)| ExecutableDef {
        name: name(exe),
        components: components.iter().map(|c| path(c)).collect(),
      })
      .collect(),
  ))
}

pub fn extern_section(entries: Vec<Vec<Token>>) -> AdefSection {
  AdefSection::Extern(Section::new(
    name("extern"),
    entries
      .into_iter()
      .enumerate()
      .map(|(i, tokens)| entry("app.adef", i + 10, tokens))
      .collect(),
  ))
}

pub fn pre_built_api(decl: Vec<Token>) -> AdefSection {
  AdefSection::Requires(Section::new(
    name("requires"),
    vec![AppRequiresSubsection::Api(Section::new(
      name("api"),
      vec![entry("app.adef", 20, decl)],
    ))],
  ))
}

/// An `.adef` `bindings:` section, numbered from line 30.
pub fn adef_bindings(entries: Vec<Vec<Token>>) -> AdefSection {
  AdefSection::Bindings(Section::new(
    name("bindings"),
    entries
      .into_iter()
      .enumerate()
      .map(|(i, tokens)| entry("app.adef", i + 30, tokens))
      .collect(),
  ))
}

pub fn apps(specs: &[&str]) -> SdefSection {
  SdefSection::Apps(Section::new(
    name("apps"),
    specs
      .iter()
      .enumerate()
      .map(|(i, spec)| AppSpec {
        spec: Token::new(TokenKind::FilePath, *spec, loc("system.sdef", i + 2)),
        overrides: vec![],
      })
      .collect(),
  ))
}

/// One `bindings:` entry per token list, numbered from line 10 of `system.sdef`.
pub fn bindings(entries: Vec<Vec<Token>>) -> SdefSection {
  SdefSection::Bindings(Section::new(
    name("bindings"),
    entries
      .into_iter()
      .enumerate()
      .map(|(i, tokens)| entry("system.sdef", i + 10, tokens))
      .collect(),
  ))
}

pub fn interface_search(dirs: &[&str]) -> SdefSection {
  SdefSection::InterfaceSearch(list("interfaceSearch", dirs.iter().map(|d| path(d)).collect()))
}

pub fn contains_dir(dirs: &[PathBuf], dir: &Path) -> bool {
  dirs.iter().any(|d| d == dir)
}
