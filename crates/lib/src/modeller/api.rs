//! API file resolution, memoisation and interface declarations.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::Modeller;
use crate::error::{ModelError, SearchedDirs};
use crate::model::{ApiFile, ApiFileId, ComponentId, Interface, InterfaceKind, Model};
use crate::parse_tree::{Entry, Location, Token, TokenKind};
use crate::paths;

/// An interface declaration split into its parts.
pub(crate) struct ApiDecl<'t> {
  pub alias: Option<&'t Token>,
  pub path: &'t Token,
  pub options: &'t [Token],
}

/// `[alias] api_file [options...]`
pub(crate) fn split_api_entry(entry: &Entry) -> Result<ApiDecl<'_>, ModelError> {
  match entry.tokens.as_slice() {
    [alias, path, options @ ..] if alias.is(TokenKind::Name) && path.is(TokenKind::FilePath) => Ok(ApiDecl {
      alias: Some(alias),
      path,
      options,
    }),
    [path, options @ ..] if path.is(TokenKind::FilePath) => Ok(ApiDecl {
      alias: None,
      path,
      options,
    }),
    _ => Err(ModelError::internal(&entry.location, "malformed interface declaration")),
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ClientOptions {
  pub types_only: bool,
  pub manual_start: bool,
  pub optional: bool,
}

/// Reads `[types-only]`, `[manual-start]` and `[optional]`. `[optional]` implies manual start.
pub(crate) fn client_options(location: &Location, options: &[Token]) -> Result<ClientOptions, ModelError> {
  let mut opts = ClientOptions::default();
  for option in options {
    if !option.is(TokenKind::ClientIpcOption) {
      return Err(ModelError::internal(&option.location, "expected a client interface option"));
    }
    match option.text.as_str() {
      "[types-only]" => opts.types_only = true,
      "[manual-start]" => opts.manual_start = true,
      "[optional]" => {
        opts.optional = true;
        opts.manual_start = true;
      }
      other => {
        return Err(ModelError::invalid(
          &option.location,
          "client interface option",
          other,
          "expected [types-only], [manual-start] or [optional]",
        ));
      }
    }
  }

  if opts.types_only && opts.manual_start {
    return Err(ModelError::Conflict {
      location: location.clone(),
      message: "[types-only] cannot be combined with [manual-start] or [optional]".to_string(),
    });
  }
  Ok(opts)
}

/// Reads `[async]` and `[manual-start]`, returning `(is_async, manual_start)`.
fn server_options(options: &[Token]) -> Result<(bool, bool), ModelError> {
  let mut is_async = false;
  let mut manual_start = false;
  for option in options {
    if !option.is(TokenKind::ServerIpcOption) {
      return Err(ModelError::internal(&option.location, "expected a server interface option"));
    }
    match option.text.as_str() {
      "[async]" => is_async = true,
      "[manual-start]" => manual_start = true,
      other => {
        return Err(ModelError::invalid(
          &option.location,
          "server interface option",
          other,
          "expected [async] or [manual-start]",
        ));
      }
    }
  }
  Ok((is_async, manual_start))
}

/// Every API file reachable from `api` through `USETYPES`, excluding `api` itself.
///
/// # Errors
///
/// Returns a cycle error if an API file uses its own types, directly or not.
pub fn usetypes_closure(model: &Model, api: ApiFileId, location: &Location) -> Result<BTreeSet<ApiFileId>, ModelError> {
  let mut in_progress = Vec::new();
  let mut done = BTreeSet::new();
  visit_usetypes(model, api, location, &mut in_progress, &mut done)?;
  Ok(done)
}

fn visit_usetypes(
  model: &Model,
  api: ApiFileId,
  location: &Location,
  in_progress: &mut Vec<ApiFileId>,
  done: &mut BTreeSet<ApiFileId>,
) -> Result<(), ModelError> {
  if let Some(pos) = in_progress.iter().position(|a| *a == api) {
    let chain = in_progress[pos..]
      .iter()
      .chain(std::iter::once(&api))
      .map(|id| paths::last_node(&model.api_file(*id).path.to_string_lossy()))
      .collect::<Vec<_>>()
      .join(" -> ");
    return Err(ModelError::Cycle {
      location: location.clone(),
      what: "USETYPES",
      chain,
    });
  }

  in_progress.push(api);
  for include in &model.api_file(api).includes {
    if done.contains(include) {
      continue;
    }
    visit_usetypes(model, *include, location, in_progress, done)?;
    done.insert(*include);
  }
  in_progress.pop();
  Ok(())
}

impl<'p> Modeller<'p> {
  /// Finds the API file a token names and models it.
  ///
  /// `pre_search_dirs` are tried before the interface search dirs.
  pub fn resolve_api(&mut self, token: &Token, pre_search_dirs: &[PathBuf]) -> Result<ApiFileId, ModelError> {
    let name = self.expand(token)?;
    let dirs: Vec<PathBuf> = pre_search_dirs
      .iter()
      .chain(self.params.interface_dirs.iter())
      .cloned()
      .collect();

    let Some(path) = paths::find_file(&name, &dirs) else {
      return Err(ModelError::NotFound {
        location: token.location.clone(),
        what: "API file",
        name,
        searched: SearchedDirs(dirs),
      });
    };

    self.model_api_file(&path, &token.location)
  }

  /// Models an API file and everything it names in `USETYPES`, once per canonical path.
  pub fn model_api_file(&mut self, path: &Path, location: &Location) -> Result<ApiFileId, ModelError> {
    let path = paths::canonical(path);
    if let Some(id) = self.model.api_file_by_path(&path) {
      trace!(api = %path.display(), "API file already modelled");
      return Ok(id);
    }

    let header = self.parser.parse_api(&path)?;
    debug!(api = %path.display(), prefix = %header.default_prefix, "modelling API file");
    let id = self.model.insert_api_file(ApiFile::new(path.clone(), header.default_prefix));

    let dirs: Vec<PathBuf> = path
      .parent()
      .map(Path::to_path_buf)
      .into_iter()
      .chain(self.params.interface_dirs.iter().cloned())
      .collect();

    let mut includes = Vec::new();
    for name in &header.usetypes {
      let Some(include) = paths::find_file(name, &dirs) else {
        return Err(ModelError::NotFound {
          location: location.clone(),
          what: "API file",
          name: format!("{} (used by {})", name, path.display()),
          searched: SearchedDirs(dirs),
        });
      };
      includes.push(self.model_api_file(&include, location)?);
    }
    self.model.api_file_mut(id).includes = includes;

    Ok(id)
  }

  /// `provides: api:` entry.
  pub(crate) fn add_provided_api(&mut self, id: ComponentId, entry: &Entry) -> Result<(), ModelError> {
    let decl = split_api_entry(entry)?;
    let (is_async, manual_start) = server_options(decl.options)?;

    let dir = self.model.component(id).dir.clone();
    let api = self.resolve_api(decl.path, std::slice::from_ref(&dir))?;
    let usetypes = usetypes_closure(&self.model, api, &entry.location)?;
    let internal_name = self.internal_name(decl.alias, api);

    let interface = self.model.insert_interface(Interface {
      kind: InterfaceKind::Server { is_async, manual_start },
      internal_name,
      component: id,
      api_file: api,
      location: entry.location.clone(),
    });

    let component = self.model.component_mut(id);
    component.server_apis.push(interface);
    component.server_usetypes_apis.extend(usetypes);
    Ok(())
  }

  /// `requires: api:` entry.
  pub(crate) fn add_required_api(&mut self, id: ComponentId, entry: &Entry) -> Result<(), ModelError> {
    let decl = split_api_entry(entry)?;
    // Option conflicts are reported before anything is resolved or created.
    let opts = client_options(&entry.location, decl.options)?;

    let dir = self.model.component(id).dir.clone();
    let api = self.resolve_api(decl.path, std::slice::from_ref(&dir))?;
    let usetypes = usetypes_closure(&self.model, api, &entry.location)?;

    let kind = if opts.types_only {
      InterfaceKind::TypesOnly
    } else {
      InterfaceKind::Client {
        manual_start: opts.manual_start,
        optional: opts.optional,
      }
    };
    let internal_name = self.internal_name(decl.alias, api);
    let interface = self.model.insert_interface(Interface {
      kind,
      internal_name,
      component: id,
      api_file: api,
      location: entry.location.clone(),
    });

    let component = self.model.component_mut(id);
    if opts.types_only {
      component.types_only_apis.push(interface);
    } else {
      component.client_apis.push(interface);
    }
    component.client_usetypes_apis.extend(usetypes);
    Ok(())
  }

  pub(crate) fn internal_name(&self, alias: Option<&Token>, api: ApiFileId) -> String {
    match alias {
      Some(token) => token.text.clone(),
      None => self.model.api_file(api).default_prefix.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::ErrorKind;
  use crate::params::BuildParams;
  use crate::parse_tree::memory::MemoryParser;
  use crate::parse_tree::{CdefFile, CdefSection, ProvidesSubsection, RequiresSubsection, Section};
  use std::fs;
  use tempfile::TempDir;

  fn tok(kind: TokenKind, text: &str) -> Token {
    Token::new(kind, text, Location::new("Component.cdef", 4, 3))
  }

  fn entry(tokens: Vec<Token>) -> Entry {
    Entry::new(Location::new("Component.cdef", 4, 3), tokens)
  }

  struct Fixture {
    _temp: TempDir,
    comp_dir: PathBuf,
    if_dir: PathBuf,
  }

  fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let comp_dir = temp.path().join("comp");
    let if_dir = temp.path().join("interfaces");
    fs::create_dir_all(&comp_dir).unwrap();
    fs::create_dir_all(&if_dir).unwrap();
    fs::write(comp_dir.join("Component.cdef"), "").unwrap();
    Fixture {
      _temp: temp,
      comp_dir,
      if_dir,
    }
  }

  fn requires(entries: Vec<Entry>) -> CdefSection {
    CdefSection::Requires(Section::new(
      tok(TokenKind::Name, "requires"),
      vec![RequiresSubsection::Api(Section::new(tok(TokenKind::Name, "api"), entries))],
    ))
  }

  fn provides(entries: Vec<Entry>) -> CdefSection {
    CdefSection::Provides(Section::new(
      tok(TokenKind::Name, "provides"),
      vec![ProvidesSubsection::Api(Section::new(tok(TokenKind::Name, "api"), entries))],
    ))
  }

  fn parser_for(f: &Fixture, sections: Vec<CdefSection>) -> MemoryParser {
    MemoryParser::new().with_cdef(CdefFile {
      path: f.comp_dir.join("Component.cdef"),
      sections,
    })
  }

  mod cache {
    use super::*;

    #[test]
    fn api_files_are_memoised_and_closed_over() {
      let f = fixture();
      fs::write(f.if_dir.join("a.api"), "USETYPES b.api;\nUSETYPES c.api;\n").unwrap();
      fs::write(f.if_dir.join("b.api"), "USETYPES d.api;\n").unwrap();
      fs::write(f.if_dir.join("c.api"), "USETYPES d.api;\n").unwrap();
      fs::write(f.if_dir.join("d.api"), "").unwrap();

      let parser = MemoryParser::new();
      let params = BuildParams::default().with_interface_dir(&f.if_dir);
      let mut modeller = Modeller::new(params, &parser);

      let token = tok(TokenKind::FilePath, "a.api");
      let a = modeller.resolve_api(&token, &[]).unwrap();
      let again = modeller.resolve_api(&token, &[]).unwrap();
      assert_eq!(a, again);
      assert_eq!(modeller.model().api_files().count(), 4);

      let closure = usetypes_closure(modeller.model(), a, &token.location).unwrap();
      assert_eq!(closure.len(), 3);
      assert!(!closure.contains(&a));
    }

    #[test]
    fn usetypes_cycle_is_detected() {
      let f = fixture();
      fs::write(f.if_dir.join("x.api"), "USETYPES y.api;\n").unwrap();
      fs::write(f.if_dir.join("y.api"), "USETYPES x.api;\n").unwrap();

      let parser = MemoryParser::new();
      let params = BuildParams::default().with_interface_dir(&f.if_dir);
      let mut modeller = Modeller::new(params, &parser);

      let token = tok(TokenKind::FilePath, "x.api");
      let x = modeller.resolve_api(&token, &[]).unwrap();
      let err = usetypes_closure(modeller.model(), x, &token.location).unwrap_err();
      assert_eq!(err.kind(), ErrorKind::Cycle);
      assert!(err.to_string().contains("x.api -> y.api -> x.api"));
    }

    #[test]
    fn missing_api_names_the_path() {
      let f = fixture();
      let parser = MemoryParser::new();
      let params = BuildParams::default().with_interface_dir(&f.if_dir);
      let mut modeller = Modeller::new(params, &parser);

      let err = modeller
        .resolve_api(&tok(TokenKind::FilePath, "le_missing.api"), &[])
        .unwrap_err();
      assert_eq!(err.kind(), ErrorKind::NotFound);
      assert!(err.to_string().contains("le_missing.api"));
    }
  }

  mod declarations {
    use super::*;

    #[test]
    fn alias_defaults_to_prefix() {
      let f = fixture();
      fs::write(f.if_dir.join("le_info.api"), "").unwrap();
      let parser = parser_for(
        &f,
        vec![
          provides(vec![entry(vec![
            tok(TokenKind::FilePath, "le_info.api"),
            tok(TokenKind::ServerIpcOption, "[async]"),
          ])]),
          requires(vec![entry(vec![
            tok(TokenKind::Name, "info"),
            tok(TokenKind::FilePath, "le_info.api"),
            tok(TokenKind::ClientIpcOption, "[optional]"),
          ])]),
        ],
      );

      let params = BuildParams::default().with_interface_dir(&f.if_dir);
      let mut modeller = Modeller::new(params, &parser);
      let id = modeller.model_component(&f.comp_dir).unwrap();
      let model = modeller.model();
      let component = model.component(id);

      let server = model.interface(component.server_apis[0]);
      assert_eq!(server.internal_name, "le_info");
      assert_eq!(
        server.kind,
        InterfaceKind::Server {
          is_async: true,
          manual_start: false
        }
      );

      let client = model.interface(component.client_apis[0]);
      assert_eq!(client.internal_name, "info");
      assert_eq!(
        client.kind,
        InterfaceKind::Client {
          manual_start: true,
          optional: true
        }
      );
      assert_eq!(server.api_file, client.api_file);
    }

    #[test]
    fn types_only_with_optional_fails_before_interface_creation() {
      let f = fixture();
      fs::write(f.if_dir.join("le_t.api"), "").unwrap();
      let parser = parser_for(
        &f,
        vec![requires(vec![entry(vec![
          tok(TokenKind::FilePath, "le_t.api"),
          tok(TokenKind::ClientIpcOption, "[types-only]"),
          tok(TokenKind::ClientIpcOption, "[optional]"),
        ])])],
      );

      let params = BuildParams::default().with_interface_dir(&f.if_dir);
      let mut modeller = Modeller::new(params, &parser);
      let err = modeller.model_component(&f.comp_dir).unwrap_err();
      assert_eq!(err.kind(), ErrorKind::Conflict);
      assert_eq!(modeller.model().interfaces().count(), 0);
      assert_eq!(modeller.model().api_files().count(), 0);
    }

    #[test]
    fn types_only_merges_usetypes_into_client_set() {
      let f = fixture();
      fs::write(f.if_dir.join("le_t.api"), "USETYPES le_base.api;\n").unwrap();
      fs::write(f.if_dir.join("le_base.api"), "").unwrap();
      let parser = parser_for(
        &f,
        vec![requires(vec![entry(vec![
          tok(TokenKind::FilePath, "le_t.api"),
          tok(TokenKind::ClientIpcOption, "[types-only]"),
        ])])],
      );

      let params = BuildParams::default().with_interface_dir(&f.if_dir);
      let mut modeller = Modeller::new(params, &parser);
      let id = modeller.model_component(&f.comp_dir).unwrap();
      let component = modeller.model().component(id);
      assert_eq!(component.types_only_apis.len(), 1);
      assert!(component.client_apis.is_empty());
      assert_eq!(component.client_usetypes_apis.len(), 1);
    }

    #[test]
    fn unknown_server_option_is_invalid() {
      let f = fixture();
      fs::write(f.if_dir.join("le_s.api"), "").unwrap();
      let parser = parser_for(
        &f,
        vec![provides(vec![entry(vec![
          tok(TokenKind::FilePath, "le_s.api"),
          tok(TokenKind::ServerIpcOption, "[fast]"),
        ])])],
      );

      let params = BuildParams::default().with_interface_dir(&f.if_dir);
      let mut modeller = Modeller::new(params, &parser);
      assert_eq!(modeller.model_component(&f.comp_dir).unwrap_err().kind(), ErrorKind::Invalid);
    }

    #[test]
    fn component_dir_is_searched_first() {
      let f = fixture();
      fs::write(f.comp_dir.join("local.api"), "").unwrap();
      let parser = parser_for(
        &f,
        vec![provides(vec![entry(vec![tok(TokenKind::FilePath, "local.api")])])],
      );

      let mut modeller = Modeller::new(BuildParams::default(), &parser);
      let id = modeller.model_component(&f.comp_dir).unwrap();
      assert_eq!(modeller.model().component(id).server_apis.len(), 1);
    }
  }
}
