//! Variable context for `$NAME` substitution in definition files.
//!
//! Lookups go through three layers: build variables set by `.sdef` files and
//! the framework's own variables, then `CURDIR`, then the process
//! environment. Undefined names expand to the empty string.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::params::BuildParams;

pub const CURDIR: &str = "CURDIR";

/// Variables that definition files may read but never set.
pub const RESERVED_VARS: &[&str] = &[
  "FRAMEWORK_ROOT",
  "FRAMEWORK_TARGET",
  "FRAMEWORK_BUILD",
  "FRAMEWORK_SYSROOT",
  CURDIR,
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VarError {
  #[error("variable '{name}' is reserved and cannot be set")]
  Reserved { name: String },

  #[error("unterminated '${{' in '{text}'")]
  Unterminated { text: String },

  #[error("invalid variable name in '{text}'")]
  InvalidName { text: String },
}

pub fn is_reserved(name: &str) -> bool {
  RESERVED_VARS.contains(&name)
}

/// Strips one pair of matching single or double quotes.
pub fn unquote(text: &str) -> &str {
  let bytes = text.as_bytes();
  if bytes.len() >= 2 {
    let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
    if first == last && (first == b'"' || first == b'\'') {
      return &text[1..text.len() - 1];
    }
  }
  text
}

pub fn is_single_quoted(text: &str) -> bool {
  text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'')
}

fn is_name_start(c: char) -> bool {
  c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_'
}

#[derive(Debug, Clone, Default)]
pub struct Vars {
  /// Set by the framework from the build parameters.
  builtins: BTreeMap<String, String>,
  /// Set by `buildVars` sections.
  build_vars: BTreeMap<String, String>,
  curdir: Option<PathBuf>,
}

impl Vars {
  pub fn new(params: &BuildParams) -> Self {
    let mut builtins = BTreeMap::new();
    builtins.insert("FRAMEWORK_TARGET".to_string(), params.target.clone());
    builtins.insert("FRAMEWORK_BUILD".to_string(), params.working_dir.display().to_string());
    if let Some(root) = &params.framework_root {
      builtins.insert("FRAMEWORK_ROOT".to_string(), root.display().to_string());
    }
    Self {
      builtins,
      build_vars: BTreeMap::new(),
      curdir: None,
    }
  }

  pub fn get(&self, name: &str) -> Option<String> {
    if let Some(value) = self.build_vars.get(name).or_else(|| self.builtins.get(name)) {
      return Some(value.clone());
    }
    if name == CURDIR {
      return self.curdir.as_ref().map(|d| d.display().to_string());
    }
    std::env::var(name).ok()
  }

  /// Sets a build variable. Reserved names are rejected.
  pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<(), VarError> {
    if is_reserved(name) {
      return Err(VarError::Reserved { name: name.to_string() });
    }
    self.build_vars.insert(name.to_string(), value.into());
    Ok(())
  }

  pub fn build_vars(&self) -> &BTreeMap<String, String> {
    &self.build_vars
  }

  pub fn curdir(&self) -> Option<&Path> {
    self.curdir.as_deref()
  }

  /// Swaps in a new `CURDIR`, returning the previous one.
  pub fn replace_curdir(&mut self, dir: Option<PathBuf>) -> Option<PathBuf> {
    std::mem::replace(&mut self.curdir, dir)
  }

  /// Expands `$NAME` and `${NAME}` references.
  ///
  /// A `$` that is not followed by a name is kept as-is.
  pub fn substitute(&self, text: &str) -> Result<String, VarError> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
      if c != '$' {
        out.push(c);
        continue;
      }

      match chars.peek().copied() {
        Some((start, '{')) => {
          chars.next();
          let rest = &text[start + 1..];
          let Some(end) = rest.find('}') else {
            return Err(VarError::Unterminated { text: text.to_string() });
          };
          let name = &rest[..end];
          if !name.starts_with(is_name_start) || !name.chars().all(is_name_char) {
            return Err(VarError::InvalidName { text: text.to_string() });
          }
          out.push_str(&self.get(name).unwrap_or_default());
          for _ in 0..=name.chars().count() {
            chars.next();
          }
        }
        Some((start, next)) if is_name_start(next) => {
          let mut end = start;
          while let Some((i, c)) = chars.peek().copied() {
            if !is_name_char(c) {
              break;
            }
            end = i + c.len_utf8();
            chars.next();
          }
          out.push_str(&self.get(&text[start..end]).unwrap_or_default());
        }
        _ => out.push('$'),
      }
    }

    Ok(out)
  }

  /// Unquotes a token's text and expands variables in it. Single-quoted text is taken literally.
  pub fn expand(&self, text: &str) -> Result<String, VarError> {
    if is_single_quoted(text) {
      return Ok(unquote(text).to_string());
    }
    self.substitute(unquote(text))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  mod substitute {
    use super::*;

    #[test]
    fn expands_both_forms() {
      let mut vars = Vars::default();
      vars.set("APP", "hello").unwrap();
      assert_eq!(vars.substitute("$APP/${APP}_x").unwrap(), "hello/hello_x");
    }

    #[test]
    #[serial]
    fn undefined_expands_to_empty() {
      let vars = Vars::default();
      temp_env::with_var_unset("SYSDEF_TEST_UNDEFINED", || {
        assert_eq!(vars.substitute("a${SYSDEF_TEST_UNDEFINED}b").unwrap(), "ab");
      });
    }

    #[test]
    fn lone_dollar_is_kept() {
      let vars = Vars::default();
      assert_eq!(vars.substitute("cost $5 $").unwrap(), "cost $5 $");
    }

    #[test]
    fn unterminated_brace_is_error() {
      let vars = Vars::default();
      assert!(matches!(
        vars.substitute("${OOPS").unwrap_err(),
        VarError::Unterminated { .. }
      ));
    }

    #[test]
    fn curdir_comes_from_scope() {
      let mut vars = Vars::default();
      vars.replace_curdir(Some(PathBuf::from("/src/comp")));
      assert_eq!(vars.substitute("$CURDIR/x.c").unwrap(), "/src/comp/x.c");
    }

    #[test]
    #[serial]
    fn falls_back_to_process_env() {
      temp_env::with_var("SYSDEF_TEST_VAR", Some("from_env"), || {
        let vars = Vars::default();
        assert_eq!(vars.substitute("${SYSDEF_TEST_VAR}").unwrap(), "from_env");
      });
    }

    #[test]
    #[serial]
    fn build_vars_shadow_process_env() {
      temp_env::with_var("SYSDEF_TEST_VAR", Some("from_env"), || {
        let mut vars = Vars::default();
        vars.set("SYSDEF_TEST_VAR", "from_sdef").unwrap();
        assert_eq!(vars.substitute("$SYSDEF_TEST_VAR").unwrap(), "from_sdef");
      });
    }
  }

  mod expand {
    use super::*;

    #[test]
    fn single_quotes_are_literal() {
      let mut vars = Vars::default();
      vars.set("X", "1").unwrap();
      assert_eq!(vars.expand("'$X'").unwrap(), "$X");
      assert_eq!(vars.expand("\"$X\"").unwrap(), "1");
    }
  }

  mod reserved {
    use super::*;

    #[test]
    fn cannot_set_reserved_names() {
      let mut vars = Vars::default();
      for name in RESERVED_VARS {
        assert_eq!(
          vars.set(name, "x").unwrap_err(),
          VarError::Reserved { name: name.to_string() }
        );
      }
    }

    #[test]
    fn builtins_come_from_params() {
      let params = BuildParams::default().with_target("wp85").with_framework_root("/fw");
      let vars = Vars::new(&params);
      assert_eq!(vars.get("FRAMEWORK_TARGET").as_deref(), Some("wp85"));
      assert_eq!(vars.get("FRAMEWORK_ROOT").as_deref(), Some("/fw"));
    }
  }
}
