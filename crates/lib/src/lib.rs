//! sysdef-lib: the conceptual model behind a system build
//!
//! This crate turns parsed definition files into one in-memory model that
//! build-script and code generators consume:
//! - `parse_tree`: typed trees for `.cdef`, `.adef`, `.mdef` and `.sdef` files
//! - `model`: components, API files, interfaces, apps, bindings and the `System`
//! - `modeller`: the passes that resolve, validate and link it all together
//!
//! The usual entry point is [`model_system`].

pub mod consts;
pub mod error;
pub mod model;
pub mod modeller;
pub mod params;
pub mod parse_tree;
pub mod paths;
pub mod util;
pub mod vars;

pub use error::{ErrorKind, ModelError};
pub use model::{Model, System};
pub use modeller::{Modeller, model_system};
pub use params::BuildParams;
pub use parse_tree::DefinitionParser;
