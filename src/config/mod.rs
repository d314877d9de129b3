//! Template registry: declarative documents become named, reusable templates
//!
//! - `schema`: per-class required fields, defaults and initialization hooks
//! - `registry`: the template arena (define, reference, copy, placeholders)
//! - `loader`: YAML documents and config directory trees
//! - `view`: typed getters and the [`FromTemplate`] trait

mod error;
mod loader;
mod registry;
mod schema;
mod value;
mod view;

pub use error::ConfigError;
pub use loader::CATEGORY_ORDER;
pub use registry::{Registry, Template, TemplateId};
pub use schema::{ClassSchema, InitializeHook, builtin_schemas};
pub use value::{Fields, Value};
pub use view::{FromTemplate, TemplateView};
