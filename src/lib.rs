//! Typed argument lists over flat, string-keyed forms.
//!
//! An argspec declares positional `args` and keyword `kwargs` as a
//! possibly nested schema. This crate goes both ways across a flat form:
//!
//! - [`describe`] projects the schema to field descriptors a renderer
//!   turns into inputs (`arg-child`, `arg[0]`, ...);
//! - [`decode`] rebuilds a typed value tree from the submitted
//!   `key → [value, type]` pairs, casting leaves through the closed
//!   type whitelist in [`cast`].
//!
//! ```
//! use argform::{decode, ArgSpec, CodecConfig, FlatForm};
//!
//! let spec: ArgSpec = r#"{
//!     "args": [{"name": "a", "type": "dict", "values": {
//!         "x": {"type": "int"}, "y": {"type": "str"}
//!     }}]
//! }"#.parse().unwrap();
//! let form = FlatForm::new().with("a-x", ["5", "int"]);
//! let out = decode(&spec, &form, &CodecConfig::default()).unwrap();
//! assert_eq!(
//!     serde_json::to_value(&out.arguments).unwrap(),
//!     serde_json::json!({"args": [{"x": 5, "y": null}], "kwargs": {}})
//! );
//! ```
pub mod cast;
pub mod config;
pub mod decode;
pub mod describe;
pub mod error;
pub mod form;
pub mod path_de;
pub mod schema;
pub mod sources;
pub mod value;

pub use cast::{cast, NativeType};
pub use config::CodecConfig;
pub use decode::{decode, decode_one, Arguments, Decoded, Diagnostic};
pub use describe::{describe_argspec, Describer, FieldDescriptor, FieldKind, FormDescriptor};
pub use error::{CastError, DecodeError, DescribeError, Error, SchemaError, SourceError};
pub use form::FlatForm;
pub use schema::{ArgSpec, SchemaNode, Shape, TypeDescriptor};
pub use sources::{SourceRegistry, StaticSource};
pub use value::{Slot, Value};
