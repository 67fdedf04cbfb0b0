//! Validation schema → JSON-Schema-ish descriptor.
//!
//! - [`node`]: input model (`SchemaNode`) and the `SchemaSource` view the
//!   translator reads through.
//! - [`translate`]: the recursive translation itself.
//! - [`descriptor`]: output model, serializable with serde.
//! - [`dsl`] / [`path_de`] / [`jq_exec`]: ways to obtain a node from text.
//! - [`convert`]: text in, descriptor (or one readable error) out.
pub mod cli;
pub mod convert;
pub mod descriptor;
pub mod dsl;
pub mod jq_exec;
pub mod node;
pub mod path_de;
pub mod translate;

pub use convert::{convert_source, ConvertError, InputFormat, Options};
pub use descriptor::{Descriptor, DescriptorType, Format};
pub use node::{DefaultValue, NodeView, NumberCheck, SchemaNode, SchemaSource, StringCheck};
pub use translate::{translate, TranslateError, Translator};
