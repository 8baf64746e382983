/*!
Subcommand dispatcher.

  descriptor.rs  (CommandDescriptor, ArgSpec, OptionSpec, Arity + validation)
  convert.rs     (raw string -> serde_json::Value converters)
  registry.rs    (Registry, Subcommand trait, FnCommand, Call, prefix helpers)
  parser.rs      (dispatch: clap parser generation, binding, invocation)
*/

pub mod convert;
pub mod descriptor;
pub mod parser;
pub mod registry;

pub use descriptor::{ArgSpec, Arity, CommandDescriptor, OptionSpec};
pub use parser::{Dispatched, dispatch};
pub use registry::{Call, FnCommand, Registry, Subcommand};
