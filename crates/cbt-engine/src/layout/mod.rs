//! Template inheritance
//!
//! Loads a template with its `extends` ancestors and merges their blocks into
//! one document. Supported markers:
//!
//! - `extends NAME`: inherit from another template
//! - `block NAME [hide]` ... `/block`: an overridable region
//! - `parent`: the ancestor's body of the enclosing block
//! - `child`: where an ancestor places the descendant's body
//! - `slot [NAME]` ... `/slot`: a replaceable region with default content
//! - `use NAME k="v"`: insert another block, filling its slots from parameters
//! - `call NAME k="v"` ... `/call` (or `apply`): like `use`, with slot
//!   overrides in the body

pub mod blocks;
pub mod resolver;
pub mod source;

pub use blocks::BlockDef;
pub use resolver::{Dependency, ResolutionContext, ResolvedDocument, Resolver};
pub use source::TemplateSource;
