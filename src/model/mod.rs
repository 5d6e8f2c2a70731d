//! Data model: the DTOs that flow between the lexer/parser, pipeline
//! executor, pattern matcher, and virtual catalog.
//!
//! Design rule inherited from the teacher crate: pure data only, no I/O,
//! no async, no storage coupling.

pub mod node;
pub mod path;
pub mod property_map;
pub mod relationship;
pub mod value;

pub use node::NodeRecord;
pub use path::Path;
pub use property_map::PropertyMap;
pub use relationship::{Direction, RelationshipMatch, RelationshipRecord};
pub use value::{flow_cmp, IsoDuration, Value};
