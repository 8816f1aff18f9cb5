//! Data models for treelock.
//!
//! Lock wire types use camelCase; graph-store types match the graph service's snake_case JSON.

mod context;
mod lease;
mod media;
mod member;
mod relations;

pub use context::*;
pub use lease::*;
pub use media::*;
pub use member::*;
pub use relations::*;
