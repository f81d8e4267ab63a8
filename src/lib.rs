#[macro_use]
extern crate lazy_static;

pub mod error;
pub mod graph;
pub mod join;
pub mod report;
pub mod schema;
pub mod scope;
pub mod tools;

pub use crate::join::{JoinResult, Joiner, JoinerOptions};
pub use crate::schema::{ParsedSpec, Schema, SourceFormat, SourceMap, SpecVersion};

pub const VERSION: &str = "0.2.1";
