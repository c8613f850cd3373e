pub mod db;
pub mod diff;
pub mod snapshot;

pub use db::*;
pub use diff::*;
pub use snapshot::*;
