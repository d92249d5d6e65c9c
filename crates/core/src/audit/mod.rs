mod file;
mod handle;
mod record;
mod sqlite;
mod store;

pub use file::*;
pub use handle::*;
pub use record::*;
pub use sqlite::*;
pub use store::*;
