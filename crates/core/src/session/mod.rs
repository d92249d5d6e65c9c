//! Session authentication against the ticketing platform.

mod citsmart;
mod manager;
mod traits;
mod types;

pub use citsmart::CitsmartAuthenticator;
pub use manager::SessionManager;
pub use traits::*;
pub use types::*;
