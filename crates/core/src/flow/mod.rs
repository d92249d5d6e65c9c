//! Open and close flows.
//!
//! Each flow reads the correlation marker, performs at most one ticket
//! transition, records the result on the event and appends one audit record.
//! Every failure is audited before it is returned.

mod close;
mod context;
mod open;
mod types;

pub use close::CloseFlow;
pub use context::FlowContext;
pub use open::OpenFlow;
pub use types::*;
