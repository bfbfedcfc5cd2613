pub mod alert;
pub mod logging;
pub mod protocol;

pub use alert::{AlertError, AlertKey, PERMITTED_MINUTES};
pub use protocol::{ProtocolError, WireMsg, MAX_FRAME_BYTES};
