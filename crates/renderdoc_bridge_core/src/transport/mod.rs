//! Wire-level pieces shared by the client and the extension's servers.

pub mod file_slot;
pub mod framing;

pub use file_slot::FileSlot;
pub use framing::{read_frame, write_frame, MAX_FRAME_LEN};
