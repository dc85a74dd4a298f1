//! Gateway protocol definitions
//!
//! Op codes, the frame envelope, payloads and close codes, from the client's
//! side of the socket.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{CloseCode, RecoveryAction};
pub use messages::{GatewayMessage, READY_EVENT, RESUMED_EVENT};
pub use opcodes::OpCode;
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, ReadyPayload, ResumePayload,
};
