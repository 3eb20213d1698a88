// Slack request verification and response delivery

pub mod respond;
pub mod verify;

pub use respond::{DeliveryError, DeliveryTarget, SlackResponder};
pub use verify::{verify_signature, SignatureError, SIGNATURE_HEADER, TIMESTAMP_HEADER};
