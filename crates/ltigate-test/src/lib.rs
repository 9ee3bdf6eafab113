//! Test harness for ltigate.
//!
//! Provides a `MockPlatform` (an LMS stand-in serving a key set, a token
//! endpoint and line-item score endpoints), signing keys and id_token
//! minting for token launches, and OAuth 1.0a form signing for legacy
//! launches.

pub mod keys;
pub mod legacy;
pub mod platform;
pub mod token;

pub use keys::{EcKeyPair, RsaKeyPair, TokenSigner};
pub use platform::MockPlatform;
