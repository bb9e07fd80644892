/*
[INPUT]:  Credentials and provider auth endpoint
[OUTPUT]: Bearer tokens and auth errors
[POS]:    Auth layer - token acquisition before each connect
[UPDATE]: When auth flow changes
*/

pub mod authenticator;

pub use authenticator::{Authenticator, HttpAuthenticator};
