//! Session token generation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Random bytes per token (256 bits of entropy)
pub const TOKEN_BYTES: usize = 32;

/// Generate an unguessable, URL-safe session token.
///
/// The bytes come from the thread-local CSPRNG and are encoded as
/// base64url without padding.
pub fn generate_token() -> String {
    let random_bytes: [u8; TOKEN_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}
