/// Application name
pub const APP_NAME: &str = "Gramkeep";

/// AES-256 key size in bytes
pub const SESSION_KEY_SIZE: usize = 32;

/// Hex length of a session key (two chars per byte)
pub const SESSION_KEY_HEX_LEN: usize = 64;

/// AES-CBC initialisation vector size in bytes
pub const IV_SIZE: usize = 16;

/// Separator between the IV and ciphertext halves of an envelope
pub const ENVELOPE_SEPARATOR: char = ':';

/// Default number of saved messages fetched per sync pass
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Maximum media download size in bytes (50 MiB)
pub const MAX_MEDIA_SIZE: usize = 50 * 1024 * 1024;
