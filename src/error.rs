//! Error types for rsclearkey.

use std::fmt;

use thiserror::Error;

/// Main error type for rsclearkey operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No license server URL was supplied.
    #[error("License server URL not found")]
    MissingLicenseUrl,

    /// The provisioned key map does not contain the default key id.
    #[error("Missing key id {0} in the DRM configuration")]
    MissingConfiguredKey(String),

    /// A provisioned key could not be decoded.
    #[error("Invalid configured key for key id {kid}: {reason}")]
    InvalidConfiguredKey { kid: String, reason: String },

    /// The license server returned an HTTP error, or the transport failed (-1).
    #[error("License server returned failure (HTTP error {0})")]
    LicenseServerHttpError(i32),

    /// The license server response could not be read to completion.
    #[error("Could not read the license server response")]
    IncompleteResponse,

    /// The license response is not a JSON object.
    #[error("Malformed JSON data in license response")]
    MalformedResponse,

    /// The license server reported an error through a `Message` field.
    #[error("Error in license response: {0}")]
    ServerError(String),

    /// The license response has no `keys` field.
    #[error("No keys in license response")]
    NoKeysInResponse,

    /// The default key id is not part of the license response.
    #[error("Key not found on license server response")]
    KeyNotFoundInResponse,

    /// The AES-128-CTR cipher could not be created.
    #[error("Failed to create the sample decrypter: {0}")]
    CipherInitFailed(String),

    /// Decrypt was called on a session without a cipher.
    #[error("Sample decrypter is not initialized")]
    DecryptorNotInitialized,

    /// The cipher rejected the sample.
    #[error("Failed to decrypt sample: {0}")]
    DecryptFailed(String),

    /// A key id could not be parsed or has the wrong length.
    #[error("Invalid key id: {0}")]
    InvalidKeyId(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    /// Hex decode error.
    #[error("Hex decode error: {0}")]
    HexDecodeError(#[from] hex::FromHexError),

    /// Transport level failure outside of the license status code.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration file is invalid.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Too many sessions are open.
    #[error("Too many sessions open (max {max})")]
    TooManySessions { max: usize },

    /// No session is associated with the key id.
    #[error("No session for key id {0}")]
    InvalidSession(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse failure classes, used by callers to decide between dropping a
/// sample, rebuilding a session, or fixing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Protocol,
    KeyResolution,
    CipherInit,
    Decryption,
    Codec,
    Host,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Transport => "transport error",
            ErrorKind::Protocol => "protocol error",
            ErrorKind::KeyResolution => "key resolution error",
            ErrorKind::CipherInit => "cipher init error",
            ErrorKind::Decryption => "decryption error",
            ErrorKind::Codec => "codec error",
            ErrorKind::Host => "host error",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingLicenseUrl
            | Error::MissingConfiguredKey(_)
            | Error::InvalidConfiguredKey { .. }
            | Error::InvalidConfig(_) => ErrorKind::Configuration,
            Error::LicenseServerHttpError(_) | Error::IncompleteResponse | Error::Transport(_) => {
                ErrorKind::Transport
            }
            Error::MalformedResponse | Error::ServerError(_) | Error::NoKeysInResponse => {
                ErrorKind::Protocol
            }
            Error::KeyNotFoundInResponse => ErrorKind::KeyResolution,
            Error::CipherInitFailed(_) => ErrorKind::CipherInit,
            Error::DecryptorNotInitialized | Error::DecryptFailed(_) => ErrorKind::Decryption,
            Error::InvalidKeyId(_) | Error::Base64DecodeError(_) | Error::HexDecodeError(_) => {
                ErrorKind::Codec
            }
            Error::TooManySessions { .. } | Error::InvalidSession(_) | Error::IoError(_) => {
                ErrorKind::Host
            }
        }
    }
}

/// Result type alias for rsclearkey operations.
pub type Result<T> = std::result::Result<T, Error>;
