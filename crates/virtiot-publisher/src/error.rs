use std::borrow::Cow;

/// All publisher error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration.
    Config,
    /// Errors while loading TLS credentials from files.
    Credentials,
    /// Errors while retrieving or decoding the secret document.
    Secret,
    /// Errors reported by the transport.
    Transport,
    /// Errors while serializing a reading.
    Serialization,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::Config => "Configuration",
            Self::Credentials => "Credentials",
            Self::Secret => "Secret",
            Self::Transport => "Transport",
            Self::Serialization => "Serialization",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// A publisher error.
#[derive(PartialEq)]
pub struct Error {
    kind: ErrorKind,
    info: Cow<'static, str>,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.error())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.error())
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description.
    #[inline]
    pub fn new(kind: ErrorKind, info: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            info: info.into(),
        }
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error description.
    #[must_use]
    pub fn info(&self) -> &str {
        &self.info
    }

    /// Returns the whole error message.
    #[must_use]
    pub fn error(&self) -> String {
        format!("{}: {}", self.kind, self.info)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization, e.to_string())
    }
}

impl From<rumqttc::v5::ClientError> for Error {
    fn from(e: rumqttc::v5::ClientError) -> Self {
        Self::new(ErrorKind::Transport, e.to_string())
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn error_message() {
        let error = Error::new(ErrorKind::Secret, "missing field `Cert`");
        assert_eq!(error.kind(), ErrorKind::Secret);
        assert_eq!(error.info(), "missing field `Cert`");
        assert_eq!(error.to_string(), "Secret: missing field `Cert`");
        assert_eq!(format!("{error:?}"), "Secret: missing field `Cert`");
    }

    #[test]
    fn conversions() {
        let json = serde_json::from_str::<u8>("{").unwrap_err();
        assert_eq!(Error::from(json).kind(), ErrorKind::Serialization);
    }
}
