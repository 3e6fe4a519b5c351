use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use serde::Deserialize;

use tracing::{debug, error};

use crate::error::{Error, ErrorKind, Result};

// Every PEM document starts with this marker.
const PEM_BEGIN: &[u8] = b"-----BEGIN ";
// Closes the PEM label.
const PEM_DASHES: &str = "-----";

fn secret_error(error: impl Into<Cow<'static, str>>) -> Error {
    Error::new(ErrorKind::Secret, error)
}

/// Returns the label of a PEM document, such as `CERTIFICATE`.
///
/// Leading whitespace is ignored. [`None`] is returned when the bytes do not
/// start with a PEM header.
#[must_use]
pub fn pem_label(pem: &[u8]) -> Option<&str> {
    let start = pem.iter().position(|byte| !byte.is_ascii_whitespace())?;
    let header = pem[start..].strip_prefix(PEM_BEGIN)?;
    let line = header.split(|byte| *byte == b'\n').next()?;
    let label = std::str::from_utf8(line).ok()?.trim_end();
    label.strip_suffix(PEM_DASHES)
}

/// The raw PEM material needed for a mutual TLS connection.
#[derive(Clone, PartialEq)]
pub struct TlsMaterial {
    /// Client private key.
    pub private_key: Vec<u8>,
    /// Client certificate.
    pub certificate: Vec<u8>,
    /// Root certificate authority.
    pub root_ca: Vec<u8>,
}

// The private key never ends up in logs.
impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("private_key", &format_args!("<{} bytes>", self.private_key.len()))
            .field("certificate", &format_args!("<{} bytes>", self.certificate.len()))
            .field("root_ca", &format_args!("<{} bytes>", self.root_ca.len()))
            .finish()
    }
}

impl TlsMaterial {
    /// Creates a [`TlsMaterial`] from PEM bytes.
    ///
    /// # Errors
    ///
    /// An error of the given kind is returned when one of the inputs is not a
    /// PEM document.
    pub fn new(
        private_key: Vec<u8>,
        certificate: Vec<u8>,
        root_ca: Vec<u8>,
        kind: ErrorKind,
    ) -> Result<Self> {
        for (name, pem) in [
            ("private key", &private_key),
            ("certificate", &certificate),
            ("root CA", &root_ca),
        ] {
            if pem_label(pem).is_none() {
                return Err(Error::new(
                    kind,
                    format!("The {name} is not a PEM document"),
                ));
            }
        }

        Ok(Self {
            private_key,
            certificate,
            root_ca,
        })
    }

    /// Reads a [`TlsMaterial`] from three PEM files.
    ///
    /// # Errors
    ///
    /// An error is returned when a file cannot be read or does not contain a
    /// PEM document.
    pub fn from_files(
        private_key: impl AsRef<Path>,
        certificate: impl AsRef<Path>,
        root_ca: impl AsRef<Path>,
    ) -> Result<Self> {
        Self::new(
            read_pem_file(private_key.as_ref())?,
            read_pem_file(certificate.as_ref())?,
            read_pem_file(root_ca.as_ref())?,
            ErrorKind::Credentials,
        )
    }
}

fn read_pem_file(path: &Path) -> Result<Vec<u8>> {
    debug!("Reading credentials from `{}`", path.display());
    fs::read(path).map_err(|e| {
        Error::new(
            ErrorKind::Credentials,
            format!("Impossible to read `{}`: {e}", path.display()),
        )
    })
}

/// The secret document holding base64-encoded TLS credentials.
///
/// Its `JSON` form is
/// `{"PrivateKey": "<base64>", "Cert": "<base64>", "AmazonRootCA": "<base64>"}`.
#[derive(Clone, PartialEq, Deserialize)]
pub struct SecretBundle {
    #[serde(rename = "PrivateKey")]
    private_key: String,
    #[serde(rename = "Cert")]
    certificate: String,
    #[serde(rename = "AmazonRootCA")]
    root_ca: String,
}

impl std::fmt::Debug for SecretBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBundle").finish_non_exhaustive()
    }
}

impl SecretBundle {
    /// Parses a [`SecretBundle`] from its `JSON` document.
    ///
    /// # Errors
    ///
    /// An error is returned when the document is not valid `JSON` or lacks
    /// one of the expected fields.
    pub fn parse(document: &str) -> Result<Self> {
        serde_json::from_str(document)
            .map_err(|e| secret_error(format!("Invalid secret document: {e}")))
    }

    /// Decodes the base64 fields into a [`TlsMaterial`].
    ///
    /// Whitespace inside the encoded fields is ignored.
    ///
    /// # Errors
    ///
    /// An error is returned when a field is not valid base64 or does not
    /// decode to a PEM document.
    pub fn decode(&self) -> Result<TlsMaterial> {
        TlsMaterial::new(
            decode_field("PrivateKey", &self.private_key)?,
            decode_field("Cert", &self.certificate)?,
            decode_field("AmazonRootCA", &self.root_ca)?,
            ErrorKind::Secret,
        )
    }
}

fn decode_field(name: &str, encoded: &str) -> Result<Vec<u8>> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|e| secret_error(format!("Field `{name}` is not valid base64: {e}")))
}

/// A store of named secrets.
pub trait SecretSource {
    /// Returns the secret document stored under `name` in `region`.
    ///
    /// # Errors
    ///
    /// An error is returned when the secret cannot be retrieved.
    fn fetch(&self, region: &str, name: &str) -> Result<String>;
}

/// A secret document supplied directly to the process.
///
/// The region and name are not used to locate it.
#[derive(Debug, Clone, PartialEq)]
pub enum SecretDocument {
    /// A file containing the document.
    File(PathBuf),
    /// The document itself.
    Inline(String),
}

impl SecretSource for SecretDocument {
    fn fetch(&self, _region: &str, _name: &str) -> Result<String> {
        match self {
            Self::File(path) => fs::read_to_string(path).map_err(|e| {
                secret_error(format!(
                    "Impossible to read secret document `{}`: {e}",
                    path.display()
                ))
            }),
            Self::Inline(document) => Ok(document.clone()),
        }
    }
}

/// Retrieves, parses and decodes a [`TlsMaterial`] from a [`SecretSource`].
///
/// # Errors
///
/// An error is returned when the secret cannot be retrieved, parsed or
/// decoded.
pub fn load_secret(source: &impl SecretSource, region: &str, name: &str) -> Result<TlsMaterial> {
    debug!("Retrieving secret `{name}` in region `{region}`");
    source
        .fetch(region, name)
        .and_then(|document| SecretBundle::parse(&document))
        .and_then(|bundle| bundle.decode())
        .inspect_err(|e| error!("Impossible to load secret `{name}`: {e}"))
}
