use std::fmt::Write;

use tracing::info;

use virtiot_publisher::credentials::{TlsMaterial, load_secret, pem_label};
use virtiot_publisher::error::{Error, ErrorKind, Result};

use crate::cli::{CredentialArgs, SecretArgs};

// Loads the TLS credentials, preferring key files over the secret document.
pub(crate) fn load_credentials(args: &CredentialArgs) -> Result<TlsMaterial> {
    if let (Some(key), Some(cert), Some(ca)) = (&args.key, &args.cert, &args.ca) {
        info!("Loading credentials from `{}`", key.display());
        return TlsMaterial::from_files(key, cert, ca);
    }
    load_secret_material(&args.secret)
}

pub(crate) fn load_secret_material(args: &SecretArgs) -> Result<TlsMaterial> {
    let document = args.document().ok_or_else(|| {
        Error::new(
            ErrorKind::Config,
            "No credentials given: pass the key files or a secret document",
        )
    })?;

    info!("Loading secret `{}`", args.secret_name);
    load_secret(&document, &args.region, &args.secret_name)
}

fn describe(name: &str, pem: &[u8]) -> String {
    format!(
        "{name}: {} ({} bytes)",
        pem_label(pem).unwrap_or("unknown"),
        pem.len()
    )
}

// The private key content is never part of the summary.
pub(crate) fn secret_summary(material: &TlsMaterial, show_ca: bool) -> String {
    let mut summary = [
        describe("Private key", &material.private_key),
        describe("Certificate", &material.certificate),
        describe("Root CA", &material.root_ca),
    ]
    .join("\n");

    if show_ca {
        let _ = write!(summary, "\n\n{}", String::from_utf8_lossy(&material.root_ca));
    }

    summary
}
