use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rustls_pemfile::{certs as pem_certs, pkcs8_private_keys, rsa_private_keys};
use tokio_rustls::rustls::{Certificate, PrivateKey};

use super::{TlsDescriptor, TlsError};

type StaticMaterial = (Certificate, Vec<Certificate>, PrivateKey, Vec<Certificate>, Vec<Certificate>);

/// `Static` mode: load an externally supplied leaf cert + key verbatim.
/// No root/intermediate pool is produced — the operator is assumed to
/// manage trust distribution out of band.
pub fn load_static(desc: &TlsDescriptor) -> Result<StaticMaterial, TlsError> {
	let cert_path = desc
		.cert_path
		.as_ref()
		.ok_or_else(|| TlsError::InvalidPem("static mode requires cert_path".to_string()))?;
	let key_path = desc
		.key_path
		.as_ref()
		.ok_or_else(|| TlsError::InvalidPem("static mode requires key_path".to_string()))?;

	let mut certs = load_certs(Path::new(cert_path))?;
	let key = load_private_key(Path::new(key_path))?;

	if certs.is_empty() {
		return Err(TlsError::InvalidPem(format!("no certificates in {}", cert_path)));
	}
	let leaf = certs.remove(0);

	Ok((leaf, certs, key, Vec::new(), Vec::new()))
}

pub fn load_certs(path: &Path) -> Result<Vec<Certificate>, TlsError> {
	let f = File::open(path)?;
	let mut reader = BufReader::new(f);
	let raw = pem_certs(&mut reader)
		.map_err(|e| TlsError::InvalidPem(format!("failed to parse PEM certs: {:?}", e)))?;
	if raw.is_empty() {
		return Err(TlsError::InvalidPem(format!("no certificates found in {}", path.display())));
	}
	Ok(raw.into_iter().map(Certificate).collect())
}

pub fn load_private_key(path: &Path) -> Result<PrivateKey, TlsError> {
	let f = File::open(path)?;
	let mut reader = BufReader::new(&f);
	let pks = pkcs8_private_keys(&mut reader)
		.map_err(|e| TlsError::UnsupportedKeyType(format!("failed to parse PKCS#8 key: {:?}", e)))?;
	if let Some(k) = pks.into_iter().next() {
		return Ok(PrivateKey(k));
	}

	let f = File::open(path)?;
	let mut reader = BufReader::new(f);
	let rs = rsa_private_keys(&mut reader)
		.map_err(|e| TlsError::UnsupportedKeyType(format!("failed to parse RSA key: {:?}", e)))?;
	if let Some(k) = rs.into_iter().next() {
		return Ok(PrivateKey(k));
	}

	Err(TlsError::UnsupportedKeyType(format!("no private key found in {}", path.display())))
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn missing_cert_file_is_an_error() {
		let p = Path::new("/this/path/does/not/exist/cert.pem");
		assert!(load_certs(p).is_err());
	}

	#[test]
	fn missing_key_file_is_an_error() {
		let p = Path::new("/this/path/does/not/exist/key.pem");
		assert!(load_private_key(p).is_err());
	}
}
