//! TLS Material Provider (C1).
//!
//! Turns a [`TlsDescriptor`] into runtime [`TlsMaterial`]: a leaf
//! certificate, its chain, a private key, and trust pools, plus a
//! TLS-1.3-only `rustls::ServerConfig`. Three modes are supported: `Static`
//! (externally supplied cert + key, loaded verbatim), `Mixed` (externally
//! supplied CA, fresh leaf minted on every start), and `Auto` (fully
//! self-generated root -> intermediate -> leaf chain).

mod generate;
mod inspect;
mod load;

pub use inspect::{dns_names_from_cert, first_common_name, ip_addresses_from_cert, is_cert_expired, is_self_signed};

use std::net::IpAddr;
use std::sync::Arc;

use tokio_rustls::rustls::{self, Certificate, PrivateKey, server::ServerConfig};

use crate::config::TlsMode;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
	#[error("invalid PEM: {0}")]
	InvalidPem(String),
	#[error("unsupported key type: {0}")]
	UnsupportedKeyType(String),
	#[error("invalid IP SAN: {0}")]
	InvalidIp(String),
	#[error("signature algorithm mismatch: {0}")]
	SignatureAlgorithmMismatch(String),
	#[error("certificate validity out of range: {0}")]
	ValidityOutOfRange(String),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("rustls config error: {0}")]
	Rustls(String),
	#[error("certificate generation error: {0}")]
	Generation(String),
}

/// Input descriptor for TLS material provisioning.
#[derive(Debug, Clone)]
pub struct TlsDescriptor {
	pub mode: TlsMode,
	/// Requested DNS SANs for the leaf, `Mixed`/`Auto` only. Must be
	/// non-empty for those modes; the first entry also becomes the leaf's
	/// subject CN. Ignored in `Static` mode.
	pub dns_sans: Vec<String>,
	/// Requested IP SANs for the leaf, `Mixed`/`Auto` only.
	pub ip_sans: Vec<IpAddr>,
	/// Requested leaf validity, in days, `Mixed`/`Auto` only.
	pub validity_days: u32,
	/// `Static`: leaf cert path. `Mixed`: ignored (a leaf is minted).
	pub cert_path: Option<String>,
	/// `Static`: leaf key path. `Mixed`: ignored.
	pub key_path: Option<String>,
	/// `Mixed`: externally supplied CA cert path, used to sign a fresh leaf.
	pub ca_cert_path: Option<String>,
	/// `Mixed`: externally supplied CA key path.
	pub ca_key_path: Option<String>,
}

/// Output of provisioning: everything a [`crate::listener::Listener`] needs
/// to accept TLS 1.3 connections.
pub struct TlsMaterial {
	pub leaf_cert: Certificate,
	pub chain: Vec<Certificate>,
	pub private_key: PrivateKey,
	/// Root CA pool. Not served in the chain for `Auto` mode (a client that
	/// wants to verify must obtain the root out-of-band).
	pub root_pool: Vec<Certificate>,
	pub intermediate_pool: Vec<Certificate>,
	pub negotiated_config: Arc<ServerConfig>,
}

/// Provision TLS material for the given descriptor.
pub fn provision(desc: &TlsDescriptor) -> Result<TlsMaterial, TlsError> {
	let (leaf_cert, chain, private_key, root_pool, intermediate_pool) = match desc.mode {
		TlsMode::Static => load::load_static(desc)?,
		TlsMode::Mixed => generate::generate_mixed(desc)?,
		TlsMode::Auto => generate::generate_auto(desc)?,
	};

	if inspect::is_self_signed(&leaf_cert).unwrap_or(false) && desc.mode != TlsMode::Auto {
		return Err(TlsError::SignatureAlgorithmMismatch(
			"leaf certificate must not be self-signed outside auto mode".to_string(),
		));
	}

	if let Ok(true) = inspect::is_cert_expired(&leaf_cert) {
		return Err(TlsError::ValidityOutOfRange(
			"leaf certificate is already expired".to_string(),
		));
	}

	let mut full_chain = vec![leaf_cert.clone()];
	full_chain.extend(chain.iter().cloned());

	let negotiated_config = build_server_config_tls13(full_chain.clone(), private_key.clone())?;

	Ok(TlsMaterial {
		leaf_cert,
		chain,
		private_key,
		root_pool,
		intermediate_pool,
		negotiated_config,
	})
}

/// Build a rustls `ServerConfig` restricted to TLS 1.3.
pub fn build_server_config_tls13(
	certs: Vec<Certificate>,
	key: PrivateKey,
) -> Result<Arc<ServerConfig>, TlsError> {
	if certs.is_empty() {
		return Err(TlsError::InvalidPem("no certificates provided".to_string()));
	}

	let cfg_builder = ServerConfig::builder()
		.with_safe_default_cipher_suites()
		.with_safe_default_kx_groups()
		.with_protocol_versions(&[&rustls::version::TLS13])
		.map_err(|e| TlsError::Rustls(format!("failed to negotiate protocol versions: {:?}", e)))?;

	let cfg = cfg_builder
		.with_no_client_auth()
		.with_single_cert(certs, key)
		.map_err(|e| TlsError::Rustls(format!("failed to build server config: {}", e)))?;

	Ok(Arc::new(cfg))
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn auto_mode_provisions_material() {
		let desc = TlsDescriptor {
			mode: TlsMode::Auto,
			dns_sans: vec!["localhost".to_string()],
			ip_sans: vec!["127.0.0.1".parse().unwrap()],
			validity_days: 365,
			cert_path: None,
			key_path: None,
			ca_cert_path: None,
			ca_key_path: None,
		};
		let material = provision(&desc).expect("auto provisioning should succeed");
		assert!(!material.root_pool.is_empty());
		assert!(is_self_signed(&material.root_pool[0]).unwrap_or(false));
		let ips = ip_addresses_from_cert(&material.leaf_cert).expect("leaf should parse for IP SANs");
		assert!(ips.contains(&"127.0.0.1".parse().unwrap()));
	}

	#[test]
	fn mixed_mode_mints_leaf_signed_by_supplied_ca() {
		let (ca_cert_pem, ca_key_pem) = generate::generate_self_signed_ca_pem_for_tests();
		let cert_dir = tempfile::tempdir().unwrap();
		let ca_cert_path = cert_dir.path().join("ca.pem");
		let ca_key_path = cert_dir.path().join("ca.key");
		std::fs::write(&ca_cert_path, ca_cert_pem).unwrap();
		std::fs::write(&ca_key_path, ca_key_pem).unwrap();

		let desc = TlsDescriptor {
			mode: TlsMode::Mixed,
			dns_sans: vec!["example.test".to_string()],
			ip_sans: Vec::new(),
			validity_days: 365,
			cert_path: None,
			key_path: None,
			ca_cert_path: Some(ca_cert_path.to_string_lossy().to_string()),
			ca_key_path: Some(ca_key_path.to_string_lossy().to_string()),
		};
		let material = provision(&desc).expect("mixed provisioning should succeed");
		assert!(!is_self_signed(&material.leaf_cert).unwrap_or(true));
	}
}
