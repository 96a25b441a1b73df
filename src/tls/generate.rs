//! Certificate generation for the `mixed` and `auto` TLS modes, via `rcgen`.
//!
//! ECDSA P-256 for leaves, ECDSA P-384 for CAs (root and intermediate),
//! 160-bit random serials. CAs get a fixed long validity; the leaf's
//! validity, DNS SANs, and IP SANs are all taken from the requesting
//! [`TlsDescriptor`]. `auto` mode never serves the root in the chain it
//! hands to clients.

use rand::RngCore;
use rcgen::{
	BasicConstraints, Certificate as RcgenCertificate, CertificateParams, DistinguishedName, DnType,
	IsCa, KeyPair, PKCS_ECDSA_P256_SHA256, PKCS_ECDSA_P384_SHA384, SanType,
};
use tokio_rustls::rustls::{Certificate, PrivateKey};

use super::{TlsDescriptor, TlsError};

/// Root and intermediate CAs outlive any leaf they sign; their validity is
/// not one of the descriptor's requested values.
const CA_VALIDITY_DAYS: i64 = 3650;

type StaticMaterial = (Certificate, Vec<Certificate>, PrivateKey, Vec<Certificate>, Vec<Certificate>);

fn random_serial() -> Vec<u8> {
	let mut bytes = [0u8; 20]; // 160 bits
	rand::thread_rng().fill_bytes(&mut bytes);
	bytes[0] &= 0x7f; // keep it a positive ASN.1 INTEGER
	bytes.to_vec()
}

fn ca_validity_window() -> (time::OffsetDateTime, time::OffsetDateTime) {
	let now = time::OffsetDateTime::now_utc();
	(now, now + time::Duration::days(CA_VALIDITY_DAYS))
}

fn leaf_validity_window(validity_days: u32) -> (time::OffsetDateTime, time::OffsetDateTime) {
	let now = time::OffsetDateTime::now_utc();
	(now, now + time::Duration::days(validity_days as i64))
}

fn ca_params(cn: &str) -> Result<CertificateParams, TlsError> {
	let mut params = CertificateParams::default();
	params.alg = &PKCS_ECDSA_P384_SHA384;
	params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
	params.serial_number = Some(random_serial());
	let (not_before, not_after) = ca_validity_window();
	params.not_before = not_before;
	params.not_after = not_after;
	let mut dn = DistinguishedName::new();
	dn.push(DnType::CommonName, cn);
	params.distinguished_name = dn;
	Ok(params)
}

/// Build leaf params from the descriptor's requested DNS SANs, IP SANs,
/// and validity. At least one DNS SAN is required; it doubles as the
/// leaf's subject CN.
fn leaf_params(desc: &TlsDescriptor) -> Result<CertificateParams, TlsError> {
	let Some(primary_dns) = desc.dns_sans.first() else {
		return Err(TlsError::Generation("at least one DNS SAN is required".to_string()));
	};

	let mut params = CertificateParams::new(desc.dns_sans.clone());
	params.alg = &PKCS_ECDSA_P256_SHA256;
	params.is_ca = IsCa::NoCa;
	params.serial_number = Some(random_serial());
	let (not_before, not_after) = leaf_validity_window(desc.validity_days);
	params.not_before = not_before;
	params.not_after = not_after;
	params.subject_alt_names.extend(desc.ip_sans.iter().copied().map(SanType::IpAddress));
	let mut dn = DistinguishedName::new();
	dn.push(DnType::CommonName, primary_dns);
	params.distinguished_name = dn;
	Ok(params)
}

fn to_rustls_cert(der: Vec<u8>) -> Certificate {
	Certificate(der)
}

fn to_rustls_key(der: Vec<u8>) -> PrivateKey {
	PrivateKey(der)
}

/// `Auto` mode: self-signed root, CA-signed intermediate, CA-signed leaf.
/// The root is never placed in the chain served to clients.
pub fn generate_auto(desc: &TlsDescriptor) -> Result<StaticMaterial, TlsError> {
	let root_params = ca_params("signet-core auto root")?;
	let root = RcgenCertificate::from_params(root_params)
		.map_err(|e| TlsError::Generation(format!("root cert generation failed: {}", e)))?;
	let root_der = root
		.serialize_der()
		.map_err(|e| TlsError::Generation(format!("root serialization failed: {}", e)))?;

	let intermediate_params = ca_params("signet-core auto intermediate")?;
	let intermediate = RcgenCertificate::from_params(intermediate_params)
		.map_err(|e| TlsError::Generation(format!("intermediate cert generation failed: {}", e)))?;
	let intermediate_der = intermediate
		.serialize_der_with_signer(&root)
		.map_err(|e| TlsError::Generation(format!("intermediate signing failed: {}", e)))?;

	let leaf_params = leaf_params(desc)?;
	let leaf = RcgenCertificate::from_params(leaf_params)
		.map_err(|e| TlsError::Generation(format!("leaf cert generation failed: {}", e)))?;
	let leaf_der = leaf
		.serialize_der_with_signer(&intermediate)
		.map_err(|e| TlsError::Generation(format!("leaf signing failed: {}", e)))?;
	let leaf_key_der = leaf.serialize_private_key_der();

	Ok((
		to_rustls_cert(leaf_der),
		vec![to_rustls_cert(intermediate_der.clone())],
		to_rustls_key(leaf_key_der),
		vec![to_rustls_cert(root_der)],
		vec![to_rustls_cert(intermediate_der)],
	))
}

/// `Mixed` mode: an externally supplied CA (loaded from PEM) signs a fresh
/// leaf on every start. No separate root/intermediate tier is generated —
/// the supplied CA cert is the trust anchor.
pub fn generate_mixed(desc: &TlsDescriptor) -> Result<StaticMaterial, TlsError> {
	let ca_cert_path = desc
		.ca_cert_path
		.as_ref()
		.ok_or_else(|| TlsError::InvalidPem("mixed mode requires ca_cert_path".to_string()))?;
	let ca_key_path = desc
		.ca_key_path
		.as_ref()
		.ok_or_else(|| TlsError::InvalidPem("mixed mode requires ca_key_path".to_string()))?;

	let ca_cert_pem = std::fs::read_to_string(ca_cert_path)?;
	let ca_key_pem = std::fs::read_to_string(ca_key_path)?;

	let ca_key_pair = KeyPair::from_pem(&ca_key_pem)
		.map_err(|e| TlsError::UnsupportedKeyType(format!("failed to parse CA key: {}", e)))?;
	let ca_params = CertificateParams::from_ca_cert_pem(&ca_cert_pem, ca_key_pair)
		.map_err(|e| TlsError::InvalidPem(format!("failed to parse CA cert: {}", e)))?;
	let ca_signer = RcgenCertificate::from_params(ca_params)
		.map_err(|e| TlsError::Generation(format!("failed to load CA signer: {}", e)))?;

	let leaf = RcgenCertificate::from_params(leaf_params(desc)?)
		.map_err(|e| TlsError::Generation(format!("leaf cert generation failed: {}", e)))?;
	let leaf_der = leaf
		.serialize_der_with_signer(&ca_signer)
		.map_err(|e| TlsError::Generation(format!("leaf signing failed: {}", e)))?;
	let leaf_key_der = leaf.serialize_private_key_der();

	let ca_chain_cert = rustls_pemfile::certs(&mut ca_cert_pem.as_bytes())
		.map_err(|e| TlsError::InvalidPem(format!("failed to re-parse CA cert PEM: {:?}", e)))?
		.into_iter()
		.map(Certificate)
		.collect::<Vec<_>>();

	Ok((
		to_rustls_cert(leaf_der),
		ca_chain_cert.clone(),
		to_rustls_key(leaf_key_der),
		ca_chain_cert,
		Vec::new(),
	))
}

/// Test helper: a self-signed CA as PEM, used to exercise `generate_mixed`
/// without depending on `generate_auto`'s output shape.
#[cfg(feature = "unit-tests")]
pub fn generate_self_signed_ca_pem_for_tests() -> (String, String) {
	let params = ca_params("signet-core test CA").expect("ca params");
	let cert = RcgenCertificate::from_params(params).expect("ca cert");
	(cert.serialize_pem().expect("ca pem"), cert.serialize_private_key_pem())
}
