//! S4: auto-mode TLS material has the expected SANs and chain shape.

use signet_core::config::TlsMode;
use signet_core::tls::{self, TlsDescriptor, dns_names_from_cert, ip_addresses_from_cert, is_self_signed};

fn auto_descriptor() -> TlsDescriptor {
	TlsDescriptor {
		mode: TlsMode::Auto,
		dns_sans: vec!["localhost".to_string()],
		ip_sans: vec!["127.0.0.1".parse().unwrap()],
		validity_days: 365,
		cert_path: None,
		key_path: None,
		ca_cert_path: None,
		ca_key_path: None,
	}
}

#[test]
fn auto_mode_leaf_has_expected_sans_and_two_cert_chain() {
	let material = tls::provision(&auto_descriptor()).expect("auto provisioning should succeed");

	let sans = dns_names_from_cert(&material.leaf_cert).expect("leaf should parse");
	assert!(sans.iter().any(|s| s == "localhost"));

	let ips = ip_addresses_from_cert(&material.leaf_cert).expect("leaf should parse for IP SANs");
	assert!(ips.contains(&"127.0.0.1".parse().unwrap()));

	// Root is self-signed and NOT part of the served chain; leaf + one
	// intermediate is what the listener hands to a connecting client.
	assert!(is_self_signed(&material.root_pool[0]).unwrap_or(false));
	assert_eq!(material.chain.len(), 1, "exactly one intermediate between leaf and root");
	assert!(!is_self_signed(&material.leaf_cert).unwrap_or(true));
}

#[test]
fn static_mode_rejects_self_signed_leaf() {
	use rcgen::generate_simple_self_signed;

	let cert = generate_simple_self_signed(vec!["localhost".into()]).expect("self-signed cert generation");
	let cert_pem = cert.serialize_pem().expect("serialize cert");
	let key_pem = cert.serialize_private_key_pem();

	let tmpdir = tempfile::tempdir().expect("tempdir");
	let cert_path = tmpdir.path().join("cert.pem");
	let key_path = tmpdir.path().join("key.pem");
	std::fs::write(&cert_path, cert_pem.as_bytes()).expect("write cert");
	std::fs::write(&key_path, key_pem.as_bytes()).expect("write key");

	let desc = TlsDescriptor {
		mode: TlsMode::Static,
		dns_sans: vec!["localhost".to_string()],
		ip_sans: vec![],
		validity_days: 365,
		cert_path: Some(cert_path.to_string_lossy().to_string()),
		key_path: Some(key_path.to_string_lossy().to_string()),
		ca_cert_path: None,
		ca_key_path: None,
	};

	let result = tls::provision(&desc);
	assert!(result.is_err(), "a self-signed leaf must not be accepted outside auto mode");
}
