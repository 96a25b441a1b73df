use tokio_rustls::rustls::Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};

use super::TlsError;

fn parse<'a>(cert: &'a Certificate) -> Result<x509_parser::certificate::X509Certificate<'a>, TlsError> {
	let (_, parsed) = x509_parser::parse_x509_certificate(&cert.0)
		.map_err(|e| TlsError::InvalidPem(format!("failed to parse x509 certificate: {:?}", e)))?;
	Ok(parsed)
}

/// True if the certificate's subject equals its issuer.
pub fn is_self_signed(cert: &Certificate) -> Result<bool, TlsError> {
	let parsed = parse(cert)?;
	Ok(parsed.tbs_certificate.subject == parsed.tbs_certificate.issuer)
}

/// DNS names from the SubjectAlternativeName extension, if present.
pub fn dns_names_from_cert(cert: &Certificate) -> Result<Vec<String>, TlsError> {
	let parsed = parse(cert)?;
	let mut out = Vec::new();
	for ext in parsed.extensions().iter() {
		if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
			for name in san.general_names.iter() {
				if let GeneralName::DNSName(d) = name {
					out.push(d.to_string());
				}
			}
		}
	}
	Ok(out)
}

/// IP addresses from the SubjectAlternativeName extension, if present.
pub fn ip_addresses_from_cert(cert: &Certificate) -> Result<Vec<std::net::IpAddr>, TlsError> {
	let parsed = parse(cert)?;
	let mut out = Vec::new();
	for ext in parsed.extensions().iter() {
		if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
			for name in san.general_names.iter() {
				if let GeneralName::IPAddress(bytes) = name {
					let bytes: &[u8] = bytes;
					match bytes.len() {
						4 => out.push(std::net::IpAddr::from(<[u8; 4]>::try_from(bytes).expect("length checked"))),
						16 => out.push(std::net::IpAddr::from(<[u8; 16]>::try_from(bytes).expect("length checked"))),
						_ => {}
					}
				}
			}
		}
	}
	Ok(out)
}

/// First Common Name (CN) from the subject, if present.
pub fn first_common_name(cert: &Certificate) -> Result<Option<String>, TlsError> {
	let parsed = parse(cert)?;
	for cn in parsed.subject().iter_common_name() {
		if let Ok(s) = cn.as_str() {
			return Ok(Some(s.to_string()));
		}
	}
	Ok(None)
}

/// True if the certificate's `notAfter` has already passed.
pub fn is_cert_expired(cert: &Certificate) -> Result<bool, TlsError> {
	let parsed = parse(cert)?;
	let not_after = parsed.validity().not_after.to_datetime();
	let now = x509_parser::time::ASN1Time::now().to_datetime();
	Ok(not_after <= now)
}

#[cfg(feature = "unit-tests")]
mod tests {
	use super::*;

	#[test]
	fn rejects_garbage_der() {
		let bogus = Certificate(vec![0u8; 16]);
		assert!(parse(&bogus).is_err());
	}
}
