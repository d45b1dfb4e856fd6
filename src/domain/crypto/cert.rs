use std::fmt;

use base64::Engine;
use der::asn1::ObjectIdentifier;
use der::Decode;
use x509_cert::Certificate;

use crate::domain::constants::{PEM_CERTIFICATE_BEGIN, PEM_CERTIFICATE_END, PEM_LINE_WIDTH};

/// id-at-commonName (2.5.4.3)
const COMMON_NAME_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// DER-encoded certificate of a selected identity.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateDer {
    der: Box<[u8]>,
}

impl CertificateDer {
    #[must_use]
    pub fn from_der(der: Vec<u8>) -> Self {
        Self {
            der: der.into_boxed_slice(),
        }
    }
    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.der.is_empty()
    }

    /// Base64 body wrapped in `BEGIN/END CERTIFICATE` lines.
    #[must_use]
    pub fn to_pem(&self) -> String {
        let body = base64::engine::general_purpose::STANDARD.encode(&self.der);
        let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
        pem.push_str(PEM_CERTIFICATE_BEGIN);
        pem.push('\n');
        // base64 output is ASCII, so byte chunks are valid UTF-8
        for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
            pem.push_str(std::str::from_utf8(line).unwrap_or_default());
            pem.push('\n');
        }
        pem.push_str(PEM_CERTIFICATE_END);
        pem.push('\n');
        pem
    }

    /// Parses the certificate structure.
    pub fn parse(&self) -> Result<Certificate, der::Error> {
        Certificate::from_der(&self.der)
    }

    /// Common name of the subject, if present.
    #[must_use]
    pub fn subject_common_name(&self) -> Option<String> {
        let cert = self.parse().ok()?;
        cert.tbs_certificate
            .subject
            .0
            .iter()
            .rev()
            .flat_map(|rdn| rdn.0.iter())
            .filter(|atv| atv.oid == COMMON_NAME_OID)
            .find_map(|atv| directory_string(&atv.value))
    }

    /// RFC 4514 rendering of the full subject.
    #[must_use]
    pub fn subject_rfc4514(&self) -> Option<String> {
        self.parse()
            .ok()
            .map(|cert| cert.tbs_certificate.subject.to_string())
    }
}

fn directory_string(value: &der::Any) -> Option<String> {
    if let Ok(s) = value.decode_as::<der::asn1::Utf8StringRef<'_>>() {
        return Some(s.to_string());
    }
    if let Ok(s) = value.decode_as::<der::asn1::PrintableStringRef<'_>>() {
        return Some(s.to_string());
    }
    if let Ok(s) = value.decode_as::<der::asn1::Ia5StringRef<'_>>() {
        return Some(s.to_string());
    }
    None
}

impl fmt::Debug for CertificateDer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertificateDer(len={})", self.der.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pem_wraps_at_64_columns() {
        let cert = CertificateDer::from_der(vec![0xAB; 100]);
        let pem = cert.to_pem();
        let lines: Vec<&str> = pem.lines().collect();

        assert_eq!(lines.first(), Some(&PEM_CERTIFICATE_BEGIN));
        assert_eq!(lines.last(), Some(&PEM_CERTIFICATE_END));
        // 100 bytes -> 136 base64 chars -> 64 + 64 + 8
        assert_eq!(lines[1].len(), 64);
        assert_eq!(lines[2].len(), 64);
        assert_eq!(lines[3].len(), 8);
    }

    #[test]
    fn garbage_has_no_subject() {
        let cert = CertificateDer::from_der(vec![1, 2, 3]);
        assert!(cert.subject_common_name().is_none());
        assert!(cert.subject_rfc4514().is_none());
    }
}
