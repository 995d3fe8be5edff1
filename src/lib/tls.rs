use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use openssl::pkcs12::{ParsedPkcs12_2, Pkcs12};
use openssl::pkey::{PKeyRef, Private};
use openssl::ssl::{SslContext, SslContextBuilder, SslMethod, SslVerifyMode, SslVersion};
use openssl::x509::X509Ref;
use openssl::x509::store::X509StoreBuilder;
use tracing::debug;

use crate::constants::DEFAULT_CIPHER_SUITES;
use crate::error::{BootstrapError, KeystoreError};

#[derive(Clone, PartialEq, Eq)]
pub struct KeystoreDescriptor {
    pub path: PathBuf,
    pub password: String,
}

impl fmt::Debug for KeystoreDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoreDescriptor")
            .field("path", &self.path)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl KeystoreDescriptor {
    pub fn new(path: impl Into<PathBuf>, password: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub truststore: KeystoreDescriptor,
    pub keystore: KeystoreDescriptor,
}

/// TLS 1.2 suites that can go on the allow-list, by IANA name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    RsaAes128CbcSha,
    RsaAes256CbcSha,
    RsaAes128GcmSha256,
    RsaAes256GcmSha384,
    EcdheRsaAes128GcmSha256,
    EcdheRsaAes256GcmSha384,
    EcdheEcdsaAes128GcmSha256,
    EcdheEcdsaAes256GcmSha384,
    EcdheRsaChacha20Poly1305,
}

impl CipherSuite {
    pub const ALL: [CipherSuite; 9] = [
        CipherSuite::RsaAes128CbcSha,
        CipherSuite::RsaAes256CbcSha,
        CipherSuite::RsaAes128GcmSha256,
        CipherSuite::RsaAes256GcmSha384,
        CipherSuite::EcdheRsaAes128GcmSha256,
        CipherSuite::EcdheRsaAes256GcmSha384,
        CipherSuite::EcdheEcdsaAes128GcmSha256,
        CipherSuite::EcdheEcdsaAes256GcmSha384,
        CipherSuite::EcdheRsaChacha20Poly1305,
    ];

    pub fn iana_name(self) -> &'static str {
        match self {
            CipherSuite::RsaAes128CbcSha => "TLS_RSA_WITH_AES_128_CBC_SHA",
            CipherSuite::RsaAes256CbcSha => "TLS_RSA_WITH_AES_256_CBC_SHA",
            CipherSuite::RsaAes128GcmSha256 => "TLS_RSA_WITH_AES_128_GCM_SHA256",
            CipherSuite::RsaAes256GcmSha384 => "TLS_RSA_WITH_AES_256_GCM_SHA384",
            CipherSuite::EcdheRsaAes128GcmSha256 => "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
            CipherSuite::EcdheRsaAes256GcmSha384 => "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
            CipherSuite::EcdheEcdsaAes128GcmSha256 => "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
            CipherSuite::EcdheEcdsaAes256GcmSha384 => "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
            CipherSuite::EcdheRsaChacha20Poly1305 => {
                "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256"
            }
        }
    }

    pub fn openssl_name(self) -> &'static str {
        match self {
            CipherSuite::RsaAes128CbcSha => "AES128-SHA",
            CipherSuite::RsaAes256CbcSha => "AES256-SHA",
            CipherSuite::RsaAes128GcmSha256 => "AES128-GCM-SHA256",
            CipherSuite::RsaAes256GcmSha384 => "AES256-GCM-SHA384",
            CipherSuite::EcdheRsaAes128GcmSha256 => "ECDHE-RSA-AES128-GCM-SHA256",
            CipherSuite::EcdheRsaAes256GcmSha384 => "ECDHE-RSA-AES256-GCM-SHA384",
            CipherSuite::EcdheEcdsaAes128GcmSha256 => "ECDHE-ECDSA-AES128-GCM-SHA256",
            CipherSuite::EcdheEcdsaAes256GcmSha384 => "ECDHE-ECDSA-AES256-GCM-SHA384",
            CipherSuite::EcdheRsaChacha20Poly1305 => "ECDHE-RSA-CHACHA20-POLY1305",
        }
    }

    pub fn defaults() -> Vec<CipherSuite> {
        DEFAULT_CIPHER_SUITES
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect()
    }
}

impl FromStr for CipherSuite {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        CipherSuite::ALL
            .into_iter()
            .find(|suite| suite.iana_name() == name || suite.openssl_name() == name)
            .ok_or_else(|| BootstrapError::config(format!("unsupported cipher suite '{}'", name)))
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.iana_name())
    }
}

/// An OpenSSL client context together with the suites it was restricted to.
#[derive(Clone)]
pub struct TlsContext {
    ssl_context: SslContext,
    cipher_suites: Vec<CipherSuite>,
}

impl TlsContext {
    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    pub fn ssl_context(&self) -> &SslContext {
        &self.ssl_context
    }

    pub fn into_ssl_context(self) -> SslContext {
        self.ssl_context
    }
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("cipher_suites", &self.cipher_suites)
            .finish_non_exhaustive()
    }
}

/// Builds a mutual-TLS client context from PKCS#12 trust and identity stores.
///
/// The protocol is capped at TLS 1.2 because OpenSSL configures 1.3 suites
/// separately; with the cap, `cipher_suites` is everything a handshake may pick.
pub fn build_tls_context(
    truststore: &KeystoreDescriptor,
    keystore: &KeystoreDescriptor,
    cipher_suites: &[CipherSuite],
) -> Result<TlsContext, BootstrapError> {
    if cipher_suites.is_empty() {
        return Err(BootstrapError::config("cipher suite allow-list is empty"));
    }

    let trusted = load_keystore(truststore)?;
    let identity = load_keystore(keystore)?;

    let mut store = X509StoreBuilder::new()?;
    let mut trusted_count = 0;
    for cert in trusted.cert.into_iter().chain(trusted.ca.into_iter().flatten()) {
        store.add_cert(cert)?;
        trusted_count += 1;
    }
    if trusted_count == 0 {
        return Err(KeystoreError::NoTrustedCertificates {
            path: truststore.path.clone(),
        }
        .into());
    }

    let (pkey, cert) = match (identity.pkey, identity.cert) {
        (Some(pkey), Some(cert)) => (pkey, cert),
        _ => {
            return Err(KeystoreError::MissingIdentity {
                path: keystore.path.clone(),
            }
            .into());
        }
    };

    let mut builder = SslContextBuilder::new(SslMethod::tls_client())?;
    builder.set_max_proto_version(Some(SslVersion::TLS1_2))?;
    builder.set_cipher_list(&openssl_cipher_list(cipher_suites))?;
    builder.set_cert_store(store.build());
    builder.set_verify(SslVerifyMode::PEER);
    install_identity(&mut builder, &pkey, &cert, &keystore.path)?;
    for chain_cert in identity.ca.into_iter().flatten() {
        builder.add_extra_chain_cert(chain_cert)?;
    }

    debug!(
        "TLS context ready: {} trusted certificates, ciphers {}",
        trusted_count,
        openssl_cipher_list(cipher_suites)
    );

    Ok(TlsContext {
        ssl_context: builder.build(),
        cipher_suites: cipher_suites.to_vec(),
    })
}

/// A key that does not belong to the certificate is bad keystore material, not a TLS failure.
fn install_identity(
    builder: &mut SslContextBuilder,
    pkey: &PKeyRef<Private>,
    cert: &X509Ref,
    path: &Path,
) -> Result<(), BootstrapError> {
    builder.set_certificate(cert)?;
    builder
        .set_private_key(pkey)
        .and_then(|_| builder.check_private_key())
        .map_err(|source| KeystoreError::KeyMismatch {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(())
}

pub fn openssl_cipher_list(cipher_suites: &[CipherSuite]) -> String {
    cipher_suites
        .iter()
        .map(|suite| suite.openssl_name())
        .collect::<Vec<_>>()
        .join(":")
}

pub fn load_keystore(descriptor: &KeystoreDescriptor) -> Result<ParsedPkcs12_2, KeystoreError> {
    let der = read_container(&descriptor.path).map_err(|source| KeystoreError::Read {
        path: descriptor.path.clone(),
        source,
    })?;

    Pkcs12::from_der(&der)
        .and_then(|pkcs12| pkcs12.parse2(&descriptor.password))
        .map_err(|source| KeystoreError::Decode {
            path: descriptor.path.clone(),
            source,
        })
}

// The handle lives only for this call; parsing happens after it is closed.
fn read_container(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut der = Vec::new();
    file.read_to_end(&mut der)?;
    Ok(der)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::Path;

    use openssl::asn1::Asn1Time;
    use openssl::bn::BigNum;
    use openssl::hash::MessageDigest;
    use openssl::pkcs12::Pkcs12;
    use openssl::pkey::{PKey, Private};
    use openssl::rsa::Rsa;
    use openssl::x509::{X509, X509NameBuilder};

    pub fn self_signed(common_name: &str) -> (PKey<Private>, X509) {
        let rsa = Rsa::generate(2048).unwrap();
        let pkey = PKey::from_rsa(rsa).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", common_name).unwrap();
        let name = name.build();

        let mut cert = X509::builder().unwrap();
        cert.set_version(2).unwrap();
        let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
        cert.set_serial_number(&serial).unwrap();
        cert.set_subject_name(&name).unwrap();
        cert.set_issuer_name(&name).unwrap();
        cert.set_pubkey(&pkey).unwrap();
        cert.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
        cert.set_not_after(&Asn1Time::days_from_now(365).unwrap()).unwrap();
        cert.sign(&pkey, MessageDigest::sha256()).unwrap();

        (pkey, cert.build())
    }

    /// Writes a PKCS#12 file holding a fresh self-signed key pair.
    pub fn write_self_signed_pkcs12(path: &Path, password: &str) {
        let (pkey, cert) = self_signed("cassandra-client");

        let mut builder = Pkcs12::builder();
        builder.name("cassandra-client").pkey(&pkey).cert(&cert);
        let der = builder.build2(password).unwrap().to_der().unwrap();
        std::fs::write(path, der).unwrap();
    }
}
