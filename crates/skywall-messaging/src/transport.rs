//! Wire transport
//!
//! The client is written against the [`Transport`] trait so tests can inject
//! an in-memory stub. The production implementation builds one
//! `reqwest::Client` per distinct connection profile (TLS flags, proxy,
//! external CA) and lets it keep the underlying sockets alive; an external
//! CA certificate supplied in the metadata is trusted for that profile only.
//!
//! The two TLS bypass flags are not the same thing: `skip_validation`
//! disables certificate verification entirely, while `ignore_ssl_name`
//! still validates the chain against the trust roots and only skips the
//! hostname match (a custom rustls verifier handles that).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::metadata::{ConnectionFlags, ProxySettings};
use crate::response::{HttpMethod, HttpResponse, HttpStatus};
use crate::MessagingResult;

/// A fully resolved request, ready for the wire
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Destination host
    pub host: String,
    /// Destination port
    pub port: u16,
    /// Request URI (path and query)
    pub uri: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body
    pub body: String,
    /// TLS flags
    pub flags: ConnectionFlags,
    /// Proxy to tunnel through, when configured
    pub proxy: Option<ProxySettings>,
    /// Extra CA certificate (PEM) trusted for this request
    pub external_ca: Option<String>,
}

impl TransportRequest {
    /// Scheme derived from the TLS flag
    pub fn scheme(&self) -> &'static str {
        if self.flags.secure {
            "https"
        } else {
            "http"
        }
    }

    /// Full request URL
    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme(), self.host, self.port, self.uri)
    }
}

/// Sends resolved requests over the wire
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the exchange; local failures surface as synthetic statuses on
    /// the error channel
    async fn send(&self, request: &TransportRequest) -> MessagingResult<HttpResponse>;
}

/// Fingerprint of a client profile; requests sharing a fingerprint reuse the
/// same `reqwest::Client` and therefore its persistent connections
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientProfile {
    flags_secure: bool,
    flags_skip_validation: bool,
    flags_ignore_ssl_name: bool,
    proxy: Option<ProxySettings>,
    external_ca: Option<String>,
}

impl ClientProfile {
    fn of(request: &TransportRequest) -> Self {
        Self {
            flags_secure: request.flags.secure,
            flags_skip_validation: request.flags.skip_validation,
            flags_ignore_ssl_name: request.flags.ignore_ssl_name,
            proxy: request.proxy.clone(),
            external_ca: request.external_ca.clone(),
        }
    }
}

/// Production transport over reqwest with rustls
#[derive(Default)]
pub struct ReqwestTransport {
    clients: Mutex<HashMap<ClientProfile, reqwest::Client>>,
}

impl ReqwestTransport {
    /// Fresh transport with no cached client profiles
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, request: &TransportRequest) -> MessagingResult<reqwest::Client> {
        let profile = ClientProfile::of(request);
        if let Some(client) = self.clients.lock().get(&profile) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder().use_rustls_tls();

        if request.flags.skip_validation {
            builder = builder.danger_accept_invalid_certs(true);
            if let Some(pem) = &request.external_ca {
                let cert = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(|e| {
                    HttpResponse::new(HttpStatus::Unknown, format!("Invalid external certificate: {e}"))
                })?;
                builder = builder.add_root_certificate(cert);
            }
        } else if request.flags.ignore_ssl_name {
            // Hostname-only bypass: the chain is still validated, so the
            // trust roots (including any external CA) live inside the
            // preconfigured rustls config
            let tls = no_hostname::tls_config(request.external_ca.as_deref())
                .map_err(|e| HttpResponse::new(HttpStatus::Unknown, format!("Failed to build TLS configuration: {e}")))?;
            builder = builder.use_preconfigured_tls(tls);
        } else if let Some(pem) = &request.external_ca {
            let cert = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(|e| {
                HttpResponse::new(HttpStatus::Unknown, format!("Invalid external certificate: {e}"))
            })?;
            builder = builder.add_root_certificate(cert);
        }
        if let Some(settings) = &request.proxy {
            // HTTPS is tunneled with CONNECT through the proxy
            let proxy_url = format!("http://{}:{}", settings.host, settings.port);
            let mut proxy = reqwest::Proxy::all(&proxy_url)
                .map_err(|e| HttpResponse::new(HttpStatus::Unknown, format!("Invalid proxy settings: {e}")))?;
            if let Some((user, pass)) = settings.authentication.split_once(':') {
                proxy = proxy.basic_auth(user, pass);
            }
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| HttpResponse::new(HttpStatus::Unknown, format!("Failed to build HTTP client: {e}")))?;
        self.clients.lock().insert(profile, client.clone());
        Ok(client)
    }
}

/// Hostname-only TLS bypass for the `ignore_ssl_name` connection flag
///
/// Unlike `skip_validation`, the certificate chain is still validated
/// against the trust roots; only the server-name match is waived.
mod no_hostname {
    use std::sync::Arc;

    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::client::WebPkiServerVerifier;
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{CertificateError, DigitallySignedStruct, Error, RootCertStore, SignatureScheme};

    /// Whether a verification error is purely a server-name mismatch
    pub(super) fn is_name_mismatch(err: &Error) -> bool {
        matches!(
            err,
            Error::InvalidCertificate(CertificateError::NotValidForName)
                | Error::InvalidCertificate(CertificateError::NotValidForNameContext { .. })
        )
    }

    /// Delegates to the standard webpki verifier and waives only the
    /// name-mismatch outcome
    #[derive(Debug)]
    pub(super) struct NoHostnameVerifier {
        inner: Arc<WebPkiServerVerifier>,
    }

    impl NoHostnameVerifier {
        pub(super) fn new(roots: RootCertStore) -> Result<Self, String> {
            WebPkiServerVerifier::builder_with_provider(
                Arc::new(roots),
                Arc::new(rustls::crypto::ring::default_provider()),
            )
            .build()
            .map(|inner| Self { inner })
            .map_err(|e| e.to_string())
        }
    }

    impl ServerCertVerifier for NoHostnameVerifier {
        fn verify_server_cert(
            &self,
            end_entity: &CertificateDer<'_>,
            intermediates: &[CertificateDer<'_>],
            server_name: &ServerName<'_>,
            ocsp_response: &[u8],
            now: UnixTime,
        ) -> Result<ServerCertVerified, Error> {
            match self
                .inner
                .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            {
                // The chain checks run before the name check; a pure name
                // mismatch means everything else already passed
                Err(ref err) if is_name_mismatch(err) => Ok(ServerCertVerified::assertion()),
                other => other,
            }
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            self.inner.verify_tls12_signature(message, cert, dss)
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            self.inner.verify_tls13_signature(message, cert, dss)
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.inner.supported_verify_schemes()
        }
    }

    /// The trust roots: webpki bundle plus any external CA from the message
    pub(super) fn trust_roots(external_ca: Option<&str>) -> Result<RootCertStore, String> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        if let Some(pem) = external_ca {
            for cert in rustls_pemfile::certs(&mut pem.as_bytes()) {
                let cert = cert.map_err(|e| format!("Invalid external certificate: {e}"))?;
                roots.add(cert).map_err(|e| format!("Invalid external certificate: {e}"))?;
            }
        }
        Ok(roots)
    }

    /// Client TLS config validating the chain but not the server name
    pub(super) fn tls_config(external_ca: Option<&str>) -> Result<rustls::ClientConfig, String> {
        let verifier = NoHostnameVerifier::new(trust_roots(external_ca)?)?;
        rustls::ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| e.to_string())
            .map(|builder| {
                builder
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(verifier))
                    .with_no_client_auth()
            })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &TransportRequest) -> MessagingResult<HttpResponse> {
        let client = self.client_for(request)?;
        let url = request.url();
        debug!(method = %request.method, url = %url, "Sending request");

        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| HttpResponse::new(HttpStatus::Unknown, format!("Bad method: {e}")))?;

        let mut req = client.request(method, &url).body(request.body.clone());
        for (key, val) in &request.headers {
            req = req.header(key, val);
        }

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Request failed before a response arrived");
                let status = if e.is_connect() || e.is_timeout() {
                    HttpStatus::NoHttpResponse
                } else {
                    HttpStatus::Unknown
                };
                return Err(HttpResponse::new(status, e.to_string()));
            }
        };

        let status = HttpStatus::from_code(response.status().as_u16());
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| HttpResponse::new(HttpStatus::Unknown, format!("Failed to read response body: {e}")))?;

        Ok(HttpResponse::with_headers(status, body, headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(secure: bool) -> TransportRequest {
        TransportRequest {
            method: HttpMethod::Get,
            host: "fog.example.com".into(),
            port: if secure { 443 } else { 80 },
            uri: "/api".into(),
            headers: HashMap::new(),
            body: String::new(),
            flags: ConnectionFlags {
                secure,
                ..ConnectionFlags::default()
            },
            proxy: None,
            external_ca: None,
        }
    }

    #[test]
    fn test_url_construction() {
        assert_eq!(request(true).url(), "https://fog.example.com:443/api");
        assert_eq!(request(false).url(), "http://fog.example.com:80/api");
    }

    #[test]
    fn test_client_profile_reuse() {
        let transport = ReqwestTransport::new();
        transport.client_for(&request(true)).expect("client");
        transport.client_for(&request(true)).expect("client");
        assert_eq!(transport.clients.lock().len(), 1);

        let mut with_proxy = request(true);
        with_proxy.proxy = Some(ProxySettings {
            host: "proxy.local".into(),
            port: 3128,
            authentication: String::new(),
        });
        transport.client_for(&with_proxy).expect("client");
        assert_eq!(transport.clients.lock().len(), 2);
    }

    #[test]
    fn test_invalid_external_ca_rejected() {
        let transport = ReqwestTransport::new();
        let mut req = request(true);
        req.external_ca = Some("not a pem".into());
        let err = transport.client_for(&req).expect_err("bad cert");
        assert_eq!(err.status(), HttpStatus::Unknown);
    }

    #[test]
    fn test_ignore_ssl_name_and_skip_validation_are_distinct_profiles() {
        let transport = ReqwestTransport::new();

        let mut ignore_name = request(true);
        ignore_name.flags.ignore_ssl_name = true;
        transport.client_for(&ignore_name).expect("client");

        let mut skip = request(true);
        skip.flags.skip_validation = true;
        transport.client_for(&skip).expect("client");

        assert_eq!(transport.clients.lock().len(), 2);
    }

    #[test]
    fn test_ignore_ssl_name_still_checks_the_chain() {
        use rustls::client::danger::ServerCertVerifier;
        use rustls::pki_types::{CertificateDer, ServerName, UnixTime};

        // skip_validation would wave this through; the name-only bypass must
        // still reject a certificate that does not verify against the roots
        let roots = no_hostname::trust_roots(None).expect("roots");
        let verifier = no_hostname::NoHostnameVerifier::new(roots).expect("verifier");

        let bogus = CertificateDer::from(vec![0u8; 16]);
        let name = ServerName::try_from("fog.example.com").expect("name");
        let result = verifier.verify_server_cert(&bogus, &[], &name, &[], UnixTime::now());
        assert!(result.is_err());
    }

    #[test]
    fn test_only_name_mismatch_is_waived() {
        use rustls::{CertificateError, Error};

        assert!(no_hostname::is_name_mismatch(&Error::InvalidCertificate(
            CertificateError::NotValidForName
        )));
        // Chain and encoding failures keep failing the handshake
        assert!(!no_hostname::is_name_mismatch(&Error::InvalidCertificate(
            CertificateError::UnknownIssuer
        )));
        assert!(!no_hostname::is_name_mismatch(&Error::InvalidCertificate(
            CertificateError::BadEncoding
        )));
        assert!(!no_hostname::is_name_mismatch(&Error::InvalidCertificate(
            CertificateError::Expired
        )));
    }

    #[test]
    fn test_ignore_ssl_name_external_ca_reaches_the_roots() {
        // The external CA lands in the verifier's trust roots instead of
        // being dropped by the preconfigured TLS path; a PEM section that is
        // not a certificate is rejected there
        let pem = "-----BEGIN CERTIFICATE-----\naGVsbG8gd29ybGQ=\n-----END CERTIFICATE-----\n";
        assert!(no_hostname::trust_roots(Some(pem)).is_err());
        assert!(no_hostname::trust_roots(None).is_ok());
    }
}
