//! TLS setup for the hyper transport.
//!
//! Native root certificates are loaded from the OS store once per process and
//! cached; the store can be slow to read on some platforms.

use super::hyper_adapter::{TlsRootConfig, TransportSecurity};
use crate::error::{ActionClientError, BoxError};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use rustls_pki_types::CertificateDer;
use std::sync::{Arc, OnceLock};

/// Cached native root certificates; empty when none were found.
static NATIVE_ROOTS: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

#[cfg(test)]
static LOAD_COUNT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

fn load_native_roots() -> Vec<CertificateDer<'static>> {
    #[cfg(test)]
    LOAD_COUNT.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

    let result = rustls_native_certs::load_native_certs();
    for err in &result.errors {
        tracing::warn!(error = %err, "error loading native root certificate");
    }

    if result.certs.is_empty() {
        tracing::warn!("no native root CA certificates found");
    } else {
        tracing::debug!(
            count = result.certs.len(),
            "loaded native root certificates"
        );
    }
    result.certs
}

/// Native root certificates, loaded on first use.
pub(super) fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS.get_or_init(load_native_roots).as_slice()
}

/// The globally installed crypto provider, or a fresh aws-lc-rs provider.
///
/// Never installs a provider globally.
pub(super) fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// rustls client configuration trusting the OS root store.
///
/// Fails when no usable root certificate is available so that the problem
/// surfaces when the adapter is built rather than on the first handshake.
fn native_roots_client_config() -> Result<rustls::ClientConfig, BoxError> {
    let certs = native_root_certs();
    if certs.is_empty() {
        return Err("no native root CA certificates found in OS certificate store".into());
    }

    let mut root_store = rustls::RootCertStore::empty();
    let (added, ignored) = root_store.add_parsable_certificates(certs.iter().cloned());
    if ignored > 0 {
        tracing::warn!(
            added,
            ignored,
            "some native root certificates could not be parsed"
        );
    }
    if added == 0 {
        return Err(format!(
            "no valid native root CA certificates parsed (found {}, all failed to parse)",
            certs.len()
        )
        .into());
    }

    Ok(
        rustls::ClientConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    )
}

/// HTTPS connector for the requested trust roots.
///
/// ALPN advertises both h2 and http/1.1. Plain `http` connections are only
/// possible with [`TransportSecurity::AllowInsecureHttp`].
///
/// # Errors
/// Returns `Transport` when the TLS configuration cannot be built.
pub(super) fn https_connector(
    tls_roots: TlsRootConfig,
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, ActionClientError> {
    let allow_http = transport == TransportSecurity::AllowInsecureHttp;

    let builder = match tls_roots {
        TlsRootConfig::WebPki => hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(crypto_provider())
            .map_err(|e| ActionClientError::Transport(Box::new(e)))?,
        TlsRootConfig::Native => hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(native_roots_client_config().map_err(ActionClientError::Transport)?),
    };

    Ok(if allow_http {
        builder.https_or_http().enable_all_versions().build()
    } else {
        builder.https_only().enable_all_versions().build()
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_native_roots_cached() {
        // Other tests may already have filled the cache
        let initial = LOAD_COUNT.load(Ordering::SeqCst);

        let first = native_root_certs();
        let second = native_root_certs();

        assert!(LOAD_COUNT.load(Ordering::SeqCst) <= initial + 1);
        assert!(std::ptr::eq(first, second), "should return same slice");
    }

    #[test]
    fn test_webpki_connector_builds() {
        assert!(https_connector(TlsRootConfig::WebPki, TransportSecurity::TlsOnly).is_ok());
        assert!(
            https_connector(TlsRootConfig::WebPki, TransportSecurity::AllowInsecureHttp).is_ok()
        );
    }

    #[test]
    fn test_native_connector_does_not_panic() {
        // CI containers may lack an OS certificate store, so both outcomes are valid
        match https_connector(TlsRootConfig::Native, TransportSecurity::TlsOnly) {
            Ok(_) => tracing::debug!("native roots available"),
            Err(e) => tracing::debug!(error = %e, "native roots unavailable"),
        }
    }
}
