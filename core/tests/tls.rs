//! Calls against the mock server behind a self-signed certificate.
//!
//! # Design
//! A fresh certificate is generated per server with rcgen and served through
//! axum-server's rustls acceptor, so the default ureq transport has to either
//! reject the unknown issuer or skip verification.

use std::net::SocketAddr;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use inocore_connect::{ApiClient, ApiError, ClientConfig};
use mock_server::{AppState, MockConfig, DEFAULT_PASSWORD, DEFAULT_USERNAME};
use rcgen::CertifiedKey;
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};

fn self_signed_config() -> RustlsConfig {
    let CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()]).unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let server_config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .unwrap();
    RustlsConfig::from_config(Arc::new(server_config))
}

/// Serve `state` over HTTPS on 127.0.0.1 with an OS-assigned port.
fn start_tls_server(state: AppState) -> SocketAddr {
    let tls = self_signed_config();
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            axum_server::from_tcp_rustls(std_listener, tls)
                .serve(mock_server::router(state).into_make_service())
                .await
        })
        .unwrap();
    });

    addr
}

fn config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(&format!("https://{addr}"), DEFAULT_USERNAME, DEFAULT_PASSWORD, "tEsT@ino").unwrap()
}

#[test]
fn self_signed_certificate_is_rejected_by_default() {
    let addr = start_tls_server(AppState::new(MockConfig::default()));
    let client = ApiClient::new(config(addr));

    assert!(client.config().verifies_peer());
    let err = client.get("v1/ping", None).unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse { status: None, .. }), "{err:?}");
}

#[test]
fn self_signed_certificate_is_accepted_without_peer_verification() {
    let state = AppState::new(MockConfig::default());
    let addr = start_tls_server(state.clone());
    let client = ApiClient::new(config(addr).verify_peer(false));

    let body = client.get("v1/ping", None).unwrap().into_json().unwrap();
    assert_eq!(body["data"]["PONG"], 1);
    assert_eq!(state.token_requests(), 1);
}
