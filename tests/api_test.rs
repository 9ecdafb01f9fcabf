//! Integration tests for the public API

use std::io;

use ssl_expiry_exporter::{
    ConfigPayload, Endpoint, EndpointStore, OpensslProbe, ProbeError, ProbeErrorKind,
    ProbeResult, Prober,
};

#[test]
fn test_public_api_compiles() {
    // This test ensures the public API is usable and compiles correctly
    fn check_certificate(hostname: &str) -> Result<i64, ProbeError> {
        OpensslProbe::default().seconds_until_expiry(hostname)
    }

    // We don't actually run this in tests (would require network)
    // but we verify it compiles
    let _ = check_certificate;
}

#[test]
fn test_error_types_are_public() {
    // Verify error types can be matched
    fn handle_error(err: ProbeError) -> String {
        match err {
            ProbeError::DnsResolution { hostname, .. } => {
                format!("DNS failed for {}", hostname)
            }
            ProbeError::ConnectionFailed { address, .. } => {
                format!("Connection failed to {}", address)
            }
            ProbeError::HandshakeFailed { details } => {
                format!("Handshake failed: {}", details)
            }
            ProbeError::Timeout { operation } => {
                format!("Timeout: {}", operation)
            }
            ProbeError::NoCertificatePresented => "No certificate".to_string(),
            ProbeError::OpenSSL(stack) => {
                format!("OpenSSL error: {}", stack)
            }
        }
    }

    let err = ProbeError::DnsResolution {
        hostname: "nowhere.test".to_string(),
        source: io::Error::from(io::ErrorKind::NotFound),
    };

    let msg = handle_error(err);
    assert!(msg.contains("nowhere.test"));
}

#[test]
fn test_failure_carries_kind_and_detail() {
    let result = ProbeResult::from_outcome(
        Endpoint::from("a.example"),
        Err(ProbeError::HandshakeFailed {
            details: "unexpected eof".to_string(),
        }),
    );

    match result {
        ProbeResult::Failure {
            domain,
            reason,
            detail,
        } => {
            assert_eq!(domain, Endpoint::from("a.example"));
            assert_eq!(reason, ProbeErrorKind::ConnectionFailed);
            assert_eq!(detail, "TLS handshake failed: unexpected eof");
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn test_probe_error_kind_display() {
    assert_eq!(ProbeErrorKind::ConnectionFailed.to_string(), "connection_failed");
    let name: &str = ProbeErrorKind::NoCertificatePresented.as_ref();
    assert_eq!(name, "no_certificate_presented");
}

#[test]
fn test_prober_is_object_safe() {
    let probers: Vec<Box<dyn Prober>> = vec![Box::new(OpensslProbe::default())];
    assert_eq!(probers.len(), 1);
}

#[test]
fn test_store_round_trips_payload() {
    let store = EndpointStore::default();
    let payload = ConfigPayload::parse(br#"{"domains":["a.example","b.example"]}"#).unwrap();
    store.replace(payload);

    assert_eq!(
        store.snapshot(),
        vec![Endpoint::from("a.example"), Endpoint::from("b.example")]
    );
}
