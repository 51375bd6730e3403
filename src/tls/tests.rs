// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tls_tests {
    use crate::kube::{Secret, TlsMaterial};
    use crate::tls::acceptor_from_pem;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use serde_json::json;

    // Self-signed pair for CN=www.test.de, valid for ten years.
    const CERT_PEM: &[u8] = include_bytes!("testdata/cert.pem");
    const KEY_PEM: &[u8] = include_bytes!("testdata/key.pem");

    fn material() -> TlsMaterial {
        TlsMaterial {
            cert_pem: CERT_PEM.to_vec(),
            key_pem: KEY_PEM.to_vec(),
        }
    }

    #[test]
    fn test_acceptor_from_valid_pem_pair() {
        assert!(acceptor_from_pem(&material()).is_ok());
    }

    #[test]
    fn test_garbage_cert_is_a_tls_secret_error() {
        let material = TlsMaterial {
            cert_pem: b"not a certificate".to_vec(),
            key_pem: KEY_PEM.to_vec(),
        };

        let err = acceptor_from_pem(&material).map(|_| ()).unwrap_err();
        assert!(err.to_string().contains("TLS secret error"));
    }

    #[test]
    fn test_missing_key_is_a_tls_secret_error() {
        let material = TlsMaterial {
            cert_pem: CERT_PEM.to_vec(),
            key_pem: Vec::new(),
        };

        assert!(acceptor_from_pem(&material).is_err());
    }

    #[test]
    fn test_secret_round_trips_into_an_acceptor() {
        let secret: Secret = serde_json::from_value(json!({
            "metadata": { "name": "tls-secret", "namespace": "default" },
            "data": {
                "tls.crt": BASE64.encode(CERT_PEM),
                "tls.key": BASE64.encode(KEY_PEM),
            }
        }))
        .unwrap();

        let material = secret.tls_material().unwrap();
        assert!(acceptor_from_pem(&material).is_ok());
    }

    #[test]
    fn test_secret_without_cert_entry_fails() {
        let secret: Secret = serde_json::from_value(json!({
            "metadata": { "name": "tls-secret", "namespace": "default" },
            "data": { "tls.key": BASE64.encode(KEY_PEM) }
        }))
        .unwrap();

        let err = secret.tls_material().unwrap_err();
        assert!(err.to_string().contains("tls.crt"));
    }

    #[test]
    fn test_secret_with_invalid_base64_fails() {
        let secret: Secret = serde_json::from_value(json!({
            "metadata": { "name": "tls-secret", "namespace": "default" },
            "data": {
                "tls.crt": "%%% not base64 %%%",
                "tls.key": BASE64.encode(KEY_PEM),
            }
        }))
        .unwrap();

        assert!(secret.tls_material().is_err());
    }
}
