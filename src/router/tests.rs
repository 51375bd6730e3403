// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod router_tests {
    use crate::kube::Ingress;
    use crate::router::{RoutingSnapshot, SharedSnapshot};
    use serde_json::json;
    use std::sync::Arc;

    fn backend_json(service: &str) -> serde_json::Value {
        json!({ "service": { "name": service, "port": { "number": 8080 } } })
    }

    /// The rule set the original deployment shipped with: service1 as the
    /// default, www.test.de entirely to service2, www.test.co.uk to service3
    /// except /backend which goes to service4.
    fn example_ingress() -> Ingress {
        serde_json::from_value(json!({
            "metadata": { "name": "ingress1", "namespace": "default" },
            "spec": {
                "defaultBackend": backend_json("service1"),
                "rules": [
                    {
                        "host": "www.test.de",
                        "http": { "paths": [
                            { "path": "/", "backend": backend_json("service2") }
                        ]}
                    },
                    {
                        "host": "www.test.co.uk",
                        "http": { "paths": [
                            { "path": "/", "backend": backend_json("service3") },
                            { "path": "/backend", "backend": backend_json("service4") }
                        ]}
                    }
                ]
            }
        }))
        .unwrap()
    }

    fn example_snapshot() -> RoutingSnapshot {
        RoutingSnapshot::compile(example_ingress())
    }

    fn resolved_service(snapshot: &RoutingSnapshot, host: &str, path: &str) -> String {
        snapshot
            .resolve(host, path)
            .unwrap_or_else(|| panic!("no backend for host={host} path={path}"))
            .service
            .clone()
    }

    #[test]
    fn test_sample_config_routing() {
        let snapshot = example_snapshot();

        assert_eq!(
            resolved_service(&snapshot, "www.test.de", "/any/page/asd"),
            "service2"
        );
        assert_eq!(
            resolved_service(&snapshot, "www.test.co.uk", "/any/page/asd"),
            "service3"
        );
        assert_eq!(
            resolved_service(&snapshot, "www.test.co.uk", "/backend/asd"),
            "service4"
        );
    }

    #[test]
    fn test_unmatched_host_falls_back_to_default() {
        let snapshot = example_snapshot();

        assert_eq!(
            resolved_service(&snapshot, "unknown.example", "/"),
            "service1"
        );
    }

    #[test]
    fn test_host_comparison_is_case_insensitive() {
        let ingress: Ingress = serde_json::from_value(json!({
            "metadata": { "name": "ingress1", "namespace": "default" },
            "spec": {
                "rules": [{
                    "host": "www.Test.de",
                    "http": { "paths": [
                        { "path": "/", "backend": backend_json("service2") }
                    ]}
                }]
            }
        }))
        .unwrap();
        let snapshot = RoutingSnapshot::compile(ingress);

        assert_eq!(resolved_service(&snapshot, "www.test.DE", "/"), "service2");
        assert_eq!(resolved_service(&snapshot, "WWW.TEST.DE", "/x"), "service2");
    }

    #[test]
    fn test_longest_prefix_wins_regardless_of_declaration_order() {
        let snapshot = example_snapshot();

        // "/backend" is declared after "/" but is longer, so it wins.
        assert_eq!(
            resolved_service(&snapshot, "www.test.co.uk", "/backend"),
            "service4"
        );
        // Paths outside the longer prefix still hit "/".
        assert_eq!(
            resolved_service(&snapshot, "www.test.co.uk", "/backen"),
            "service3"
        );
    }

    #[test]
    fn test_equal_length_prefixes_keep_first_declared_rule() {
        let ingress: Ingress = serde_json::from_value(json!({
            "metadata": { "name": "ingress1", "namespace": "default" },
            "spec": {
                "rules": [{
                    "host": "www.test.de",
                    "http": { "paths": [
                        { "path": "/api", "backend": backend_json("first") },
                        { "path": "/api", "backend": backend_json("second") }
                    ]}
                }]
            }
        }))
        .unwrap();
        let snapshot = RoutingSnapshot::compile(ingress);

        for _ in 0..10 {
            assert_eq!(
                resolved_service(&snapshot, "www.test.de", "/api/v1"),
                "first"
            );
        }
    }

    #[test]
    fn test_empty_path_normalizes_to_root() {
        let ingress: Ingress = serde_json::from_value(json!({
            "metadata": { "name": "ingress1", "namespace": "default" },
            "spec": {
                "rules": [{
                    "host": "www.test.de",
                    "http": { "paths": [
                        { "path": "", "backend": backend_json("service2") }
                    ]}
                }]
            }
        }))
        .unwrap();
        let snapshot = RoutingSnapshot::compile(ingress);

        assert_eq!(
            resolved_service(&snapshot, "www.test.de", "/anything"),
            "service2"
        );
    }

    #[test]
    fn test_no_match_and_no_default_resolves_to_none() {
        let ingress: Ingress = serde_json::from_value(json!({
            "metadata": { "name": "ingress1", "namespace": "default" },
            "spec": {
                "rules": [{
                    "host": "www.test.de",
                    "http": { "paths": [
                        { "path": "/only-this", "backend": backend_json("service2") }
                    ]}
                }]
            }
        }))
        .unwrap();
        let snapshot = RoutingSnapshot::compile(ingress);

        assert!(snapshot.resolve("unknown.example", "/").is_none());
        // Host matches but no path rule does, and there is no default.
        assert!(snapshot.resolve("www.test.de", "/other").is_none());
    }

    #[test]
    fn test_backends_resolve_in_the_resource_namespace() {
        let mut ingress = example_ingress();
        ingress.metadata.namespace = "edge".to_string();
        let snapshot = RoutingSnapshot::compile(ingress);

        let backend = snapshot.resolve("www.test.de", "/").unwrap();
        assert_eq!(backend.namespace, "edge");
        assert_eq!(
            backend.target_url(),
            "http://service2.edge.svc.cluster.local:8080"
        );
    }

    #[tokio::test]
    async fn test_shared_snapshot_load_is_stable_until_store() {
        let shared = SharedSnapshot::new(example_snapshot());

        let first = shared.load().await;
        let second = shared.load().await;
        assert!(Arc::ptr_eq(&first, &second));

        shared.store(example_snapshot()).await;
        let third = shared.load().await;
        assert!(!Arc::ptr_eq(&first, &third));

        // Readers holding the old snapshot still see a complete rule set.
        assert_eq!(
            first.resolve("www.test.de", "/").unwrap().service,
            "service2"
        );
    }
}
