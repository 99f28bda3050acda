#[cfg(test)]
mod tests {
    use crate::config::Settings;
    use crate::transform::{
        apply_status_mapping, first_movement_code, overwrite_brokerage_status,
        strip_planning_fields, TransformError,
    };
    use crate::upstream::client::TmsClient;
    use crate::upstream::error::UpstreamError;
    use reqwest::header::HOST;
    use reqwest::Method;
    use serde_json::{json, Value};

    fn order_payload(brokerage_status: &str) -> Value {
        json!({
            "message": {
                "status": "X",
                "movements": [
                    {"brokerage_status": brokerage_status, "status": "X"}
                ],
                "stops": [
                    {"status": "X"},
                    {"status": "Y"}
                ]
            }
        })
    }

    fn configured_settings() -> Settings {
        Settings {
            get_url: Some("https://tms.example.com/ws/api".to_string()),
            token: Some("secret-token".to_string()),
            company_id: Some("TMS01".to_string()),
            ..Default::default()
        }
    }

    // --- status mapping rules ---

    #[test]
    fn enroute_marks_first_stop_departed() {
        let input = order_payload("enroute");
        let output = apply_status_mapping(&input, None, None);

        assert_eq!(
            output,
            json!({
                "message": {
                    "status": "P",
                    "movements": [
                        {"brokerage_status": "ENROUTE", "status": "P"}
                    ],
                    "stops": [
                        {"status": "D"},
                        {"status": "Y"}
                    ]
                }
            })
        );
    }

    #[test]
    fn arrived_shipper_marks_first_stop_arrived() {
        for code in ["ARVDSHPPER", "ARVDSHPR"] {
            let input = order_payload(code);
            let output = apply_status_mapping(&input, Some("2024-01-01T08:00:00Z"), None);

            assert_eq!(output["message"]["status"], "P");
            assert_eq!(
                output["message"]["movements"][0]["brokerage_status"],
                "ARVDSHPR"
            );
            assert_eq!(output["message"]["movements"][0]["status"], "P");
            assert_eq!(output["message"]["stops"][0]["status"], "A");
            assert_eq!(
                output["message"]["stops"][0]["actual_arrival"],
                "2024-01-01T08:00:00Z"
            );
            assert_eq!(output["message"]["stops"][1], json!({"status": "Y"}));
        }
    }

    #[test]
    fn arrived_consignee_marks_last_stop_arrived() {
        let input = order_payload("ARVDCNSG");
        let output = apply_status_mapping(&input, Some("2024-01-01T10:00:00Z"), None);

        assert_eq!(output["message"]["status"], "P");
        assert_eq!(
            output["message"]["movements"][0]["brokerage_status"],
            "ARVDCNSG"
        );
        assert_eq!(output["message"]["stops"][0], json!({"status": "X"}));
        assert_eq!(output["message"]["stops"][1]["status"], "A");
        assert_eq!(
            output["message"]["stops"][1]["actual_arrival"],
            "2024-01-01T10:00:00Z"
        );
    }

    #[test]
    fn delivered_marks_order_and_last_stop_delivered() {
        let input = order_payload("DELIVER");
        let output = apply_status_mapping(&input, None, Some("2024-01-02T16:30:00Z"));

        assert_eq!(output["message"]["status"], "D");
        assert_eq!(
            output["message"]["movements"][0]["brokerage_status"],
            "DELIVER"
        );
        assert_eq!(output["message"]["movements"][0]["status"], "D");
        assert_eq!(output["message"]["stops"][1]["status"], "D");
        assert_eq!(
            output["message"]["stops"][1]["actual_departure"],
            "2024-01-02T16:30:00Z"
        );
        assert_eq!(output["message"]["stops"][0], json!({"status": "X"}));
    }

    #[test]
    fn breakdown_only_normalizes_the_code() {
        let input = order_payload(" breakdwn ");
        let output = apply_status_mapping(&input, Some("ts-a"), Some("ts-d"));

        assert_eq!(output["message"]["status"], "X");
        assert_eq!(
            output["message"]["movements"][0]["brokerage_status"],
            "BREAKDWN"
        );
        assert_eq!(output["message"]["movements"][0]["status"], "X");
        assert_eq!(output["message"]["stops"][0], json!({"status": "X"}));
        assert_eq!(output["message"]["stops"][1], json!({"status": "Y"}));
    }

    #[test]
    fn timestamps_are_only_written_when_provided() {
        let output = apply_status_mapping(&order_payload("ENROUTE"), None, None);
        assert!(output["message"]["stops"][0].get("actual_departure").is_none());

        let output = apply_status_mapping(&order_payload("ENROUTE"), None, Some("ts"));
        assert_eq!(output["message"]["stops"][0]["actual_departure"], "ts");
    }

    #[test]
    fn unknown_code_leaves_status_fields_untouched() {
        let input = order_payload("SOMETHING_ELSE");
        let output = apply_status_mapping(&input, Some("ts"), Some("ts"));
        assert_eq!(output, input);
    }

    #[test]
    fn input_payload_is_never_mutated() {
        let input = order_payload("DELIVER");
        let before = input.clone();
        let _ = apply_status_mapping(&input, Some("a"), Some("d"));
        assert_eq!(input, before);
    }

    #[test]
    fn empty_stops_skips_only_the_stop_writes() {
        let input = json!({
            "message": {
                "status": "X",
                "movements": [{"brokerage_status": "ENROUTE", "status": "X"}],
                "stops": []
            }
        });
        let output = apply_status_mapping(&input, None, Some("ts"));

        assert_eq!(output["message"]["status"], "P");
        assert_eq!(output["message"]["movements"][0]["status"], "P");
        assert_eq!(output["message"]["stops"], json!([]));
    }

    #[test]
    fn missing_movements_means_no_rule_and_no_stop_writes() {
        let input = json!({
            "message": {
                "status": "X",
                "stops": [{"status": "X"}]
            }
        });
        let output = apply_status_mapping(&input, Some("ts"), Some("ts"));
        assert_eq!(output, input);
    }

    #[test]
    fn empty_or_malformed_movements_mean_no_rule() {
        let empty = json!({"message": {"status": "X", "movements": [], "stops": [{"status": "X"}]}});
        assert_eq!(apply_status_mapping(&empty, Some("ts"), None), empty);

        let malformed = json!({
            "message": {
                "status": "X",
                "movements": ["ENROUTE"],
                "stops": [{"status": "X"}]
            }
        });
        assert_eq!(apply_status_mapping(&malformed, Some("ts"), None), malformed);

        let non_string_code = json!({
            "message": {
                "status": "X",
                "movements": [{"brokerage_status": 7}],
                "stops": [{"status": "X"}]
            }
        });
        assert_eq!(
            apply_status_mapping(&non_string_code, Some("ts"), None),
            non_string_code
        );
    }

    #[test]
    fn payload_without_message_round_trips_minus_redacted_keys() {
        let input = json!({"id": 42, "planning": {"a": 1}, "other": "value"});
        let output = apply_status_mapping(&input, None, None);
        assert_eq!(output, json!({"id": 42, "other": "value"}));
    }

    #[test]
    fn non_mapping_message_is_left_alone() {
        let input = json!({"message": "plain text"});
        let output = apply_status_mapping(&input, None, None);
        assert_eq!(output, input);
    }

    #[test]
    fn code_normalization_trims_and_uppercases() {
        let payload = order_payload("  enroute  ");
        assert_eq!(first_movement_code(&payload).as_deref(), Some("ENROUTE"));

        let output = apply_status_mapping(&payload, None, None);
        assert_eq!(output["message"]["movements"][0]["brokerage_status"], "ENROUTE");
    }

    // --- redaction ---

    #[test]
    fn redaction_removes_keys_at_every_depth() {
        let mut value = json!({
            "planning": {"x": 1},
            "order_planning2": 1,
            "other": {"planning": "nested"},
            "list": [
                {"order_planning3": true, "keep": 1},
                {"deep": {"order_planning4": [1, 2]}}
            ]
        });
        strip_planning_fields(&mut value);

        assert_eq!(
            value,
            json!({
                "other": {},
                "list": [
                    {"keep": 1},
                    {"deep": {}}
                ]
            })
        );
    }

    #[test]
    fn redaction_is_idempotent() {
        let mut once = json!({
            "planning": 1,
            "nested": {"order_planning2": 2, "keep": [{"planning": 3}]}
        });
        strip_planning_fields(&mut once);
        let mut twice = once.clone();
        strip_planning_fields(&mut twice);
        assert_eq!(once, twice);
    }

    // --- targeted brokerage status overwrite ---

    #[test]
    fn overwrite_finds_top_level_movements() {
        let input = json!({
            "movements": [{"brokerage_status": "OLD"}],
            "planning": {"drop": true}
        });
        let output = overwrite_brokerage_status(&input, "DELIVER").expect("movements present");

        assert_eq!(output, json!({"movements": [{"brokerage_status": "DELIVER"}]}));
        assert_eq!(input["movements"][0]["brokerage_status"], "OLD");
    }

    #[test]
    fn overwrite_falls_back_to_message_movements() {
        let input = json!({
            "message": {
                "movements": [{"brokerage_status": "OLD", "status": "X"}]
            }
        });
        let output = overwrite_brokerage_status(&input, "BREAKDWN").expect("movements present");

        assert_eq!(
            output["message"]["movements"][0]["brokerage_status"],
            "BREAKDWN"
        );
        assert_eq!(output["message"]["movements"][0]["status"], "X");
    }

    #[test]
    fn overwrite_reports_available_keys_when_movements_missing() {
        let input = json!({"id": 1, "message": {"stops": []}});
        let err = overwrite_brokerage_status(&input, "DELIVER").unwrap_err();

        let TransformError::MovementsNotFound { keys } = err;
        assert_eq!(keys, vec!["id".to_string(), "message".to_string()]);
    }

    #[test]
    fn overwrite_rejects_non_mapping_first_movement() {
        let input = json!({"movements": ["DELIVER"]});
        assert!(overwrite_brokerage_status(&input, "DELIVER").is_err());
    }

    // --- upstream client construction ---

    #[test]
    fn missing_settings_are_reported_together() {
        let err = TmsClient::new(&Settings::default()).unwrap_err();
        match err {
            UpstreamError::MissingConfig { missing } => {
                assert_eq!(missing, vec!["GET_URL", "TOKEN", "COMPANY_ID"]);
            }
            other => panic!("expected MissingConfig, got {other:?}"),
        }
    }

    #[test]
    fn fetch_url_appends_orders_segment_once() {
        let client = TmsClient::new(&configured_settings()).expect("client");
        assert_eq!(
            client.fetch_url("123"),
            "https://tms.example.com/ws/api/orders/123"
        );

        let settings = Settings {
            get_url: Some("https://tms.example.com/ws/api/orders/".to_string()),
            ..configured_settings()
        };
        let client = TmsClient::new(&settings).expect("client");
        assert_eq!(
            client.fetch_url("123"),
            "https://tms.example.com/ws/api/orders/123"
        );
    }

    #[test]
    fn update_url_targets_orders_update() {
        let client = TmsClient::new(&configured_settings()).expect("client");
        assert_eq!(
            client.update_url(),
            "https://tms.example.com/ws/api/orders/update"
        );
    }

    #[test]
    fn methods_default_to_get_and_put() {
        let client = TmsClient::new(&configured_settings()).expect("client");
        assert_eq!(client.fetch_method(), &Method::GET);
        assert_eq!(client.update_method(), &Method::PUT);
    }

    #[test]
    fn method_overrides_are_honored() {
        let settings = Settings {
            request_method: Some("post".to_string()),
            update_method: Some(" PATCH ".to_string()),
            ..configured_settings()
        };
        let client = TmsClient::new(&settings).expect("client");
        assert_eq!(client.fetch_method(), &Method::POST);
        assert_eq!(client.update_method(), &Method::PATCH);
    }

    #[test]
    fn nonsense_method_override_falls_back_to_default() {
        let settings = Settings {
            update_method: Some("not a method".to_string()),
            ..configured_settings()
        };
        let client = TmsClient::new(&settings).expect("client");
        assert_eq!(client.update_method(), &Method::PUT);
    }

    #[test]
    fn tls_verification_defaults_on() {
        let client = TmsClient::new(&configured_settings()).expect("client");
        assert!(client.verify_tls());
    }

    #[test]
    fn pinned_ip_over_https_defaults_verification_off() {
        let settings = Settings {
            upstream_connect_ip: Some("203.0.113.10".to_string()),
            ..configured_settings()
        };
        let client = TmsClient::new(&settings).expect("client");
        assert!(!client.verify_tls());
    }

    #[test]
    fn explicit_verify_setting_wins_over_pinned_ip() {
        let settings = Settings {
            upstream_connect_ip: Some("203.0.113.10".to_string()),
            requests_verify: Some(true),
            ..configured_settings()
        };
        let client = TmsClient::new(&settings).expect("client");
        assert!(client.verify_tls());

        let settings = Settings {
            requests_verify: Some(false),
            ..configured_settings()
        };
        let client = TmsClient::new(&settings).expect("client");
        assert!(!client.verify_tls());
    }

    #[test]
    fn pinned_ip_over_http_keeps_verification_on() {
        let settings = Settings {
            get_url: Some("http://tms.example.com/ws/api".to_string()),
            upstream_connect_ip: Some("203.0.113.10".to_string()),
            ..configured_settings()
        };
        let client = TmsClient::new(&settings).expect("client");
        assert!(client.verify_tls());
    }

    #[test]
    fn pinned_ip_preserves_hostname_in_host_header() {
        let settings = Settings {
            upstream_connect_ip: Some("203.0.113.10".to_string()),
            ..configured_settings()
        };
        let client = TmsClient::new(&settings).expect("client");
        assert_eq!(
            client.headers().get(HOST).and_then(|v| v.to_str().ok()),
            Some("tms.example.com")
        );
    }

    #[test]
    fn explicit_host_header_wins() {
        let settings = Settings {
            upstream_connect_ip: Some("203.0.113.10".to_string()),
            host_header: Some("override.example.com".to_string()),
            ..configured_settings()
        };
        let client = TmsClient::new(&settings).expect("client");
        assert_eq!(
            client.headers().get(HOST).and_then(|v| v.to_str().ok()),
            Some("override.example.com")
        );
    }

    #[test]
    fn auth_and_tenant_headers_are_always_present() {
        let client = TmsClient::new(&configured_settings()).expect("client");
        let headers = client.headers();

        assert_eq!(
            headers
                .get(reqwest::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
            Some("Token secret-token")
        );
        assert_eq!(
            headers
                .get("x-com.mcleodsoftware.companyid")
                .and_then(|v| v.to_str().ok()),
            Some("TMS01")
        );
        assert_eq!(
            headers
                .get(reqwest::header::ACCEPT)
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
        assert!(headers.get(HOST).is_none());
    }

    #[test]
    fn invalid_base_url_is_a_configuration_error() {
        let settings = Settings {
            get_url: Some("not a url".to_string()),
            ..configured_settings()
        };
        assert!(matches!(
            TmsClient::new(&settings),
            Err(UpstreamError::InvalidConfig(_))
        ));
    }

    #[test]
    fn invalid_connect_ip_is_a_configuration_error() {
        let settings = Settings {
            upstream_connect_ip: Some("not-an-ip".to_string()),
            ..configured_settings()
        };
        assert!(matches!(
            TmsClient::new(&settings),
            Err(UpstreamError::InvalidConfig(_))
        ));
    }
}
