// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading and merging.

use keywarden_config::{load_config_from_str, validate_config};

#[test]
fn empty_config_uses_defaults() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.storage.path, "keywarden-data");
    assert_eq!(config.server.listen_address, "127.0.0.1:5771");
    assert!(!config.server.production);
    assert!(config.server.tls.is_none());
    assert_eq!(config.log.level, "info");
}

#[test]
fn full_config_round_trips() {
    let config = load_config_from_str(
        r#"
[storage]
path = "/var/lib/keywarden"

[server]
listen_address = "0.0.0.0:5771"
production = true

[server.tls]
cert_file = "/etc/keywarden/cert.pem"
key_file = "/etc/keywarden/key.pem"

[log]
level = "debug"
"#,
    )
    .unwrap();

    assert_eq!(config.storage.path, "/var/lib/keywarden");
    assert_eq!(config.server.listen_address, "0.0.0.0:5771");
    assert!(config.server.production);
    let tls = config.server.tls.as_ref().unwrap();
    assert_eq!(tls.cert_file, "/etc/keywarden/cert.pem");
    assert_eq!(tls.key_file, "/etc/keywarden/key.pem");
    assert_eq!(config.log.level, "debug");
    assert!(validate_config(&config).is_ok());
}

#[test]
fn unknown_keys_are_rejected() {
    let result = load_config_from_str(
        r#"
[storage]
path = "/tmp/kw"
pathh = "typo"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn unknown_section_is_rejected() {
    let result = load_config_from_str(
        r#"
[stroage]
path = "/tmp/kw"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn partial_section_keeps_other_defaults() {
    let config = load_config_from_str(
        r#"
[server]
listen_address = "[::1]:9000"
"#,
    )
    .unwrap();
    assert_eq!(config.server.listen_address, "[::1]:9000");
    assert!(!config.server.production);
    assert_eq!(config.storage.path, "keywarden-data");
}
