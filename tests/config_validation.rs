//! Integration tests for configuration validation

#![allow(clippy::expect_used)]

use game_transport::config::{
    AuthenticationMode, ClientConfig, LoggingConfig, NetworkConfig, ServerConfig,
    TransportConfig, DEFAULT_CIPHER_KEY, MAX_PAYLOAD_SIZE,
};
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = NetworkConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_defaults() {
    let config = NetworkConfig::default();
    assert_eq!(config.server.hello_timeout, Duration::from_secs(300));
    assert_eq!(config.transport.authentication, AuthenticationMode::Token);
    assert_eq!(config.transport.token_freshness, Duration::from_secs(30));
    assert_eq!(config.transport.cipher_key, DEFAULT_CIPHER_KEY);
    assert_eq!(config.transport.max_payload_size, MAX_PAYLOAD_SIZE);
}

#[test]
fn test_invalid_server_address() {
    let mut config = NetworkConfig::default();
    config.server.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(!errors.is_empty(), "Should have validation errors");
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_empty_server_address() {
    let mut config = NetworkConfig::default();
    config.server.address = String::new();

    let errors = config.validate();
    assert!(!errors.is_empty());
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_short_hello_timeout() {
    let mut config = NetworkConfig::default();
    config.server.hello_timeout = Duration::from_millis(5);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Hello timeout too short")));
}

#[test]
fn test_long_hello_timeout() {
    let mut config = NetworkConfig::default();
    config.server.hello_timeout = Duration::from_secs(7200);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Hello timeout too long")));
}

#[test]
fn test_long_shutdown_timeout() {
    let mut config = NetworkConfig::default();
    config.server.shutdown_timeout = Duration::from_secs(120);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Shutdown timeout too long")));
}

#[test]
fn test_zero_max_connections() {
    let mut config = NetworkConfig::default();
    config.server.max_connections = 0;

    let errors = config.validate();
    assert!(!errors.is_empty());
    assert!(errors
        .iter()
        .any(|e| e.contains("Max connections must be greater than 0")));
}

#[test]
fn test_high_max_connections_warning() {
    let mut config = NetworkConfig::default();
    config.server.max_connections = 150_000;

    let errors = config.validate();
    assert!(!errors.is_empty());
    assert!(errors
        .iter()
        .any(|e| e.contains("Max connections very high")));
}

#[test]
fn test_empty_client_address() {
    let mut config = NetworkConfig::default();
    config.client.address = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Client address cannot be empty")));
}

#[test]
fn test_short_connection_timeout() {
    let mut config = NetworkConfig::default();
    config.client.connection_timeout = Duration::from_millis(50);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Connection timeout too short")));
}

#[test]
fn test_zero_max_payload_size() {
    let mut config = NetworkConfig::default();
    config.transport.max_payload_size = 0;

    let errors = config.validate();
    assert!(!errors.is_empty());
    assert!(errors
        .iter()
        .any(|e| e.contains("Max payload size cannot be 0")));
}

#[test]
fn test_payload_size_beyond_wire_limit() {
    let mut config = NetworkConfig::default();
    config.transport.max_payload_size = i32::MAX as usize + 1;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max payload size too large")));
}

#[test]
fn test_empty_cipher_key() {
    let mut config = NetworkConfig::default();
    config.transport.cipher_key = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Cipher key cannot be empty")));
}

#[test]
fn test_token_freshness_bounds() {
    let mut config = NetworkConfig::default();
    config.transport.token_freshness = Duration::from_millis(10);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Token freshness too short")));

    config.transport.token_freshness = Duration::from_secs(4000);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Token freshness too long")));
}

#[test]
fn test_authentication_disabled_warning() {
    let mut config = NetworkConfig::default();
    config.transport.authentication = AuthenticationMode::None;
    config.transport.cipher_key = String::new();

    let errors = config.validate();
    assert_eq!(errors.len(), 1, "Only the warning expected: {:?}", errors);
    assert!(errors[0].contains("Token authentication is disabled"));
}

#[test]
fn test_empty_app_name() {
    let mut config = NetworkConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(!errors.is_empty());
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_long_app_name() {
    let mut config = NetworkConfig::default();
    config.logging.app_name = "a".repeat(100);

    let errors = config.validate();
    assert!(!errors.is_empty());
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name too long")));
}

#[test]
fn test_validate_strict_with_valid_config() {
    let config = NetworkConfig::default();
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_validate_strict_with_invalid_config() {
    let mut config = NetworkConfig::default();
    config.server.address = String::new();

    let result = config.validate_strict();
    assert!(result.is_err());

    if let Err(e) = result {
        let error_str = e.to_string();
        assert!(error_str.contains("Configuration validation failed"));
    }
}

#[test]
fn test_multiple_validation_errors() {
    let mut config = NetworkConfig::default();

    // Introduce multiple errors
    config.server.address = String::new();
    config.server.max_connections = 0;
    config.client.address = String::new();
    config.transport.max_payload_size = 0;
    config.logging.app_name = String::new();

    let errors = config.validate();

    // Should have at least 5 errors
    assert!(
        errors.len() >= 5,
        "Expected at least 5 errors, got {}: {:?}",
        errors.len(),
        errors
    );
}

#[test]
fn test_toml_roundtrip() {
    let text = NetworkConfig::example_config();
    let parsed = NetworkConfig::from_toml(&text).expect("example config parses");
    assert_eq!(parsed.server.address, "127.0.0.1:5555");
    assert_eq!(parsed.server.hello_timeout, Duration::from_secs(300));
    assert_eq!(parsed.transport.authentication, AuthenticationMode::Token);
    assert_eq!(parsed.logging.log_level, Level::INFO);
}

#[test]
fn test_toml_plain_framing() {
    let text = r#"
        [server]
        address = "0.0.0.0:7000"
        hello_timeout = 2000
        shutdown_timeout = 5000
        max_connections = 64

        [transport]
        authentication = "none"
        cipher_key = ""
        token_freshness = 30000
        max_payload_size = 65536
    "#;

    let config = NetworkConfig::from_toml(text).expect("parses");
    assert_eq!(config.server.hello_timeout, Duration::from_millis(2000));
    assert_eq!(config.server.max_connections, 64);
    assert_eq!(config.transport.authentication, AuthenticationMode::None);
    assert_eq!(config.transport.max_payload_size, 65536);
    // Sections left out fall back to defaults.
    assert_eq!(config.client.address, "127.0.0.1:5555");
}

#[test]
fn test_toml_rejects_unknown_mode() {
    let text = r#"
        [transport]
        authentication = "kerberos"
        cipher_key = "k"
        token_freshness = 30000
        max_payload_size = 1024
    "#;
    assert!(NetworkConfig::from_toml(text).is_err());
}

#[test]
fn test_valid_production_config() {
    let config = NetworkConfig {
        server: ServerConfig {
            address: "0.0.0.0:8443".to_string(),
            hello_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(10),
            max_connections: 10000,
        },
        client: ClientConfig {
            address: "game.example.com:8443".to_string(),
            connection_timeout: Duration::from_secs(10),
        },
        transport: TransportConfig {
            authentication: AuthenticationMode::Token,
            cipher_key: "a long production passphrase".to_string(),
            token_freshness: Duration::from_secs(15),
            max_payload_size: 1024 * 1024,
        },
        logging: LoggingConfig {
            app_name: "production-server".to_string(),
            log_level: Level::INFO,
            json_format: true,
        },
    };

    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Production config should be valid, got: {:?}",
        errors
    );
}

#[test]
fn test_overrides() {
    let config = NetworkConfig::default_with_overrides(|c| {
        c.server.max_connections = 8;
        c.transport.authentication = AuthenticationMode::None;
    });
    assert_eq!(config.server.max_connections, 8);
    assert_eq!(config.transport.authentication, AuthenticationMode::None);
}
