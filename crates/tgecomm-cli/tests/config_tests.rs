//! Layered configuration loading from TOML, .env and the environment
//!
//! Kept to a single test: loading a .env file mutates the process
//! environment shared by every test in this binary.

use std::fs;

use tgecomm_cli::load_configuration;

#[test]
fn test_env_file_overrides_toml() {
    let dir = tempfile::tempdir().unwrap();

    let toml_path = dir.path().join("tgecomm.toml");
    fs::write(
        &toml_path,
        r#"
[credentials]
session_name = "from_toml"
phone = "+10000000000"

[session]
fetch_batch_size = 3
"#,
    )
    .unwrap();

    let env_path = dir.path().join("test.env");
    fs::write(
        &env_path,
        "API_ID=424242\nAPI_HASH=0123456789abcdef0123456789abcdef\nPHONE=+1987654321\n",
    )
    .unwrap();

    let config = load_configuration(Some(&toml_path), &env_path).unwrap();

    assert_eq!(config.credentials.api_id, Some(424242));
    assert_eq!(config.credentials.phone.as_deref(), Some("+1987654321"));
    assert_eq!(config.credentials.session_name, "from_toml");
    assert_eq!(config.session.fetch_batch_size, 3);
    assert!(config.validate().is_ok());

    let masked = config.masked();
    assert_ne!(masked.api_hash.as_deref(), config.credentials.api_hash.as_deref());
}
