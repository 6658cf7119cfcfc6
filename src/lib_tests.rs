// Error taxonomy surface tests.

use super::*;

#[test]
fn config_errors_name_their_cause() {
    let missing = VaultError::ConfigMissing("no target device".into());
    assert!(missing.to_string().contains("not found"));
    assert!(missing.to_string().contains("no target device"));

    let invalid = VaultError::ConfigInvalid("max_attempts 0".into());
    assert!(invalid.to_string().contains("invalid"));
}

#[test]
fn io_errors_convert_transparently() {
    let err: VaultError =
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
    assert!(matches!(err, VaultError::Io(_)));
    assert!(err.to_string().contains("denied"));
}

#[test]
fn credential_and_platform_errors_render() {
    assert!(VaultError::Credential("bad tag".into())
        .to_string()
        .contains("malformed"));
    assert!(VaultError::Platform("mlockall failed".into())
        .to_string()
        .contains("mlockall"));
}
