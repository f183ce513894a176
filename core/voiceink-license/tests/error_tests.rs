use voiceink_license::LicenseError;

#[test]
fn error_display_empty_key() {
    let err = LicenseError::EmptyKey;
    assert!(format!("{err}").contains("please enter"));
}

#[test]
fn error_display_invalid_key() {
    let err = LicenseError::InvalidKey;
    assert!(format!("{err}").contains("invalid license key"));
}

#[test]
fn error_display_validator() {
    let err = LicenseError::Validator("HTTP 500".into());
    let msg = format!("{err}");
    assert!(msg.contains("validation failed"));
    assert!(msg.contains("HTTP 500"));
}

#[test]
fn error_display_network() {
    let err = LicenseError::Network("timeout".into());
    assert!(format!("{err}").contains("network"));
}

#[test]
fn error_display_activation_failed() {
    let err = LicenseError::ActivationFailed("server error".into());
    let msg = format!("{err}");
    assert!(msg.contains("failed to activate"));
    assert!(msg.contains("server error"));
}

#[test]
fn error_display_activation_not_required() {
    let err = LicenseError::ActivationNotRequired;
    assert!(format!("{err}").contains("does not require activation"));
}

#[test]
fn error_display_activation_limit() {
    let err = LicenseError::ActivationLimitReached;
    assert!(format!("{err}").contains("activation limit"));
}

#[test]
fn error_display_invalid_url() {
    let err = LicenseError::InvalidUrl("file:///etc/passwd".into());
    assert!(format!("{err}").contains("file:///etc/passwd"));
}

#[test]
fn error_display_storage() {
    let err = LicenseError::Storage("disk full".into());
    assert!(format!("{err}").contains("storage"));
}

#[test]
fn error_from_serde_json() {
    let serde_err: Result<serde_json::Value, _> = serde_json::from_str("not json");
    let license_err: LicenseError = serde_err.unwrap_err().into();
    assert!(format!("{license_err}").contains("serialization"));
}

#[test]
fn error_from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let license_err: LicenseError = io.into();
    assert!(format!("{license_err}").contains("denied"));
}
