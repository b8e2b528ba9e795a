use super::*;

#[test]
fn auth_error_to_status_maps_validation_to_bad_request() {
    assert_eq!(auth_error_to_status(auth_svc::AuthError::InvalidEmail), StatusCode::BAD_REQUEST);
    assert_eq!(auth_error_to_status(auth_svc::AuthError::InvalidCode), StatusCode::BAD_REQUEST);
}

#[test]
fn auth_error_to_status_maps_failed_verification_to_unauthorized() {
    assert_eq!(
        auth_error_to_status(auth_svc::AuthError::VerificationFailed),
        StatusCode::UNAUTHORIZED
    );
}

#[test]
fn auth_error_to_status_maps_delivery_failure_to_bad_gateway() {
    assert_eq!(
        auth_error_to_status(auth_svc::AuthError::EmailDelivery("timeout".to_owned())),
        StatusCode::BAD_GATEWAY
    );
}
