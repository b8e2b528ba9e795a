use super::*;
use crate::services::session::SessionUser;

fn signed_in(id: Uuid) -> MaybeAuthUser {
    MaybeAuthUser(Some(SessionUser {
        id,
        first_name: Some("Casey".to_owned()),
        last_name: None,
        email: "casey@example.com".to_owned(),
    }))
}

#[test]
fn resolve_identity_prefers_session_over_fingerprint() {
    let user_id = Uuid::new_v4();
    let voter = resolve_identity(&signed_in(user_id), Some(Uuid::new_v4())).expect("identity should resolve");
    assert_eq!(voter, VoterIdentity::User(user_id));
}

#[test]
fn resolve_identity_falls_back_to_fingerprint() {
    let fingerprint = Uuid::new_v4();
    let voter = resolve_identity(&MaybeAuthUser(None), Some(fingerprint)).expect("identity should resolve");
    assert_eq!(voter, VoterIdentity::Anonymous(fingerprint));
}

#[test]
fn resolve_identity_rejects_unattributable_request() {
    assert!(resolve_identity(&MaybeAuthUser(None), None).is_none());
}

#[test]
fn vote_error_to_status_maps_not_found() {
    assert_eq!(vote_error_to_status(VoteError::PollNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
}

#[test]
fn vote_error_to_status_maps_login_gate_to_unauthorized() {
    assert_eq!(vote_error_to_status(VoteError::LoginRequired), StatusCode::UNAUTHORIZED);
}

#[test]
fn vote_error_to_status_maps_ended_poll_to_conflict() {
    assert_eq!(vote_error_to_status(VoteError::PollEnded), StatusCode::CONFLICT);
}

#[test]
fn vote_error_to_status_maps_selection_errors_to_bad_request() {
    assert_eq!(vote_error_to_status(VoteError::NoSelection), StatusCode::BAD_REQUEST);
    assert_eq!(vote_error_to_status(VoteError::MultipleNotAllowed), StatusCode::BAD_REQUEST);
    assert_eq!(
        vote_error_to_status(VoteError::OptionNotInPoll(Uuid::nil())),
        StatusCode::BAD_REQUEST
    );
}

#[test]
fn vote_receipt_hides_voter_identity() {
    let row = VoteRow {
        id: Uuid::new_v4(),
        poll_id: Uuid::new_v4(),
        option_id: Uuid::new_v4(),
        user_id: None,
        voter_fingerprint: Some(Uuid::new_v4()),
        created_at: 42,
    };
    let value = serde_json::to_value(receipt(row)).expect("serialization should succeed");
    assert!(value.get("voter_fingerprint").is_none());
    assert!(value.get("user_id").is_none());
    assert_eq!(value["created_at"], 42);
}
