use super::*;
use crate::services::poll::{PollDetail, PollError};
use crate::services::vote::VoteRow;

fn sample_poll(ends_at: Option<i64>) -> PollRow {
    PollRow {
        id: Uuid::new_v4(),
        title: "Lunch?".to_owned(),
        description: Some("Team vote".to_owned()),
        owner_id: Uuid::new_v4(),
        is_public: true,
        allow_multiple_votes: false,
        require_login_to_vote: false,
        ends_at,
        created_at: 0,
    }
}

fn sample_option(poll_id: Uuid, text: &str) -> PollOptionRow {
    PollOptionRow { id: Uuid::new_v4(), poll_id, text: text.to_owned(), created_at: 0 }
}

#[test]
fn poll_error_to_status_maps_not_found() {
    assert_eq!(poll_error_to_status(PollError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
}

#[test]
fn poll_error_to_status_maps_forbidden() {
    assert_eq!(poll_error_to_status(PollError::Forbidden(Uuid::nil())), StatusCode::FORBIDDEN);
}

#[test]
fn poll_error_to_status_maps_validation_to_bad_request() {
    assert_eq!(poll_error_to_status(PollError::EmptyTitle), StatusCode::BAD_REQUEST);
    assert_eq!(poll_error_to_status(PollError::TooFewOptions), StatusCode::BAD_REQUEST);
}

#[test]
fn summary_response_counts_options_and_formats_countdown() {
    let poll = sample_poll(Some(90_000));
    let poll_id = poll.id;
    let item = PollWithOptions {
        poll,
        owner_name: "Casey".to_owned(),
        options: vec![sample_option(poll_id, "Pizza"), sample_option(poll_id, "Salad")],
        votes_count: 7,
    };

    let response = summary_response(item, 0);
    assert_eq!(response.options_count, 2);
    assert_eq!(response.votes_count, 7);
    assert_eq!(response.owner_name, "Casey");
    assert_eq!(response.time_remaining.as_deref(), Some("1m 30s left"));
}

#[test]
fn summary_response_without_deadline_has_no_countdown() {
    let item = PollWithOptions {
        poll: sample_poll(None),
        owner_name: "Casey".to_owned(),
        options: Vec::new(),
        votes_count: 0,
    };
    let response = summary_response(item, 0);
    assert!(response.time_remaining.is_none());
}

#[test]
fn detail_response_tallies_match_option_order() {
    let poll = sample_poll(None);
    let poll_id = poll.id;
    let pizza = sample_option(poll_id, "Pizza");
    let salad = sample_option(poll_id, "Salad");
    let votes = vec![
        VoteRow {
            id: Uuid::new_v4(),
            poll_id,
            option_id: pizza.id,
            user_id: Some(Uuid::new_v4()),
            voter_fingerprint: None,
            created_at: 0,
        },
        VoteRow {
            id: Uuid::new_v4(),
            poll_id,
            option_id: pizza.id,
            user_id: None,
            voter_fingerprint: Some(Uuid::new_v4()),
            created_at: 0,
        },
    ];
    let detail = PollDetail {
        poll,
        options: vec![pizza.clone(), salad.clone()],
        votes,
        votes_count: 2,
        registered_votes_count: 1,
        anonymous_votes_count: 1,
    };

    let response = detail_response(detail, 0);
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].option_id, pizza.id);
    assert_eq!(response.results[0].votes, 2);
    assert!((response.results[0].percentage - 100.0).abs() < f64::EPSILON);
    assert_eq!(response.results[1].option_id, salad.id);
    assert_eq!(response.results[1].votes, 0);
}

#[test]
fn detail_response_hides_voter_fingerprints() {
    let poll = sample_poll(None);
    let poll_id = poll.id;
    let option = sample_option(poll_id, "Pizza");
    let detail = PollDetail {
        poll,
        options: vec![option.clone()],
        votes: vec![VoteRow {
            id: Uuid::new_v4(),
            poll_id,
            option_id: option.id,
            user_id: None,
            voter_fingerprint: Some(Uuid::new_v4()),
            created_at: 0,
        }],
        votes_count: 1,
        registered_votes_count: 0,
        anonymous_votes_count: 1,
    };

    let value = serde_json::to_value(detail_response(detail, 0)).expect("serialization should succeed");
    let vote = &value["votes"][0];
    assert!(vote.get("voter_fingerprint").is_none());
    assert!(vote.get("option_id").is_some());
}
