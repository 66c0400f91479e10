// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Start one with `gcloud emulators firestore start` and export
//! FIRESTORE_EMULATOR_HOST before running.
//!
//! Every test signs up fresh users, so runs do not interfere with each
//! other on a shared emulator.

use axum::{http::StatusCode, Router};
use serde_json::{json, Value};
use studenthub::models::notification::connection_request_id;

mod common;
use common::{create_emulator_app, send_json, signup, TestUser};

async fn connect(app: &Router, from: &TestUser, to: &TestUser) {
    let (status, json) = send_json(
        app,
        "POST",
        "/api/matching/connect",
        Some(&from.token),
        Some(json!({"partnerId": to.id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "connect failed: {json}");

    let (status, json) = send_json(
        app,
        "POST",
        "/api/matching/accept-request",
        Some(&to.token),
        Some(json!({"requesterId": from.id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "accept failed: {json}");
}

async fn profile(app: &Router, user: &TestUser) -> Value {
    let (status, json) = send_json(app, "GET", "/api/user/profile", Some(&user.token), None).await;
    assert_eq!(status, StatusCode::OK);
    json["data"]["user"].clone()
}

async fn inbox(app: &Router, user: &TestUser) -> Vec<Value> {
    let (status, json) =
        send_json(app, "GET", "/api/notifications?limit=100", Some(&user.token), None).await;
    assert_eq!(status, StatusCode::OK);
    json["data"]["notifications"].as_array().unwrap().clone()
}

fn of_type<'a>(notifications: &'a [Value], kind: &str) -> Vec<&'a Value> {
    notifications.iter().filter(|n| n["type"] == kind).collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// ACCOUNTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_duplicate_signup_conflicts() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let ada = signup(&app, "Ada", json!({})).await;

    let (status, json) = send_json(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({
            "name": "Ada Again",
            "email": ada.email.to_uppercase(),
            "password": "hunter22",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["message"], "User already exists with this email");
}

#[tokio::test]
async fn test_login_and_wrong_password() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let ada = signup(&app, "Ada", json!({})).await;

    let (status, json) = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": ada.email, "password": "hunter22"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user"]["id"], ada.id.as_str());
    assert!(json["data"]["user"].get("passwordHash").is_none());

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": ada.email, "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ═══════════════════════════════════════════════════════════════════════════
// CONNECTIONS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_accepted_connection_is_symmetric() {
    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let ada = signup(&app, "Ada", json!({})).await;
    let bob = signup(&app, "Bob", json!({})).await;

    connect(&app, &ada, &bob).await;

    let ada_profile = profile(&app, &ada).await;
    let bob_profile = profile(&app, &bob).await;
    assert_eq!(ada_profile["connections"], json!([bob.id]));
    assert_eq!(bob_profile["connections"], json!([ada.id]));

    // The request is consumed
    let request = state
        .db
        .get_notification(&connection_request_id(&ada.id, &bob.id))
        .await
        .unwrap();
    assert!(request.is_none());

    // Ada hears back
    let responses = inbox(&app, &ada).await;
    assert_eq!(of_type(&responses, "connection_accepted").len(), 1);

    // Disconnecting removes both sides
    let (status, _) = send_json(
        &app,
        "DELETE",
        &format!("/api/matching/connections/{}", bob.id),
        Some(&ada.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile(&app, &ada).await["connections"], json!([]));
    assert_eq!(profile(&app, &bob).await["connections"], json!([]));
}

#[tokio::test]
async fn test_declined_request_is_consumed_and_reported() {
    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let ada = signup(&app, "Ada", json!({})).await;
    let bob = signup(&app, "Bob", json!({})).await;

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/matching/connect",
        Some(&ada.token),
        Some(json!({"partnerId": bob.id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let decline = json!({"requesterId": ada.id});
    let (status, json) = send_json(
        &app,
        "POST",
        "/api/matching/decline-request",
        Some(&bob.token),
        Some(decline.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "decline failed: {json}");

    let request = state
        .db
        .get_notification(&connection_request_id(&ada.id, &bob.id))
        .await
        .unwrap();
    assert!(request.is_none());

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/matching/decline-request",
        Some(&bob.token),
        Some(decline),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let ada_inbox = inbox(&app, &ada).await;
    let declined = of_type(&ada_inbox, "connection_declined");
    assert_eq!(declined.len(), 1);
    assert_eq!(declined[0]["sender"], bob.id.as_str());
    assert_eq!(profile(&app, &ada).await["connections"], json!([]));
    assert_eq!(profile(&app, &bob).await["connections"], json!([]));
}

#[tokio::test]
async fn test_duplicate_connection_request_conflicts() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let ada = signup(&app, "Ada", json!({})).await;
    let bob = signup(&app, "Bob", json!({})).await;

    let body = json!({"partnerId": bob.id});
    let (status, _) = send_json(
        &app,
        "POST",
        "/api/matching/connect",
        Some(&ada.token),
        Some(body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) =
        send_json(&app, "POST", "/api/matching/connect", Some(&ada.token), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["message"], "Connection request already sent");

    let (status, json) = send_json(
        &app,
        "GET",
        "/api/matching/connection-requests",
        Some(&bob.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let requests = json["data"]["requests"].as_array().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["otherUser"]["id"], ada.id.as_str());
}

// ═══════════════════════════════════════════════════════════════════════════
// Q&A
// ═══════════════════════════════════════════════════════════════════════════

async fn ask(app: &Router, asker: &TestUser, title: &str) -> String {
    let (status, json) = send_json(
        app,
        "POST",
        "/api/qna/askQuestion",
        Some(&asker.token),
        Some(json!({"title": title, "description": "Details", "tags": [" rust ", ""]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "ask failed: {json}");
    assert_eq!(json["data"]["question"]["tags"], json!(["rust"]));
    json["data"]["question"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_ask_question_awards_points_and_broadcasts() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let ada = signup(&app, "Ada", json!({})).await;
    let bob = signup(&app, "Bob", json!({})).await;

    let question_id = ask(&app, &ada, "How do lifetimes work?").await;

    let ada_profile = profile(&app, &ada).await;
    assert_eq!(ada_profile["points"], 5);
    assert_eq!(ada_profile["questionsAsked"], 1);
    assert!(ada_profile["badges"]
        .as_array()
        .unwrap()
        .contains(&json!("First Step")));

    let bob_inbox = inbox(&app, &bob).await;
    assert!(of_type(&bob_inbox, "qa_activity")
        .iter()
        .any(|n| n["metadata"]["questionId"] == question_id.as_str()));

    // Never to the asker
    let ada_inbox = inbox(&app, &ada).await;
    assert!(!of_type(&ada_inbox, "qa_activity")
        .iter()
        .any(|n| n["metadata"]["questionId"] == question_id.as_str()));
}

#[tokio::test]
async fn test_votes_are_idempotent_and_exclusive() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let ada = signup(&app, "Ada", json!({})).await;
    let bob = signup(&app, "Bob", json!({})).await;
    let question_id = ask(&app, &ada, "Borrow checker help").await;
    let body = json!({"questionId": question_id});

    let (status, json) = send_json(
        &app,
        "PUT",
        "/api/qna/upvoteQuestion",
        Some(&bob.token),
        Some(body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["changed"], true);
    assert_eq!(json["data"]["question"]["upVotes"], json!([bob.id]));

    // Repeating is a no-op
    let (_, json) = send_json(
        &app,
        "PUT",
        "/api/qna/upvoteQuestion",
        Some(&bob.token),
        Some(body.clone()),
    )
    .await;
    assert_eq!(json["data"]["changed"], false);
    assert_eq!(json["data"]["question"]["upVotes"], json!([bob.id]));

    // Switching moves the vote
    let (_, json) = send_json(
        &app,
        "PUT",
        "/api/qna/downvoteQuestion",
        Some(&bob.token),
        Some(body.clone()),
    )
    .await;
    assert_eq!(json["data"]["question"]["upVotes"], json!([]));
    assert_eq!(json["data"]["question"]["downVotes"], json!([bob.id]));

    // Question votes never pay the asker
    send_json(
        &app,
        "PUT",
        "/api/qna/upvoteQuestion",
        Some(&bob.token),
        Some(body),
    )
    .await;
    assert_eq!(profile(&app, &ada).await["points"], 5);
}

#[tokio::test]
async fn test_first_answer_upvote_pays_author_once() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let ada = signup(&app, "Ada", json!({})).await;
    let bob = signup(&app, "Bob", json!({})).await;
    let question_id = ask(&app, &ada, "Pinning explained").await;

    let (status, json) = send_json(
        &app,
        "POST",
        "/api/qna/answer",
        Some(&ada.token),
        Some(json!({"questionId": question_id, "answer": "Answering my own question"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let answer_id = json["data"]["question"]["answers"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let body = json!({"questionId": question_id, "answerId": answer_id});

    // Ask (5) + answer (10)
    assert_eq!(profile(&app, &ada).await["points"], 15);

    // Authors are paid for upvoting their own answer too
    let (status, _) = send_json(
        &app,
        "PUT",
        "/api/qna/upvoteAnswer",
        Some(&ada.token),
        Some(body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile(&app, &ada).await["points"], 17);

    // Repeats and switches back to up do not pay again
    for uri in ["/api/qna/upvoteAnswer", "/api/qna/downvoteAnswer", "/api/qna/upvoteAnswer"] {
        let (status, _) = send_json(&app, "PUT", uri, Some(&ada.token), Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(profile(&app, &ada).await["points"], 17);

    // Another voter's first upvote pays again
    let (status, json) = send_json(
        &app,
        "PUT",
        "/api/qna/upvoteAnswer",
        Some(&bob.token),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["data"]["question"]["answers"][0]["upVotes"],
        json!([ada.id, bob.id])
    );
    assert_eq!(profile(&app, &ada).await["points"], 19);
}

#[tokio::test]
async fn test_answer_notifies_asker_once() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let ada = signup(&app, "Ada", json!({})).await;
    let bob = signup(&app, "Bob", json!({})).await;
    let question_id = ask(&app, &ada, "Async traits?").await;

    for text in ["Use async fn in traits", "Or box the futures"] {
        let (status, _) = send_json(
            &app,
            "POST",
            "/api/qna/answer",
            Some(&bob.token),
            Some(json!({"questionId": question_id, "answer": text})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let bob_profile = profile(&app, &bob).await;
    assert_eq!(bob_profile["points"], 20);
    assert_eq!(bob_profile["questionsAnswered"], 2);

    let ada_inbox = inbox(&app, &ada).await;
    assert_eq!(of_type(&ada_inbox, "question_answered").len(), 1);
}

#[tokio::test]
async fn test_delete_question_owner_only_and_clears_notices() {
    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let ada = signup(&app, "Ada", json!({})).await;
    let bob = signup(&app, "Bob", json!({})).await;
    let question_id = ask(&app, &ada, "Trait objects vs generics").await;
    let body = json!({"questionId": question_id});

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/qna/delete-question",
        Some(&bob.token),
        Some(body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/qna/delete-question",
        Some(&ada.token),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert!(state.db.get_question(&question_id).await.unwrap().is_none());
    let bob_inbox = inbox(&app, &bob).await;
    assert!(!bob_inbox
        .iter()
        .any(|n| n["metadata"]["questionId"] == question_id.as_str()));
}

// ═══════════════════════════════════════════════════════════════════════════
// SESSIONS
// ═══════════════════════════════════════════════════════════════════════════

fn session_body(topic: &str) -> Value {
    json!({
        "topic": topic,
        "details": "Bring questions",
        "sessionType": "Video Session",
        "duration": 60,
        "sessionOn": "2030-05-01T15:00:00Z",
        "link": "https://meet.example.com/abc",
    })
}

async fn create_session(app: &Router, host: &TestUser, body: Value) -> String {
    let (status, json) = send_json(
        app,
        "POST",
        "/api/session/create-session",
        Some(&host.token),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {json}");
    json["data"]["session"]["id"].as_str().unwrap().to_string()
}

async fn join(app: &Router, guest: &TestUser, session_id: &str) {
    let (status, json) = send_json(
        app,
        "POST",
        "/api/session/accept-session",
        Some(&guest.token),
        Some(json!({"sessionId": session_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "join failed: {json}");
}

/// The guest's pending invite to `session_id`.
async fn invite_to(app: &Router, guest: &TestUser, session_id: &str) -> String {
    let notifications = inbox(app, guest).await;
    let invite = of_type(&notifications, "session_invite")
        .into_iter()
        .find(|n| n["metadata"]["sessionId"] == session_id)
        .expect("no invite for session");
    invite["id"].as_str().unwrap().to_string()
}

async fn respond(app: &Router, guest: &TestUser, invite_id: &str, action: &str) -> Value {
    let (status, json) = send_json(
        app,
        "POST",
        &format!("/api/notifications/{invite_id}/respond"),
        Some(&guest.token),
        Some(json!({"action": action})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "respond failed: {json}");
    json
}

#[tokio::test]
async fn test_create_session_invites_every_connection() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let host = signup(&app, "Host", json!({})).await;
    let mut guests = Vec::new();
    for name in ["Ann", "Ben", "Cat"] {
        let guest = signup(&app, name, json!({})).await;
        connect(&app, &guest, &host).await;
        guests.push(guest);
    }

    let (status, json) = send_json(
        &app,
        "POST",
        "/api/session/create-session",
        Some(&host.token),
        Some(session_body("Graph algorithms")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {json}");
    let session_id = json["data"]["session"]["id"].as_str().unwrap().to_string();
    assert_eq!(profile(&app, &host).await["points"], 15);

    for guest in &guests {
        let invites = inbox(&app, guest).await;
        let invites = of_type(&invites, "session_invite");
        assert_eq!(invites.len(), 1);
        assert_eq!(invites[0]["metadata"]["sessionId"], session_id.as_str());
    }

    // Accepting through the invite joins the session and replies once
    let invites = inbox(&app, &guests[0]).await;
    let invite_id = of_type(&invites, "session_invite")[0]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let respond_uri = format!("/api/notifications/{invite_id}/respond");
    let (status, json) = send_json(
        &app,
        "POST",
        &respond_uri,
        Some(&guests[0].token),
        Some(json!({"action": "accept"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "respond failed: {json}");
    assert_eq!(json["data"]["notification"]["type"], "session_accepted");

    // The invite is consumed by the first answer
    let (status, _) = send_json(
        &app,
        "POST",
        &respond_uri,
        Some(&guests[0].token),
        Some(json!({"action": "accept"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = send_json(
        &app,
        "GET",
        &format!("/api/session/get-session/{session_id}"),
        Some(&host.token),
        None,
    )
    .await;
    assert_eq!(json["data"]["session"]["members"], json!([guests[0].id]));
    assert_eq!(profile(&app, &guests[0]).await["points"], 20);

    let host_inbox = inbox(&app, &host).await;
    assert_eq!(of_type(&host_inbox, "session_accepted").len(), 1);
}

#[tokio::test]
async fn test_rating_awards_points_once() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let host = signup(&app, "Host", json!({})).await;
    let guest = signup(&app, "Guest", json!({})).await;

    let (_, json) = send_json(
        &app,
        "POST",
        "/api/session/create-session",
        Some(&host.token),
        Some(session_body("Dynamic programming")),
    )
    .await;
    let session_id = json["data"]["session"]["id"].as_str().unwrap().to_string();

    // Outsiders cannot rate
    let (status, _) = send_json(
        &app,
        "POST",
        "/api/session/rate-session",
        Some(&guest.token),
        Some(json!({"sessionId": session_id, "rating": 4})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/session/accept-session",
        Some(&guest.token),
        Some(json!({"sessionId": session_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for rating in [4, 2] {
        let (status, json) = send_json(
            &app,
            "POST",
            "/api/session/rate-session",
            Some(&guest.token),
            Some(json!({"sessionId": session_id, "rating": rating})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["session"]["ratings"].as_array().unwrap().len(), 1);
        assert_eq!(json["data"]["session"]["averageRating"], f64::from(rating));
    }

    // Attend (20) + first rating (5)
    assert_eq!(profile(&app, &guest).await["points"], 25);
}

#[tokio::test]
async fn test_only_creator_changes_status() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let host = signup(&app, "Host", json!({})).await;
    let guest = signup(&app, "Guest", json!({})).await;

    let (_, json) = send_json(
        &app,
        "POST",
        "/api/session/create-session",
        Some(&host.token),
        Some(session_body("Compilers")),
    )
    .await;
    let session_id = json["data"]["session"]["id"].as_str().unwrap().to_string();
    let body = json!({"sessionId": session_id, "status": "Completed"});

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/session/update-status",
        Some(&guest.token),
        Some(body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send_json(
        &app,
        "POST",
        "/api/session/update-status",
        Some(&host.token),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["session"]["status"], "Completed");
}

#[tokio::test]
async fn test_accepting_twice_conflicts() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let host = signup(&app, "Host", json!({})).await;
    let guest = signup(&app, "Guest", json!({})).await;
    let session_id = create_session(&app, &host, session_body("Type theory")).await;

    join(&app, &guest, &session_id).await;
    let (status, json) = send_json(
        &app,
        "POST",
        "/api/session/accept-session",
        Some(&guest.token),
        Some(json!({"sessionId": session_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["message"], "User already a member of the session");

    // Attendance paid once
    assert_eq!(profile(&app, &guest).await["points"], 20);
}

#[tokio::test]
async fn test_declining_invite_does_not_join() {
    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let host = signup(&app, "Host", json!({})).await;
    let guest = signup(&app, "Guest", json!({})).await;
    connect(&app, &guest, &host).await;
    let session_id = create_session(&app, &host, session_body("Category theory")).await;

    let invite_id = invite_to(&app, &guest, &session_id).await;
    let json = respond(&app, &guest, &invite_id, "decline").await;
    assert_eq!(json["message"], "Session invitation declined successfully");
    assert_eq!(json["data"]["notification"]["type"], "session_declined");

    assert!(state.db.get_notification(&invite_id).await.unwrap().is_none());
    let session = state.db.get_session(&session_id).await.unwrap().unwrap();
    assert!(session.members.is_empty());
    assert_eq!(profile(&app, &guest).await["points"], 0);

    let host_inbox = inbox(&app, &host).await;
    let declined = of_type(&host_inbox, "session_declined");
    assert_eq!(declined.len(), 1);
    assert_eq!(declined[0]["metadata"]["sessionId"], session_id.as_str());
}

#[tokio::test]
async fn test_invite_replies_deduped_per_session() {
    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let host = signup(&app, "Host", json!({})).await;
    let ann = signup(&app, "Ann", json!({})).await;
    let ben = signup(&app, "Ben", json!({})).await;
    connect(&app, &ann, &host).await;
    connect(&app, &ben, &host).await;
    let session_id = create_session(&app, &host, session_body("Parsing")).await;

    let invite_id = invite_to(&app, &ann, &session_id).await;
    let json = respond(&app, &ann, &invite_id, "accept").await;
    assert_eq!(json["data"]["notification"]["sender"], ann.id.as_str());

    // Ben still joins, but the creator already has an acceptance for this session
    let invite_id = invite_to(&app, &ben, &session_id).await;
    let json = respond(&app, &ben, &invite_id, "accept").await;
    assert!(json["data"]["notification"].is_null());

    let session = state.db.get_session(&session_id).await.unwrap().unwrap();
    assert_eq!(session.members, vec![ann.id.clone(), ben.id.clone()]);

    let host_inbox = inbox(&app, &host).await;
    let accepted: Vec<_> = of_type(&host_inbox, "session_accepted")
        .into_iter()
        .filter(|n| n["metadata"]["sessionId"] == session_id.as_str())
        .collect();
    assert_eq!(accepted.len(), 1);
}

#[tokio::test]
async fn test_fractional_ratings_average() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let host = signup(&app, "Host", json!({})).await;
    let ann = signup(&app, "Ann", json!({})).await;
    let ben = signup(&app, "Ben", json!({})).await;
    let session_id = create_session(&app, &host, session_body("Linear algebra")).await;
    join(&app, &ann, &session_id).await;
    join(&app, &ben, &session_id).await;

    let mut last = Value::Null;
    for (rater, rating) in [(&ann, 4.5), (&ben, 1.4)] {
        let (status, json) = send_json(
            &app,
            "POST",
            "/api/session/rate-session",
            Some(&rater.token),
            Some(json!({"sessionId": session_id, "rating": rating})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "rate failed: {json}");
        last = json;
    }

    let session = &last["data"]["session"];
    assert_eq!(session["ratings"][0]["rating"], 4.5);
    assert_eq!(session["ratings"][1]["rating"], 1.4);
    assert_eq!(session["averageRating"], 2.95);
}

#[tokio::test]
async fn test_delete_session_cascades() {
    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let host = signup(&app, "Host", json!({})).await;
    let ann = signup(&app, "Ann", json!({})).await;
    let ben = signup(&app, "Ben", json!({})).await;
    connect(&app, &ann, &host).await;
    connect(&app, &ben, &host).await;
    let session_id = create_session(&app, &host, session_body("Operating systems")).await;

    // Ann joins directly; Ben's invite stays pending
    join(&app, &ann, &session_id).await;
    let ben_invite = invite_to(&app, &ben, &session_id).await;
    let ann_user = state.db.get_user(&ann.id).await.unwrap().unwrap();
    assert!(ann_user.sessions.contains(&session_id));

    let body = json!({"sessionId": session_id});
    let (status, _) = send_json(
        &app,
        "POST",
        "/api/session/delete-session",
        Some(&ann.token),
        Some(body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send_json(
        &app,
        "POST",
        "/api/session/delete-session",
        Some(&host.token),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "delete failed: {json}");

    assert!(state.db.get_session(&session_id).await.unwrap().is_none());
    let ann_user = state.db.get_user(&ann.id).await.unwrap().unwrap();
    assert!(!ann_user.sessions.contains(&session_id));
    assert!(state.db.get_notification(&ben_invite).await.unwrap().is_none());
    for user in [&ann, &ben] {
        let notifications = inbox(&app, user).await;
        assert!(!notifications
            .iter()
            .any(|n| n["metadata"]["sessionId"] == session_id.as_str()));
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// QUIZZES
// ═══════════════════════════════════════════════════════════════════════════

fn quiz_session_body(topic: &str, questions: usize) -> Value {
    let mut body = session_body(topic);
    body["quizQuestions"] = (0..questions)
        .map(|i| {
            json!({
                "question": format!("Question {}", i + 1),
                "options": ["a", "b", "c", "d"],
                "answer": "a",
            })
        })
        .collect();
    body
}

async fn submit_quiz(app: &Router, user: &TestUser, session_id: &str, score: u32) -> (StatusCode, Value) {
    send_json(
        app,
        "POST",
        "/api/points/quiz-complete",
        Some(&user.token),
        Some(json!({"sessionId": session_id, "score": score, "totalQuestions": 100})),
    )
    .await
}

#[tokio::test]
async fn test_quiz_requires_existing_session() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let student = signup(&app, "Student", json!({})).await;

    let (status, json) = submit_quiz(&app, &student, "no-such-session", 100).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Session not found");

    let student = profile(&app, &student).await;
    assert_eq!(student["points"], 0);
    assert_eq!(student["badges"], json!([]));
}

#[tokio::test]
async fn test_quiz_limited_to_participants_and_quiz_length() {
    require_emulator!();

    let (app, _) = create_emulator_app().await;
    let host = signup(&app, "Host", json!({})).await;
    let guest = signup(&app, "Guest", json!({})).await;
    let session_id = create_session(&app, &host, quiz_session_body("Graphs", 3)).await;

    let (status, _) = submit_quiz(&app, &guest, &session_id, 1).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    join(&app, &guest, &session_id).await;
    let (status, json) = submit_quiz(&app, &guest, &session_id, 4).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Score cannot exceed the session's quiz length");

    let (status, json) = submit_quiz(&app, &guest, &session_id, 3).await;
    assert_eq!(status, StatusCode::OK, "quiz failed: {json}");
    assert_eq!(json["data"]["pointsAwarded"], 30);

    // Attend (20) + three correct answers (30)
    let guest = profile(&app, &guest).await;
    assert_eq!(guest["points"], 50);
    assert_eq!(guest["sessionsCompleted"], 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// ACCOUNT DELETION
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_delete_account_repairs_connections() {
    require_emulator!();

    let (app, state) = create_emulator_app().await;
    let ada = signup(&app, "Ada", json!({})).await;
    let bob = signup(&app, "Bob", json!({})).await;
    connect(&app, &ada, &bob).await;

    let (status, _) = send_json(&app, "DELETE", "/api/user/delete-account", Some(&ada.token), None).await;
    assert_eq!(status, StatusCode::OK);

    assert!(state.db.get_user(&ada.id).await.unwrap().is_none());
    assert!(state.db.get_user_by_email(&ada.email).await.unwrap().is_none());
    assert_eq!(profile(&app, &bob).await["connections"], json!([]));
}
