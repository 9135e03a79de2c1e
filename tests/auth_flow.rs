//! Connection authentication integration tests.
//!
//! A connection must present a valid signed token before any state is
//! touched. Every rejection path gets one error frame and a closed socket.

mod common;

use common::TestServer;

async fn expect_rejection(server: &TestServer, token: Option<&str>, code: &str) {
    let mut client = server
        .connect_raw(token)
        .await
        .expect("handshake should complete");

    let data = client.expect_event("error").await.expect("error frame");
    assert_eq!(data["type"], code);

    // The socket closes after the error frame.
    assert!(client.recv().await.is_err());
}

#[tokio::test]
async fn missing_token_is_refused() {
    let server = TestServer::spawn().await.expect("server");
    expect_rejection(&server, None, "missing_credential").await;
    assert_eq!(server.hub.connection_count(), 0);
}

#[tokio::test]
async fn garbage_token_is_refused() {
    let server = TestServer::spawn().await.expect("server");
    expect_rejection(&server, Some("not-a-token"), "malformed_token").await;
}

#[tokio::test]
async fn tampered_token_is_refused() {
    let server = TestServer::spawn().await.expect("server");
    let mut token = server.token_for("alice");
    // Flip the final signature character.
    let last = token.pop().expect("non-empty");
    token.push(if last == 'A' { 'B' } else { 'A' });
    expect_rejection(&server, Some(&token), "bad_signature").await;
}

#[tokio::test]
async fn expired_token_is_refused() {
    let server = TestServer::spawn().await.expect("server");
    let token = server.expired_token_for("alice");
    expect_rejection(&server, Some(&token), "token_expired").await;
}

#[tokio::test]
async fn token_for_unknown_identity_is_refused() {
    let server = TestServer::spawn().await.expect("server");
    // Validly signed, but "mallory" has no identity row.
    let token = server.token_for("mallory");
    expect_rejection(&server, Some(&token), "unknown_identity").await;
}

#[tokio::test]
async fn valid_token_gets_connected_ack() {
    let server = TestServer::spawn().await.expect("server");

    let mut client = server
        .connect_raw(Some(&server.token_for("alice")))
        .await
        .expect("handshake");
    let data = client.expect_event("connected").await.expect("ack");
    assert_eq!(data["user_id"], "alice");

    assert_eq!(server.hub.connection_count(), 1);
    assert!(server.hub.presence.is_online("alice"));
}

#[tokio::test]
async fn display_name_comes_from_identity_store_not_token() {
    let server = TestServer::spawn().await.expect("server");

    let mut alice = server.connect("alice").await.expect("alice");
    let mut bob = server.connect("bob").await.expect("bob");
    alice.join("open-day", None).await.expect("join");
    bob.join("open-day", None).await.expect("join");

    // Alice learns of bob's join with the store-resolved display name.
    let data = alice.expect_event("user_joined").await.expect("notice");
    assert_eq!(data["user_id"], "bob");
    assert_eq!(data["display_name"], "Bob");
}
