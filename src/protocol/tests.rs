// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::core::frame::{encode_body, Frame};
use crate::error::ProtocolError;
use crate::protocol::command::{status, Command, LOGIN_AUTH, SIGN_DAY};
use crate::protocol::dispatcher::{Dispatcher, Reply, SessionContext};
use crate::store::{token_key, SessionCache, TokenCache};

fn ctx(authenticated: bool, identity: u64) -> SessionContext {
    SessionContext {
        session_id: 1,
        peer: "127.0.0.1:40000".parse::<SocketAddr>().unwrap(),
        identity,
        authenticated,
    }
}

fn login_frame(identity: u64, token: &str) -> Frame {
    Frame::new(identity, LOGIN_AUTH, 0, encode_body(token.as_bytes()))
}

async fn cache_with_token(identity: u64, token: &str) -> Arc<dyn SessionCache> {
    let cache = TokenCache::new(16, Duration::from_secs(60));
    cache.store(token_key(identity), token.to_string()).await;
    Arc::new(cache)
}

#[test]
fn test_command_codes() {
    assert_eq!(Command::from(1001), Command::LoginAuth);
    assert_eq!(Command::from(1002), Command::SignDay);
    assert_eq!(Command::from(7), Command::Other(7));
    assert_eq!(Command::SignDay.code(), SIGN_DAY);
    assert_eq!(Command::LoginAuth.name(), "LOGIN_AUTH");
}

#[tokio::test]
async fn test_dispatch_routes_by_main_command() {
    let dispatcher = Dispatcher::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&hits);
    dispatcher
        .register(7, move |frame: Frame, _ctx| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Reply::respond(Frame::new(frame.identity(), 7, 0, Bytes::new())))
            }
        })
        .unwrap();

    let reply = dispatcher
        .dispatch(Frame::new(5, 7, 0, Bytes::new()), ctx(true, 5))
        .await
        .unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(reply.response.unwrap().identity(), 5);
    assert!(!reply.authenticate);
}

#[tokio::test]
async fn test_unknown_command() {
    let dispatcher = Dispatcher::new();
    let result = dispatcher
        .dispatch(Frame::new(5, 4242, 0, Bytes::new()), ctx(true, 5))
        .await;
    assert!(matches!(result, Err(ProtocolError::UnknownCommand(4242))));
}

#[tokio::test]
async fn test_register_replaces_handler() {
    let dispatcher = Dispatcher::new();
    dispatcher
        .register(9, |_frame, _ctx| async { Ok(Reply::none()) })
        .unwrap();
    dispatcher
        .register(9, |_frame, _ctx| async { Ok(Reply::authenticated(None)) })
        .unwrap();

    let reply = dispatcher
        .dispatch(Frame::new(1, 9, 0, Bytes::new()), ctx(false, 0))
        .await
        .unwrap();
    assert!(reply.authenticate);
}

#[tokio::test]
async fn test_login_auth_accepts_matching_token() {
    let cache = cache_with_token(42, "f00dfeed").await;
    let dispatcher = Dispatcher::with_builtin_commands(cache).unwrap();

    let reply = dispatcher
        .dispatch(login_frame(42, "f00dfeed"), ctx(false, 0))
        .await
        .unwrap();

    assert!(reply.authenticate);
    let response = reply.response.unwrap();
    assert_eq!(response.main_command(), LOGIN_AUTH);
    assert_eq!(response.sub_command(), status::OK);
}

#[tokio::test]
async fn test_login_auth_rejects_wrong_token() {
    let cache = cache_with_token(42, "f00dfeed").await;
    let dispatcher = Dispatcher::with_builtin_commands(cache).unwrap();

    let reply = dispatcher
        .dispatch(login_frame(42, "deadbeef"), ctx(false, 0))
        .await
        .unwrap();
    assert!(!reply.authenticate);
    assert_eq!(reply.response.unwrap().sub_command(), status::REJECTED);

    // Token cached for another identity
    let reply = dispatcher
        .dispatch(login_frame(43, "f00dfeed"), ctx(false, 0))
        .await
        .unwrap();
    assert!(!reply.authenticate);
}

#[tokio::test]
async fn test_login_auth_rejects_zero_identity() {
    let cache = cache_with_token(0, "f00dfeed").await;
    let dispatcher = Dispatcher::with_builtin_commands(cache).unwrap();

    let reply = dispatcher
        .dispatch(login_frame(0, "f00dfeed"), ctx(false, 0))
        .await
        .unwrap();
    assert!(!reply.authenticate);
}

#[tokio::test]
async fn test_sign_day_requires_authentication() {
    let cache = cache_with_token(42, "f00dfeed").await;
    let dispatcher = Dispatcher::with_builtin_commands(cache).unwrap();
    let frame = Frame::new(42, SIGN_DAY, 0, encode_body(b"day-1"));

    let reply = dispatcher.dispatch(frame.clone(), ctx(false, 0)).await.unwrap();
    assert_eq!(reply.response.unwrap().sub_command(), status::UNAUTHENTICATED);

    let reply = dispatcher.dispatch(frame, ctx(true, 42)).await.unwrap();
    let response = reply.response.unwrap();
    assert_eq!(response.sub_command(), status::OK);
    assert_eq!(response.payload_text().as_deref(), Some("day-1"));
}
