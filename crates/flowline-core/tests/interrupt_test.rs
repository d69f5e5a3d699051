// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the bulk interruption selectors.

mod common;

use chrono::Utc;
use common::*;
use flowline_core::interrupts::{
    interrupt_sessions_for_channels, interrupt_sessions_for_contacts,
    interrupt_sessions_for_flows, interrupt_sessions_of_type_for_contacts,
};
use flowline_core::{write_sessions, ConnectionID, FlowType};
use flowline_engine as engine;

#[tokio::test]
async fn test_interrupt_sessions_for_contacts() {
    skip_if_no_db!();
    let ctx = TestContext::new().await.expect("failed to create test context");

    let cathy = ctx.insert_contact("Cathy").await;
    let bob = ctx.insert_contact("Bob").await;
    let george = ctx.insert_contact("George").await;
    let favorites = ctx.insert_flow("Favorites", "M").await;

    let (session1, _) = ctx.insert_session_and_run(&cathy, "M", "C", &favorites, None).await;
    let (session2, _) = ctx.insert_session_and_run(&cathy, "M", "W", &favorites, None).await;
    let (session3, _) = ctx.insert_session_and_run(&bob, "M", "W", &favorites, None).await;
    let (session4, _) = ctx.insert_session_and_run(&george, "M", "W", &favorites, None).await;

    // noop if no contacts
    let mut tx = ctx.begin().await;
    interrupt_sessions_for_contacts(&mut tx, &[], Utc::now()).await.unwrap();
    tx.commit().await.unwrap();

    ctx.assert_session_and_run_status(session1, "C").await;
    ctx.assert_session_and_run_status(session2, "W").await;
    ctx.assert_session_and_run_status(session3, "W").await;
    ctx.assert_session_and_run_status(session4, "W").await;

    let mut tx = ctx.begin().await;
    interrupt_sessions_for_contacts(&mut tx, &[cathy.id, bob.id], Utc::now())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    ctx.assert_session_and_run_status(session1, "C").await; // wasn't waiting
    ctx.assert_session_and_run_status(session2, "I").await;
    ctx.assert_session_and_run_status(session3, "I").await;
    ctx.assert_session_and_run_status(session4, "W").await; // contact not included

    // check other columns are correct on interrupted session
    assert_eq!(ctx.count_cleanly_ended(session2).await, 1);

    // interrupting again is a no-op on the now-terminal sessions
    let ended_on: Option<chrono::DateTime<Utc>> =
        sqlx::query_scalar(r#"SELECT ended_on FROM flows_flowsession WHERE id = $1"#)
            .bind(session2)
            .fetch_one(&ctx.pool)
            .await
            .unwrap();

    let mut tx = ctx.begin().await;
    interrupt_sessions_for_contacts(&mut tx, &[cathy.id, bob.id], Utc::now())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let ended_on_after: Option<chrono::DateTime<Utc>> =
        sqlx::query_scalar(r#"SELECT ended_on FROM flows_flowsession WHERE id = $1"#)
            .bind(session2)
            .fetch_one(&ctx.pool)
            .await
            .unwrap();
    assert_eq!(ended_on, ended_on_after); // row untouched
}

#[tokio::test]
async fn test_interrupt_sessions_of_type_for_contacts() {
    skip_if_no_db!();
    let ctx = TestContext::new().await.expect("failed to create test context");

    let cathy = ctx.insert_contact("Cathy").await;
    let bob = ctx.insert_contact("Bob").await;
    let george = ctx.insert_contact("George").await;
    let favorites = ctx.insert_flow("Favorites", "M").await;
    let ivr = ctx.insert_flow("IVR Survey", "V").await;

    let (session1, _) = ctx.insert_session_and_run(&cathy, "M", "C", &favorites, None).await;
    let (session2, _) = ctx.insert_session_and_run(&cathy, "M", "W", &favorites, None).await;
    let (session3, _) = ctx.insert_session_and_run(&bob, "M", "W", &favorites, None).await;
    let (session4, _) = ctx.insert_session_and_run(&george, "V", "W", &ivr, None).await;

    let mut tx = ctx.begin().await;
    interrupt_sessions_of_type_for_contacts(
        &mut tx,
        &[cathy.id, bob.id, george.id],
        FlowType::Messaging,
        Utc::now(),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    ctx.assert_session_and_run_status(session1, "C").await; // wasn't waiting
    ctx.assert_session_and_run_status(session2, "I").await;
    ctx.assert_session_and_run_status(session3, "I").await;
    ctx.assert_session_and_run_status(session4, "W").await; // wrong type

    assert_eq!(ctx.count_cleanly_ended(session2).await, 1);
}

#[tokio::test]
async fn test_interrupt_sessions_for_channels() {
    skip_if_no_db!();
    let ctx = TestContext::new().await.expect("failed to create test context");

    let cathy = ctx.insert_contact("Cathy").await;
    let bob = ctx.insert_contact("Bob").await;
    let george = ctx.insert_contact("George").await;
    let favorites = ctx.insert_flow("Favorites", "M").await;
    let (twilio, _) = ctx.insert_channel("Twilio").await;
    let (vonage, _) = ctx.insert_channel("Vonage").await;

    let cathy1_conn = ctx.insert_connection(twilio, cathy.id).await;
    let cathy2_conn = ctx.insert_connection(twilio, cathy.id).await;
    let bob_conn = ctx.insert_connection(twilio, bob.id).await;
    let george_conn = ctx.insert_connection(vonage, george.id).await;

    let (session1, _) = ctx
        .insert_session_and_run(&cathy, "M", "C", &favorites, Some(cathy1_conn))
        .await;
    let (session2, _) = ctx
        .insert_session_and_run(&cathy, "M", "W", &favorites, Some(cathy2_conn))
        .await;
    let (session3, _) = ctx
        .insert_session_and_run(&bob, "M", "W", &favorites, Some(bob_conn))
        .await;
    let (session4, _) = ctx
        .insert_session_and_run(&george, "M", "W", &favorites, Some(george_conn))
        .await;

    // noop if no channels
    let mut tx = ctx.begin().await;
    interrupt_sessions_for_channels(&mut tx, &[], Utc::now()).await.unwrap();
    tx.commit().await.unwrap();

    ctx.assert_session_and_run_status(session1, "C").await;
    ctx.assert_session_and_run_status(session2, "W").await;
    ctx.assert_session_and_run_status(session3, "W").await;
    ctx.assert_session_and_run_status(session4, "W").await;

    let mut tx = ctx.begin().await;
    interrupt_sessions_for_channels(&mut tx, &[twilio], Utc::now()).await.unwrap();
    tx.commit().await.unwrap();

    ctx.assert_session_and_run_status(session1, "C").await; // wasn't waiting
    ctx.assert_session_and_run_status(session2, "I").await;
    ctx.assert_session_and_run_status(session3, "I").await;
    ctx.assert_session_and_run_status(session4, "W").await; // channel not included

    assert_eq!(ctx.count_cleanly_ended(session2).await, 1);
}

#[tokio::test]
async fn test_interrupt_written_voice_session_by_channel() {
    skip_if_no_db!();
    let ctx = TestContext::new().await.expect("failed to create test context");

    let cathy = ctx.insert_contact("Cathy").await;
    let ivr = ctx.insert_flow("IVR Survey", "V").await;
    let (twilio, _) = ctx.insert_channel("Twilio").await;
    let (vonage, _) = ctx.insert_channel("Vonage").await;
    let connection = ctx.insert_connection(twilio, cathy.id).await;
    let org = ctx.org_assets().await;

    // the voice layer places the call, creates the connection row and puts
    // its id on the engine snapshot before the first sprint
    let run = make_run(&ivr, engine::RunStatus::Waiting, None, vec![]);
    let mut fs = make_session(
        engine::FlowType::Voice,
        engine::SessionStatus::Waiting,
        engine_contact(&cathy, "Cathy"),
        vec![run],
        Some(engine::Wait {
            expires_on: None,
            timeout_seconds: None,
        }),
    );
    fs.connection_id = Some(connection.0);

    let mut tx = ctx.begin().await;
    let (sessions, _) = write_sessions(
        &ctx.rt,
        &mut tx,
        &org,
        std::slice::from_ref(&fs),
        &[engine::Sprint::default()],
        None,
        None,
        Utc::now(),
    )
    .await
    .expect("failed to write sessions");
    tx.commit().await.unwrap();

    let session_id = sessions[0].id();
    assert_eq!(sessions[0].connection_id(), Some(connection));

    // the connection lands on the session row and is mirrored to its run
    let row: (Option<ConnectionID>, Option<ConnectionID>) = sqlx::query_as(
        r#"
        SELECT s.connection_id, r.connection_id
        FROM flows_flowsession s JOIN flows_flowrun r ON r.session_id = s.id
        WHERE s.id = $1
        "#,
    )
    .bind(session_id)
    .fetch_one(&ctx.pool)
    .await
    .unwrap();
    assert_eq!(row, (Some(connection), Some(connection)));

    // interrupting the other channel leaves the call alone
    let mut tx = ctx.begin().await;
    interrupt_sessions_for_channels(&mut tx, &[vonage], Utc::now()).await.unwrap();
    tx.commit().await.unwrap();
    ctx.assert_session_and_run_status(session_id, "W").await;

    // interrupting its own channel ends it
    let mut tx = ctx.begin().await;
    interrupt_sessions_for_channels(&mut tx, &[twilio], Utc::now()).await.unwrap();
    tx.commit().await.unwrap();

    ctx.assert_session_and_run_status(session_id, "I").await;
    assert_eq!(ctx.count_cleanly_ended(session_id).await, 1);
}

#[tokio::test]
async fn test_interrupt_sessions_for_flows() {
    skip_if_no_db!();
    let ctx = TestContext::new().await.expect("failed to create test context");

    let cathy = ctx.insert_contact("Cathy").await;
    let bob = ctx.insert_contact("Bob").await;
    let george = ctx.insert_contact("George").await;
    let favorites = ctx.insert_flow("Favorites", "M").await;
    let pick_a_number = ctx.insert_flow("Pick a Number", "M").await;

    let (session1, _) = ctx.insert_session_and_run(&cathy, "M", "C", &favorites, None).await;
    let (session2, _) = ctx.insert_session_and_run(&cathy, "M", "W", &favorites, None).await;
    let (session3, _) = ctx.insert_session_and_run(&bob, "M", "W", &favorites, None).await;
    let (session4, _) = ctx
        .insert_session_and_run(&george, "M", "W", &pick_a_number, None)
        .await;

    // noop if no flows
    let mut tx = ctx.begin().await;
    interrupt_sessions_for_flows(&mut tx, &[], Utc::now()).await.unwrap();
    tx.commit().await.unwrap();

    ctx.assert_session_and_run_status(session1, "C").await;
    ctx.assert_session_and_run_status(session2, "W").await;
    ctx.assert_session_and_run_status(session3, "W").await;
    ctx.assert_session_and_run_status(session4, "W").await;

    let mut tx = ctx.begin().await;
    interrupt_sessions_for_flows(&mut tx, &[favorites.id], Utc::now()).await.unwrap();
    tx.commit().await.unwrap();

    ctx.assert_session_and_run_status(session1, "C").await; // wasn't waiting
    ctx.assert_session_and_run_status(session2, "I").await;
    ctx.assert_session_and_run_status(session3, "I").await;
    ctx.assert_session_and_run_status(session4, "W").await; // flow not included

    assert_eq!(ctx.count_cleanly_ended(session2).await, 1);
}
