//! End-to-end scenario tests driven through the public `Client`/`Document`
//! API against an in-process fake server (`support::FakeServer`), exercised
//! end-to-end rather than mocked at the unit level.

mod support;

use serde_json::Value as Json;
use std::collections::HashMap;
use support::FakeServer;
use yorkie_client::crdt::{CounterValue, PrimitiveValue};
use yorkie_client::{
    AttachmentMode, Change, ChangePack, Checkpoint, Client, ClientOptions, ClientStatus, Document,
    DocumentOptions, DocumentStatus, NewValue, Result, Snapshot, SyncMode, YorkieError,
};

fn client(server: &std::sync::Arc<FakeServer>) -> Client {
    Client::new(server.clone(), ClientOptions::default())
}

/// S1: a client activates, attaches, and deactivates cleanly; operations
/// requiring an active client fail once deactivated.
#[tokio::test]
async fn s1_activate_deactivate_round_trip() {
    let server = FakeServer::new();
    let c = client(&server);

    assert_eq!(c.status().await, ClientStatus::Deactivated);
    c.activate().await.unwrap();
    assert_eq!(c.status().await, ClientStatus::Activated);

    let handle = c
        .attach(
            "s1-doc",
            HashMap::new(),
            SyncMode::PushPull,
            AttachmentMode::Manual,
            DocumentOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(handle.status().await, DocumentStatus::Attached);

    c.deactivate().await.unwrap();
    assert_eq!(c.status().await, ClientStatus::Deactivated);

    let err = c.sync("s1-doc", None).await.unwrap_err();
    assert!(matches!(err, YorkieError::ClientNotActive));
}

/// S2: three clients share one document. A `PushOnly` client's edits reach
/// the others, but it never pulls anything back; `PushPull` clients
/// converge on each other's state.
#[tokio::test]
async fn s2_push_pull_vs_push_only_converges_selectively() {
    let server = FakeServer::new();
    let a = client(&server);
    let b = client(&server);
    let c = client(&server);
    a.activate().await.unwrap();
    b.activate().await.unwrap();
    c.activate().await.unwrap();

    let key = "s2-doc";
    let ha = a
        .attach(key, HashMap::new(), SyncMode::PushPull, AttachmentMode::Manual, DocumentOptions::default())
        .await
        .unwrap();
    let hb = b
        .attach(key, HashMap::new(), SyncMode::PushPull, AttachmentMode::Manual, DocumentOptions::default())
        .await
        .unwrap();
    let hc = c
        .attach(key, HashMap::new(), SyncMode::PushOnly, AttachmentMode::Manual, DocumentOptions::default())
        .await
        .unwrap();

    ha.update(|ctx| {
        let root = ctx.root_ticket();
        ctx.set(&root, "from_a", NewValue::Primitive(PrimitiveValue::Integer(1)))
    })
    .await
    .unwrap();
    hc.update(|ctx| {
        let root = ctx.root_ticket();
        ctx.set(&root, "from_c", NewValue::Primitive(PrimitiveValue::Integer(3)))
    })
    .await
    .unwrap();

    a.sync(key, None).await.unwrap();
    c.sync(key, None).await.unwrap(); // push-only: sends from_c, pulls nothing
    b.sync(key, None).await.unwrap(); // push-pull: should see from_a and from_c

    assert_eq!(
        hb.to_sorted_json().await,
        Json::from(serde_json::json!({"from_a": 1, "from_c": 3}))
    );
    // the push-only client never applied what it pulled (it never pulls)
    assert_eq!(hc.to_sorted_json().await, Json::from(serde_json::json!({"from_c": 3})));
}

/// S3: two clients concurrently increase a shared counter; after both sync
/// both ways, the counter converges to the sum of every increase, and each
/// client's checkpoint has advanced by one local change.
#[tokio::test]
async fn s3_counter_converges_and_checkpoint_advances() {
    let server = FakeServer::new();
    let a = client(&server);
    let b = client(&server);
    a.activate().await.unwrap();
    b.activate().await.unwrap();

    let key = "s3-doc";
    let ha = a
        .attach(key, HashMap::new(), SyncMode::PushPull, AttachmentMode::Manual, DocumentOptions::default())
        .await
        .unwrap();

    ha.update(|ctx| {
        let root = ctx.root_ticket();
        ctx.set(&root, "counter", NewValue::Counter(CounterValue::I32(0)))
    })
    .await
    .unwrap();
    a.sync(key, None).await.unwrap();

    let hb = b
        .attach(key, HashMap::new(), SyncMode::PushPull, AttachmentMode::Manual, DocumentOptions::default())
        .await
        .unwrap();
    assert_eq!(hb.to_sorted_json().await, Json::from(serde_json::json!({"counter": 0})));

    ha.update(|ctx| {
        let counter = ctx.root().get("counter").unwrap().created_at().unwrap().clone();
        ctx.increase_counter(&counter, CounterValue::I32(5))
    })
    .await
    .unwrap();
    hb.update(|ctx| {
        let counter = ctx.root().get("counter").unwrap().created_at().unwrap().clone();
        ctx.increase_counter(&counter, CounterValue::I32(7))
    })
    .await
    .unwrap();

    a.sync(key, None).await.unwrap();
    b.sync(key, None).await.unwrap();
    a.sync(key, None).await.unwrap();

    assert_eq!(
        ha.to_sorted_json().await,
        Json::from(serde_json::json!({"counter": 12}))
    );
    assert_eq!(
        hb.to_sorted_json().await,
        Json::from(serde_json::json!({"counter": 12}))
    );
}

/// S4: installing a snapshot-bearing pack replaces the root wholesale and
/// keeps only local changes the snapshot's checkpoint hasn't acknowledged
/// yet (§4.4 steps 1-4, exercised directly against `Document` since the
/// fake server doesn't model the server's own snapshot-collapse policy).
#[tokio::test]
async fn s4_snapshot_pack_replaces_root_and_prunes_acked_local_changes() {
    use yorkie_client::{ActorId, ChangeId, Operation, Root, TimeTicket};

    let mut doc = Document::new("s4-doc", ActorId::new("aaaaaaaaaaaaaaaaaaaaaaaa"));
    for i in 0..5u32 {
        doc.update(|ctx| {
            let root = ctx.root_ticket();
            ctx.set(&root, format!("k{i}"), NewValue::Primitive(PrimitiveValue::Integer(i as i64)))
        })
        .unwrap();
    }
    assert!(doc.has_local_changes());

    let snapshot_root_ticket = TimeTicket::initial();
    let mut snapshot_root = Root::new(snapshot_root_ticket.clone());
    let remote_actor = ActorId::new("bbbbbbbbbbbbbbbbbbbbbbbb");
    let op_ticket = TimeTicket::new(1, 1, remote_actor.clone());
    let seed = Change::new(
        ChangeId::new(1, 1, remote_actor),
        vec![Operation::SetObject {
            parent: snapshot_root_ticket,
            key: "from_snapshot".to_string(),
            value: NewValue::Primitive(PrimitiveValue::String("seeded".into())),
            ticket: op_ticket,
        }],
    );
    seed.apply(&mut snapshot_root).unwrap();

    let pack = ChangePack::new(
        "s4-doc",
        Checkpoint {
            server_seq: 10,
            client_seq: 3, // acknowledges the first 3 local changes
        },
    )
    .with_snapshot(Snapshot {
        root: snapshot_root,
        checkpoint: Checkpoint {
            server_seq: 10,
            client_seq: 3,
        },
    });

    doc.apply_change_pack(pack).unwrap();

    assert_eq!(
        doc.to_sorted_json(),
        Json::from(serde_json::json!({"from_snapshot": "seeded"}))
    );
    assert_eq!(doc.checkpoint().client_seq, 3);
}

/// S5: document state-transition guards reject operations outside their
/// valid state (§4.5).
#[tokio::test]
async fn s5_document_state_transitions_reject_invalid_operations() {
    let server = FakeServer::new();
    let a = client(&server);
    a.activate().await.unwrap();

    let key = "s5-doc";
    let handle = a
        .attach(key, HashMap::new(), SyncMode::PushPull, AttachmentMode::Manual, DocumentOptions::default())
        .await
        .unwrap();

    // attaching the same key twice is rejected while still attached
    let second = a
        .attach(key, HashMap::new(), SyncMode::PushPull, AttachmentMode::Manual, DocumentOptions::default())
        .await;
    assert!(matches!(second, Err(YorkieError::DocumentNotDetached)));

    a.remove(key).await.unwrap();
    assert_eq!(handle.status().await, DocumentStatus::Removed);

    // detaching an already-removed (no longer tracked) document fails
    let detach_again = a.detach(key).await;
    assert!(matches!(detach_again, Err(YorkieError::DocumentNotAttached)));

    // updating a removed document is rejected
    let result: Result<()> = handle
        .update(|ctx| {
            let root = ctx.root_ticket();
            ctx.set(&root, "x", NewValue::Primitive(PrimitiveValue::Integer(1)))
        })
        .await;
    assert!(matches!(result, Err(YorkieError::DocumentRemoved)));
}

/// S6b: a `PushOnly` client's second sync does not resend a change the
/// first sync already got acknowledged (§4.4/§4.5: checkpoint-forward and
/// local-change pruning must still run even though remote changes are
/// ignored).
#[tokio::test]
async fn s6b_push_only_second_sync_does_not_resend_acked_change() {
    let server = FakeServer::new();
    let a = client(&server);
    a.activate().await.unwrap();

    let key = "s6b-doc";
    let handle = a
        .attach(key, HashMap::new(), SyncMode::PushOnly, AttachmentMode::Manual, DocumentOptions::default())
        .await
        .unwrap();

    handle
        .update(|ctx| {
            let root = ctx.root_ticket();
            ctx.set(&root, "x", NewValue::Primitive(PrimitiveValue::Integer(1)))
        })
        .await
        .unwrap();
    a.sync(key, None).await.unwrap();
    assert_eq!(server.change_count(key), 1);

    // no new local change since the last sync: the pack sent must be empty,
    // not a resend of the already-acknowledged first change.
    a.sync(key, None).await.unwrap();
    assert_eq!(server.change_count(key), 1);
}

/// S6: a document update that would exceed its configured size ceiling is
/// rejected and rolled back (§4.7).
#[tokio::test]
async fn s6_update_exceeding_size_limit_is_rejected() {
    let server = FakeServer::new();
    let a = client(&server);
    a.activate().await.unwrap();

    let handle = a
        .attach(
            "s6-doc",
            HashMap::new(),
            SyncMode::PushPull,
            AttachmentMode::Manual,
            DocumentOptions::with_max_size(16),
        )
        .await
        .unwrap();

    let result = handle
        .update(|ctx| {
            let root = ctx.root_ticket();
            ctx.set(
                &root,
                "big",
                NewValue::Primitive(PrimitiveValue::String(
                    "this string is deliberately much too long to fit".into(),
                )),
            )
        })
        .await;
    assert!(matches!(result, Err(YorkieError::SizeLimitExceeded { .. })));
    assert_eq!(handle.to_sorted_json().await, Json::from(serde_json::json!({})));
}
