/// Integration tests for user and capability operations
///
/// Run with: cargo test --test user_tests
/// Requires DATABASE_URL, see `common`.

mod common;

use common::TestContext;
use glauth_store::models::capability::{CapabilityAction, CreateCapability};
use glauth_store::models::group::{CreateGroup, Group};
use glauth_store::models::user::{CreateUser, GroupRef, UpdateUser};
use glauth_store::password::sha256_hex;
use glauth_store::DirectoryStore;

async fn create_group(store: &DirectoryStore, name: &str) -> Group {
    store
        .create_group(CreateGroup {
            name: name.to_string(),
            gid_number: None,
        })
        .await
        .unwrap()
}

fn user(name: &str) -> CreateUser {
    CreateUser {
        name: name.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_first_user_gets_uid_20000() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    assert_eq!(ctx.store.find_next_user_id().await.unwrap(), 20000);

    let alice = ctx.store.create_user(user("alice")).await.unwrap();
    assert_eq!(alice.uid_number, 20000);

    let bob = ctx.store.create_user(user("bob")).await.unwrap();
    assert_eq!(bob.uid_number, 20001);
    assert_eq!(ctx.store.find_next_user_id().await.unwrap(), 20002);
}

#[tokio::test]
async fn test_uid_allocation_stops_at_i32_max() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    ctx.store
        .create_user(CreateUser {
            uid_number: Some(i32::MAX),
            ..user("top")
        })
        .await
        .unwrap();

    let err = ctx.store.find_next_user_id().await.unwrap_err();
    assert!(err.is_conflict(), "unexpected error: {:?}", err);

    let err = ctx.store.create_user(user("next")).await.unwrap_err();
    assert!(err.is_conflict(), "unexpected error: {:?}", err);
    assert!(!ctx.store.user_exist_by_name("next").await.unwrap());
}

#[tokio::test]
async fn test_create_user_round_trips_cust_attr() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    ctx.store
        .create_user(CreateUser {
            cust_attr: Some(r#"{"k":1}"#.to_string()),
            ..user("alice")
        })
        .await
        .unwrap();

    let alice = ctx.store.get_user_by_name("alice").await.unwrap();
    assert_eq!(alice.custom_attributes().unwrap(), serde_json::json!({"k": 1}));
    assert_eq!(alice.pass_sha256, "");
    assert!(alice.primary_group.is_none());
    assert!(alice.lookup_failures.is_empty());
}

#[tokio::test]
async fn test_create_user_defaults_cust_attr_to_empty_object() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let alice = ctx.store.create_user(user("alice")).await.unwrap();
    assert_eq!(alice.cust_attr, "{}");
}

#[tokio::test]
async fn test_create_user_rejects_malformed_cust_attr() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let err = ctx
        .store
        .create_user(CreateUser {
            cust_attr: Some("[1, 2]".to_string()),
            ..user("alice")
        })
        .await
        .unwrap_err();
    assert!(err.is_validation(), "unexpected error: {:?}", err);
    assert!(!ctx.store.user_exist_by_name("alice").await.unwrap());
}

#[tokio::test]
async fn test_create_user_hashes_password() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let hackers = ctx
        .store
        .create_user(CreateUser {
            password: Some("dogood".to_string()),
            ..user("hackers")
        })
        .await
        .unwrap();

    assert_eq!(hackers.pass_sha256, sha256_hex("dogood"));
}

#[tokio::test]
async fn test_create_user_duplicate_name_conflicts() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    ctx.store.create_user(user("alice")).await.unwrap();

    let err = ctx.store.create_user(user("alice")).await.unwrap_err();
    assert!(err.is_conflict(), "unexpected error: {:?}", err);
    assert_eq!(ctx.store.get_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_user_duplicate_uid_conflicts() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    ctx.store
        .create_user(CreateUser {
            uid_number: Some(5001),
            ..user("alice")
        })
        .await
        .unwrap();

    let err = ctx
        .store
        .create_user(CreateUser {
            uid_number: Some(5001),
            ..user("bob")
        })
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "unexpected error: {:?}", err);
    assert!(!ctx.store.user_exist_by_name("bob").await.unwrap());
}

#[tokio::test]
async fn test_primary_group_is_resolved() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let users = create_group(&ctx.store, "users").await;
    assert_eq!(users.gid_number, 10000);

    ctx.store
        .create_user(CreateUser {
            primary_group: Some(10000),
            ..user("bob")
        })
        .await
        .unwrap();

    let bob = ctx.store.get_user_by_name("bob").await.unwrap();
    let primary = bob.primary_group.as_ref().and_then(GroupRef::group).unwrap();
    assert_eq!(primary.name, "users");
}

#[tokio::test]
async fn test_missing_groups_are_reported_not_dropped() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let staff = create_group(&ctx.store, "staff").await;

    ctx.store
        .create_user(CreateUser {
            primary_group: Some(15000),
            other_groups: vec![staff.gid_number, 16000],
            ..user("bob")
        })
        .await
        .unwrap();

    let bob = ctx.store.get_user_by_name("bob").await.unwrap();
    assert_eq!(bob.primary_group, Some(GroupRef::Missing { gid: 15000 }));
    assert_eq!(
        bob.other_groups,
        vec![GroupRef::Resolved(staff), GroupRef::Missing { gid: 16000 }]
    );
    assert!(bob.lookup_failures.is_empty());
}

#[tokio::test]
async fn test_groups_including_primary_are_merged() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let users = create_group(&ctx.store, "users").await;
    let staff = create_group(&ctx.store, "staff").await;
    let vpn = create_group(&ctx.store, "vpn").await;

    ctx.store.include_group(staff.gid_number, users.gid_number).await.unwrap();
    ctx.store.include_group(vpn.gid_number, users.gid_number).await.unwrap();

    ctx.store
        .create_user(CreateUser {
            primary_group: Some(users.gid_number),
            other_groups: vec![vpn.gid_number, users.gid_number],
            ..user("bob")
        })
        .await
        .unwrap();

    let bob = ctx.store.get_user_by_name("bob").await.unwrap();
    let gids: Vec<i32> = bob.other_groups.iter().map(GroupRef::gid).collect();
    assert_eq!(gids, vec![vpn.gid_number, staff.gid_number]);

    let names: Vec<&str> = bob.member_of().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["users", "vpn", "staff"]);
}

#[tokio::test]
async fn test_user_lookups() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let alice = ctx.store.create_user(user("alice")).await.unwrap();

    assert!(ctx.store.user_exist_by_name("alice").await.unwrap());
    assert!(ctx.store.user_exist_by_uid(alice.uid_number).await.unwrap());
    assert!(!ctx.store.user_exist_by_uid(alice.uid_number + 1).await.unwrap());

    let by_uid = ctx.store.get_user_by_uid(alice.uid_number).await.unwrap();
    assert_eq!(by_uid.name, "alice");

    assert!(ctx.store.get_user_by_name("nobody").await.unwrap_err().is_not_found());
    assert!(ctx.store.get_user_by_uid(1).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_create_capability() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let alice = ctx.store.create_user(user("alice")).await.unwrap();

    ctx.store
        .create_capability(alice.uid_number, CreateCapability::search("*"))
        .await
        .unwrap();

    let capabilities = ctx
        .store
        .get_capabilities_by_user_uid_number(alice.uid_number)
        .await
        .unwrap();
    assert_eq!(capabilities.len(), 1);
    assert_eq!(capabilities[0].action, CapabilityAction::Search);
    assert_eq!(capabilities[0].action.as_str(), "search");
    assert_eq!(capabilities[0].object, "*");
    assert_eq!(capabilities[0].user_id, alice.uid_number);

    let alice = ctx.store.get_user_by_name("alice").await.unwrap();
    assert_eq!(alice.capabilities, capabilities);
}

#[tokio::test]
async fn test_create_user_with_capabilities() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let alice = ctx
        .store
        .create_user(CreateUser {
            capabilities: vec![
                CreateCapability::search("ou=superheros,dc=glauth,dc=com"),
                CreateCapability::search("*"),
            ],
            ..user("alice")
        })
        .await
        .unwrap();

    assert_eq!(alice.capabilities.len(), 2);
}

#[tokio::test]
async fn test_update_password() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let alice = ctx.store.create_user(user("alice")).await.unwrap();

    ctx.store.update_user_password("alice", "s3cret").await.unwrap();
    assert_eq!(
        ctx.store.get_user_by_name("alice").await.unwrap().pass_sha256,
        sha256_hex("s3cret")
    );

    ctx.store
        .update_user_password_by_uid(alice.uid_number, "other")
        .await
        .unwrap();
    assert_eq!(
        ctx.store.get_user_by_name("alice").await.unwrap().pass_sha256,
        sha256_hex("other")
    );

    assert!(ctx
        .store
        .update_user_password("nobody", "x")
        .await
        .unwrap_err()
        .is_not_found());
    assert!(ctx
        .store
        .update_user_password_by_uid(1, "x")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_update_user_patches_only_given_fields() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    ctx.store
        .create_user(CreateUser {
            given_name: "Alice".to_string(),
            mail: "alice@example.com".to_string(),
            ..user("alice")
        })
        .await
        .unwrap();

    let alice = ctx
        .store
        .update_user(
            "alice",
            UpdateUser {
                mail: Some("alice@example.org".to_string()),
                disabled: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(alice.mail, "alice@example.org");
    assert!(alice.disabled);
    assert_eq!(alice.given_name, "Alice");
}

#[tokio::test]
async fn test_update_user_rejects_unknown_secondary_group() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let staff = create_group(&ctx.store, "staff").await;
    ctx.store.create_user(user("alice")).await.unwrap();

    let err = ctx
        .store
        .update_user(
            "alice",
            UpdateUser {
                other_groups: Some(vec![staff.gid_number, 19999]),
                mail: Some("changed@example.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_validation(), "unexpected error: {:?}", err);

    let alice = ctx.store.get_user_by_name("alice").await.unwrap();
    assert!(alice.other_groups.is_empty());
    assert_eq!(alice.mail, "");
}

#[tokio::test]
async fn test_update_user_rejects_primary_in_secondary_groups() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let users = create_group(&ctx.store, "users").await;
    let staff = create_group(&ctx.store, "staff").await;

    ctx.store
        .create_user(CreateUser {
            primary_group: Some(users.gid_number),
            ..user("alice")
        })
        .await
        .unwrap();

    let err = ctx
        .store
        .update_user(
            "alice",
            UpdateUser {
                other_groups: Some(vec![staff.gid_number, users.gid_number]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_validation(), "unexpected error: {:?}", err);

    let alice = ctx
        .store
        .update_user(
            "alice",
            UpdateUser {
                other_groups: Some(vec![staff.gid_number]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(alice.other_groups, vec![GroupRef::Resolved(staff)]);
}

#[tokio::test]
async fn test_update_user_checks_patched_primary_group() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let users = create_group(&ctx.store, "users").await;
    let staff = create_group(&ctx.store, "staff").await;
    let vpn = create_group(&ctx.store, "vpn").await;

    ctx.store
        .create_user(CreateUser {
            primary_group: Some(users.gid_number),
            other_groups: vec![staff.gid_number],
            ..user("alice")
        })
        .await
        .unwrap();

    let err = ctx
        .store
        .update_user(
            "alice",
            UpdateUser {
                primary_group: Some(staff.gid_number),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_validation(), "unexpected error: {:?}", err);

    let unchanged = ctx.store.get_user_by_name("alice").await.unwrap();
    assert_eq!(unchanged.primary_group, Some(GroupRef::Resolved(users)));

    let alice = ctx
        .store
        .update_user(
            "alice",
            UpdateUser {
                primary_group: Some(vpn.gid_number),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(alice.primary_group, Some(GroupRef::Resolved(vpn)));
    assert_eq!(alice.other_groups, vec![GroupRef::Resolved(staff)]);
}

#[tokio::test]
async fn test_update_user_rehashes_password() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    ctx.store
        .create_user(CreateUser {
            password: Some("dogood".to_string()),
            ..user("alice")
        })
        .await
        .unwrap();

    let alice = ctx
        .store
        .update_user(
            "alice",
            UpdateUser {
                password: Some("dobetter".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(alice.pass_sha256, sha256_hex("dobetter"));
    assert_eq!(
        ctx.store.get_user_by_name("alice").await.unwrap().pass_sha256,
        sha256_hex("dobetter")
    );
}

#[tokio::test]
async fn test_update_user_replaces_capabilities() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let alice = ctx
        .store
        .create_user(CreateUser {
            capabilities: vec![
                CreateCapability::search("ou=a,dc=glauth,dc=com"),
                CreateCapability::search("ou=b,dc=glauth,dc=com"),
            ],
            ..user("alice")
        })
        .await
        .unwrap();

    ctx.store
        .update_user(
            "alice",
            UpdateUser {
                capabilities: Some(vec![CreateCapability::search("*")]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let capabilities = ctx
        .store
        .get_capabilities_by_user_uid_number(alice.uid_number)
        .await
        .unwrap();
    assert_eq!(capabilities.len(), 1);
    assert_eq!(capabilities[0].object, "*");
}

#[tokio::test]
async fn test_update_user_rejects_malformed_cust_attr() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    ctx.store.create_user(user("alice")).await.unwrap();

    let err = ctx
        .store
        .update_user(
            "alice",
            UpdateUser {
                cust_attr: Some("not json".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_update_missing_user_not_found() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let err = ctx
        .store
        .update_user("ghost", UpdateUser::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_user_removes_capabilities() {
    let Some(ctx) = TestContext::new().await.unwrap() else { return };

    let alice = ctx
        .store
        .create_user(CreateUser {
            capabilities: vec![CreateCapability::search("*")],
            ..user("alice")
        })
        .await
        .unwrap();

    ctx.store.delete_user(alice.uid_number).await.unwrap();

    assert!(!ctx.store.user_exist_by_uid(alice.uid_number).await.unwrap());
    assert!(ctx
        .store
        .get_capabilities_by_user_uid_number(alice.uid_number)
        .await
        .unwrap()
        .is_empty());

    let err = ctx.store.delete_user(alice.uid_number).await.unwrap_err();
    assert!(err.is_not_found());
}
