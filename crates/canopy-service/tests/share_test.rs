//! Integration tests for public links, user grants, and class grants.

mod helpers;

use chrono::{Duration, Utc};

use canopy_auth::AccessReason;
use canopy_core::error::ErrorKind;
use canopy_core::types::{NodeId, UserId};
use canopy_database::NodeRepository;
use canopy_entity::grant::CohortTarget;
use canopy_service::LinkDuration;

use helpers::{TestApp, member, student, teacher};

fn alter_one_char(code: &str) -> String {
    let mut chars: Vec<char> = code.chars().collect();
    chars[0] = if chars[0] == 'a' { 'b' } else { 'a' };
    chars.into_iter().collect()
}

#[tokio::test]
async fn test_public_link_resolves_and_counts_access() {
    let app = TestApp::new().await;
    let owner = UserId::new();
    let file = app.file(owner, "syllabus.pdf", None, b"pdf").await;

    let link = app
        .services
        .public_links
        .create_public_link(file.id, owner, LinkDuration::OneDay)
        .await
        .unwrap();
    assert_eq!(link.code.len(), app.config.share.code_length);

    let resolved = app
        .services
        .public_links
        .resolve_public_link(&link.code)
        .await
        .unwrap();
    assert_eq!(resolved.meta.name, "syllabus.pdf");
    assert_eq!(resolved.meta.size_bytes, 3);

    let node = app.node(file.id).await.unwrap();
    assert_eq!(node.download_count, 1);
    assert!(node.last_accessed_at.is_some());
}

#[tokio::test]
async fn test_altered_code_gets_generic_error() {
    let app = TestApp::new().await;
    let owner = UserId::new();
    let file = app.file(owner, "a.txt", None, b"a").await;
    let link = app
        .services
        .public_links
        .create_public_link(file.id, owner, LinkDuration::OneHour)
        .await
        .unwrap();

    let err = app
        .services
        .public_links
        .resolve_public_link(&alter_one_char(&link.code))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
    assert_eq!(err.message, "Invalid or expired link");
}

#[tokio::test]
async fn test_expired_revoked_and_trashed_links_do_not_resolve() {
    let app = TestApp::new().await;
    let owner = UserId::new();

    let expired = app.file(owner, "old.txt", None, b"o").await;
    app.store
        .set_public_share(expired.id, "expiredcode", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();
    let err = app
        .services
        .public_links
        .resolve_public_link("expiredcode")
        .await
        .unwrap_err();
    assert_eq!(err.message, "Invalid or expired link");

    let revoked = app.file(owner, "revoked.txt", None, b"r").await;
    let link = app
        .services
        .public_links
        .create_public_link(revoked.id, owner, LinkDuration::SevenDays)
        .await
        .unwrap();
    app.services
        .public_links
        .revoke_public_link(revoked.id, owner)
        .await
        .unwrap();
    app.services
        .public_links
        .revoke_public_link(revoked.id, owner)
        .await
        .unwrap();
    let err = app
        .services
        .public_links
        .resolve_public_link(&link.code)
        .await
        .unwrap_err();
    assert_eq!(err.message, "Invalid or expired link");

    let trashed = app.file(owner, "trashed.txt", None, b"t").await;
    let link = app
        .services
        .public_links
        .create_public_link(trashed.id, owner, LinkDuration::OneDay)
        .await
        .unwrap();
    app.services.trash.soft_delete(trashed.id, owner).await.unwrap();
    let err = app
        .services
        .public_links
        .resolve_public_link(&link.code)
        .await
        .unwrap_err();
    assert_eq!(err.message, "Invalid or expired link");
}

#[tokio::test]
async fn test_new_public_link_supersedes_old_one() {
    let app = TestApp::new().await;
    let owner = UserId::new();
    let file = app.file(owner, "a.txt", None, b"a").await;

    let first = app
        .services
        .public_links
        .create_public_link(file.id, owner, LinkDuration::OneDay)
        .await
        .unwrap();
    let second = app
        .services
        .public_links
        .create_public_link(file.id, owner, LinkDuration::OneDay)
        .await
        .unwrap();

    assert!(
        app.services
            .public_links
            .resolve_public_link(&second.code)
            .await
            .is_ok()
    );
    if first.code != second.code {
        assert!(
            app.services
                .public_links
                .resolve_public_link(&first.code)
                .await
                .is_err()
        );
    }
}

#[tokio::test]
async fn test_public_link_is_owner_only_and_files_only() {
    let app = TestApp::new().await;
    let owner = UserId::new();
    let folder = app.folder(owner, "Docs", None).await;
    let file = app.file(owner, "a.txt", Some(folder.id), b"a").await;

    let err = app
        .services
        .public_links
        .create_public_link(file.id, UserId::new(), LinkDuration::OneDay)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Forbidden));

    let err = app
        .services
        .public_links
        .create_public_link(folder.id, owner, LinkDuration::OneDay)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::InvalidArgument));
}

#[tokio::test]
async fn test_share_with_user_validations() {
    let app = TestApp::new().await;
    let owner = app.create_user("Owner", true).await;
    let friend = app.create_user("Friend", true).await;
    let hermit = app.create_user("Hermit", false).await;
    let file = app.file(owner, "a.txt", None, b"a").await;
    let shares = &app.services.shares;

    let err = shares.share_with_user(file.id, owner, owner, None).await.unwrap_err();
    assert!(err.is(ErrorKind::InvalidArgument));

    let err = shares
        .share_with_user(file.id, owner, UserId::new(), None)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::NotFound));

    let err = shares.share_with_user(file.id, owner, hermit, None).await.unwrap_err();
    assert!(err.is(ErrorKind::Forbidden));

    let err = shares
        .share_with_user(file.id, owner, friend, Some(Utc::now() - Duration::hours(1)))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::InvalidArgument));

    shares.share_with_user(file.id, owner, friend, None).await.unwrap();
    let err = shares.share_with_user(file.id, owner, friend, None).await.unwrap_err();
    assert!(err.is(ErrorKind::Conflict));

    let err = shares
        .share_with_user(file.id, friend, owner, None)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Forbidden));
}

#[tokio::test]
async fn test_inherited_grant_and_revocation() {
    let app = TestApp::new().await;
    let owner = app.create_user("Owner", true).await;
    let friend = app.create_user("Friend", true).await;
    let folder = app.folder(owner, "Shared", None).await;
    let file = app.file(owner, "inside.txt", Some(folder.id), b"i").await;

    app.services
        .shares
        .share_with_user(folder.id, owner, friend, None)
        .await
        .unwrap();

    let verdict = app
        .services
        .resolver
        .check_read_access(file.id, &member(friend))
        .await
        .unwrap();
    assert_eq!(verdict.reason, AccessReason::Inherited);
    app.services
        .downloads
        .get_download_url(file.id, &member(friend))
        .await
        .unwrap();

    app.services
        .shares
        .revoke_user_share(folder.id, owner, Some(friend))
        .await
        .unwrap();

    let verdict = app
        .services
        .resolver
        .check_read_access(file.id, &member(friend))
        .await
        .unwrap();
    assert!(!verdict.granted);
    let err = app
        .services
        .downloads
        .get_download_url(file.id, &member(friend))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Forbidden));
}

#[tokio::test]
async fn test_revoke_rules() {
    let app = TestApp::new().await;
    let owner = app.create_user("Owner", true).await;
    let friend = app.create_user("Friend", true).await;
    let other = app.create_user("Other", true).await;
    let file = app.file(owner, "a.txt", None, b"a").await;
    let shares = &app.services.shares;

    shares.share_with_user(file.id, owner, friend, None).await.unwrap();
    shares.share_with_user(file.id, owner, other, None).await.unwrap();

    let err = shares.revoke_user_share(file.id, owner, None).await.unwrap_err();
    assert!(err.is(ErrorKind::Forbidden));

    let err = shares
        .revoke_user_share(file.id, friend, Some(other))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Forbidden));

    shares.revoke_user_share(file.id, friend, None).await.unwrap();
    let remaining = shares.list_grants(file.id, owner).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].grantee_id, other);

    let err = shares.revoke_user_share(file.id, friend, None).await.unwrap_err();
    assert!(err.is(ErrorKind::Forbidden));
}

#[tokio::test]
async fn test_bulk_remove_self_validates_before_mutating() {
    let app = TestApp::new().await;
    let owner = app.create_user("Owner", true).await;
    let friend = app.create_user("Friend", true).await;
    let a = app.file(owner, "a.txt", None, b"a").await;
    let b = app.file(owner, "b.txt", None, b"b").await;
    let shares = &app.services.shares;

    shares.share_with_user(a.id, owner, friend, None).await.unwrap();
    shares.share_with_user(b.id, owner, friend, None).await.unwrap();

    let err = shares
        .bulk_remove_self(&[a.id, NodeId::new()], friend)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
    assert_eq!(shares.shared_with_me(&member(friend)).await.unwrap().len(), 2);

    let result = shares.bulk_remove_self(&[a.id, b.id], friend).await.unwrap();
    assert_eq!(result.removed, 2);
    assert!(shares.shared_with_me(&member(friend)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_class_share_reaches_matching_students_only() {
    let app = TestApp::new().await;
    let teacher_id = UserId::new();
    let folder = app.folder(teacher_id, "Lectures", None).await;
    let file = app.file(teacher_id, "week1.pdf", Some(folder.id), b"w").await;

    let target = CohortTarget {
        batch: "2024".to_string(),
        semester: 3,
        section: Some("A".to_string()),
    };

    let err = app
        .services
        .class_shares
        .share_with_class(folder.id, &member(teacher_id), target.clone(), None, None)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Forbidden));

    let grant = app
        .services
        .class_shares
        .share_with_class(
            folder.id,
            &teacher(teacher_id),
            target,
            Some("CS301".to_string()),
            None,
        )
        .await
        .unwrap();

    let in_section = student(UserId::new(), "A");
    let verdict = app
        .services
        .resolver
        .check_read_access(file.id, &in_section)
        .await
        .unwrap();
    assert_eq!(verdict.reason, AccessReason::Class);
    let shared = app.services.shares.shared_with_me(&in_section).await.unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].id, folder.id);

    let other_section = student(UserId::new(), "B");
    let verdict = app
        .services
        .resolver
        .check_read_access(file.id, &other_section)
        .await
        .unwrap();
    assert!(!verdict.granted);

    app.services
        .class_shares
        .revoke_class_share(grant.id, teacher_id)
        .await
        .unwrap();
    assert!(
        app.services
            .class_shares
            .list_class_grants(folder.id, teacher_id)
            .await
            .unwrap()
            .is_empty()
    );
    let verdict = app
        .services
        .resolver
        .check_read_access(file.id, &in_section)
        .await
        .unwrap();
    assert!(!verdict.granted);
}
