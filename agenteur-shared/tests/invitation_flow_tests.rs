/// Invitation workflow: create, look up, accept

mod common;

use agenteur_shared::{
    error::CoreError,
    models::{invitation::InvitationStatus, membership::MembershipRole},
    services::invitations::{InvitationSettings, NewInvitation},
    store::{InvitationRepository, Store},
};
use chrono::Duration;
use common::{ctx, Fixture};
use futures::future::join;
use uuid::Uuid;

async fn acme(fx: &Fixture) -> (Uuid, Uuid) {
    let alice = fx.signup("alice@example.com", "Alice").await;
    let org = fx
        .services
        .organizations
        .create(&ctx(), alice.user.id, "Acme")
        .await
        .expect("Should create organization");
    (alice.user.id, org.id)
}

fn invite(organization_id: Uuid, invited_by: Uuid, email: &str) -> NewInvitation {
    NewInvitation {
        organization_id,
        invited_by,
        email: email.to_string(),
        role: MembershipRole::User,
    }
}

#[tokio::test]
async fn test_acme_scenario() {
    let fx = Fixture::new();
    let (alice_id, org_id) = acme(&fx).await;

    let invitation = fx
        .services
        .invitations
        .create(&ctx(), invite(org_id, alice_id, "Bob@Example.com"))
        .await
        .expect("Should invite bob");
    assert_eq!(invitation.email, "bob@example.com");
    assert_eq!(invitation.status, InvitationStatus::Pending);

    let notice = fx.notifier.sent().pop().expect("Should notify");
    assert_eq!(notice.recipient, "bob@example.com");
    assert_eq!(notice.organization_name, "Acme");
    assert_eq!(notice.inviter_name, "Alice Tester");
    assert!(notice.invite_url.starts_with("http://localhost:5173/invitations/"));

    let token = fx.notifier.last_token();
    let details = fx
        .services
        .invitations
        .get_by_token(&ctx(), &token)
        .await
        .expect("Should look up invitation");
    assert_eq!(details.organization_name, "Acme");
    assert_eq!(details.invited_by_name, "Alice Tester");
    assert_eq!(details.invitation.role, MembershipRole::User);

    let bob = fx.signup("bob@example.com", "Bob").await;
    let membership = fx
        .services
        .invitations
        .accept(&ctx(), &token, bob.user.id, &bob.user.email)
        .await
        .expect("Should accept");
    assert_eq!(membership.organization_id, org_id);
    assert_eq!(membership.role, MembershipRole::User);

    let err = fx
        .services
        .invitations
        .accept(&ctx(), &token, bob.user.id, &bob.user.email)
        .await
        .expect_err("Re-accept should fail");
    assert!(matches!(err, CoreError::InvitationNotFound));

    let err = fx
        .services
        .invitations
        .get_by_token(&ctx(), &token)
        .await
        .expect_err("Accepted invitation reads as not found");
    assert!(matches!(err, CoreError::InvitationNotFound));
}

#[tokio::test]
async fn test_accept_with_other_email_fails() {
    let fx = Fixture::new();
    let (alice_id, org_id) = acme(&fx).await;
    fx.services
        .invitations
        .create(&ctx(), invite(org_id, alice_id, "bob@example.com"))
        .await
        .expect("Should invite");
    let token = fx.notifier.last_token();

    let eve = fx.signup("eve@example.com", "Eve").await;
    let err = fx
        .services
        .invitations
        .accept(&ctx(), &token, eve.user.id, &eve.user.email)
        .await
        .expect_err("Wrong email should fail");
    assert!(matches!(err, CoreError::EmailMismatch));

    // Still open for the right person.
    let bob = fx.signup("bob@example.com", "Bob").await;
    fx.services
        .invitations
        .accept(&ctx(), &token, bob.user.id, "BOB@example.com")
        .await
        .expect("Email comparison ignores case");
}

#[tokio::test]
async fn test_concurrent_accepts_have_one_winner() {
    let fx = Fixture::new();
    let (alice_id, org_id) = acme(&fx).await;
    fx.services
        .invitations
        .create(&ctx(), invite(org_id, alice_id, "bob@example.com"))
        .await
        .expect("Should invite");
    let token = fx.notifier.last_token();
    let bob = fx.signup("bob@example.com", "Bob").await;

    let ctx = ctx();
    let (a, b) = join(
        fx.services.invitations.accept(&ctx, &token, bob.user.id, &bob.user.email),
        fx.services.invitations.accept(&ctx, &token, bob.user.id, &bob.user.email),
    )
    .await;

    assert!(a.is_ok() != b.is_ok());
    let failure = a.err().or(b.err()).expect("One accept should fail");
    assert!(matches!(failure, CoreError::InvitationNotFound));
}

#[tokio::test]
async fn test_invite_existing_member_fails() {
    let fx = Fixture::new();
    let (alice_id, org_id) = acme(&fx).await;

    let err = fx
        .services
        .invitations
        .create(&ctx(), invite(org_id, alice_id, "ALICE@example.com"))
        .await
        .expect_err("Inviting a member should fail");
    assert!(matches!(err, CoreError::AlreadyMember));
    assert!(fx.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_duplicate_pending_invitation_fails() {
    let fx = Fixture::new();
    let (alice_id, org_id) = acme(&fx).await;

    fx.services
        .invitations
        .create(&ctx(), invite(org_id, alice_id, "bob@example.com"))
        .await
        .expect("Should invite");
    let err = fx
        .services
        .invitations
        .create(&ctx(), invite(org_id, alice_id, "Bob@example.com"))
        .await
        .expect_err("Second pending invitation should fail");
    assert!(matches!(err, CoreError::InvitationExists));
    assert_eq!(fx.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_expired_invitation_is_not_found_and_superseded() {
    let fx = Fixture::with_settings(InvitationSettings {
        ttl: Duration::seconds(-1),
        base_url: "http://localhost:5173/invitations".to_string(),
    });
    let (alice_id, org_id) = acme(&fx).await;

    fx.services
        .invitations
        .create(&ctx(), invite(org_id, alice_id, "bob@example.com"))
        .await
        .expect("Should invite");
    let stale = fx.notifier.last_token();

    let err = fx
        .services
        .invitations
        .get_by_token(&ctx(), &stale)
        .await
        .expect_err("Expired invitation reads as not found");
    assert!(matches!(err, CoreError::InvitationNotFound));

    let bob = fx.signup("bob@example.com", "Bob").await;
    let err = fx
        .services
        .invitations
        .accept(&ctx(), &stale, bob.user.id, &bob.user.email)
        .await
        .expect_err("Expired invitation cannot be accepted");
    assert!(matches!(err, CoreError::InvitationNotFound));

    let replacement = fx
        .services
        .invitations
        .create(&ctx(), invite(org_id, alice_id, "bob@example.com"))
        .await
        .expect("Expired pending invitation should be replaced");
    assert_ne!(fx.notifier.last_token(), stale);

    let mut tx = fx.store.begin().await.expect("Should begin");
    let pending = tx
        .pending_invitation(org_id, "bob@example.com")
        .await
        .expect("Should read")
        .expect("Replacement should be pending");
    assert_eq!(pending.id, replacement.id);
}

#[tokio::test]
async fn test_notifier_failure_leaves_no_invitation() {
    let fx = Fixture::new();
    let (alice_id, org_id) = acme(&fx).await;

    fx.notifier.fail_next(true);
    let err = fx
        .services
        .invitations
        .create(&ctx(), invite(org_id, alice_id, "bob@example.com"))
        .await
        .expect_err("Delivery failure should abort");
    assert!(matches!(err, CoreError::Notification(_)));
    assert!(err.is_internal());

    {
        let mut tx = fx.store.begin().await.expect("Should begin");
        let pending = tx
            .pending_invitation(org_id, "bob@example.com")
            .await
            .expect("Should read");
        assert!(pending.is_none());
    }

    fx.notifier.fail_next(false);
    fx.services
        .invitations
        .create(&ctx(), invite(org_id, alice_id, "bob@example.com"))
        .await
        .expect("Retry after delivery recovers should succeed");
}

#[tokio::test]
async fn test_invitation_for_unknown_organization() {
    let fx = Fixture::new();
    let (alice_id, _) = acme(&fx).await;

    let err = fx
        .services
        .invitations
        .create(&ctx(), invite(Uuid::new_v4(), alice_id, "bob@example.com"))
        .await
        .expect_err("Unknown organization should fail");
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_admin_invitation_grants_admin_role() {
    let fx = Fixture::new();
    let (alice_id, org_id) = acme(&fx).await;

    fx.services
        .invitations
        .create(
            &ctx(),
            NewInvitation {
                role: MembershipRole::Admin,
                ..invite(org_id, alice_id, "carol@example.com")
            },
        )
        .await
        .expect("Should invite");
    let carol = fx.signup("carol@example.com", "Carol").await;

    let membership = fx
        .services
        .invitations
        .accept(&ctx(), &fx.notifier.last_token(), carol.user.id, &carol.user.email)
        .await
        .expect("Should accept");
    assert_eq!(membership.role, MembershipRole::Admin);

    fx.services
        .organizations
        .remove_member(&ctx(), org_id, alice_id)
        .await
        .expect("Second admin allows removing the first");
}

#[tokio::test]
async fn test_unknown_token() {
    let fx = Fixture::new();
    let err = fx
        .services
        .invitations
        .get_by_token(&ctx(), "no-such-token")
        .await
        .expect_err("Unknown token should fail");
    assert!(matches!(err, CoreError::InvitationNotFound));
}
