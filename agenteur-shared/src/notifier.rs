/// Outbound invitation delivery
///
/// The invitation workflow hands each new invitation to a [`Notifier`] before
/// committing. A delivery failure aborts the invitation.

use async_trait::async_trait;
use tracing::info;

/// Everything a delivery channel needs to tell the invitee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationNotice {
    pub recipient: String,
    pub inviter_name: String,
    pub organization_name: String,

    /// Link carrying the raw invitation token
    pub invite_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_invitation(&self, notice: &InvitationNotice) -> Result<(), NotifierError>;
}

/// Writes invitations to the log instead of sending mail
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_invitation(&self, notice: &InvitationNotice) -> Result<(), NotifierError> {
        info!(
            to = %notice.recipient,
            inviter = %notice.inviter_name,
            organization = %notice.organization_name,
            invite_url = %notice.invite_url,
            "Invitation email"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_accepts_everything() {
        let notice = InvitationNotice {
            recipient: "bob@example.com".to_string(),
            inviter_name: "Alice".to_string(),
            organization_name: "Acme".to_string(),
            invite_url: "http://localhost/invitations/abc".to_string(),
        };

        LogNotifier
            .send_invitation(&notice)
            .await
            .expect("Should log invitation");
    }
}
