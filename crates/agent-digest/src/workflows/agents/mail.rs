//! Outbound digest delivery.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::MailConfig;

/// Fully rendered message ready for the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: Option<String>,
    pub html: String,
    /// Inline attachments keyed by the filename the template refers to.
    pub images: BTreeMap<String, PathBuf>,
    pub tags: Vec<String>,
    /// Identifies this digest within a run so a retried send can be recognised.
    pub dedupe_key: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliveryError {
    /// No connection was made, so nothing reached the provider.
    #[error("mail provider unreachable: {0}")]
    Connect(String),
    /// The request may have been delivered before the exchange broke off.
    #[error("mail transport failed: {0}")]
    Transport(String),
    #[error("mail provider rate limited the request")]
    RateLimited,
    #[error("mail provider rejected the message ({status}): {body}")]
    Provider { status: u16, body: String },
    #[error("unable to attach {name}: {reason}")]
    Attachment { name: String, reason: String },
    #[error("mail delivery timed out")]
    Timeout,
}

impl DeliveryError {
    /// True only when the provider cannot have accepted the message.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::RateLimited => true,
            Self::Provider { status, .. } => *status >= 500,
            Self::Transport(_) | Self::Attachment { .. } | Self::Timeout => false,
        }
    }
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, mail: &OutboundMail) -> Result<(), DeliveryError>;
}

/// Mailgun messages API.
#[derive(Clone)]
pub struct MailgunSender {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl MailgunSender {
    pub fn new(config: &MailConfig) -> Self {
        Self::with_endpoint(
            Client::new(),
            format!("{}/v3/{}/messages", config.region.api_base(), config.domain),
            config.api_key.clone(),
        )
    }

    pub fn with_endpoint(
        client: Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    async fn build_form(&self, mail: &OutboundMail) -> Result<Form, DeliveryError> {
        let mut form = Form::new()
            .text("from", mail.from.clone())
            .text("to", mail.to.clone())
            .text("subject", mail.subject.clone())
            .text("html", mail.html.clone())
            .text("h:X-Digest-Key", mail.dedupe_key.clone());

        if let Some(text) = &mail.text {
            form = form.text("text", text.clone());
        }

        for tag in &mail.tags {
            form = form.text("o:tag", tag.clone());
        }

        for (name, path) in &mail.images {
            let attachment_error = |reason: String| DeliveryError::Attachment {
                name: name.clone(),
                reason,
            };
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|err| attachment_error(err.to_string()))?;
            let content_type = mime_guess::from_path(path).first_or(mime::IMAGE_PNG);
            let part = Part::bytes(bytes)
                .file_name(name.clone())
                .mime_str(content_type.essence_str())
                .map_err(|err| attachment_error(err.to_string()))?;
            form = form.part("inline", part);
        }

        Ok(form)
    }
}

impl std::fmt::Debug for MailgunSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailgunSender")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl NotificationSender for MailgunSender {
    async fn send(&self, mail: &OutboundMail) -> Result<(), DeliveryError> {
        let form = self.build_form(mail).await?;
        debug!(to = %mail.to, subject = %mail.subject, "sending digest via Mailgun");

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth("api", Some(&self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                if err.is_connect() {
                    DeliveryError::Connect(err.to_string())
                } else {
                    DeliveryError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            Err(DeliveryError::RateLimited)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(DeliveryError::Provider {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_rejections_are_not_retried() {
        assert!(DeliveryError::Connect("refused".to_string()).is_retryable());
        assert!(!DeliveryError::Transport("reset mid-response".to_string()).is_retryable());
        assert!(DeliveryError::RateLimited.is_retryable());
        assert!(DeliveryError::Provider {
            status: 502,
            body: String::new()
        }
        .is_retryable());
        assert!(!DeliveryError::Provider {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!DeliveryError::Timeout.is_retryable());
    }

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        let sender =
            MailgunSender::with_endpoint(Client::new(), "http://127.0.0.1:9/messages", "key");
        let mail = OutboundMail {
            from: "Agent <agent@example.com>".to_string(),
            to: "reader@example.com".to_string(),
            subject: "1 новая вакансия".to_string(),
            text: None,
            html: "<p>hi</p>".to_string(),
            images: BTreeMap::new(),
            tags: Vec::new(),
            dedupe_key: "run:1".to_string(),
        };

        let err = sender.send(&mail).await.expect_err("nothing listens on port 9");
        assert!(matches!(err, DeliveryError::Connect(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn missing_image_fails_before_contacting_provider() {
        let sender =
            MailgunSender::with_endpoint(Client::new(), "http://127.0.0.1:9/messages", "key");
        let mut images = BTreeMap::new();
        images.insert(
            "logo.png".to_string(),
            PathBuf::from("/nonexistent/agent/images/logo.png"),
        );
        let mail = OutboundMail {
            from: "Agent <agent@example.com>".to_string(),
            to: "reader@example.com".to_string(),
            subject: "1 новая вакансия".to_string(),
            text: None,
            html: "<p>hi</p>".to_string(),
            images,
            tags: vec!["Agent".to_string()],
            dedupe_key: "run:1".to_string(),
        };

        let err = sender.send(&mail).await.expect_err("attachment missing");
        assert!(matches!(err, DeliveryError::Attachment { ref name, .. } if name == "logo.png"));
    }
}
