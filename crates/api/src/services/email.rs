//! Applicant notification emails.
//!
//! Supports multiple providers:
//! - `console`: Logs emails (development)
//! - `http`: Posts `{email, type, ign, adminNotes, discordLink}` to an edge
//!   function that renders and sends the mail
//! - `sendgrid`: Renders locally and sends via the SendGrid API

use async_trait::async_trait;
use domain::services::{
    Delivery, DeliveryError, NotificationContext, NotificationTemplate, Notifier,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::EmailConfig;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Rendered email ready for a provider.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
}

#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    clan_name: String,
    client: reqwest::Client,
}

impl EmailService {
    pub fn new(config: EmailConfig, clan_name: impl Into<String>) -> Self {
        Self {
            config: Arc::new(config),
            clan_name: clan_name.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Renders subject and bodies for a template.
    pub fn render(
        &self,
        to: &str,
        template: NotificationTemplate,
        context: &NotificationContext,
    ) -> EmailMessage {
        let clan = &self.clan_name;
        let (subject, lead) = match template {
            NotificationTemplate::Submission => (
                format!("{} - Application received", clan),
                "We received your application. An officer will review it soon.".to_string(),
            ),
            NotificationTemplate::Approved => (
                format!("{} - Application approved", clan),
                format!(
                    "Welcome aboard! Your application was approved. Join us on Discord: {}",
                    context.invite_link
                ),
            ),
            NotificationTemplate::Rejected => (
                format!("{} - Application update", clan),
                "Thank you for applying. Unfortunately your application was not approved this time. You are welcome to apply again.".to_string(),
            ),
        };

        let notes = context
            .admin_notes
            .as_deref()
            .map(|n| format!("\n\nNotes from the officers: {}", n))
            .unwrap_or_default();

        let body_text = format!("Hi {},\n\n{}{}\n\n- {}", context.ign, lead, notes, clan);
        let body_html = format!(
            "<p>Hi {},</p><p>{}</p>{}<p>- {}</p>",
            escape_html(&context.ign),
            escape_html(&lead),
            context
                .admin_notes
                .as_deref()
                .map(|n| format!("<p><strong>Notes from the officers:</strong> {}</p>", escape_html(n)))
                .unwrap_or_default(),
            escape_html(clan)
        );

        EmailMessage {
            to: to.to_string(),
            subject,
            body_text,
            body_html,
        }
    }

    async fn send_console(&self, message: EmailMessage) -> Result<Delivery, DeliveryError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body_text,
            "Email (console provider)"
        );
        Ok(Delivery::Sent)
    }

    async fn send_http(
        &self,
        to: &str,
        template: NotificationTemplate,
        context: &NotificationContext,
    ) -> Result<Delivery, DeliveryError> {
        if self.config.endpoint_url.is_empty() {
            return Err(DeliveryError::NotConfigured("email.endpoint_url".to_string()));
        }

        let body = json!({
            "email": to,
            "type": template,
            "ign": context.ign,
            "adminNotes": context.admin_notes,
            "discordLink": context.invite_link,
        });

        let response = self
            .client
            .post(&self.config.endpoint_url)
            .bearer_auth(&self.config.endpoint_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        check_response(response, "notification endpoint").await
    }

    async fn send_sendgrid(&self, message: EmailMessage) -> Result<Delivery, DeliveryError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(DeliveryError::NotConfigured("email.sendgrid_api_key".to_string()));
        }

        let body = json!({
            "personalizations": [{ "to": [{ "email": message.to }] }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": message.subject,
            "content": [
                { "type": "text/plain", "value": message.body_text },
                { "type": "text/html", "value": message.body_html }
            ]
        });

        let response = self
            .client
            .post(SENDGRID_URL)
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(format!("SendGrid request failed: {}", e)))?;

        check_response(response, "SendGrid").await
    }
}

async fn check_response(
    response: reqwest::Response,
    provider: &str,
) -> Result<Delivery, DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(Delivery::Sent);
    }
    let body = response.text().await.unwrap_or_default();
    error!(status = %status, error = %body, provider = provider, "Email provider error");
    Err(DeliveryError::Rejected {
        status: status.as_u16(),
        body,
    })
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl Notifier for EmailService {
    async fn send(
        &self,
        recipient: &str,
        template: NotificationTemplate,
        context: &NotificationContext,
    ) -> Result<Delivery, DeliveryError> {
        if !self.config.enabled {
            debug!(to = %recipient, template = %template, "Email service disabled, skipping send");
            return Ok(Delivery::Skipped);
        }

        let result = match self.config.provider.as_str() {
            "console" => self.send_console(self.render(recipient, template, context)).await,
            "http" => self.send_http(recipient, template, context).await,
            "sendgrid" => self.send_sendgrid(self.render(recipient, template, context)).await,
            provider => Err(DeliveryError::NotConfigured(format!(
                "unknown provider {}",
                provider
            ))),
        };

        if result.is_ok() {
            info!(to = %recipient, template = %template, "Notification email sent");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(notes: Option<&str>) -> NotificationContext {
        NotificationContext {
            ign: "Ghost".to_string(),
            admin_notes: notes.map(str::to_string),
            invite_link: "https://discord.com/invite/jBPFT3BGF".to_string(),
        }
    }

    fn service(enabled: bool, provider: &str) -> EmailService {
        EmailService::new(
            EmailConfig {
                enabled,
                provider: provider.to_string(),
                ..EmailConfig::default()
            },
            "Test Clan",
        )
    }

    #[test]
    fn test_render_approved_includes_invite_and_notes() {
        let message = service(true, "console").render(
            "g@example.com",
            NotificationTemplate::Approved,
            &context(Some("See you at scrims")),
        );
        assert_eq!(message.subject, "Test Clan - Application approved");
        assert!(message.body_text.contains("https://discord.com/invite/jBPFT3BGF"));
        assert!(message.body_text.contains("See you at scrims"));
        assert!(message.body_html.contains("Notes from the officers"));
    }

    #[test]
    fn test_render_escapes_html() {
        let message = service(true, "console").render(
            "g@example.com",
            NotificationTemplate::Rejected,
            &context(Some("<b>no</b>")),
        );
        assert!(message.body_html.contains("&lt;b&gt;no&lt;/b&gt;"));
        assert!(!message.body_text.contains("Discord"));
    }

    #[tokio::test]
    async fn test_disabled_skips() {
        let result = service(false, "http")
            .send("g@example.com", NotificationTemplate::Submission, &context(None))
            .await;
        assert_eq!(result.unwrap(), Delivery::Skipped);
    }

    #[tokio::test]
    async fn test_console_sends() {
        let result = service(true, "console")
            .send("g@example.com", NotificationTemplate::Submission, &context(None))
            .await;
        assert_eq!(result.unwrap(), Delivery::Sent);
    }

    #[tokio::test]
    async fn test_unconfigured_providers_fail() {
        for provider in ["http", "sendgrid", "pigeon"] {
            let result = service(true, provider)
                .send("g@example.com", NotificationTemplate::Approved, &context(None))
                .await;
            assert!(
                matches!(result, Err(DeliveryError::NotConfigured(_))),
                "provider {}",
                provider
            );
        }
    }
}
