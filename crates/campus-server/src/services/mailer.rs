//! Outgoing mail

use crate::config::MailConfig;
use async_trait::async_trait;
use campus_core::{CampusError, Result};
use reqwest::Client as ReqwestClient;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<()>;
}

/// Posts mails as JSON to an HTTP relay.
pub struct HttpMailer {
    http: ReqwestClient,
    relay_url: String,
    api_key: Option<String>,
    from: Option<String>,
    cc: Option<String>,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: Option<&'a str>,
    to: &'a str,
    cc: Option<&'a str>,
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(relay_url: String, config: &MailConfig) -> Self {
        Self {
            http: ReqwestClient::new(),
            relay_url,
            api_key: config.api_key.clone(),
            from: config.from.clone(),
            cc: config.cc.clone(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: Mail) -> Result<()> {
        let payload = RelayPayload {
            from: self.from.as_deref(),
            to: &mail.to,
            cc: self.cc.as_deref(),
            subject: &mail.subject,
            html: &mail.html,
        };

        let mut request = self.http.post(&self.relay_url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            warn!("Mail relay unreachable: {}", e);
            CampusError::Mail(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Mail relay answered {}: {}", status, body);
            return Err(CampusError::Mail(format!("relay answered {}", status)));
        }

        info!("Mail '{}' sent to {}", mail.subject, mail.to);
        Ok(())
    }
}

/// Writes mails to the log instead of sending them.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: Mail) -> Result<()> {
        info!(to = %mail.to, subject = %mail.subject, "Mail not sent (no relay configured)");
        tracing::debug!("{}", mail.html);
        Ok(())
    }
}

pub fn from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    match &config.relay_url {
        Some(url) => Arc::new(HttpMailer::new(url.clone(), config)),
        None => Arc::new(LogMailer),
    }
}

/// Login code mail. Outside production the administrator note with the
/// matricule and code is appended.
pub fn otp_mail(to: &str, prenom: &str, matricule: &str, otp: &str, production: bool) -> Mail {
    let mut html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="text-align: center;">Connexion à l'application étudiant</h2>
<p>Bonjour <strong>{prenom}</strong>,</p>
<p>Votre code de connexion est :</p>
<div style="padding: 10px; text-align: center; font-size: 24px; font-weight: bold; letter-spacing: 5px;">{otp}</div>
<p>Ce code est valable pendant 5 minutes.</p>
<p style="font-size: 12px; color: #777; text-align: center;">Cet email a été envoyé automatiquement.</p>
</div>"#
    );

    if !production {
        html.push_str(&format!(
            r#"<div style="margin-top: 20px; padding: 10px;">
<p><strong>Note pour l'administrateur:</strong> message envoyé en mode développement.</p>
<ul><li>Matricule: {matricule}</li><li>OTP: {otp}</li><li>Date: {date}</li></ul>
</div>"#,
            date = chrono::Utc::now().format("%d/%m/%Y %H:%M:%S"),
        ));
    }

    Mail {
        to: to.to_string(),
        subject: "Code de connexion à l'application étudiant".to_string(),
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_mail_admin_note() {
        let dev = otp_mail("a@inbtp.cd", "JEAN", "2024001", "123456", false);
        assert!(dev.html.contains("123456"));
        assert!(dev.html.contains("Matricule: 2024001"));

        let prod = otp_mail("a@inbtp.cd", "JEAN", "2024001", "123456", true);
        assert!(prod.html.contains("Bonjour <strong>JEAN</strong>"));
        assert!(!prod.html.contains("Matricule: 2024001"));
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_everything() {
        let mailer = from_config(&MailConfig::default());
        let mail = otp_mail("a@inbtp.cd", "JEAN", "2024001", "123456", true);
        assert!(mailer.send(mail).await.is_ok());
    }
}
