use lettre::{
    Message, SmtpTransport, Transport,
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
};
use log::{info, error, warn};

use crate::config::Config;

pub struct EmailService;

type MailResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

impl EmailService {
    /// Fire-and-forget: the lifecycle call that triggered the mail never
    /// waits on SMTP nor fails because of it.
    pub fn notify(to: String, subject: String, html: String) {
        if !Config::is_mail_enabled() {
            if Config::is_development() {
                info!("Mail disabled, would have sent '{}' to {}", subject, to);
            } else {
                warn!("Email credentials not configured. Skipping '{}'", subject);
            }
            return;
        }

        tokio::task::spawn_blocking(move || match Self::send(&to, &subject, html) {
            Ok(_) => info!("Email '{}' sent to {}", subject, to),
            Err(e) => error!("Failed to send '{}' to {}: {}", subject, to, e),
        });
    }

    fn send(to: &str, subject: &str, html: String) -> MailResult {
        let from_mailbox: Mailbox = Config::mail_from().parse()?;
        let to_mailbox: Mailbox = to.parse()?;

        let email_message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)?;

        let creds = Credentials::new(Config::mail_user(), Config::mail_password());
        let mailer = SmtpTransport::starttls_relay(&Config::mail_host())?
            .port(Config::mail_port())
            .credentials(creds)
            .build();

        mailer.send(&email_message)?;
        Ok(())
    }

    fn layout(title: &str, body: &str) -> String {
        format!(
            r#"
            <!DOCTYPE html>
            <html>
            <body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
                <h2>{}</h2>
                {}
                <p>À bientôt,<br><strong>L'équipe Adopte un Étudiant</strong></p>
            </body>
            </html>
            "#,
            title, body
        )
    }

    pub fn adoption_received(student_email: &str, company_name: &str) {
        let body = format!(
            r#"<p><strong>{}</strong> souhaite vous adopter !</p>
               <p>Répondez à cette demande depuis votre <a href="{}/dashboard">tableau de bord</a>.</p>"#,
            company_name,
            Config::frontend_url()
        );
        Self::notify(
            student_email.to_string(),
            format!("{} souhaite vous adopter", company_name),
            Self::layout("Nouvelle demande d'adoption", &body),
        );
    }

    pub fn contract_received(student_email: &str, company_name: &str) {
        let body = format!(
            r#"<p><strong>{}</strong> vous a envoyé un contrat.</p>
               <p>Consultez-le et signez-le depuis votre <a href="{}/dashboard">tableau de bord</a>.</p>"#,
            company_name,
            Config::frontend_url()
        );
        Self::notify(
            student_email.to_string(),
            format!("Nouveau contrat de {}", company_name),
            Self::layout("Nouveau contrat", &body),
        );
    }

    pub fn application_status_changed(student_email: &str, job_title: &str, status: &str) {
        let body = format!(
            "<p>Votre candidature pour <strong>{}</strong> est passée au statut <strong>{}</strong>.</p>",
            job_title, status
        );
        Self::notify(
            student_email.to_string(),
            format!("Candidature {} : {}", job_title, status),
            Self::layout("Mise à jour de votre candidature", &body),
        );
    }
}
