//! Deploy status notifications: report composition and SMTP delivery

use crate::MailConfig;
use crate::deploy::DeployOutcome;
use crate::error::Result;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::extension::ClientId;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// A composed status email, ready to address and send.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployReport {
    pub subject: String,
    pub body: String,
}

/// Selects the report template for a finished deploy. Checkout failure wins
/// over upload failure; each body embeds the relevant command output
/// verbatim.
pub fn compose_report(artifact: &str, repo_url: &str, outcome: &DeployOutcome) -> DeployReport {
    match outcome {
        DeployOutcome::CheckoutFailed(git) => DeployReport {
            subject: format!(
                "[CHEFDEPLOY] Git checkout of {artifact} failed, could not deploy."
            ),
            body: format!(
                "Git checkout of {artifact} from {repo_url} failed.\n\nGit command output:\n\n{}",
                git.output
            ),
        },
        DeployOutcome::UploadFailed(knife) => DeployReport {
            subject: format!(
                "[CHEFDEPLOY] Knife upload of {artifact} failed, could not deploy."
            ),
            body: format!(
                "Knife upload of {artifact} failed.\n\nKnife command output:\n\n{}",
                knife.output
            ),
        },
        DeployOutcome::Deployed(knife) => DeployReport {
            subject: format!("[CHEFDEPLOY] Chef deploy of {artifact} was a success."),
            body: format!("Well done!\n\nKnife command output:\n\n{}", knife.output),
        },
    }
}

/// Seam for delivering reports, so the pipeline can be tested without an
/// SMTP server.
pub trait Notify {
    fn send(&self, to: &str, report: &DeployReport) -> impl Future<Output = Result<()>> + Send;
}

/// SMTP submission with STARTTLS and PLAIN authentication. Built once at
/// startup and reused for every notification.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    cc: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let from: Mailbox = config.from.parse()?;
        let cc: Mailbox = config.cc.parse()?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .authentication(vec![Mechanism::Plain]);
        if let Some(domain) = &config.domain {
            builder = builder.hello_name(ClientId::Domain(domain.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            cc,
        })
    }
}

impl Notify for SmtpMailer {
    async fn send(&self, to: &str, report: &DeployReport) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .cc(self.cc.clone())
            .subject(report.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(report.body.clone())?;

        self.transport.send(message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ProcessResult;

    const URL: &str = "git@github.com:acme/chef-repo.git";

    #[test]
    fn checkout_failure_report_carries_git_output_only() {
        let outcome = DeployOutcome::CheckoutFailed(ProcessResult::failed("fatal: repo not found"));
        let report = compose_report("base", URL, &outcome);
        assert_eq!(
            report.subject,
            "[CHEFDEPLOY] Git checkout of base failed, could not deploy."
        );
        assert!(report.body.contains("fatal: repo not found"));
        assert!(report.body.contains(URL));
        assert!(!report.body.contains("Knife"));
    }

    #[test]
    fn upload_failure_report_carries_knife_output() {
        let outcome = DeployOutcome::UploadFailed(ProcessResult::failed("ERROR: 401 Unauthorized"));
        let report = compose_report("base", URL, &outcome);
        assert_eq!(
            report.subject,
            "[CHEFDEPLOY] Knife upload of base failed, could not deploy."
        );
        assert!(report.body.contains("ERROR: 401 Unauthorized"));
        assert!(report.body.starts_with("Knife upload of base failed."));
    }

    #[test]
    fn success_report_carries_knife_output() {
        let outcome = DeployOutcome::Deployed(ProcessResult::succeeded("Uploaded 1 cookbook"));
        let report = compose_report("base", URL, &outcome);
        assert_eq!(
            report.subject,
            "[CHEFDEPLOY] Chef deploy of base was a success."
        );
        assert!(report.body.starts_with("Well done!"));
        assert!(report.body.contains("Uploaded 1 cookbook"));
    }

    #[test]
    fn mailer_builds_from_display_name_addresses() {
        let config = MailConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "username".into(),
            password: "passwd".into(),
            domain: Some("example.com".into()),
            from: "Chef Deploy Status <alerts@example.com>".into(),
            cc: "automation@example.com".into(),
        };
        assert!(SmtpMailer::from_config(&config).is_ok());
    }

    #[test]
    fn malformed_from_address_is_rejected() {
        let config = MailConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "username".into(),
            password: "passwd".into(),
            domain: None,
            from: "not an address".into(),
            cc: "automation@example.com".into(),
        };
        assert!(SmtpMailer::from_config(&config).is_err());
    }
}
