use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, DEFAULT_MECHANISMS};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::commands::{Data, Mail, Rcpt};
use lettre::transport::smtp::extension::{ClientId, MailBodyParameter, MailParameter};
use lettre::Message;
use secrecy::ExposeSecret;
use std::time;

use crate::config::{SmtpSecurity, SmtpSettings};
use crate::domain::subscriber_email::SubscriberEmail;

const SESSION_TIMEOUT: time::Duration = time::Duration::from_secs(20);

/// Whether retrying a failed send can possibly help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Fatal,
    Transient,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SendEmailError {
    #[error("SMTP authentication failed. Check credentials/app password.")]
    AuthenticationRejected,
    #[error("Recipient address {0} refused by SMTP server.")]
    RecipientRejected(String),
    #[error("SMTP session timed out: {0}")]
    Timeout(String),
    #[error("SMTP server temporarily rejected the message: {0}")]
    TemporaryRejection(String),
    #[error("SMTP connection error. Server may be unreachable: {0}")]
    Transport(String),
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl SendEmailError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SendEmailError::AuthenticationRejected | SendEmailError::RecipientRejected(_) => {
                FailureKind::Fatal
            }
            SendEmailError::Timeout(_)
            | SendEmailError::TemporaryRejection(_)
            | SendEmailError::Transport(_)
            | SendEmailError::Unexpected(_) => FailureKind::Transient,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == FailureKind::Fatal
    }

    fn from_smtp(
        err: lettre::transport::smtp::Error,
        stage: SessionStage,
        recipient: &SubscriberEmail,
    ) -> Self {
        if err.is_timeout() {
            return SendEmailError::Timeout(err.to_string());
        }

        if err.is_transient() {
            return SendEmailError::TemporaryRejection(err.to_string());
        }

        if err.is_permanent() {
            return match (stage, err.status().map(u16::from)) {
                (SessionStage::Authenticate, _) | (SessionStage::Sender, Some(530)) => {
                    SendEmailError::AuthenticationRejected
                }
                (SessionStage::Recipient, _) => {
                    SendEmailError::RecipientRejected(recipient.to_string())
                }
                _ => SendEmailError::Unexpected(err.to_string()),
            };
        }

        SendEmailError::Transport(err.to_string())
    }
}

/// Step of the SMTP session a reply belongs to.
///
/// A permanent reply means something different at each step: at `AUTH` the
/// credentials are wrong, at `RCPT TO` the recipient is refused whatever the
/// reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStage {
    Connect,
    Authenticate,
    Sender,
    Recipient,
    Data,
}

#[derive(thiserror::Error, Debug)]
pub enum SmtpClientError {
    #[error("Sender address cannot be used as an SMTP mailbox.")]
    InvalidSender(#[from] lettre::address::AddressError),
    #[error("Failed to configure the SMTP relay.")]
    Relay(#[from] lettre::transport::smtp::Error),
}

/// Plain-text mail delivery, one session per call.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        text_content: &str,
    ) -> Result<(), SendEmailError>;
}

pub struct SmtpEmailClient {
    host: String,
    port: u16,
    timeout: time::Duration,
    security: SmtpSecurity,
    tls_parameters: Option<TlsParameters>,
    credentials: Option<Credentials>,
    hello_name: ClientId,
    sender: Mailbox,
}

impl SmtpEmailClient {
    pub fn new(
        settings: &SmtpSettings,
        sender: SubscriberEmail,
    ) -> Result<SmtpEmailClient, SmtpClientError> {
        let tls_parameters = match settings.security {
            SmtpSecurity::None => None,
            SmtpSecurity::Tls | SmtpSecurity::StartTls => {
                Some(TlsParameters::new(settings.host.clone())?)
            }
        };
        let credentials = match (&settings.username, &settings.password) {
            (Some(username), Some(password)) => Some(Credentials::new(
                username.clone(),
                password.expose_secret().clone(),
            )),
            _ => None,
        };

        Ok(SmtpEmailClient {
            host: settings.host.clone(),
            port: settings.port,
            timeout: settings
                .timeout_seconds
                .map(time::Duration::from_secs)
                .unwrap_or(SESSION_TIMEOUT),
            security: settings.security,
            tls_parameters,
            credentials,
            hello_name: ClientId::default(),
            sender: Mailbox::new(None, sender.as_ref().parse()?),
        })
    }

    fn build_message(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        text_content: &str,
    ) -> Result<Message, SendEmailError> {
        let to: Mailbox = recipient
            .as_ref()
            .parse()
            .map_err(|_| SendEmailError::RecipientRejected(recipient.to_string()))?;

        Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(String::from(text_content))
            .map_err(|err| SendEmailError::Unexpected(err.to_string()))
    }

    /// Connects, upgrades to TLS when configured and authenticates.
    async fn open_session(
        &self,
        recipient: &SubscriberEmail,
    ) -> Result<AsyncSmtpConnection, SendEmailError> {
        let implicit_tls = match self.security {
            SmtpSecurity::Tls => self.tls_parameters.clone(),
            SmtpSecurity::None | SmtpSecurity::StartTls => None,
        };

        let mut session = AsyncSmtpConnection::connect_tokio1(
            (self.host.as_str(), self.port),
            Some(self.timeout),
            &self.hello_name,
            implicit_tls,
            None,
        )
        .await
        .map_err(|err| SendEmailError::from_smtp(err, SessionStage::Connect, recipient))?;

        if let (SmtpSecurity::StartTls, Some(tls_parameters)) =
            (self.security, &self.tls_parameters)
        {
            if let Err(err) = session
                .starttls(tls_parameters.clone(), &self.hello_name)
                .await
            {
                session.abort().await;
                return Err(SendEmailError::from_smtp(err, SessionStage::Connect, recipient));
            }
        }

        if let Some(credentials) = &self.credentials {
            if let Err(err) = session.auth(DEFAULT_MECHANISMS, credentials).await {
                session.abort().await;
                return Err(SendEmailError::from_smtp(
                    err,
                    SessionStage::Authenticate,
                    recipient,
                ));
            }
        }

        Ok(session)
    }
}

/// Runs one `MAIL FROM` / `RCPT TO` / `DATA` transaction.
async fn transmit(
    session: &mut AsyncSmtpConnection,
    message: &Message,
    recipient: &SubscriberEmail,
) -> Result<(), SendEmailError> {
    let envelope = message.envelope();
    let body = message.formatted();
    let mut parameters = Vec::new();
    if !body.is_ascii() {
        parameters.push(MailParameter::Body(MailBodyParameter::EightBitMime));
    }

    session
        .command(Mail::new(envelope.from().cloned(), parameters))
        .await
        .map_err(|err| SendEmailError::from_smtp(err, SessionStage::Sender, recipient))?;

    for address in envelope.to() {
        session
            .command(Rcpt::new(address.clone(), vec![]))
            .await
            .map_err(|err| SendEmailError::from_smtp(err, SessionStage::Recipient, recipient))?;
    }

    session
        .command(Data)
        .await
        .map_err(|err| SendEmailError::from_smtp(err, SessionStage::Data, recipient))?;
    session
        .message(&body)
        .await
        .map_err(|err| SendEmailError::from_smtp(err, SessionStage::Data, recipient))?;

    Ok(())
}

#[async_trait]
impl EmailTransport for SmtpEmailClient {
    #[tracing::instrument(
        name = "Sending an email over SMTP",
        skip(self, text_content),
        fields(recipient = %recipient, subject = %subject)
    )]
    async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        text_content: &str,
    ) -> Result<(), SendEmailError> {
        let message = self.build_message(recipient, subject, text_content)?;
        let mut session = self.open_session(recipient).await?;

        let result = transmit(&mut session, &message, recipient).await;

        match &result {
            Ok(()) => {
                if let Err(err) = session.quit().await {
                    tracing::debug!("SMTP server did not acknowledge QUIT: {}", err);
                }
            }
            Err(_) => session.abort().await,
        }

        result
    }
}
