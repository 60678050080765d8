//! SMTP 客户端

use std::time::Duration;

use cardgate_errors::{AppError, AppResult};
use lettre::message::{Mailbox, MultiPart, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::{EmailConfig, EmailMessage, EmailSender};

/// 基于 lettre 的 SMTP 发送器
///
/// 传输对象在构造时建立并复用其连接池，发送在 blocking 线程池中执行。
pub struct EmailClient {
    from: Mailbox,
    transport: SmtpTransport,
}

impl EmailClient {
    pub fn new(config: EmailConfig) -> AppResult<Self> {
        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| AppError::internal(format!("Invalid from address: {}", e)))?;

        let builder = if config.use_tls {
            SmtpTransport::starttls_relay(&config.smtp_host)
        } else {
            SmtpTransport::relay(&config.smtp_host)
        }
        .map_err(|e| AppError::internal(format!("Failed to create SMTP transport: {}", e)))?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.expose_secret().clone(),
            ))
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(Self { from, transport })
    }

    fn build_message(&self, msg: &EmailMessage) -> AppResult<Message> {
        let to = msg
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::validation(format!("Invalid recipient: {}", e)))?;

        let text = SinglePart::builder()
            .header(header::ContentType::TEXT_PLAIN)
            .body(msg.text_body.clone());
        let body = match &msg.html_body {
            Some(html) => MultiPart::alternative().singlepart(text).singlepart(
                SinglePart::builder()
                    .header(header::ContentType::TEXT_HTML)
                    .body(html.clone()),
            ),
            None => MultiPart::alternative().singlepart(text),
        };

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&msg.subject)
            .multipart(body)
            .map_err(|e| AppError::internal(format!("Failed to build message: {}", e)))
    }
}

#[async_trait::async_trait]
impl EmailSender for EmailClient {
    async fn send(&self, msg: &EmailMessage) -> AppResult<()> {
        let message = self.build_message(msg)?;
        let transport = self.transport.clone();
        debug!(subject = %msg.subject, "Sending email");

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| AppError::internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::external_service(format!("Failed to send email: {}", e)))?;

        info!(subject = %msg.subject, "Email sent");
        Ok(())
    }
}
