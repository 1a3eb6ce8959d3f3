use chrono::{DateTime, Utc};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use qrcode::render::svg;
use qrcode::QrCode;
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::config::SmtpConfig;

#[derive(thiserror::Error, Debug)]
pub enum MailerError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("QR code generation failed: {0}")]
    Qr(#[from] qrcode::types::QrError),
}

/// SMTP mailer for booking confirmations and promotion notices. Always
/// invoked post-commit and fire-and-forget; failures are logged by the
/// dispatcher, never surfaced to the request.
pub struct Mailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(cfg: &SmtpConfig) -> Result<Self, MailerError> {
        let transport = SmtpTransport::starttls_relay(&cfg.host)?
            .port(cfg.port)
            .credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.expose_secret().clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: cfg.from.parse()?,
        })
    }

    pub fn send_booking_confirmation(
        &self,
        to: &str,
        event_name: &str,
        venue: Option<&str>,
        start_time: Option<DateTime<Utc>>,
        booking_id: Uuid,
        seat_nos: &[String],
    ) -> Result<(), MailerError> {
        let subject = format!("Your tickets for {event_name}");
        let body = confirmation_html(event_name, venue, start_time, booking_id, seat_nos)?;
        self.send_html(to, &subject, body)
    }

    pub fn send_promotion_notice(
        &self,
        to: &str,
        event_name: &str,
        booking_id: Uuid,
        seat_nos: &[String],
    ) -> Result<(), MailerError> {
        let subject = format!("A spot opened up for {event_name}");
        let body = confirmation_html(event_name, None, None, booking_id, seat_nos)?;
        self.send_html(to, &subject, body)
    }

    fn send_html(&self, to: &str, subject: &str, body: String) -> Result<(), MailerError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)?;

        self.transport.send(&message)?;
        Ok(())
    }
}

/// SVG QR of the booking reference, scanned at the venue gate.
fn ticket_qr_svg(booking_id: Uuid) -> Result<String, qrcode::types::QrError> {
    let code = QrCode::new(booking_id.to_string().as_bytes())?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(160, 160)
        .dark_color(svg::Color("#0f172a"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

fn confirmation_html(
    event_name: &str,
    venue: Option<&str>,
    start_time: Option<DateTime<Utc>>,
    booking_id: Uuid,
    seat_nos: &[String],
) -> Result<String, qrcode::types::QrError> {
    let qr = ticket_qr_svg(booking_id)?;
    let when = start_time
        .map(|t| t.format("%a, %d %b %Y %H:%M UTC").to_string())
        .unwrap_or_else(|| "TBA".to_string());
    let where_ = venue.unwrap_or("TBA");
    let seats = seat_nos.join(", ");

    Ok(format!(
        r#"<!doctype html>
<html>
  <body style="margin:0;padding:0;background:#f4f6fb;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Arial;">
    <center style="width:100%;padding:28px 12px;">
      <table role="presentation" width="600" cellpadding="0" cellspacing="0" border="0" style="max-width:600px;width:100%;background:#ffffff;border-radius:12px;overflow:hidden;">
        <tr>
          <td style="padding:18px 20px;background:#0f172a;color:#ffffff;">
            <div style="font-size:18px;font-weight:700;">{event_name}</div>
            <div style="font-size:13px;opacity:0.9;margin-top:6px;">{where_}</div>
          </td>
        </tr>
        <tr>
          <td style="padding:18px 20px;">
            <div style="font-size:13px;color:#374151;">
              <div style="font-weight:600;margin-bottom:6px;">When</div>
              <div style="margin-bottom:10px;">{when}</div>
              <div style="font-weight:600;margin-bottom:6px;">Seats</div>
              <div style="margin-bottom:10px;">{seats}</div>
              <div style="font-weight:600;margin-bottom:6px;">Booking reference</div>
              <div style="margin-bottom:16px;font-family:monospace;">{booking_id}</div>
            </div>
            <div>{qr}</div>
          </td>
        </tr>
      </table>
    </center>
  </body>
</html>"#
    ))
}
