//! Resident notification emails.
//!
//! Uses SMTP via lettre for delivery with Askama HTML templates. Sending is
//! best effort: callers log failures and carry on.

use askama::Template;
use chrono::NaiveDate;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

/// Fields shown in the invoice email.
#[derive(Debug, Clone)]
pub struct InvoiceNotice<'a> {
    pub resident_name: &'a str,
    pub invoice_no: &'a str,
    pub apartment_number: &'a str,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_amount: Decimal,
}

/// Fields shown in the booking confirmation email.
#[derive(Debug, Clone)]
pub struct BookingNotice<'a> {
    pub resident_name: &'a str,
    pub amenity_name: &'a str,
    pub package_name: &'a str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: i32,
}

#[derive(Template)]
#[template(path = "email/invoice_issued.html")]
struct InvoiceIssuedHtml<'a> {
    name: &'a str,
    invoice_no: &'a str,
    apartment: &'a str,
    issue_date: String,
    due_date: String,
    total: String,
}

#[derive(Template)]
#[template(path = "email/invoice_issued.txt")]
struct InvoiceIssuedText<'a> {
    name: &'a str,
    invoice_no: &'a str,
    apartment: &'a str,
    issue_date: String,
    due_date: String,
    total: String,
}

#[derive(Template)]
#[template(path = "email/booking_confirmed.html")]
struct BookingConfirmedHtml<'a> {
    name: &'a str,
    amenity: &'a str,
    package: &'a str,
    start_date: String,
    end_date: String,
    price: String,
}

#[derive(Template)]
#[template(path = "email/booking_confirmed.txt")]
struct BookingConfirmedText<'a> {
    name: &'a str,
    amenity: &'a str,
    package: &'a str,
    start_date: String,
    end_date: String,
    price: String,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for resident notifications.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Tell a resident an invoice has been issued.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_invoice_issued(
        &self,
        to: &str,
        notice: &InvoiceNotice<'_>,
    ) -> Result<(), EmailError> {
        let html = InvoiceIssuedHtml {
            name: notice.resident_name,
            invoice_no: notice.invoice_no,
            apartment: notice.apartment_number,
            issue_date: format_date(notice.issue_date),
            due_date: format_date(notice.due_date),
            total: format_vnd(notice.total_amount),
        }
        .render()?;
        let text = InvoiceIssuedText {
            name: notice.resident_name,
            invoice_no: notice.invoice_no,
            apartment: notice.apartment_number,
            issue_date: format_date(notice.issue_date),
            due_date: format_date(notice.due_date),
            total: format_vnd(notice.total_amount),
        }
        .render()?;

        let subject = format!("Hóa đơn {} đã được phát hành", notice.invoice_no);
        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Tell a resident their amenity booking was confirmed.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_booking_confirmed(
        &self,
        to: &str,
        notice: &BookingNotice<'_>,
    ) -> Result<(), EmailError> {
        let price = format_vnd(Decimal::from(notice.price));
        let html = BookingConfirmedHtml {
            name: notice.resident_name,
            amenity: notice.amenity_name,
            package: notice.package_name,
            start_date: format_date(notice.start_date),
            end_date: format_date(notice.end_date),
            price: price.clone(),
        }
        .render()?;
        let text = BookingConfirmedText {
            name: notice.resident_name,
            amenity: notice.amenity_name,
            package: notice.package_name,
            start_date: format_date(notice.start_date),
            end_date: format_date(notice.end_date),
            price,
        }
        .render()?;

        let subject = format!("Xác nhận đăng ký {}", notice.amenity_name);
        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// `dd/MM/yyyy`, as residents read dates.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Whole đồng with `.` thousands separators, e.g. `1.250.000 ₫`.
#[must_use]
pub fn format_vnd(amount: Decimal) -> String {
    let rounded = sams_core::round_vnd(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-{grouped} ₫")
    } else {
        format!("{grouped} ₫")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_vnd() {
        assert_eq!(format_vnd(Decimal::from(0)), "0 ₫");
        assert_eq!(format_vnd(Decimal::from(950)), "950 ₫");
        assert_eq!(format_vnd(Decimal::from(1_250_000)), "1.250.000 ₫");
        assert_eq!(format_vnd("300000.4".parse().unwrap()), "300.000 ₫");
        assert_eq!(format_vnd(Decimal::from(-12_000)), "-12.000 ₫");
        assert_eq!(format_vnd("2500.5".parse().unwrap()), "2.501 ₫");
    }

    #[test]
    fn test_format_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(format_date(date), "05/03/2025");
    }

    #[test]
    fn test_invoice_template_renders() {
        let text = InvoiceIssuedText {
            name: "Nguyễn Văn An",
            invoice_no: "INV-202503-A1001",
            apartment: "A1001",
            issue_date: "01/03/2025".to_string(),
            due_date: "10/04/2025".to_string(),
            total: "1.250.000 ₫".to_string(),
        }
        .render()
        .unwrap();
        assert!(text.contains("INV-202503-A1001"));
        assert!(text.contains("1.250.000 ₫"));
        assert!(text.contains("10/04/2025"));
    }

    #[test]
    fn test_booking_html_escapes_names() {
        let html = BookingConfirmedHtml {
            name: "<b>An</b>",
            amenity: "Hồ bơi",
            package: "Gói 1 tháng",
            start_date: "01/03/2025".to_string(),
            end_date: "01/04/2025".to_string(),
            price: "500.000 ₫".to_string(),
        }
        .render()
        .unwrap();
        assert!(html.contains("Hồ bơi"));
        assert!(!html.contains("<b>An</b>"));
    }
}
