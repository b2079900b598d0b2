//! Payment Webhook Envelope
//!
//! Signature verification and parsing for provider events. The provider
//! delivers at-least-once and out of order; everything downstream of
//! [`parse_event`] must therefore be idempotent.

use crate::utils::{AppError, AppResult};
use ring::hmac;

/// Typed provider event.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentEvent {
    /// Successful checkout; binds the customer and activates the member.
    CheckoutCompleted {
        customer_id: String,
        /// Our member id, round-tripped through `client_reference_id`.
        member_id: i64,
        subscription_id: Option<String>,
    },

    /// Subscription changed upstream (status, cancellation schedule).
    SubscriptionUpdated {
        customer_id: String,
        status: String,
        cancel_at_period_end: bool,
    },

    /// Subscription terminated upstream.
    SubscriptionDeleted { customer_id: String },

    /// Renewal (or first) charge collected for a billing period.
    InvoicePaid {
        customer_id: String,
        /// "YYYY-MM", the Renewal Bonus dedupe key.
        billing_period: String,
    },

    /// Renewal charge failed.
    InvoicePaymentFailed {
        customer_id: String,
        attempt_count: i64,
    },

    /// Unhandled event type; acknowledged without action.
    Unknown { event_type: String },
}

/// Verify the `t=<unix>,v1=<hex>` signature header: HMAC-SHA256 over
/// `"<t>.<payload>"`. Rejects stale timestamps beyond `tolerance_secs`.
///
/// An empty secret disables verification (development only).
pub fn verify_signature(
    payload: &str,
    header: &str,
    secret: &str,
    now_unix: i64,
    tolerance_secs: i64,
) -> AppResult<()> {
    if secret.is_empty() {
        return Ok(());
    }

    let mut timestamp: Option<i64> = None;
    let mut signature: Option<&str> = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return Err(AppError::SignatureInvalid);
    };

    if (now_unix - timestamp).abs() > tolerance_secs {
        return Err(AppError::SignatureInvalid);
    }

    let expected = hex::decode(signature).map_err(|_| AppError::SignatureInvalid)?;
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let signed_payload = format!("{timestamp}.{payload}");
    hmac::verify(&key, signed_payload.as_bytes(), &expected)
        .map_err(|_| AppError::SignatureInvalid)
}

/// Produce the signature header for a payload. Test and client helper.
pub fn sign_payload(payload: &str, secret: &str, timestamp: i64) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let tag = hmac::sign(&key, format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(tag.as_ref()))
}

/// Parse a provider event envelope into a [`PaymentEvent`].
pub fn parse_event(payload: &str) -> AppResult<PaymentEvent> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| AppError::validation(format!("Malformed event payload: {e}")))?;

    let event_type = value["type"]
        .as_str()
        .ok_or_else(|| AppError::validation("Missing event type"))?;
    let object = &value["data"]["object"];

    match event_type {
        "checkout.session.completed" => {
            let member_id = object["client_reference_id"]
                .as_str()
                .and_then(|id| id.parse().ok())
                .ok_or_else(|| AppError::validation("Missing client_reference_id"))?;
            Ok(PaymentEvent::CheckoutCompleted {
                customer_id: require_customer(object)?,
                member_id,
                subscription_id: object["subscription"].as_str().map(Into::into),
            })
        }

        "customer.subscription.updated" => Ok(PaymentEvent::SubscriptionUpdated {
            customer_id: require_customer(object)?,
            status: object["status"].as_str().unwrap_or("active").to_string(),
            cancel_at_period_end: object["cancel_at_period_end"].as_bool().unwrap_or(false),
        }),

        "customer.subscription.deleted" => Ok(PaymentEvent::SubscriptionDeleted {
            customer_id: require_customer(object)?,
        }),

        "invoice.paid" => {
            let period_start = object["period_start"]
                .as_i64()
                .ok_or_else(|| AppError::validation("Missing period_start"))?;
            let period = chrono::DateTime::from_timestamp(period_start, 0)
                .ok_or_else(|| AppError::validation("Invalid period_start"))?
                .format("%Y-%m")
                .to_string();
            Ok(PaymentEvent::InvoicePaid {
                customer_id: require_customer(object)?,
                billing_period: period,
            })
        }

        "invoice.payment_failed" => Ok(PaymentEvent::InvoicePaymentFailed {
            customer_id: require_customer(object)?,
            attempt_count: object["attempt_count"].as_i64().unwrap_or(1),
        }),

        other => Ok(PaymentEvent::Unknown {
            event_type: other.to_string(),
        }),
    }
}

fn require_customer(object: &serde_json::Value) -> AppResult<String> {
    object["customer"]
        .as_str()
        .map(Into::into)
        .ok_or_else(|| AppError::validation("Missing customer id"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_signature_verifies() {
        let payload = r#"{"type":"invoice.paid"}"#;
        let header = sign_payload(payload, "whsec_test", 1_700_000_000);
        verify_signature(payload, &header, "whsec_test", 1_700_000_010, 300).unwrap();
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let header = sign_payload(r#"{"a":1}"#, "whsec_test", 1_700_000_000);
        let err = verify_signature(r#"{"a":2}"#, &header, "whsec_test", 1_700_000_010, 300)
            .unwrap_err();
        assert!(matches!(err, AppError::SignatureInvalid));
    }

    #[test]
    fn wrong_secret_and_stale_timestamp_are_rejected() {
        let payload = "{}";
        let header = sign_payload(payload, "whsec_a", 1_700_000_000);
        assert!(verify_signature(payload, &header, "whsec_b", 1_700_000_010, 300).is_err());
        assert!(verify_signature(payload, &header, "whsec_a", 1_700_009_999, 300).is_err());
    }

    #[test]
    fn missing_header_parts_are_rejected() {
        assert!(verify_signature("{}", "", "whsec_a", 0, 300).is_err());
        assert!(verify_signature("{}", "t=123", "whsec_a", 123, 300).is_err());
        assert!(verify_signature("{}", "v1=abcd", "whsec_a", 0, 300).is_err());
    }

    #[test]
    fn parses_checkout_completed() {
        let payload = r#"{
            "type": "checkout.session.completed",
            "data": {"object": {
                "customer": "cus_42",
                "client_reference_id": "9001",
                "subscription": "sub_7"
            }}
        }"#;
        let event = parse_event(payload).unwrap();
        assert_eq!(
            event,
            PaymentEvent::CheckoutCompleted {
                customer_id: "cus_42".into(),
                member_id: 9001,
                subscription_id: Some("sub_7".into()),
            }
        );
    }

    #[test]
    fn parses_invoice_paid_into_billing_period() {
        let payload = r#"{
            "type": "invoice.paid",
            "data": {"object": {"customer": "cus_42", "period_start": 1754265600}}
        }"#;
        let event = parse_event(payload).unwrap();
        assert_eq!(
            event,
            PaymentEvent::InvoicePaid {
                customer_id: "cus_42".into(),
                billing_period: "2025-08".into(),
            }
        );
    }

    #[test]
    fn unknown_event_types_pass_through() {
        let event = parse_event(r#"{"type":"product.created","data":{"object":{}}}"#).unwrap();
        assert_eq!(
            event,
            PaymentEvent::Unknown {
                event_type: "product.created".into()
            }
        );
    }
}
