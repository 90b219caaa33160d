//! CSV export of the payments ledger for the admin dashboard.

use seisen_core::{Timestamp, ROBUX_CURRENCY};
use seisen_store::PaymentRecord;

pub const CSV_HEADER: &str = "Date,User,Tier,Method,Amount,Currency,Key,Transaction ID";

/// `seisen-payments-YYYY-MM-DD.csv`.
pub fn export_filename(now: Timestamp) -> String {
    format!("seisen-payments-{}.csv", now.date_string())
}

/// Render `payments` in the order given, one quoted row each.
pub fn payments_csv(payments: &[PaymentRecord]) -> String {
    let mut out = String::from(CSV_HEADER);
    for p in payments {
        let user = p
            .payer_email
            .as_deref()
            .or(p.roblox_username.as_deref())
            .unwrap_or("N/A");
        let method = if p.currency == ROBUX_CURRENCY {
            "Roblox"
        } else {
            "PayPal"
        };
        let key = p.generated_keys.first().map_or("N/A", String::as_str);
        let row = [
            p.created_at.to_rfc3339(),
            user.to_string(),
            p.tier.as_str().to_string(),
            method.to_string(),
            p.amount.to_string(),
            p.currency.clone(),
            key.to_string(),
            p.transaction_id.to_string(),
        ];
        out.push('\n');
        out.push_str(
            &row.iter()
                .map(|cell| quote(cell))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    out
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use seisen_core::{Tier, TransactionId};

    fn row(id: &str, email: Option<&str>, roblox: Option<&str>, currency: &str) -> PaymentRecord {
        let at = Timestamp::parse("2024-03-05T10:00:00Z").unwrap();
        PaymentRecord {
            transaction_id: TransactionId::new(id).unwrap(),
            payer_email: email.map(String::from),
            payer_id: None,
            roblox_username: roblox.map(String::from),
            roblox_uaid: None,
            tier: Tier::Monthly,
            amount: if currency == "ROBUX" { 0.0 } else { 5.0 },
            currency: currency.into(),
            payment_status: "completed".into(),
            generated_keys: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_filename_uses_date() {
        let now = Timestamp::parse("2024-12-31T23:59:59Z").unwrap();
        assert_eq!(export_filename(now), "seisen-payments-2024-12-31.csv");
    }

    #[test]
    fn test_rows_are_quoted_with_fallbacks() {
        let mut paypal = row("CAP1", Some("a@b.c"), None, "EUR");
        paypal.generated_keys = vec!["K1".into(), "K2".into()];
        let roblox = row("ROBLOX_1_2", None, Some("builder"), "ROBUX");
        let anon = row("CAP2", None, None, "EUR");

        let csv = payments_csv(&[paypal, roblox, anon]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            r#""2024-03-05T10:00:00.000Z","a@b.c","monthly","PayPal","5","EUR","K1","CAP1""#
        );
        assert_eq!(
            lines[2],
            r#""2024-03-05T10:00:00.000Z","builder","monthly","Roblox","0","ROBUX","N/A","ROBLOX_1_2""#
        );
        assert!(lines[3].contains(r#""N/A","monthly""#));
    }

    #[test]
    fn test_inner_quotes_are_doubled() {
        let p = row("CAP3", Some("say \"hi\"@x.y"), None, "EUR");
        let csv = payments_csv(&[p]);
        assert!(csv.contains(r#""say ""hi""@x.y""#));
    }
}
