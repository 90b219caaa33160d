//! Discord messages for sales and the support desk.
//!
//! Builders are pure so their layout can be tested; [`dispatch`] sends in
//! the background and never blocks or fails the request.

use seisen_client::{spoiler, DiscordNotifier, Embed};
use seisen_core::Tier;
use seisen_store::{ReplyRecord, TicketRecord};

pub const COLOR_PAYPAL: u32 = 0xfbbf24;
pub const COLOR_ROBLOX: u32 = 0x10b981;
pub const COLOR_TICKET: u32 = 0x3b82f6;
pub const COLOR_USER_REPLY: u32 = 0x10b981;
pub const COLOR_ADMIN_REPLY: u32 = 0xa855f7;

/// Support text fields are shortened to this many characters.
const SUPPORT_TEXT_LIMIT: usize = 1000;

/// A ready-to-send webhook message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub content: Option<String>,
    pub embed: Embed,
}

/// Send `message` on a background task.
pub fn dispatch(notifier: &DiscordNotifier, message: Message) {
    if !notifier.is_enabled() {
        return;
    }
    let notifier = notifier.clone();
    tokio::spawn(async move {
        notifier
            .notify(message.content.as_deref(), std::slice::from_ref(&message.embed))
            .await;
    });
}

/// The first key, hidden behind a spoiler.
fn keys_field(keys: &[String]) -> String {
    keys.first().map(|k| spoiler(k)).unwrap_or_default()
}

fn clip(text: &str) -> String {
    text.chars().take(SUPPORT_TEXT_LIMIT).collect()
}

/// PayPal capture completed.
pub struct PayPalSale<'a> {
    pub tier: Tier,
    pub amount: f64,
    pub currency: &'a str,
    pub transaction_id: &'a str,
    pub email: Option<&'a str>,
    pub keys: &'a [String],
}

pub fn paypal_sale(notifier: &DiscordNotifier, sale: &PayPalSale<'_>) -> Message {
    let embed = Embed::new("💎 New Premium Purchase (PayPal)", COLOR_PAYPAL)
        .field("Tier", sale.tier.as_str().to_uppercase(), true)
        .field("Amount", format!("{} {}", sale.amount, sale.currency), true)
        .field("Transaction ID", sale.transaction_id, false)
        .field("Customer Email", sale.email.unwrap_or("N/A"), false)
        .field("License Key", keys_field(sale.keys), false);
    Message {
        content: Some(notifier.with_mention("💰 New Premium Purchase!")),
        embed,
    }
}

/// Roblox purchase claimed or renewed.
pub struct RobloxSale<'a> {
    pub tier: Tier,
    pub username: &'a str,
    pub user_id: u64,
    pub is_renewal: bool,
    pub expiry: Option<String>,
    pub keys: &'a [String],
}

pub fn roblox_sale(notifier: &DiscordNotifier, sale: &RobloxSale<'_>) -> Message {
    let (headline, kind) = if sale.is_renewal {
        ("Premium Renewal", "Renewal")
    } else {
        ("New Premium Purchase", "New Purchase")
    };
    let embed = Embed::new(format!("💎 {headline} (Roblox)"), COLOR_ROBLOX)
        .field("Tier", sale.tier.as_str().to_uppercase(), true)
        .field("Type", kind, true)
        .field("Roblox Username", sale.username, true)
        .field("User ID", sale.user_id.to_string(), true)
        .field("Expiry", sale.expiry.as_deref().unwrap_or("Lifetime"), true)
        .field("License Key", keys_field(sale.keys), false);
    Message {
        content: Some(notifier.with_mention(&format!("💰 {headline}!"))),
        embed,
    }
}

pub fn new_ticket(ticket: &TicketRecord) -> Message {
    let embed = Embed::new("🎫 New Support Ticket", COLOR_TICKET)
        .field("Ticket #", ticket.ticket_number.as_str(), true)
        .field("Category", &ticket.category, true)
        .field("Status", "Open", true)
        .field(
            "From",
            format!("{} ({})", ticket.user_name, ticket.user_email),
            false,
        )
        .field("Subject", &ticket.subject, false)
        .field("Description", clip(&ticket.description), false)
        .at(ticket.created_at);
    Message {
        content: None,
        embed,
    }
}

pub fn user_reply(ticket: &TicketRecord, reply: &ReplyRecord) -> Message {
    let embed = Embed::new(
        format!("💬 New Reply on Ticket #{}", ticket.ticket_number),
        COLOR_USER_REPLY,
    )
    .field("From", &reply.author_name, true)
    .field("Ticket", &ticket.subject, true)
    .field("Reply", clip(&reply.message), false)
    .at(reply.created_at);
    Message {
        content: None,
        embed,
    }
}

pub fn admin_reply(ticket: &TicketRecord, reply: &ReplyRecord) -> Message {
    let embed = Embed::new(
        format!("✅ Admin Reply on Ticket #{}", ticket.ticket_number),
        COLOR_ADMIN_REPLY,
    )
    .field("Ticket", &ticket.subject, false)
    .field("Reply", clip(&reply.message), false)
    .at(reply.created_at);
    Message {
        content: None,
        embed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seisen_core::{TicketNumber, Timestamp};
    use seisen_state::TicketStatus;
    use seisen_store::AuthorType;

    fn field<'a>(m: &'a Message, name: &str) -> &'a str {
        m.embed
            .fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
            .unwrap()
    }

    fn ticket() -> TicketRecord {
        let at = Timestamp::parse("2024-02-01T12:00:00Z").unwrap();
        TicketRecord {
            ticket_number: TicketNumber::parse("TKT-LS3N8Q00-AB12").unwrap(),
            user_name: "Ana".into(),
            user_email: "ana@example.com".into(),
            category: "billing".into(),
            subject: "Key missing".into(),
            description: "x".repeat(1500),
            status: TicketStatus::Open,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_paypal_sale_spoils_keys() {
        let keys = vec!["AAA".to_string(), "BBB".to_string()];
        let msg = paypal_sale(
            &DiscordNotifier::disabled(),
            &PayPalSale {
                tier: Tier::Monthly,
                amount: 5.0,
                currency: "EUR",
                transaction_id: "CAP-1",
                email: None,
                keys: &keys,
            },
        );
        assert_eq!(msg.embed.color, COLOR_PAYPAL);
        assert_eq!(field(&msg, "Tier"), "MONTHLY");
        assert_eq!(field(&msg, "Amount"), "5 EUR");
        assert_eq!(field(&msg, "Customer Email"), "N/A");
        assert_eq!(field(&msg, "License Key"), "||AAA||");
        assert_eq!(msg.content.as_deref(), Some("💰 New Premium Purchase!"));
    }

    #[test]
    fn test_roblox_renewal_wording() {
        let keys = vec!["K".to_string()];
        let msg = roblox_sale(
            &DiscordNotifier::disabled(),
            &RobloxSale {
                tier: Tier::Lifetime,
                username: "builder",
                user_id: 42,
                is_renewal: true,
                expiry: None,
                keys: &keys,
            },
        );
        assert_eq!(msg.content.as_deref(), Some("💰 Premium Renewal!"));
        assert_eq!(field(&msg, "Type"), "Renewal");
        assert_eq!(field(&msg, "Expiry"), "Lifetime");
        assert_eq!(field(&msg, "User ID"), "42");
    }

    #[test]
    fn test_ticket_description_is_clipped() {
        let msg = new_ticket(&ticket());
        assert_eq!(msg.embed.color, COLOR_TICKET);
        assert!(msg.content.is_none());
        assert_eq!(field(&msg, "Description").chars().count(), 1000);
        assert_eq!(field(&msg, "From"), "Ana (ana@example.com)");
    }

    #[test]
    fn test_reply_titles_carry_ticket_number() {
        let t = ticket();
        let reply = ReplyRecord {
            id: uuid::Uuid::new_v4(),
            ticket_number: t.ticket_number.clone(),
            author_type: AuthorType::Admin,
            author_name: "Support Team".into(),
            message: "On it".into(),
            created_at: t.created_at,
        };
        let admin = admin_reply(&t, &reply);
        assert_eq!(admin.embed.title, "✅ Admin Reply on Ticket #TKT-LS3N8Q00-AB12");
        assert_eq!(admin.embed.color, COLOR_ADMIN_REPLY);
        let user = user_reply(&t, &reply);
        assert_eq!(field(&user, "From"), "Support Team");
    }
}
