//! # Support Tickets
//!
//! Each ticket and its replies are stored as one document keyed by ticket
//! number, so adding a reply and bumping the ticket's status is a single
//! per-key update.

use rand::Rng;
use seisen_core::{TicketNumber, Timestamp};
use seisen_state::TicketStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::json_store::JsonStore;

/// A support ticket as shown to customers and staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub ticket_number: TicketNumber,
    pub user_name: String,
    pub user_email: String,
    pub category: String,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Who wrote a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorType {
    /// The customer who opened the ticket.
    User,
    /// Support staff.
    Admin,
}

/// One message on a ticket thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub id: Uuid,
    pub ticket_number: TicketNumber,
    pub author_type: AuthorType,
    pub author_name: String,
    pub message: String,
    pub created_at: Timestamp,
}

/// A ticket with its replies in chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketThread {
    pub ticket: TicketRecord,
    #[serde(default)]
    pub replies: Vec<ReplyRecord>,
}

/// Fields a customer submits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub user_name: String,
    pub user_email: String,
    pub category: String,
    pub subject: String,
    pub description: String,
}

/// Ticket document store.
#[derive(Debug, Clone)]
pub struct TicketStore {
    docs: JsonStore<TicketThread>,
}

impl TicketStore {
    /// Wrap an opened document store.
    pub fn new(docs: JsonStore<TicketThread>) -> Self {
        Self { docs }
    }

    /// In-memory store.
    pub fn in_memory() -> Self {
        Self::new(JsonStore::in_memory())
    }

    /// Open a ticket. Retries number generation on the (unlikely) collision.
    pub fn create<R: Rng + ?Sized>(
        &self,
        new: NewTicket,
        now: Timestamp,
        rng: &mut R,
    ) -> Result<TicketRecord, StoreError> {
        let mut attempts = 0;
        loop {
            let ticket = TicketRecord {
                ticket_number: TicketNumber::generate(now, rng),
                user_name: new.user_name.clone(),
                user_email: new.user_email.clone(),
                category: new.category.clone(),
                subject: new.subject.clone(),
                description: new.description.clone(),
                status: TicketStatus::Open,
                created_at: now,
                updated_at: now,
            };
            let thread = TicketThread {
                ticket: ticket.clone(),
                replies: Vec::new(),
            };
            match self.docs.insert_new(ticket.ticket_number.as_str(), thread) {
                Ok(()) => return Ok(ticket),
                Err(StoreError::Conflict { .. }) if attempts < 3 => attempts += 1,
                Err(e) => return Err(e),
            }
        }
    }

    /// Ticket and replies, replies oldest first.
    pub fn get(&self, number: &TicketNumber) -> Option<TicketThread> {
        self.docs.get(number.as_str()).map(|mut thread| {
            thread.replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            thread
        })
    }

    /// All tickets without replies, newest first, optionally filtered.
    pub fn list(&self, status: Option<TicketStatus>) -> Vec<TicketRecord> {
        let mut tickets: Vec<TicketRecord> = self
            .docs
            .values()
            .into_iter()
            .map(|t| t.ticket)
            .filter(|t| status.map_or(true, |s| t.status == s))
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tickets
    }

    /// Append a reply and apply its implicit status change. Returns the
    /// reply and the ticket as updated.
    pub fn add_reply(
        &self,
        number: &TicketNumber,
        author_type: AuthorType,
        author_name: String,
        message: String,
        now: Timestamp,
    ) -> Result<(ReplyRecord, TicketRecord), StoreError> {
        let reply = ReplyRecord {
            id: Uuid::new_v4(),
            ticket_number: number.clone(),
            author_type,
            author_name,
            message,
            created_at: now,
        };
        let stored = reply.clone();
        self.docs
            .update(number.as_str(), move |thread| {
                thread.ticket.status = match author_type {
                    AuthorType::User => thread.ticket.status.after_customer_reply(),
                    AuthorType::Admin => thread.ticket.status.after_staff_reply(),
                };
                thread.ticket.updated_at = now;
                thread.replies.push(stored);
                thread.ticket.clone()
            })?
            .map(|ticket| (reply, ticket))
            .ok_or_else(|| not_found(number))
    }

    /// Staff status change. Any status may be set from any other.
    pub fn set_status(
        &self,
        number: &TicketNumber,
        status: TicketStatus,
        now: Timestamp,
    ) -> Result<TicketRecord, StoreError> {
        self.docs
            .update(number.as_str(), |thread| {
                thread.ticket.status = status;
                thread.ticket.updated_at = now;
                thread.ticket.clone()
            })?
            .ok_or_else(|| not_found(number))
    }
}

fn not_found(number: &TicketNumber) -> StoreError {
    StoreError::NotFound {
        kind: "ticket",
        key: number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn sample() -> NewTicket {
        NewTicket {
            user_name: "Kai".into(),
            user_email: "kai@example.com".into(),
            category: "billing".into(),
            subject: "Key not working".into(),
            description: "It says invalid".into(),
        }
    }

    fn at(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let store = TicketStore::in_memory();
        let mut rng = StepRng::new(3, 11);
        let t = store.create(sample(), at("2026-01-01T00:00:00Z"), &mut rng).unwrap();
        assert_eq!(t.status, TicketStatus::Open);
        let thread = store.get(&t.ticket_number).unwrap();
        assert_eq!(thread.ticket, t);
        assert!(thread.replies.is_empty());
    }

    #[test]
    fn test_replies_sorted_and_status_moves() {
        let store = TicketStore::in_memory();
        let mut rng = StepRng::new(3, 11);
        let t = store.create(sample(), at("2026-01-01T00:00:00Z"), &mut rng).unwrap();

        let (_, after_admin) = store
            .add_reply(
                &t.ticket_number,
                AuthorType::Admin,
                "Support Team".into(),
                "Try again".into(),
                at("2026-01-01T01:00:00Z"),
            )
            .unwrap();
        assert_eq!(after_admin.status, TicketStatus::InProgress);

        store
            .set_status(&t.ticket_number, TicketStatus::Closed, at("2026-01-01T02:00:00Z"))
            .unwrap();
        let (_, after_user) = store
            .add_reply(
                &t.ticket_number,
                AuthorType::User,
                "Kai".into(),
                "Still broken".into(),
                at("2026-01-01T03:00:00Z"),
            )
            .unwrap();
        assert_eq!(after_user.status, TicketStatus::Open);

        let thread = store.get(&t.ticket_number).unwrap();
        let messages: Vec<&str> = thread.replies.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["Try again", "Still broken"]);
        assert_eq!(thread.ticket.updated_at, at("2026-01-01T03:00:00Z"));
    }

    #[test]
    fn test_reply_to_missing_ticket() {
        let store = TicketStore::in_memory();
        let number = TicketNumber::parse("TKT-NOPE-0000").unwrap();
        let err = store
            .add_reply(&number, AuthorType::User, "x".into(), "y".into(), Timestamp::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "ticket", .. }));
    }

    #[test]
    fn test_staff_can_move_closed_ticket_back_into_progress() {
        let store = TicketStore::in_memory();
        let mut rng = StepRng::new(3, 11);
        let t = store.create(sample(), at("2026-01-01T00:00:00Z"), &mut rng).unwrap();
        store
            .set_status(&t.ticket_number, TicketStatus::Closed, at("2026-01-01T01:00:00Z"))
            .unwrap();
        let reopened = store
            .set_status(&t.ticket_number, TicketStatus::InProgress, at("2026-01-01T02:00:00Z"))
            .unwrap();
        assert_eq!(reopened.status, TicketStatus::InProgress);
        assert_eq!(reopened.updated_at, at("2026-01-01T02:00:00Z"));
        assert_eq!(
            store.get(&t.ticket_number).unwrap().ticket.status,
            TicketStatus::InProgress
        );
    }

    #[test]
    fn test_list_filters_and_orders() {
        let store = TicketStore::in_memory();
        let mut rng = StepRng::new(3, 11);
        let a = store.create(sample(), at("2026-01-01T00:00:00Z"), &mut rng).unwrap();
        let b = store.create(sample(), at("2026-01-02T00:00:00Z"), &mut rng).unwrap();
        store
            .set_status(&a.ticket_number, TicketStatus::Closed, Timestamp::now())
            .unwrap();
        let all = store.list(None);
        assert_eq!(all[0].ticket_number, b.ticket_number);
        let open = store.list(Some(TicketStatus::Open));
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].ticket_number, b.ticket_number);
    }
}
