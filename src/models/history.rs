use chrono::{DateTime as ChronoDateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;

use super::{Adoption, AdoptionStatus, Contract, ContractStatus, Conversation};
use crate::utils::to_chrono;

/// Shown for every step of the relationship that has not happened yet.
pub const PENDING_PLACEHOLDER: &str = "en cours";

#[derive(Debug, Serialize, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum Milestone<T> {
    Reached(T),
    Pending(String),
}

impl<T> Milestone<T> {
    fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Milestone::Reached(v),
            None => Milestone::Pending(PENDING_PLACEHOLDER.to_string()),
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        matches!(self, Milestone::Pending(_))
    }
}

/// Timeline of one company/student relationship, built from whatever
/// records exist so far.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryProjection {
    pub company: String,
    pub student: String,
    pub adoption_status: Milestone<AdoptionStatus>,
    pub adoption_requested_at: Milestone<ChronoDateTime<Utc>>,
    pub adoption_accepted_at: Milestone<ChronoDateTime<Utc>>,
    pub first_contact_at: Milestone<ChronoDateTime<Utc>>,
    pub contract_status: Milestone<ContractStatus>,
    pub contract_sent_at: Milestone<ChronoDateTime<Utc>>,
    pub contract_signed_at: Milestone<ChronoDateTime<Utc>>,
    pub contract_duration_months: Milestone<i32>,
    pub contract_remaining_months: Milestone<i64>,
}

impl HistoryProjection {
    pub fn build(
        company: String,
        student: String,
        adoption: Option<&Adoption>,
        conversation: Option<&Conversation>,
        contract: Option<&Contract>,
        now: ChronoDateTime<Utc>,
    ) -> Self {
        let accepted_at = adoption
            .filter(|a| a.status == AdoptionStatus::Accepted)
            .map(|a| to_chrono(a.updated_at));
        let signed_at = contract.and_then(|c| c.signed_at).map(to_chrono);

        HistoryProjection {
            company,
            student,
            adoption_status: Milestone::from_option(adoption.map(|a| a.status)),
            adoption_requested_at: Milestone::from_option(adoption.map(|a| to_chrono(a.created_at))),
            adoption_accepted_at: Milestone::from_option(accepted_at),
            first_contact_at: Milestone::from_option(conversation.map(|c| to_chrono(c.created_at))),
            contract_status: Milestone::from_option(contract.map(|c| c.status)),
            contract_sent_at: Milestone::from_option(contract.map(|c| to_chrono(c.created_at))),
            contract_signed_at: Milestone::from_option(signed_at),
            contract_duration_months: Milestone::from_option(contract.map(|c| c.duration_months())),
            contract_remaining_months: Milestone::from_option(contract.map(|c| c.remaining_months(now))),
        }
    }
}
