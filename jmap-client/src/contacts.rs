// Contacts
// Served either by the IETF `ContactCard` family or by the older vendor
// `Contact` family, depending on the account. Records are returned as raw
// JSON because the two families do not share a schema.

use crate::client::JmapClient;
use crate::recipes::{get_arguments, QueryThenGet, GET, QUERY};
use crate::strategy::{first_supported, Candidate};
use jmap_core::capability::{CONTACTS, FASTMAIL_CONTACTS};
use jmap_core::{Batch, Result};
use serde_json::{json, Value};

pub const DEFAULT_CONTACT_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactsApi {
    ContactCard,
    Legacy,
}

impl ContactsApi {
    /// Tried in this order.
    pub const ALL: [ContactsApi; 2] = [ContactsApi::ContactCard, ContactsApi::Legacy];

    pub fn type_name(&self) -> &'static str {
        match self {
            ContactsApi::ContactCard => "ContactCard",
            ContactsApi::Legacy => "Contact",
        }
    }

    fn batch(&self) -> Batch {
        Batch::with_capabilities([self.capability()])
    }
}

impl Candidate for ContactsApi {
    fn name(&self) -> &'static str {
        self.type_name()
    }

    fn capability(&self) -> &'static str {
        match self {
            ContactsApi::ContactCard => CONTACTS,
            ContactsApi::Legacy => FASTMAIL_CONTACTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Contacts {
    client: JmapClient,
}

impl Contacts {
    pub fn new(client: JmapClient) -> Self {
        Self { client }
    }

    async fn query(
        &self,
        api: ContactsApi,
        account_id: &str,
        filter: Value,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let mut batch = api.batch();
        QueryThenGet::new(api.type_name(), account_id)
            .filter(filter)
            .limit(limit)
            .append_to(&mut batch)?;
        self.client.execute(batch).await?.query_list(QUERY, GET)
    }

    async fn fetch(&self, api: ContactsApi, account_id: &str, contact_id: &str) -> Result<Value> {
        let mut batch = api.batch();
        batch.call(
            GET,
            format!("{}/get", api.type_name()),
            get_arguments(account_id, Some(&[contact_id][..]), None),
        )?;
        self.client.execute(batch).await?.get_one(GET, contact_id)
    }

    pub async fn list_contacts(&self, limit: Option<usize>) -> Result<Vec<Value>> {
        let session = self.client.session().await?;
        let limit = limit.unwrap_or(DEFAULT_CONTACT_LIMIT);
        first_supported("list contacts", &session, &ContactsApi::ALL, |api| {
            self.query(api, &session.account_id, json!({}), limit)
        })
        .await
    }

    /// A `notFound` on the first supported family is final; the next family
    /// is not asked.
    pub async fn get_contact(&self, contact_id: &str) -> Result<Value> {
        let session = self.client.session().await?;
        first_supported("get contact", &session, &ContactsApi::ALL, |api| {
            self.fetch(api, &session.account_id, contact_id)
        })
        .await
    }

    pub async fn search_contacts(&self, query: &str, limit: Option<usize>) -> Result<Vec<Value>> {
        let session = self.client.session().await?;
        let limit = limit.unwrap_or(DEFAULT_CONTACT_LIMIT);
        first_supported("search contacts", &session, &ContactsApi::ALL, |api| {
            self.query(api, &session.account_id, json!({ "text": query }), limit)
        })
        .await
    }
}
