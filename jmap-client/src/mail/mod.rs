// Mail operations
// Each operation is a fixed batch recipe: lookups that need a container or an
// identity take one extra round trip before the batch that does the work.

mod types;

pub use types::{
    AccountSummary, BodyPart, BodyValue, Email, EmailAddress, Identity, Mailbox, SearchFilter,
    SendEmail, SentEmail, Thread,
};

use crate::client::JmapClient;
use crate::recipes::{self, get_arguments, QueryThenGet, GET, QUERY};
use jmap_core::capability::{MAIL, SUBMISSION};
use jmap_core::{
    creation_ref, find_container, Arguments, Batch, BatchResponse, JmapError, Rejection,
    RejectionKind, Result, SetError,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const DEFAULT_SEARCH_LIMIT: usize = 20;
pub const DEFAULT_ADVANCED_SEARCH_LIMIT: usize = 50;
pub const DEFAULT_RECENT_LIMIT: usize = 10;

const SUMMARY_PROPERTIES: &[&str] = &[
    "id",
    "threadId",
    "mailboxIds",
    "keywords",
    "from",
    "to",
    "subject",
    "receivedAt",
    "preview",
    "hasAttachment",
    "size",
];

const FULL_PROPERTIES: &[&str] = &[
    "id",
    "threadId",
    "mailboxIds",
    "keywords",
    "from",
    "to",
    "cc",
    "bcc",
    "replyTo",
    "subject",
    "receivedAt",
    "sentAt",
    "preview",
    "hasAttachment",
    "size",
    "textBody",
    "htmlBody",
    "attachments",
    "bodyValues",
];

const MAILBOXES: &str = "mailboxes";
const IDENTITIES: &str = "identities";
const UPDATE: &str = "update";
const DRAFT: &str = "draft";
const SUBMISSION_STEP: &str = "submission";

fn mail_batch() -> Batch {
    Batch::with_capabilities([MAIL])
}

fn submission_batch() -> Batch {
    Batch::with_capabilities([MAIL, SUBMISSION])
}

fn newest_first() -> Value {
    json!([{"property": "receivedAt", "isAscending": false}])
}

fn email_list(account_id: &str, filter: Value, limit: usize) -> QueryThenGet {
    QueryThenGet::new("Email", account_id)
        .filter(filter)
        .sort(newest_first())
        .limit(limit)
        .properties(SUMMARY_PROPERTIES)
}

fn keyword_patch(keyword: &str, set: bool) -> Value {
    // Patching a keyword to null removes it.
    let mut patch = Map::new();
    patch.insert(
        format!("keywords/{}", keyword),
        if set { Value::Bool(true) } else { Value::Null },
    );
    Value::Object(patch)
}

fn move_patch(mailbox_id: &str) -> Value {
    json!({ "mailboxIds": { mailbox_id: true } })
}

fn require_ids<S: AsRef<str>>(ids: &[S]) -> Result<()> {
    if ids.is_empty() {
        return Err(JmapError::InvalidInput("no email ids given".to_string()));
    }
    Ok(())
}

/// Pick the sending identity for `from`.
///
/// Exact addresses are preferred over `*@domain` identities. Without `from`
/// the first identity is used.
pub fn select_identity<'a>(identities: &'a [Identity], from: Option<&str>) -> Result<&'a Identity> {
    let missing = || JmapError::Identity {
        address: from.unwrap_or_default().to_string(),
    };
    match from {
        None => identities.first().ok_or_else(missing),
        Some(address) => identities
            .iter()
            .find(|identity| !identity.is_wildcard() && identity.matches(address))
            .or_else(|| identities.iter().find(|identity| identity.matches(address)))
            .ok_or_else(missing),
    }
}

/// A failure on the submission step after the draft step succeeded. The
/// draft exists, so the error carries its id.
fn created_but_not_submitted(err: JmapError, email_id: &str) -> JmapError {
    match err {
        JmapError::Rejection(rejection) => {
            JmapError::rejection(rejection.with_context("emailId", email_id))
        }
        JmapError::Method(method) => {
            let mut reason = SetError::new(method.kind);
            reason.description = method.description;
            let mut failures = BTreeMap::new();
            failures.insert(SUBMISSION_STEP.to_string(), reason);
            JmapError::rejection(
                Rejection::new(
                    method.label,
                    "EmailSubmission/set",
                    RejectionKind::NotCreated,
                    failures,
                )
                .with_context("emailId", email_id),
            )
        }
        other => other,
    }
}

fn created_id(created: &Value, label: &str) -> Result<String> {
    created
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            JmapError::protocol(format!("step '{}' created an object without id", label))
        })
}

/// Everything an outgoing message needs from the account.
struct Outgoing {
    mailboxes: Vec<Mailbox>,
    identity: Identity,
    from: EmailAddress,
}

impl Outgoing {
    fn mailbox(&self, role: &str, name: &str) -> Result<&Mailbox> {
        find_container(&self.mailboxes, role, name)
    }
}

/// Mail operations of one client.
#[derive(Debug, Clone)]
pub struct Mail {
    client: JmapClient,
}

impl Mail {
    pub fn new(client: JmapClient) -> Self {
        Self { client }
    }

    async fn account_id(&self) -> Result<String> {
        Ok(self.client.session().await?.account_id.clone())
    }

    async fn mailboxes(&self, account_id: &str) -> Result<Vec<Mailbox>> {
        let mut batch = mail_batch();
        batch.call(MAILBOXES, "Mailbox/get", get_arguments::<&str>(account_id, None, None))?;
        self.client.execute(batch).await?.list(MAILBOXES)
    }

    async fn fetch_list(&self, recipe: QueryThenGet) -> Result<Vec<Email>> {
        let mut batch = mail_batch();
        recipe.append_to(&mut batch)?;
        self.client.execute(batch).await?.query_list(QUERY, GET)
    }

    pub async fn list_mailboxes(&self) -> Result<Vec<Mailbox>> {
        let account_id = self.account_id().await?;
        self.mailboxes(&account_id).await
    }

    /// Newest emails first, optionally restricted to one mailbox. The order
    /// is the order the server returned the records in.
    pub async fn list_emails(
        &self,
        mailbox_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Email>> {
        let account_id = self.account_id().await?;
        let filter = match mailbox_id {
            Some(id) => json!({ "inMailbox": id }),
            None => json!({}),
        };
        self.fetch_list(email_list(&account_id, filter, limit.unwrap_or(DEFAULT_LIST_LIMIT)))
            .await
    }

    /// One email with its body values.
    pub async fn get_email(&self, email_id: &str) -> Result<Email> {
        let account_id = self.account_id().await?;
        let properties: Vec<String> = FULL_PROPERTIES.iter().map(|p| p.to_string()).collect();
        let mut arguments =
            get_arguments(&account_id, Some(&[email_id][..]), Some(properties.as_slice()));
        arguments.insert("fetchTextBodyValues", true);
        arguments.insert("fetchHTMLBodyValues", true);

        let mut batch = mail_batch();
        batch.call(GET, "Email/get", arguments)?;
        self.client.execute(batch).await?.get_one(GET, email_id)
    }

    pub async fn search_emails(&self, query: &str, limit: Option<usize>) -> Result<Vec<Email>> {
        let account_id = self.account_id().await?;
        self.fetch_list(email_list(
            &account_id,
            json!({ "text": query }),
            limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
        ))
        .await
    }

    pub async fn advanced_search(
        &self,
        filter: &SearchFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Email>> {
        let account_id = self.account_id().await?;
        self.fetch_list(email_list(
            &account_id,
            filter.to_filter(),
            limit.unwrap_or(DEFAULT_ADVANCED_SEARCH_LIMIT),
        ))
        .await
    }

    /// Newest emails of the mailbox with role (or name) `mailbox_name`,
    /// `inbox` by default.
    pub async fn recent_emails(
        &self,
        limit: Option<usize>,
        mailbox_name: Option<&str>,
    ) -> Result<Vec<Email>> {
        let account_id = self.account_id().await?;
        let name = mailbox_name.unwrap_or("inbox");
        let mailboxes = self.mailboxes(&account_id).await?;
        let mailbox = find_container(&mailboxes, &name.to_lowercase(), name)?;
        self.fetch_list(email_list(
            &account_id,
            json!({ "inMailbox": mailbox.id }),
            limit.unwrap_or(DEFAULT_RECENT_LIMIT),
        ))
        .await
    }

    /// Every email of a thread, in one round trip.
    pub async fn get_thread(&self, thread_id: &str) -> Result<Vec<Email>> {
        let account_id = self.account_id().await?;
        let mut batch = mail_batch();
        let thread = batch.call(
            "thread",
            "Thread/get",
            get_arguments(&account_id, Some(&[thread_id][..]), None),
        )?;
        batch.call(
            GET,
            "Email/get",
            Arguments::new()
                .set("accountId", account_id.as_str())
                .set("properties", json!(SUMMARY_PROPERTIES))
                .reference("ids", thread.result("/list/*/emailIds")),
        )?;

        let response = self.client.execute(batch).await?;
        response.get_one::<Thread>(thread.label(), thread_id)?;
        response.list(GET)
    }

    async fn update_emails<S: AsRef<str>>(&self, ids: &[S], patch: Value) -> Result<()> {
        require_ids(ids)?;
        let account_id = self.account_id().await?;
        self.apply(&account_id, ids, patch).await
    }

    async fn apply<S: AsRef<str>>(&self, account_id: &str, ids: &[S], patch: Value) -> Result<()> {
        let mut batch = mail_batch();
        recipes::update(
            &mut batch,
            UPDATE,
            "Email",
            account_id,
            ids.iter().map(|id| (id.as_ref().to_string(), patch.clone())),
        )?;
        self.client.execute(batch).await?.ensure_updated(UPDATE, ids)?;
        debug!("updated {} email(s)", ids.len());
        Ok(())
    }

    pub async fn mark_read(&self, email_id: &str, read: bool) -> Result<()> {
        self.update_emails(&[email_id], keyword_patch("$seen", read)).await
    }

    pub async fn flag(&self, email_id: &str, flagged: bool) -> Result<()> {
        self.update_emails(&[email_id], keyword_patch("$flagged", flagged)).await
    }

    /// Replace the email's mailboxes with `mailbox_id`.
    pub async fn move_email(&self, email_id: &str, mailbox_id: &str) -> Result<()> {
        self.update_emails(&[email_id], move_patch(mailbox_id)).await
    }

    /// Move the email to the trash mailbox.
    pub async fn delete_email(&self, email_id: &str) -> Result<()> {
        self.bulk_delete(&[email_id]).await
    }

    /// Fails with one rejection naming exactly the ids that were not updated.
    pub async fn bulk_mark_read<S: AsRef<str>>(&self, email_ids: &[S], read: bool) -> Result<()> {
        self.update_emails(email_ids, keyword_patch("$seen", read)).await
    }

    pub async fn bulk_move<S: AsRef<str>>(&self, email_ids: &[S], mailbox_id: &str) -> Result<()> {
        self.update_emails(email_ids, move_patch(mailbox_id)).await
    }

    pub async fn bulk_delete<S: AsRef<str>>(&self, email_ids: &[S]) -> Result<()> {
        require_ids(email_ids)?;
        let account_id = self.account_id().await?;
        let mailboxes = self.mailboxes(&account_id).await?;
        let trash = find_container(&mailboxes, "trash", "trash")?;
        self.apply(&account_id, email_ids, move_patch(&trash.id)).await
    }

    pub async fn list_identities(&self) -> Result<Vec<Identity>> {
        let account_id = self.account_id().await?;
        let mut batch = submission_batch();
        batch.call(IDENTITIES, "Identity/get", get_arguments::<&str>(&account_id, None, None))?;
        self.client.execute(batch).await?.list(IDENTITIES)
    }

    /// Mailboxes and identities in one round trip, with the sender resolved.
    async fn outgoing(&self, account_id: &str, from: Option<&str>) -> Result<Outgoing> {
        let mut batch = submission_batch();
        batch.call(MAILBOXES, "Mailbox/get", get_arguments::<&str>(account_id, None, None))?;
        batch.call(IDENTITIES, "Identity/get", get_arguments::<&str>(account_id, None, None))?;
        let response = self.client.execute(batch).await?;

        let mailboxes: Vec<Mailbox> = response.list(MAILBOXES)?;
        let identities: Vec<Identity> = response.list(IDENTITIES)?;
        let identity = select_identity(&identities, from)?.clone();

        let email = match from {
            Some(address) if identity.is_wildcard() => address.to_string(),
            _ => identity.email.clone(),
        };
        let from = EmailAddress {
            name: Some(identity.name.clone()).filter(|name| !name.is_empty()),
            email,
        };
        Ok(Outgoing {
            mailboxes,
            identity,
            from,
        })
    }

    /// Save a message in the drafts mailbox without sending it. Returns the
    /// new email's id.
    pub async fn create_draft(&self, params: &SendEmail) -> Result<String> {
        params.validate()?;
        let account_id = self.account_id().await?;
        let outgoing = self.outgoing(&account_id, params.from.as_deref()).await?;
        let drafts = outgoing.mailbox("drafts", "draft")?;

        let mut batch = mail_batch();
        recipes::create(
            &mut batch,
            DRAFT,
            "Email",
            &account_id,
            DRAFT,
            params.to_email_object(&drafts.id, &outgoing.from)?,
        )?;
        let response = self.client.execute(batch).await?;
        created_id(&response.ensure_created(DRAFT, DRAFT)?, DRAFT)
    }

    /// Create the message as a draft and submit it in the same batch.
    ///
    /// On success the server moves the message from drafts to sent. If the
    /// draft was created but the submission refused, the returned rejection
    /// carries the draft's id under the `emailId` context key.
    pub async fn send_email(&self, params: &SendEmail) -> Result<SentEmail> {
        params.validate()?;
        let account_id = self.account_id().await?;
        let outgoing = self.outgoing(&account_id, params.from.as_deref()).await?;
        let drafts = outgoing.mailbox("drafts", "draft")?;
        let sent = outgoing.mailbox("sent", "sent")?;

        let mut batch = submission_batch();
        recipes::create(
            &mut batch,
            DRAFT,
            "Email",
            &account_id,
            DRAFT,
            params.to_email_object(&drafts.id, &outgoing.from)?,
        )?;

        let mut on_success = Map::new();
        on_success.insert(format!("mailboxIds/{}", drafts.id), Value::Null);
        on_success.insert(format!("mailboxIds/{}", sent.id), Value::Bool(true));
        on_success.insert("keywords/$draft".to_string(), Value::Null);
        batch.call(
            SUBMISSION_STEP,
            "EmailSubmission/set",
            Arguments::new()
                .set("accountId", account_id.as_str())
                .set(
                    "create",
                    json!({
                        SUBMISSION_STEP: {
                            "identityId": outgoing.identity.id,
                            "emailId": creation_ref(DRAFT),
                        }
                    }),
                )
                .set(
                    "onSuccessUpdateEmail",
                    json!({ creation_ref(SUBMISSION_STEP): on_success }),
                ),
        )?;

        let response = self.client.execute(batch).await?;
        let email_id = created_id(&response.ensure_created(DRAFT, DRAFT)?, DRAFT)?;
        let submission = response
            .ensure_created(SUBMISSION_STEP, SUBMISSION_STEP)
            .map_err(|err| created_but_not_submitted(err, &email_id))?;
        let submission_id = created_id(&submission, SUBMISSION_STEP)?;

        let moved_to_sent = moved_to_sent(&response, &email_id)?;
        if !moved_to_sent {
            warn!("email {} was submitted but not moved to the sent mailbox", email_id);
        }

        Ok(SentEmail {
            email_id,
            submission_id,
            moved_to_sent,
        })
    }

    /// Attachment parts of an email.
    pub async fn email_attachments(&self, email_id: &str) -> Result<Vec<BodyPart>> {
        let account_id = self.account_id().await?;
        let properties = vec!["id".to_string(), "attachments".to_string()];
        let mut batch = mail_batch();
        batch.call(
            GET,
            "Email/get",
            get_arguments(&account_id, Some(&[email_id][..]), Some(properties.as_slice())),
        )?;
        let email: Email = self.client.execute(batch).await?.get_one(GET, email_id)?;
        Ok(email.attachments.unwrap_or_default())
    }

    /// Download URL of one attachment of an email. A blob that is not among
    /// the email's attachments is reported as `notFound`.
    pub async fn attachment_download_url(&self, email_id: &str, blob_id: &str) -> Result<String> {
        let attachments = self.email_attachments(email_id).await?;
        let part = attachments
            .iter()
            .find(|part| part.blob_id.as_deref() == Some(blob_id))
            .ok_or_else(|| {
                let mut failures = BTreeMap::new();
                failures.insert(blob_id.to_string(), SetError::not_found());
                JmapError::rejection(
                    Rejection::new(GET, "Email/get", RejectionKind::NotFound, failures)
                        .with_context("emailId", email_id),
                )
            })?;

        let session = self.client.session().await?;
        session
            .download_url(
                blob_id,
                part.name.as_deref().unwrap_or("attachment"),
                part.mime_type.as_deref().unwrap_or("application/octet-stream"),
            )
            .ok_or_else(|| JmapError::protocol("session document has no downloadUrl"))
    }

    /// Counters of one mailbox, or of every mailbox.
    pub async fn mailbox_stats(&self, mailbox_id: Option<&str>) -> Result<Vec<Mailbox>> {
        let account_id = self.account_id().await?;
        match mailbox_id {
            None => self.mailboxes(&account_id).await,
            Some(id) => {
                let mut batch = mail_batch();
                batch.call(
                    MAILBOXES,
                    "Mailbox/get",
                    get_arguments(&account_id, Some(&[id][..]), None),
                )?;
                let mailbox = self.client.execute(batch).await?.get_one(MAILBOXES, id)?;
                Ok(vec![mailbox])
            }
        }
    }

    pub async fn account_summary(&self) -> Result<AccountSummary> {
        let session = self.client.session().await?;
        let mut batch = submission_batch();
        batch.call(
            MAILBOXES,
            "Mailbox/get",
            get_arguments::<&str>(&session.account_id, None, None),
        )?;
        batch.call(
            IDENTITIES,
            "Identity/get",
            get_arguments::<&str>(&session.account_id, None, None),
        )?;
        let response = self.client.execute(batch).await?;
        let mailboxes: Vec<Mailbox> = response.list(MAILBOXES)?;
        let identities: Vec<Identity> = response.list(IDENTITIES)?;

        Ok(AccountSummary {
            account_id: session.account_id.clone(),
            username: session.username.clone(),
            mailbox_count: mailboxes.len(),
            total_emails: mailboxes.iter().map(|m| m.total_emails).sum(),
            unread_emails: mailboxes.iter().map(|m| m.unread_emails).sum(),
            identity_count: identities.len(),
            capabilities: session.capabilities.keys().cloned().collect(),
        })
    }
}

/// Whether the implicit `Email/set` of the submission step updated the email.
fn moved_to_sent(response: &BatchResponse, email_id: &str) -> Result<bool> {
    Ok(match response.implicit_set(SUBMISSION_STEP, "Email/set")? {
        Some(set) => set.updated.contains_key(email_id) && !set.not_updated.contains_key(email_id),
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str, email: &str) -> Identity {
        Identity {
            id: id.to_string(),
            name: String::new(),
            email: email.to_string(),
            reply_to: None,
            bcc: None,
            may_delete: false,
        }
    }

    #[test]
    fn test_select_identity() {
        let identities = vec![
            identity("wild", "*@example.com"),
            identity("me", "me@example.com"),
        ];
        assert_eq!(select_identity(&identities, None).unwrap().id, "wild");
        assert_eq!(select_identity(&identities, Some("ME@example.com")).unwrap().id, "me");
        assert_eq!(select_identity(&identities, Some("other@example.com")).unwrap().id, "wild");

        let err = select_identity(&identities, Some("me@example.org")).unwrap_err();
        assert!(matches!(err, JmapError::Identity { ref address } if address == "me@example.org"));
        assert!(select_identity(&[], None).is_err());
    }

    #[test]
    fn test_keyword_patch_removes_with_null() {
        assert_eq!(keyword_patch("$seen", true), json!({"keywords/$seen": true}));
        assert_eq!(keyword_patch("$seen", false), json!({"keywords/$seen": null}));
    }

    #[test]
    fn test_created_but_not_submitted_keeps_email_id() {
        let method = JmapError::Method(jmap_core::MethodError {
            label: SUBMISSION_STEP.to_string(),
            kind: "forbiddenFrom".to_string(),
            description: None,
        });
        let err = created_but_not_submitted(method, "M9");
        let rejection = err.as_rejection().unwrap();
        assert_eq!(rejection.kind, RejectionKind::NotCreated);
        assert_eq!(rejection.context("emailId"), Some("M9"));
        assert_eq!(rejection.reason(SUBMISSION_STEP).unwrap().kind, "forbiddenFrom");

        let protocol = created_but_not_submitted(JmapError::protocol("x"), "M9");
        assert!(matches!(protocol, JmapError::Protocol(_)));
    }

    #[test]
    fn test_email_list_recipe() {
        let mut batch = mail_batch();
        email_list("A1", json!({"inMailbox": "MB1"}), 3)
            .append_to(&mut batch)
            .unwrap();
        assert_eq!(batch.labels(), vec!["query", "get"]);
        assert_eq!(batch.steps()[0].arguments.get("limit"), Some(&json!(3)));
        assert_eq!(batch.steps()[0].arguments.get("sort"), Some(&newest_first()));
    }
}
