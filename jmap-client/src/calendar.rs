// Calendars and events (JSCalendar)

use crate::client::JmapClient;
use crate::recipes::{self, get_arguments, QueryThenGet, GET, QUERY};
use crate::strategy::{first_supported, Candidate};
use chrono::{DateTime, SubsecRound, Utc};
use jmap_core::capability::{CALENDARS, FASTMAIL_CALENDARS};
use jmap_core::{Batch, JmapError, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub const DEFAULT_EVENT_LIMIT: usize = 50;

const CALENDARS_STEP: &str = "calendars";
const CREATE: &str = "create";
const NEW_EVENT: &str = "event";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarApi {
    Ietf,
    Fastmail,
}

impl CalendarApi {
    pub const ALL: [CalendarApi; 2] = [CalendarApi::Ietf, CalendarApi::Fastmail];

    fn batch(&self) -> Batch {
        Batch::with_capabilities([self.capability()])
    }
}

impl Candidate for CalendarApi {
    fn name(&self) -> &'static str {
        match self {
            CalendarApi::Ietf => "calendars",
            CalendarApi::Fastmail => "fastmail calendars",
        }
    }

    fn capability(&self) -> &'static str {
        match self {
            CalendarApi::Ietf => CALENDARS,
            CalendarApi::Fastmail => FASTMAIL_CALENDARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_visible: Option<bool>,
    #[serde(default)]
    pub role: Option<String>,
}

/// A new event. Times are in UTC and are sent with whole-second precision.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub calendar_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
    /// Attendee email addresses.
    pub participants: Vec<String>,
}

impl NewEvent {
    /// The JSCalendar object for `CalendarEvent/set` create.
    pub fn to_event_object(&self) -> Result<Value> {
        let start = self.start.trunc_subsecs(0);
        let end = self.end.trunc_subsecs(0);
        if end <= start {
            return Err(JmapError::InvalidInput(format!(
                "event must last at least one second ({} .. {})",
                self.start, self.end
            )));
        }

        let mut event = Map::new();
        event.insert("@type".to_string(), json!("Event"));
        event.insert("calendarIds".to_string(), json!({ self.calendar_id.as_str(): true }));
        event.insert("title".to_string(), json!(self.title));
        if let Some(description) = &self.description {
            event.insert("description".to_string(), json!(description));
        }
        event.insert(
            "start".to_string(),
            json!(start.format("%Y-%m-%dT%H:%M:%S").to_string()),
        );
        event.insert("timeZone".to_string(), json!("Etc/UTC"));
        event.insert(
            "duration".to_string(),
            json!(iso_duration((end - start).num_seconds())),
        );
        if let Some(location) = &self.location {
            event.insert(
                "locations".to_string(),
                json!({ "1": { "@type": "Location", "name": location } }),
            );
        }
        if !self.participants.is_empty() {
            let participants: Map<String, Value> = self
                .participants
                .iter()
                .enumerate()
                .map(|(i, email)| {
                    (
                        format!("p{}", i + 1),
                        json!({
                            "@type": "Participant",
                            "email": email,
                            "roles": { "attendee": true },
                            "sendTo": { "imip": format!("mailto:{}", email) }
                        }),
                    )
                })
                .collect();
            event.insert("participants".to_string(), Value::Object(participants));
        }
        Ok(Value::Object(event))
    }
}

/// `PT1H30M`-style duration of a positive number of seconds.
fn iso_duration(total_seconds: i64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    let mut out = String::from("P");
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if hours > 0 || minutes > 0 || seconds > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if seconds > 0 {
            out.push_str(&format!("{}S", seconds));
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct Calendar {
    client: JmapClient,
}

impl Calendar {
    pub fn new(client: JmapClient) -> Self {
        Self { client }
    }

    async fn calendars(&self, api: CalendarApi, account_id: &str) -> Result<Vec<CalendarInfo>> {
        let mut batch = api.batch();
        batch.call(
            CALENDARS_STEP,
            "Calendar/get",
            get_arguments::<&str>(account_id, None, None),
        )?;
        self.client.execute(batch).await?.list(CALENDARS_STEP)
    }

    async fn events(
        &self,
        api: CalendarApi,
        account_id: &str,
        filter: Value,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let mut batch = api.batch();
        QueryThenGet::new("CalendarEvent", account_id)
            .filter(filter)
            .limit(limit)
            .append_to(&mut batch)?;
        self.client.execute(batch).await?.query_list(QUERY, GET)
    }

    async fn event(&self, api: CalendarApi, account_id: &str, event_id: &str) -> Result<Value> {
        let mut batch = api.batch();
        batch.call(
            GET,
            "CalendarEvent/get",
            get_arguments(account_id, Some(&[event_id][..]), None),
        )?;
        self.client.execute(batch).await?.get_one(GET, event_id)
    }

    async fn create(&self, api: CalendarApi, account_id: &str, object: Value) -> Result<String> {
        let mut batch = api.batch();
        recipes::create(&mut batch, CREATE, "CalendarEvent", account_id, NEW_EVENT, object)?;
        let created = self.client.execute(batch).await?.ensure_created(CREATE, NEW_EVENT)?;
        created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| JmapError::protocol("created event has no id"))
    }

    pub async fn list_calendars(&self) -> Result<Vec<CalendarInfo>> {
        let session = self.client.session().await?;
        first_supported("list calendars", &session, &CalendarApi::ALL, |api| {
            self.calendars(api, &session.account_id)
        })
        .await
    }

    /// Events as raw JSCalendar objects, optionally restricted to one
    /// calendar.
    pub async fn list_events(
        &self,
        calendar_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Value>> {
        let session = self.client.session().await?;
        let filter = match calendar_id {
            Some(id) => json!({ "inCalendars": [id] }),
            None => json!({}),
        };
        let limit = limit.unwrap_or(DEFAULT_EVENT_LIMIT);
        first_supported("list events", &session, &CalendarApi::ALL, |api| {
            self.events(api, &session.account_id, filter.clone(), limit)
        })
        .await
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Value> {
        let session = self.client.session().await?;
        first_supported("get event", &session, &CalendarApi::ALL, |api| {
            self.event(api, &session.account_id, event_id)
        })
        .await
    }

    /// Create an event; returns the server-assigned id. A refused create is a
    /// `notCreated` rejection carrying the server's reason.
    pub async fn create_event(&self, event: &NewEvent) -> Result<String> {
        let object = event.to_event_object()?;
        let session = self.client.session().await?;
        first_supported("create event", &session, &CalendarApi::ALL, |api| {
            self.create(api, &session.account_id, object.clone())
        })
        .await
    }
}
