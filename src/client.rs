//! Remote ledger access. The core only sees the [`Ledger`] trait; the HTTP
//! implementation owns authentication, pagination and header parsing.

use chrono::NaiveDate;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderName, ACCEPT, LAST_MODIFIED, LINK};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::catalog::Context;
use crate::error::{Result, SyncError};
use crate::models::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Entries,
    Accounts,
    Categories,
    Tags,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entries => "entries",
            Self::Accounts => "accounts",
            Self::Categories => "categories",
            Self::Tags => "tags",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub per_page: u32,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub since: Option<String>,
}

impl Query {
    pub fn new(per_page: u32) -> Self {
        Self {
            per_page,
            from: None,
            to: None,
            since: None,
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("per_page", self.per_page.to_string()), ("page", "0".to_string())];
        if let Some(from) = self.from {
            params.push(("from", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.to {
            params.push(("to", to.format("%Y-%m-%d").to_string()));
        }
        if let Some(since) = &self.since {
            params.push(("since", since.clone()));
        }
        params
    }
}

/// Every page of a listing plus the last page's modification watermark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fetched {
    pub records: Vec<Value>,
    pub watermark: Option<String>,
}

pub trait Ledger {
    fn fetch_all(&mut self, resource: Resource, query: &Query) -> Result<Fetched>;

    fn replace(&mut self, resource: Resource, id: &str, record: &Value) -> Result<Value>;

    fn entries(&mut self, query: &Query) -> Result<(Vec<Entry>, Option<String>)> {
        let fetched = self.fetch_all(Resource::Entries, query)?;
        Ok((typed(Resource::Entries, fetched.records)?, fetched.watermark))
    }

    fn context(&mut self, per_page: u32) -> Result<Context> {
        let query = Query::new(per_page);
        let accounts = typed(Resource::Accounts, self.fetch_all(Resource::Accounts, &query)?.records)?;
        let categories = typed(
            Resource::Categories,
            self.fetch_all(Resource::Categories, &query)?.records,
        )?;
        let tags = typed(Resource::Tags, self.fetch_all(Resource::Tags, &query)?.records)?;
        let ctx = Context::new(accounts, categories, tags);
        tracing::debug!(
            accounts = ctx.accounts.len(),
            categories = ctx.categories.len(),
            tags = ctx.tags.len(),
            "catalogs loaded"
        );
        Ok(ctx)
    }

    fn update_entry(&mut self, entry: &Entry) -> Result<Value> {
        let record = serde_json::to_value(entry)?;
        self.replace(Resource::Entries, &entry.id, &record)
    }
}

fn typed<T: DeserializeOwned>(resource: Resource, records: Vec<Value>) -> Result<Vec<T>> {
    records
        .into_iter()
        .map(|record| {
            serde_json::from_value(record).map_err(|e| SyncError::InvalidRecord {
                resource: resource.as_str().to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

pub struct HttpLedger {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpLedger {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("ledgersync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Lazily walks `rel="next"` links until the listing is exhausted.
    pub fn pages(&self, resource: Resource, query: &Query) -> Pages<'_> {
        Pages {
            ledger: self,
            resource,
            next: Some(PageRequest::First(query.params())),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token).header(ACCEPT, "application/json")
    }

    fn fetch_page(&self, resource: Resource, request: PageRequest) -> Result<(Page, Option<String>)> {
        let builder = match request {
            PageRequest::First(params) => self
                .http
                .get(format!("{}/{}", self.base_url, resource.as_str()))
                .query(&params),
            PageRequest::Next(url) => self.http.get(url),
        };
        let response = checked(resource, self.authorized(builder).send()?)?;
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let watermark = header(LAST_MODIFIED);
        let next = header(LINK).as_deref().and_then(next_link);

        let records = match response.json::<Value>()? {
            Value::Array(records) => records,
            other => {
                return Err(SyncError::InvalidRecord {
                    resource: resource.as_str().to_string(),
                    message: format!("expected a list, got {other}"),
                })
            }
        };
        tracing::debug!(resource = resource.as_str(), count = records.len(), "fetched page");
        Ok((Page { records, watermark }, next))
    }
}

impl Ledger for HttpLedger {
    fn fetch_all(&mut self, resource: Resource, query: &Query) -> Result<Fetched> {
        let mut fetched = Fetched::default();
        for page in self.pages(resource, query) {
            let page = page?;
            fetched.records.extend(page.records);
            fetched.watermark = page.watermark;
        }
        Ok(fetched)
    }

    fn replace(&mut self, resource: Resource, id: &str, record: &Value) -> Result<Value> {
        let url = format!("{}/{}/{}", self.base_url, resource.as_str(), id);
        let response = checked(resource, self.authorized(self.http.put(url)).json(record).send()?)?;
        Ok(response.json()?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Value>,
    pub watermark: Option<String>,
}

enum PageRequest {
    First(Vec<(&'static str, String)>),
    Next(String),
}

pub struct Pages<'a> {
    ledger: &'a HttpLedger,
    resource: Resource,
    next: Option<PageRequest>,
}

impl Iterator for Pages<'_> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        let request = self.next.take()?;
        match self.ledger.fetch_page(self.resource, request) {
            Ok((page, next)) => {
                self.next = next.map(PageRequest::Next);
                Some(Ok(page))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

fn checked(resource: Resource, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(SyncError::Transport {
        resource: resource.as_str().to_string(),
        status: status.as_u16(),
        body: response.text().unwrap_or_default(),
    })
}

/// Target of the `rel="next"` member of a `Link` header.
fn next_link(header: &str) -> Option<String> {
    // Targets may contain commas; only a comma after the closing `>` ends a link.
    let mut rest = header.trim_start();
    while let Some(body) = rest.strip_prefix('<') {
        let (target, tail) = body.split_once('>')?;
        let (params, next) = tail.split_once(',').unwrap_or((tail, ""));
        let is_next = params.split(';').any(|param| {
            let param = param.trim().replace(' ', "");
            param == "rel=\"next\"" || param == "rel=next"
        });
        if is_next {
            return Some(target.to_string());
        }
        rest = next.trim_start();
    }
    None
}
