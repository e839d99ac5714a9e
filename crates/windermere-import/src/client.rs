//! HTTP client for the SS12000 v2 API.
//!
//! All endpoints are paginated with opaque page tokens; [`PageReader`]
//! exposes them as a bounded lazy sequence of pages that refills on
//! demand and can restart from its last token. Every request races against
//! a cancellation token so a quitting runner is never stuck on a network
//! read.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{ApiConfiguration, AuthenticationType};
use crate::error::ImportError;
use crate::model::{Activity, DeletedEntitiesData, Duty, Group, Organisation, Person};

/// Per-entity page size caps imposed by the API profile.
pub const MAX_ORGANISATION_PAGE_SIZE: i32 = 100;
pub const MAX_PERSON_PAGE_SIZE: i32 = 50;
pub const MAX_GROUP_PAGE_SIZE: i32 = 50;
pub const MAX_DUTY_PAGE_SIZE: i32 = 100;
pub const MAX_ACTIVITY_PAGE_SIZE: i32 = 50;
pub const MAX_DELETED_ENTITIES_PAGE_SIZE: i32 = 200;

/// The token endpoint used for EduCloud client-credentials authentication.
const EDUCLOUD_AUTH_SERVER: &str = "https://skolid.se/connect/token";

/// Renew EduCloud tokens this many minutes before they actually expire.
const TOKEN_SAFETY_MARGIN_MINUTES: i64 = 5;

/// The organisation types we query for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganisationType {
    /// A principal ("huvudman").
    Huvudman,
    /// A school unit ("skolenhet").
    Skolenhet,
}

impl OrganisationType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganisationType::Huvudman => "Huvudman",
            OrganisationType::Skolenhet => "Skolenhet",
        }
    }
}

/// Query parameters shared by the paginated object endpoints.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub limit: Option<i32>,
    pub page_token: Option<String>,
    pub meta_created_after: Option<DateTime<Utc>>,
    pub meta_modified_after: Option<DateTime<Utc>>,
    /// Only meaningful for the organisations endpoint.
    pub organisation_type: Option<OrganisationType>,
}

/// One page of results.
#[derive(Debug)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page_token: Option<String>,
}

#[derive(Deserialize)]
struct PageBody<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(rename = "pageToken")]
    page_token: Option<String>,
}

#[derive(Deserialize)]
struct DeletedPageBody {
    #[serde(default)]
    data: DeletedEntitiesData,
    #[serde(rename = "pageToken")]
    page_token: Option<String>,
}

#[derive(Default)]
struct TokenState {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

enum Auth {
    ApiKey {
        header: String,
        secret: String,
    },
    EduCloud {
        client_id: String,
        client_secret: String,
        state: Mutex<TokenState>,
    },
}

/// Client for one tenant's SS12000 v2 API.
pub struct Ss12000Client {
    http: reqwest::Client,
    base_url: String,
    auth: Auth,
}

impl Ss12000Client {
    /// Build a client from a stored API configuration.
    pub fn new(config: &ApiConfiguration) -> Result<Self, ImportError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ImportError::Config(format!("failed to build HTTP client: {e}")))?;
        let auth = match config.authentication {
            AuthenticationType::ApiKey => {
                if config.api_key_header.is_empty() {
                    return Err(ImportError::Config(
                        "APIKey authentication needs an apiKeyHeader".to_string(),
                    ));
                }
                Auth::ApiKey {
                    header: config.api_key_header.clone(),
                    secret: config.client_secret.clone(),
                }
            }
            AuthenticationType::EduCloud => Auth::EduCloud {
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                state: Mutex::new(TokenState::default()),
            },
        };
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ImportError> {
        match &self.auth {
            Auth::ApiKey { header, secret } => Ok(request.header(header, secret)),
            Auth::EduCloud {
                client_id,
                client_secret,
                state,
            } => {
                let mut state = state.lock().await;
                let expired = state
                    .expires_at
                    .map_or(true, |expires_at| Utc::now() >= expires_at);
                if expired {
                    let (token, expires_at) =
                        fetch_educloud_token(&self.http, client_id, client_secret).await?;
                    state.token = token;
                    state.expires_at = expires_at;
                }
                Ok(request.bearer_auth(state.token.clone()))
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &CancellationToken,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, ImportError> {
        let request = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .query(query);
        let request = self.authorize(request).await?;

        let fetch = async {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ImportError::Remote(format!(
                    "failed to get {path}: {status}"
                )));
            }
            Ok(response.json::<T>().await?)
        };

        tokio::select! {
            () = token.cancelled() => Err(ImportError::Cancelled),
            result = fetch => result,
        }
    }

    fn object_query(params: &QueryParams) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(limit) = params.limit {
            query.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(page_token) = &params.page_token {
            query.push(("pageToken".to_string(), page_token.clone()));
        }
        if let Some(created_after) = params.meta_created_after {
            query.push(("metaCreatedAfter".to_string(), created_after.to_rfc3339()));
        }
        if let Some(modified_after) = params.meta_modified_after {
            query.push(("metaModifiedAfter".to_string(), modified_after.to_rfc3339()));
        }
        if let Some(organisation_type) = params.organisation_type {
            query.push(("type".to_string(), organisation_type.as_str().to_string()));
        }
        query
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        token: &CancellationToken,
        path: &str,
        params: &QueryParams,
    ) -> Result<Page<T>, ImportError> {
        let body: PageBody<T> = self
            .get_json(token, path, &Self::object_query(params))
            .await?;
        Ok(Page {
            data: body.data,
            page_token: body.page_token,
        })
    }

    pub async fn organisations(
        &self,
        token: &CancellationToken,
        params: &QueryParams,
    ) -> Result<Page<Organisation>, ImportError> {
        self.get_page(token, "organisations", params).await
    }

    pub async fn persons(
        &self,
        token: &CancellationToken,
        params: &QueryParams,
    ) -> Result<Page<Person>, ImportError> {
        self.get_page(token, "persons", params).await
    }

    pub async fn groups(
        &self,
        token: &CancellationToken,
        params: &QueryParams,
    ) -> Result<Page<Group>, ImportError> {
        self.get_page(token, "groups", params).await
    }

    pub async fn duties(
        &self,
        token: &CancellationToken,
        params: &QueryParams,
    ) -> Result<Page<Duty>, ImportError> {
        self.get_page(token, "duties", params).await
    }

    pub async fn activities(
        &self,
        token: &CancellationToken,
        params: &QueryParams,
    ) -> Result<Page<Activity>, ImportError> {
        self.get_page(token, "activities", params).await
    }

    /// One page of the deleted-entities feed.
    pub async fn deleted_entities(
        &self,
        token: &CancellationToken,
        after: Option<DateTime<Utc>>,
        entities: &[&str],
        limit: i32,
        page_token: Option<&str>,
    ) -> Result<(DeletedEntitiesData, Option<String>), ImportError> {
        let mut query = vec![
            ("entities".to_string(), entities.join(",")),
            ("limit".to_string(), limit.to_string()),
        ];
        if let Some(after) = after {
            query.push(("after".to_string(), after.to_rfc3339()));
        }
        if let Some(page_token) = page_token {
            query.push(("pageToken".to_string(), page_token.to_string()));
        }
        let body: DeletedPageBody = self.get_json(token, "deletedEntities", &query).await?;
        Ok((body.data, body.page_token))
    }
}

#[derive(Deserialize)]
struct TokenAnswer {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

async fn fetch_educloud_token(
    http: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
) -> Result<(String, Option<DateTime<Utc>>), ImportError> {
    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
    ];
    let response = http.post(EDUCLOUD_AUTH_SERVER).form(&form).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ImportError::Remote(format!(
            "unexpected status code from {EDUCLOUD_AUTH_SERVER}: {status}"
        )));
    }
    let answer: TokenAnswer = response.json().await?;
    let Some(token) = answer.access_token else {
        return Err(ImportError::Remote(format!(
            "no access token returned from {EDUCLOUD_AUTH_SERVER}"
        )));
    };
    let expires_at = answer.expires_in.map(|secs| {
        Utc::now() + Duration::seconds(secs) - Duration::minutes(TOKEN_SAFETY_MARGIN_MINUTES)
    });
    Ok((token, expires_at))
}

/// A bounded lazy sequence of pages for one endpoint.
///
/// Each call to [`PageReader::next_page`] fetches the next page using the
/// token returned by the previous one; `None` marks the end of the
/// sequence.
pub struct PageReader<'a, T> {
    client: &'a Ss12000Client,
    token: &'a CancellationToken,
    path: &'static str,
    params: QueryParams,
    done: bool,
    _marker: std::marker::PhantomData<T>,
}

impl<'a, T: DeserializeOwned> PageReader<'a, T> {
    fn new(
        client: &'a Ss12000Client,
        token: &'a CancellationToken,
        path: &'static str,
        params: QueryParams,
    ) -> Self {
        Self {
            client,
            token,
            path,
            params,
            done: false,
            _marker: std::marker::PhantomData,
        }
    }

    /// Fetch the next page, or `None` when the sequence is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>, ImportError> {
        if self.done {
            return Ok(None);
        }
        let page: Page<T> = self
            .client
            .get_page(self.token, self.path, &self.params)
            .await?;
        match page.page_token {
            Some(next) => self.params.page_token = Some(next),
            None => self.done = true,
        }
        Ok(Some(page.data))
    }

    /// Drain the remaining pages into one list.
    pub async fn collect_all(mut self) -> Result<Vec<T>, ImportError> {
        let mut all = Vec::new();
        while let Some(mut page) = self.next_page().await? {
            all.append(&mut page);
        }
        Ok(all)
    }
}

impl Ss12000Client {
    /// Lazy pages of organisations of one type, optionally time filtered.
    #[must_use]
    pub fn organisation_reader<'a>(
        &'a self,
        token: &'a CancellationToken,
        organisation_type: OrganisationType,
        created_after: Option<DateTime<Utc>>,
        modified_after: Option<DateTime<Utc>>,
    ) -> PageReader<'a, Organisation> {
        PageReader::new(
            self,
            token,
            "organisations",
            QueryParams {
                limit: Some(MAX_ORGANISATION_PAGE_SIZE),
                organisation_type: Some(organisation_type),
                meta_created_after: created_after,
                meta_modified_after: modified_after,
                ..Default::default()
            },
        )
    }

    #[must_use]
    pub fn person_reader<'a>(
        &'a self,
        token: &'a CancellationToken,
        created_after: Option<DateTime<Utc>>,
        modified_after: Option<DateTime<Utc>>,
    ) -> PageReader<'a, Person> {
        PageReader::new(
            self,
            token,
            "persons",
            QueryParams {
                limit: Some(MAX_PERSON_PAGE_SIZE),
                meta_created_after: created_after,
                meta_modified_after: modified_after,
                ..Default::default()
            },
        )
    }

    #[must_use]
    pub fn group_reader<'a>(
        &'a self,
        token: &'a CancellationToken,
        created_after: Option<DateTime<Utc>>,
        modified_after: Option<DateTime<Utc>>,
    ) -> PageReader<'a, Group> {
        PageReader::new(
            self,
            token,
            "groups",
            QueryParams {
                limit: Some(MAX_GROUP_PAGE_SIZE),
                meta_created_after: created_after,
                meta_modified_after: modified_after,
                ..Default::default()
            },
        )
    }

    #[must_use]
    pub fn duty_reader<'a>(
        &'a self,
        token: &'a CancellationToken,
        created_after: Option<DateTime<Utc>>,
        modified_after: Option<DateTime<Utc>>,
    ) -> PageReader<'a, Duty> {
        PageReader::new(
            self,
            token,
            "duties",
            QueryParams {
                limit: Some(MAX_DUTY_PAGE_SIZE),
                meta_created_after: created_after,
                meta_modified_after: modified_after,
                ..Default::default()
            },
        )
    }

    #[must_use]
    pub fn activity_reader<'a>(
        &'a self,
        token: &'a CancellationToken,
        created_after: Option<DateTime<Utc>>,
        modified_after: Option<DateTime<Utc>>,
    ) -> PageReader<'a, Activity> {
        PageReader::new(
            self,
            token,
            "activities",
            QueryParams {
                limit: Some(MAX_ACTIVITY_PAGE_SIZE),
                meta_created_after: created_after,
                meta_modified_after: modified_after,
                ..Default::default()
            },
        )
    }

    /// All deleted entity ids of the given endpoints since `after`.
    pub async fn all_deleted_entities(
        &self,
        token: &CancellationToken,
        after: Option<DateTime<Utc>>,
        entities: &[&str],
    ) -> Result<DeletedEntitiesData, ImportError> {
        let mut merged = DeletedEntitiesData::default();
        let mut page_token: Option<String> = None;
        loop {
            let (page, next) = self
                .deleted_entities(
                    token,
                    after,
                    entities,
                    MAX_DELETED_ENTITIES_PAGE_SIZE,
                    page_token.as_deref(),
                )
                .await?;
            merge_ids(&mut merged.organisations, page.organisations);
            merge_ids(&mut merged.persons, page.persons);
            merge_ids(&mut merged.groups, page.groups);
            merge_ids(&mut merged.duties, page.duties);
            merge_ids(&mut merged.activities, page.activities);
            match next {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(merged)
    }
}

fn merge_ids(into: &mut Option<Vec<Uuid>>, from: Option<Vec<Uuid>>) {
    if let Some(mut ids) = from {
        into.get_or_insert_with(Vec::new).append(&mut ids);
    }
}
