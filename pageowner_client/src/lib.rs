//! Client for the page and space endpoints of the wiki REST API (v2).
mod types;

pub use reqwest::StatusCode;
pub use types::{
    CURSOR_PARAM, Links, Page, PageList, PageUpdate, Space, Version, VersionUpdate,
    cursor_from_link,
};

use reqwest::{IntoUrl, Method, header::ACCEPT};
use secrecy::{ExposeSecret, Secret};
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use crate::types::SpaceList;

/// Primary error type for the [`Client`]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("base URL error: {0}")]
    BaseUrl(#[source] reqwest::Error),

    #[error("base URL '{0}' cannot have API paths joined onto it")]
    CannotBeABase(Url),

    #[error("request URL error: {0}")]
    RequestUrl(#[from] url::ParseError),

    #[error("failed to parse JSON response: {0}")]
    Json(#[source] reqwest::Error),

    #[error("failed to parse plaintext response: {0}")]
    Text(#[source] reqwest::Error),

    #[error("server responded with error [{code}]: {message}")]
    ApiError { code: StatusCode, message: String },

    #[error("failed to send {method} {url} request: {source}")]
    RequestSend {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("next page link '{link}' does not carry a cursor parameter")]
    MalformedNextLink { link: String },
}

impl Error {
    fn request_send(method: Method, url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::RequestSend {
            method,
            url: url.into(),
            source,
        }
    }

    /// The HTTP status the server answered with, if the request reached it
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the server rejected a write because the page version moved on
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Identity and API token sent as HTTP basic auth on every request
#[derive(Debug, Clone)]
struct Credentials {
    user: String,
    token: Secret<String>,
}

/// The wiki API client
///
/// For programmatic access to the `pages` and `spaces` collections of the v2 REST API
#[derive(Debug, Clone)]
pub struct Client {
    /// The base URL that API paths are joined onto, always ending in `/`,
    /// e.g. `https://example.atlassian.net/wiki/api/v2/`
    base_url: Url,
    /// Basic auth credentials used on each request
    credentials: Option<Credentials>,
    /// A [`reqwest::Client`] for handling HTTP requests
    http_client: reqwest::Client,
}

impl Client {
    /// Create a new [`Client`]
    ///
    /// A trailing `/` is added to the path of `base_url` if it is missing, so that relative API
    /// paths resolve beneath it rather than replacing its last segment.
    pub fn new<U: IntoUrl>(base_url: U) -> Result<Self> {
        let mut base_url = base_url.into_url().map_err(Error::BaseUrl)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::CannotBeABase(base_url));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            credentials: None,
            http_client: reqwest::Client::new(),
        })
    }

    /// Set the identity and API token sent as basic auth with each request
    ///
    /// # Example
    /// ```
    /// # use pageowner_client::Client;
    /// # fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    /// let client = Client::new("https://example.atlassian.net/wiki/api/v2/")?
    ///     .with_basic_auth("ops@example.com", "secret-api-token");
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_basic_auth(mut self, user: impl Into<String>, token: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            token: Secret::new(token.into()),
        });
        self
    }

    /// The base URL API paths are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Make a request to the `GET /spaces?keys=K` API
    ///
    /// An unknown key is not an error, the server answers with an empty result list.
    pub async fn spaces_by_key(&self, key: impl AsRef<str> + Send) -> Result<Vec<Space>> {
        #[derive(Serialize)]
        struct Params<'a> {
            keys: &'a str,
        }
        let list: SpaceList = self
            .send_get_json(Method::GET, "spaces", Some(Params { keys: key.as_ref() }), None::<()>)
            .await?;
        Ok(list.results)
    }

    /// Make a request to the `GET /pages?limit=N[&cursor=C]` API
    ///
    /// # Example
    /// ```no_run
    /// # use pageowner_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    /// let client = Client::new("https://example.atlassian.net/wiki/api/v2/")?;
    /// let mut cursor = None;
    /// loop {
    ///     let list = client.list_pages(100, cursor.as_deref()).await?;
    ///     for page in &list.results {
    ///         println!("{} {}", page.id, page.title);
    ///     }
    ///     match list.next_cursor()? {
    ///         Some(next) => cursor = Some(next),
    ///         None => break,
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn list_pages(&self, limit: usize, cursor: Option<&str>) -> Result<PageList> {
        #[derive(Serialize)]
        struct Params<'a> {
            limit: usize,
            #[serde(skip_serializing_if = "Option::is_none")]
            cursor: Option<&'a str>,
        }
        self.send_get_json(Method::GET, "pages", Some(Params { limit, cursor }), None::<()>)
            .await
    }

    /// Make a request to the `GET /pages/{id}` API
    pub async fn get_page(&self, id: impl AsRef<str> + Send) -> Result<Page> {
        let api_path = format!("pages/{}", id.as_ref());
        self.send_get_json(Method::GET, &api_path, None::<()>, None::<()>)
            .await
    }

    /// Make a request to the `PUT /pages/{id}` API
    ///
    /// The server rejects the write with `409 Conflict` if `update.version.number` is not exactly
    /// one more than the version it currently holds.
    pub async fn update_page(&self, id: impl AsRef<str> + Send, update: &PageUpdate) -> Result<()> {
        let api_path = format!("pages/{}", id.as_ref());
        self.send_checked(Method::PUT, &api_path, None::<()>, Some(update))
            .await?;
        Ok(())
    }

    async fn send_get_json<T, Q, B>(
        &self,
        method: Method,
        api_path: &str,
        query: Option<Q>,
        body: Option<B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + Send,
        B: Serialize + Send,
    {
        self.send_checked(method, api_path, query, body)
            .await?
            .json()
            .await
            .map_err(Error::Json)
    }

    async fn send_checked<Q, B>(
        &self,
        method: Method,
        api_path: &str,
        query: Option<Q>,
        body: Option<B>,
    ) -> Result<reqwest::Response>
    where
        Q: Serialize + Send,
        B: Serialize + Send,
    {
        let url = self.base_url.join(api_path)?;
        let mut req = self
            .http_client
            .request(method.clone(), url)
            .header(ACCEPT, "application/json");
        if let Some(query) = query {
            req = req.query(&query);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        if let Some(Credentials { user, token }) = &self.credentials {
            req = req.basic_auth(user, Some(token.expose_secret()));
        }
        let resp = req
            .send()
            .await
            .map_err(|src| Error::request_send(method, api_path, src))?;
        match resp.status() {
            StatusCode::OK => Ok(resp),
            code => Err(Error::ApiError {
                code,
                message: resp.text().await.map_err(Error::Text)?,
            }),
        }
    }
}
