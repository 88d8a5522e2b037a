// API client module: a small blocking HTTP client for the File Browser
// REST endpoints (`/login`, `/resources`, `/tus`, `/raw`). The upload,
// tree and download logic only see the `Transport` trait, so they can be
// driven by an in-memory server in tests.

use std::io::Read;
use std::sync::Arc;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, ORIGIN, REFERER};
use reqwest::Url;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Config, USER_AGENT};
use crate::entry::{normalize_remote_path, Listing};
use crate::error::{Error, Result};

/// Protocol version sent with every chunk.
pub const TUS_VERSION: &str = "1.0.0";
pub const AUTH_HEADER: &str = "X-Auth";

/// The remote operations the transfer logic depends on.
///
/// Implementations attach the session token to every call. Any failure,
/// network or non-success status, comes back as an `Err`.
pub trait Transport {
    /// Metadata for `path`, or `None` when the server answers 404.
    fn stat(&self, path: &str) -> Result<Option<Listing>>;

    /// Create a folder. The parent must already exist.
    fn create_folder(&self, path: &str, override_existing: bool) -> Result<()>;

    /// Open an upload session for a file; missing parent folders are
    /// created by the server.
    fn create_upload(&self, path: &str, override_existing: bool) -> Result<()>;

    /// Send one chunk starting at `offset`.
    fn patch_chunk(
        &self,
        path: &str,
        override_existing: bool,
        offset: u64,
        chunk: &[u8],
    ) -> Result<()>;

    /// Remove a (possibly partial) upload target.
    fn delete_upload(&self, path: &str) -> Result<()>;

    /// Stream the raw content of a remote file. The second value is the
    /// content length when the server announced one.
    fn open_raw(&self, path: &str) -> Result<(Box<dyn Read + '_>, Option<u64>)>;
}

/// Login request payload.
#[derive(Serialize, Debug)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub recaptcha: &'a str,
}

/// Blocking client for one File Browser server. Holds the reqwest client,
/// the API base URL and, after `login`, the session token.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    api_url: Url,
    cookies: Arc<Jar>,
    token: Option<String>,
}

impl ApiClient {
    /// Build a client from the resolved configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let home = config.home_url.as_str();
        if let Ok(origin) = HeaderValue::from_str(home.trim_end_matches('/')) {
            headers.insert(ORIGIN, origin);
        }
        if let Ok(referer) = HeaderValue::from_str(home) {
            headers.insert(REFERER, referer);
        }

        let cookies = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_provider(cookies.clone())
            .danger_accept_invalid_certs(config.insecure)
            .timeout(config.timeout)
            .build()?;

        Ok(ApiClient {
            client,
            api_url: config.api_url.clone(),
            cookies,
            token: None,
        })
    }

    /// Exchange credentials for a session token and keep it for
    /// subsequent calls. The server answers with the raw token string.
    pub fn login(&mut self, username: &str, password: &str) -> Result<String> {
        info!("Requesting access token...");
        let url = self.endpoint("login", "", false)?;
        let req = LoginRequest {
            username,
            password,
            recaptcha: "",
        };
        debug!(%url, username, "login request");
        let token = self
            .client
            .post(url)
            .json(&req)
            .send()
            .map_err(Error::from)
            .and_then(check_status)
            .and_then(|res| res.text().map_err(Error::from))
            .map_err(|e| Error::Login(Box::new(e)))?;

        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(Error::EmptyToken);
        }
        info!("Access token received.");
        self.set_token(&token);
        Ok(token)
    }

    /// Store a token for subsequent authenticated requests. It is sent
    /// both as the `X-Auth` header and as the `auth` cookie.
    pub fn set_token(&mut self, token: &str) {
        self.cookies
            .add_cookie_str(&format!("auth={token}; Path=/"), &self.api_url);
        self.token = Some(token.to_string());
    }

    /// Direct link to a file's raw content, usable without other headers.
    pub fn download_link(&self, path: &str) -> Result<String> {
        let token = self.token()?;
        let mut url = self.endpoint("raw", normalize_remote_path(path), false)?;
        url.query_pairs_mut().append_pair("auth", token);
        Ok(url.into())
    }

    fn token(&self) -> Result<&str> {
        self.token.as_deref().ok_or(Error::NotAuthenticated)
    }

    /// `{api}/{kind}/{path}`, each path segment percent-encoded.
    fn endpoint(&self, kind: &str, path: &str, trailing_slash: bool) -> Result<Url> {
        let mut url = self.api_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("{} is not a base URL", self.api_url)))?;
            segments.pop_if_empty().push(kind);
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
            if trailing_slash {
                segments.push("");
            }
        }
        Ok(url)
    }

    fn with_override(mut url: Url, override_existing: bool) -> Url {
        url.query_pairs_mut()
            .append_pair("override", if override_existing { "true" } else { "false" });
        url
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        Ok(req.header(AUTH_HEADER, self.token()?))
    }
}

/// Turn a non-success response into `Error::Status` carrying its body.
fn check_status(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().unwrap_or_default();
    Err(Error::Status {
        status: status.as_u16(),
        body,
    })
}

impl Transport for ApiClient {
    fn stat(&self, path: &str) -> Result<Option<Listing>> {
        let url = self.endpoint("resources", normalize_remote_path(path), false)?;
        let res = self.authed(self.client.get(url))?.send()?;
        debug!(path, status = res.status().as_u16(), "stat");
        match check_status(res) {
            Ok(res) => Ok(Some(Listing::from_json(&res.text()?)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_folder(&self, path: &str, override_existing: bool) -> Result<()> {
        let url = self.endpoint("resources", normalize_remote_path(path), true)?;
        let url = Self::with_override(url, override_existing);
        debug!(%url, "creating folder");
        let req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/plain;charset=UTF-8");
        check_status(self.authed(req)?.send()?)?;
        Ok(())
    }

    fn create_upload(&self, path: &str, override_existing: bool) -> Result<()> {
        let url = self.endpoint("tus", normalize_remote_path(path), false)?;
        let url = Self::with_override(url, override_existing);
        let res = check_status(self.authed(self.client.post(url))?.send()?)?;
        debug!(path, status = res.status().as_u16(), "upload session created");
        Ok(())
    }

    fn patch_chunk(
        &self,
        path: &str,
        override_existing: bool,
        offset: u64,
        chunk: &[u8],
    ) -> Result<()> {
        let url = self.endpoint("tus", normalize_remote_path(path), false)?;
        let url = Self::with_override(url, override_existing);
        let req = self
            .client
            .patch(url)
            .header(CONTENT_TYPE, "application/offset+octet-stream")
            .header("Tus-Resumable", TUS_VERSION)
            .header("Upload-Offset", offset.to_string())
            .body(chunk.to_vec());
        let res = check_status(self.authed(req)?.send()?)?;
        debug!(path, offset, status = res.status().as_u16(), "chunk accepted");
        Ok(())
    }

    fn delete_upload(&self, path: &str) -> Result<()> {
        let url = self.endpoint("tus", normalize_remote_path(path), false)?;
        check_status(self.authed(self.client.delete(url))?.send()?)?;
        Ok(())
    }

    fn open_raw(&self, path: &str) -> Result<(Box<dyn Read + '_>, Option<u64>)> {
        let url = self.download_link(path)?;
        let res = check_status(self.authed(self.client.get(url))?.send()?)?;
        let len = res.content_length();
        Ok((Box::new(res), len))
    }
}
