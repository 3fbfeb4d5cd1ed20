use clap::Parser;
use secrecy::Secret;
use url::Url;

/// Path of the v2 REST API below a site root
const API_PATH: &str = "/wiki/api/v2/";

#[derive(Debug, Parser)]
pub(crate) struct WikiConfig {
    /// The wiki site, either its root such as `https://example.atlassian.net`
    /// or the full v2 API base URL
    #[clap(long = "url", env = "ATLASSIAN_URL")]
    pub(crate) url: Url,

    /// The account email used for authentication, prompted for if not given
    #[clap(long = "email", env = "ATLASSIAN_EMAIL")]
    pub(crate) email: Option<String>,

    /// The API token used for authentication, prompted for if not given
    #[clap(long = "token", env = "ATLASSIAN_API_TOKEN")]
    pub(crate) token: Option<Secret<String>>,
}

impl WikiConfig {
    /// The base URL API paths are joined onto
    ///
    /// A bare site root gets the v2 API path appended, a URL ending in `/wiki`
    /// gets `api/v2/` appended, anything else is used as given.
    pub(crate) fn api_base_url(&self) -> Url {
        api_base_url(&self.url)
    }
}

fn api_base_url(url: &Url) -> Url {
    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);

    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        base.set_path(API_PATH);
    } else if path.ends_with("/wiki") {
        base.set_path(&format!("{path}/api/v2/"));
    } else {
        base.set_path(&format!("{path}/"));
    }
    base
}
