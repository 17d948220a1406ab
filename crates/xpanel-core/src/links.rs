use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Client configuration flavours a subscription can be downloaded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientFormat {
    Universal,
    Clash,
    V2ray,
    Shadowrocket,
    Quantumult,
    Surge,
}

impl ClientFormat {
    pub const ALL: [ClientFormat; 6] = [
        ClientFormat::Universal,
        ClientFormat::Clash,
        ClientFormat::V2ray,
        ClientFormat::Shadowrocket,
        ClientFormat::Quantumult,
        ClientFormat::Surge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ClientFormat::Universal => "universal",
            ClientFormat::Clash => "clash",
            ClientFormat::V2ray => "v2ray",
            ClientFormat::Shadowrocket => "shadowrocket",
            ClientFormat::Quantumult => "quantumult",
            ClientFormat::Surge => "surge",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ClientFormat::Universal => "Universal",
            ClientFormat::Clash => "Clash",
            ClientFormat::V2ray => "V2Ray",
            ClientFormat::Shadowrocket => "Shadowrocket",
            ClientFormat::Quantumult => "Quantumult X",
            ClientFormat::Surge => "Surge",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ClientFormat::Clash => "application/yaml",
            _ => "text/plain",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            ClientFormat::Clash => "yaml",
            _ => "txt",
        }
    }
}

impl fmt::Display for ClientFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        ClientFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == lower)
            .ok_or_else(|| RenderError::UnsupportedFormat(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionLink {
    pub format: ClientFormat,
    pub name: String,
    pub url: String,
}

/// The full set of client links for one token.
///
/// All links embed the same token; revoking it disables every format at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionLinks {
    #[serde(skip)]
    token: String,
    links: Vec<SubscriptionLink>,
}

impl SubscriptionLinks {
    pub fn build(base_url: &str, token: &str) -> Self {
        let links = ClientFormat::ALL
            .into_iter()
            .map(|format| {
                let content = content_url(base_url, format, token);
                let url = match format {
                    ClientFormat::Clash => format!(
                        "clash://install-config?url={}",
                        urlencoding::encode(&content)
                    ),
                    _ => content,
                };
                SubscriptionLink {
                    format,
                    name: format.label().to_string(),
                    url,
                }
            })
            .collect();

        Self {
            token: token.to_string(),
            links,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn links(&self) -> &[SubscriptionLink] {
        &self.links
    }

    pub fn get(&self, format: ClientFormat) -> Option<&SubscriptionLink> {
        self.links.iter().find(|l| l.format == format)
    }
}

/// `<base>/api/subscription/<format>/<token>`
pub fn content_url(base_url: &str, format: ClientFormat, token: &str) -> String {
    format!(
        "{}/api/subscription/{}/{}",
        base_url.trim_end_matches('/'),
        format,
        token
    )
}

/// Recovers the token embedded in a link produced by [`SubscriptionLinks::build`].
pub fn token_from_link(link: &str) -> Option<String> {
    let content = match link.strip_prefix("clash://install-config?url=") {
        Some(encoded) => urlencoding::decode(encoded).ok()?.into_owned(),
        None => link.to_string(),
    };
    content
        .rsplit('/')
        .next()
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
