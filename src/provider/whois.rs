//! WHOIS pass-through endpoints.
//!
//! Each call sends one request and hands back the response body verbatim.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::instrument;

use super::ProviderClient;
use super::error::ProviderError;

const WHOIS_SEARCH_PATH: &str = "v2/whois/search";
const WHOIS_CREDITS_PATH: &str = "v2/whois/credits";

/// Kind of WHOIS search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WhoisSearchType {
    #[serde(rename = "whois")]
    Whois,
    #[serde(rename = "whois-history")]
    History,
    #[serde(rename = "reverse-whois")]
    ReverseWhois,
    #[serde(rename = "reverse-ip")]
    ReverseIp,
    #[serde(rename = "reverse-mx")]
    ReverseMx,
    #[serde(rename = "reverse-ns")]
    ReverseNs,
    #[serde(rename = "subdomain-scan")]
    SubdomainScan,
}

/// Registrant attribute a reverse WHOIS search matches on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReverseWhoisType {
    #[default]
    Registrant,
    Email,
    Organization,
    Address,
    Phone,
}

impl fmt::Display for ReverseWhoisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Registrant => "registrant",
            Self::Email => "email",
            Self::Organization => "organization",
            Self::Address => "address",
            Self::Phone => "phone",
        };
        write!(f, "{label}")
    }
}

impl FromStr for ReverseWhoisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "registrant" => Ok(Self::Registrant),
            "email" => Ok(Self::Email),
            "organization" => Ok(Self::Organization),
            "address" => Ok(Self::Address),
            "phone" => Ok(Self::Phone),
            other => Err(format!(
                "invalid reverse WHOIS type '{other}'; expected one of: registrant, email, organization, address, phone"
            )),
        }
    }
}

/// Body of a WHOIS search call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhoisRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse_type: Option<ReverseWhoisType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mx_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ns_address: Option<String>,
    pub search_type: WhoisSearchType,
}

impl WhoisRequest {
    fn new(search_type: WhoisSearchType) -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            ip_address: None,
            reverse_type: None,
            domain: None,
            mx_address: None,
            ns_address: None,
            search_type,
        }
    }

    /// Domain WHOIS lookup.
    #[must_use]
    pub fn lookup(domain: &str) -> Self {
        Self {
            domain: Some(domain.to_string()),
            ..Self::new(WhoisSearchType::Whois)
        }
    }

    /// Domain WHOIS history.
    #[must_use]
    pub fn history(domain: &str) -> Self {
        Self {
            domain: Some(domain.to_string()),
            ..Self::new(WhoisSearchType::History)
        }
    }

    /// Subdomain scan for a domain.
    #[must_use]
    pub fn subdomain_scan(domain: &str) -> Self {
        Self {
            domain: Some(domain.to_string()),
            ..Self::new(WhoisSearchType::SubdomainScan)
        }
    }

    /// Reverse WHOIS over include/exclude terms.
    #[must_use]
    pub fn reverse_whois(
        include: Vec<String>,
        exclude: Vec<String>,
        reverse_type: ReverseWhoisType,
    ) -> Self {
        Self {
            include,
            exclude,
            reverse_type: Some(reverse_type),
            ..Self::new(WhoisSearchType::ReverseWhois)
        }
    }

    /// Domains hosted on an IP address.
    #[must_use]
    pub fn reverse_ip(ip_address: &str) -> Self {
        Self {
            ip_address: Some(ip_address.to_string()),
            ..Self::new(WhoisSearchType::ReverseIp)
        }
    }

    /// Domains using a mail exchanger.
    #[must_use]
    pub fn reverse_mx(mx_address: &str) -> Self {
        Self {
            mx_address: Some(mx_address.to_string()),
            ..Self::new(WhoisSearchType::ReverseMx)
        }
    }

    /// Domains using a name server.
    #[must_use]
    pub fn reverse_ns(ns_address: &str) -> Self {
        Self {
            ns_address: Some(ns_address.to_string()),
            ..Self::new(WhoisSearchType::ReverseNs)
        }
    }
}

impl ProviderClient {
    /// Sends a WHOIS search and returns the raw body.
    ///
    /// # Errors
    ///
    /// Returns the mapped [`ProviderError`] on non-success or transport failure.
    #[instrument(skip(self, request), fields(search_type = ?request.search_type))]
    pub async fn whois(&self, request: &WhoisRequest) -> Result<String, ProviderError> {
        self.post_json(WHOIS_SEARCH_PATH, request).await
    }

    /// Returns the raw WHOIS credit balance body.
    ///
    /// # Errors
    ///
    /// Returns the mapped [`ProviderError`] on non-success or transport failure.
    #[instrument(skip(self))]
    pub async fn whois_credits(&self) -> Result<String, ProviderError> {
        self.get_text(WHOIS_CREDITS_PATH).await
    }
}
