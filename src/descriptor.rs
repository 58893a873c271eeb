//! Asset Descriptor - the immutable input of one render request

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::templates::TemplateId;

/// Placeholder rendered for any missing stat value.
pub const MISSING_VALUE: &str = "\u{2014}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListingStatus {
    ForSale,
    JustListed,
    UnderContract,
    JustSold,
    ForLease,
    OpenHouse,
}

/// The one status/label table. Validation, badge text and caller-side option
/// lists all read from here.
const STATUS_LABELS: [(ListingStatus, &str); 6] = [
    (ListingStatus::ForSale, "FOR SALE"),
    (ListingStatus::JustListed, "JUST LISTED"),
    (ListingStatus::UnderContract, "UNDER CONTRACT"),
    (ListingStatus::JustSold, "JUST SOLD"),
    (ListingStatus::ForLease, "FOR LEASE"),
    (ListingStatus::OpenHouse, "OPEN HOUSE"),
];

impl ListingStatus {
    pub const ALL: [ListingStatus; 6] = [
        ListingStatus::ForSale,
        ListingStatus::JustListed,
        ListingStatus::UnderContract,
        ListingStatus::JustSold,
        ListingStatus::ForLease,
        ListingStatus::OpenHouse,
    ];

    pub fn label(self) -> &'static str {
        STATUS_LABELS
            .iter()
            .find(|(status, _)| *status == self)
            .map(|(_, label)| *label)
            .unwrap_or("")
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A photo or logo reference as supplied by the surrounding application.
///
/// Serialized as the original string: `https://...`, a proxy-wrapped URL
/// carrying the real target in its `url` query parameter, or a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PhotoRef {
    Remote(String),
    Proxied { wrapper: String, target: String },
    Embedded(String),
}

impl PhotoRef {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.starts_with("data:") {
            return Ok(Self::Embedded(raw.to_string()));
        }
        if let Some(target) = proxied_target(raw) {
            return Ok(Self::Proxied {
                wrapper: raw.to_string(),
                target,
            });
        }
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Self::Remote(raw.to_string())),
            _ => Err(format!("unsupported photo reference: {raw}")),
        }
    }

    /// The string the caller supplied; also the key resolved images are stored under.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Remote(url) => url,
            Self::Proxied { wrapper, .. } => wrapper,
            Self::Embedded(data) => data,
        }
    }

    /// The URL that actually hosts the pixels, if the reference is remote.
    pub fn remote_url(&self) -> Option<&str> {
        match self {
            Self::Remote(url) => Some(url),
            Self::Proxied { target, .. } => Some(target),
            Self::Embedded(_) => None,
        }
    }
}

/// Recover the wrapped remote URL from `/proxy?url=<encoded>` style references.
fn proxied_target(raw: &str) -> Option<String> {
    let base = Url::parse("http://localhost/").ok()?;
    let parsed = if raw.starts_with('/') {
        base.join(raw).ok()?
    } else {
        Url::parse(raw).ok()?
    };
    let (_, target) = parsed.query_pairs().find(|(key, _)| key == "url")?;
    let target = Url::parse(&target).ok()?;
    matches!(target.scheme(), "http" | "https").then(|| target.to_string())
}

impl TryFrom<String> for PhotoRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PhotoRef::parse(&value)
    }
}

impl From<PhotoRef> for String {
    fn from(photo: PhotoRef) -> Self {
        photo.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub photo: Option<PhotoRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHouse {
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl OpenHouse {
    /// Non-empty day/date parts, in display order.
    pub fn parts(&self) -> Vec<&str> {
        [self.day.as_deref(), self.date.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDescriptor {
    pub format: TemplateId,
    pub status: ListingStatus,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub bedrooms: Option<String>,
    #[serde(default)]
    pub bathrooms: Option<String>,
    #[serde(default)]
    pub square_feet: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub photo_refs: Vec<PhotoRef>,
    #[serde(default)]
    pub logo: Option<PhotoRef>,
    #[serde(default)]
    pub agent: Option<AgentInfo>,
    #[serde(default)]
    pub open_house: Option<OpenHouse>,
}

impl AssetDescriptor {
    /// Street line and city/state/zip line.
    pub fn address_lines(&self) -> (String, String) {
        split_address(&self.address)
    }

    /// Open-house details, only when the status calls for a ribbon.
    pub fn open_house_parts(&self) -> Option<Vec<&str>> {
        if self.status != ListingStatus::OpenHouse {
            return None;
        }
        let parts = self.open_house.as_ref()?.parts();
        (!parts.is_empty()).then_some(parts)
    }
}

/// Split on the first newline, otherwise on the first comma.
pub fn split_address(address: &str) -> (String, String) {
    let address = address.trim();
    let split = address
        .split_once('\n')
        .or_else(|| address.split_once(','));
    match split {
        Some((street, rest)) => (street.trim().to_string(), rest.trim().to_string()),
        None => (address.to_string(), String::new()),
    }
}

/// Raw numeric prices become `$1,234,567`; anything else is shown as typed.
pub fn format_price(raw: &str) -> String {
    let raw = raw.trim();
    let numeric = raw
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '$' | ' '));
    if raw.is_empty() || !numeric {
        return raw.to_string();
    }
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    let (whole, fraction) = cleaned.split_once('.').unwrap_or((&cleaned, ""));
    if whole.is_empty() {
        return raw.to_string();
    }
    let mut formatted = format!("${}", group_thousands(whole.trim_start_matches('0')));
    if formatted == "$" {
        formatted.push('0');
    }
    if fraction.chars().any(|c| c != '0') {
        formatted.push('.');
        formatted.push_str(fraction);
    }
    formatted
}

/// Stat value for display: em-dash when missing, separators for plain integers.
pub fn format_stat(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        None | Some("") => MISSING_VALUE.to_string(),
        Some(value) if value.len() > 3 && value.chars().all(|c| c.is_ascii_digit()) => {
            group_thousands(value)
        }
        Some(value) => value.to_string(),
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `JANE o'neil-smith` -> `Jane O'Neil-Smith`
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut start_of_word = true;
    for c in name.trim().chars() {
        if start_of_word {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        start_of_word = c.is_whitespace() || c == '-' || c == '\'';
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_status_has_a_label() {
        for status in ListingStatus::ALL {
            assert!(!status.label().is_empty());
        }
        assert_eq!(ListingStatus::UnderContract.label(), "UNDER CONTRACT");
    }

    #[test]
    fn test_status_serde_kebab_case() {
        let status: ListingStatus = serde_json::from_str(r#""just-sold""#).unwrap();
        assert_eq!(status, ListingStatus::JustSold);
    }

    #[test]
    fn test_photo_ref_kinds() {
        assert!(matches!(
            PhotoRef::parse("https://cdn.example.com/a.jpg").unwrap(),
            PhotoRef::Remote(_)
        ));
        assert!(matches!(
            PhotoRef::parse("data:image/png;base64,AAAA").unwrap(),
            PhotoRef::Embedded(_)
        ));
        let proxied =
            PhotoRef::parse("/api/proxy-image?url=https%3A%2F%2Fmls.example.com%2FIMG-1_2.jpg")
                .unwrap();
        assert_eq!(proxied.remote_url(), Some("https://mls.example.com/IMG-1_2.jpg"));
        assert!(PhotoRef::parse("ftp://example.com/a.jpg").is_err());
        assert!(PhotoRef::parse("photos/a.jpg").is_err());
    }

    #[test]
    fn test_photo_ref_serializes_as_original_string() {
        let raw = "/api/proxy-image?url=https%3A%2F%2Fmls.example.com%2Fa.jpg";
        let photo = PhotoRef::parse(raw).unwrap();
        assert_eq!(serde_json::to_string(&photo).unwrap(), format!("\"{raw}\""));
    }

    #[test]
    fn test_split_address() {
        assert_eq!(
            split_address("123 Main St, Austin, TX 78701"),
            ("123 Main St".to_string(), "Austin, TX 78701".to_string())
        );
        assert_eq!(
            split_address("9 Elm Rd\nSpringfield, IL"),
            ("9 Elm Rd".to_string(), "Springfield, IL".to_string())
        );
        assert_eq!(split_address("Lot 7"), ("Lot 7".to_string(), String::new()));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price("1250000"), "$1,250,000");
        assert_eq!(format_price("$450,000"), "$450,000");
        assert_eq!(format_price("450000.00"), "$450,000");
        assert_eq!(format_price("2,500/mo"), "2,500/mo");
        assert_eq!(format_price("999"), "$999");
    }

    #[test]
    fn test_format_stat() {
        assert_eq!(format_stat(None), MISSING_VALUE);
        assert_eq!(format_stat(Some("  ")), MISSING_VALUE);
        assert_eq!(format_stat(Some("2150")), "2,150");
        assert_eq!(format_stat(Some("2.5")), "2.5");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("JANE o'neil-smith"), "Jane O'Neil-Smith");
        assert_eq!(title_case("  bob  "), "Bob");
    }

    #[test]
    fn test_open_house_only_for_open_house_status() {
        let descriptor: AssetDescriptor = serde_json::from_value(serde_json::json!({
            "format": "social-portrait",
            "status": "for-sale",
            "price": "1",
            "openHouse": {"day": "Saturday", "date": "June 14"}
        }))
        .unwrap();
        assert!(descriptor.open_house_parts().is_none());

        let descriptor = AssetDescriptor {
            status: ListingStatus::OpenHouse,
            ..descriptor
        };
        assert_eq!(descriptor.open_house_parts().unwrap(), vec!["Saturday", "June 14"]);
    }
}
