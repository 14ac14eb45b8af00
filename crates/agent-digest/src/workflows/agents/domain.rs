use serde::{Deserialize, Serialize};

/// Location id meaning "no geographic restriction".
pub const WORLDWIDE_LOCATION_ID: i64 = 0;

/// Upper bound on listings fetched and shown per digest.
pub const DIGEST_PAGE_SIZE: usize = 60;

/// Kind of listings a subscriber wants to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestType {
    Vacancies,
    Cv,
    /// Also the fallback for any type label this service does not know.
    #[serde(other)]
    Universal,
}

impl DigestType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Vacancies => "vacancies",
            Self::Cv => "cv",
            Self::Universal => "universal",
        }
    }

    /// Listing type codes searched for this digest. Universal shares the vacancy codes.
    pub fn listing_types(self) -> &'static [u8] {
        match self {
            Self::Cv => &[ListingType::CV],
            Self::Vacancies | Self::Universal => {
                &[ListingType::JOB_OFFER, ListingType::JOB_REQUEST]
            }
        }
    }

    pub const fn delivery_tag(self) -> &'static str {
        match self {
            Self::Cv => "Agent CV",
            Self::Vacancies | Self::Universal => "Agent vacancies",
        }
    }
}

/// Numeric `type` codes stored on indexed listings.
pub struct ListingType;

impl ListingType {
    pub const JOB_OFFER: u8 = 0;
    pub const JOB_REQUEST: u8 = 1;
    pub const CV: u8 = 2;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub address: String,
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRef {
    pub id: i64,
    pub title: String,
}

impl LocationRef {
    pub fn is_worldwide(&self) -> bool {
        self.id == WORLDWIDE_LOCATION_ID
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionRef {
    pub id: i64,
    pub title: String,
}

/// Saved search profile with notification settings. Read-only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: i64,
    pub digest_type: DigestType,
    pub email: EmailAddress,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub locations: Vec<LocationRef>,
    #[serde(default)]
    pub professions: Vec<ProfessionRef>,
    #[serde(default)]
    pub keywords: String,
}

impl Subscriber {
    pub fn is_confirmed(&self) -> bool {
        self.email.confirmed
    }

    /// Locations that restrict the search geographically, in subscriber order.
    pub fn regional_locations(&self) -> impl Iterator<Item = &LocationRef> {
        self.locations.iter().filter(|location| !location.is_worldwide())
    }

    pub fn keywords(&self) -> Option<&str> {
        if self.keywords.is_empty() {
            None
        } else {
            Some(self.keywords.as_str())
        }
    }
}

/// Site a run is executed for; decides the index domain filter and digest language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSite {
    pub id: i64,
    pub name: String,
    pub language: String,
}

/// One matched listing as projected by the stored-field list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hit {
    pub id: String,
    pub title: Option<String>,
    pub profession: Option<String>,
    pub location: Vec<String>,
    pub offeror_name: Option<String>,
    pub rating: Option<f64>,
    pub days: Option<i64>,
    pub pricing_type: Option<String>,
    pub short_id: Option<String>,
}
