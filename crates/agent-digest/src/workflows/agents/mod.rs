//! Saved-search digests ("agents"): query compilation, digest composition and the
//! batch dispatcher that ties them to the search and mail services.

pub mod digest;
pub mod directory;
pub mod dispatch;
pub mod domain;
pub mod indices;
pub mod mail;
pub mod plural;
pub mod query;
pub mod render;
pub mod search;
pub mod translations;

pub use digest::{Digest, DigestComposer, Unsubscribe};
pub use directory::{DirectoryError, JsonSubscriberDirectory, SubscriberDirectory};
pub use dispatch::{
    DispatchError, DispatchPorts, Dispatcher, FailureRecord, RetryPolicy, RunConfig, RunOutcome,
    RunReport, RunState, StopHandle, SubscriberFailure, SubscriberOutcome,
};
pub use domain::{
    DigestType, DomainSite, EmailAddress, Hit, LocationRef, ProfessionRef, Subscriber,
    WORLDWIDE_LOCATION_ID,
};
pub use indices::{select_indices, IndexTarget};
pub use mail::{DeliveryError, MailgunSender, NotificationSender, OutboundMail};
pub use query::{compile, SearchRequest};
pub use render::{DigestRenderer, HandlebarsRenderer, RenderError, DIGEST_TEMPLATE};
pub use search::{HttpSearchGateway, SearchError, SearchGateway, SearchResult};
pub use translations::{
    TranslationCatalog, TranslationError, TranslationLoader, YamlTranslationLoader,
};
