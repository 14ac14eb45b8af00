use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest as _, Sha256};
use url::form_urlencoded;

use super::domain::{DigestType, DomainSite, Hit, Subscriber, DIGEST_PAGE_SIZE};
use super::plural::count_phrase;
use super::translations::TranslationCatalog;

/// Inline images referenced by the digest template.
pub const DIGEST_IMAGES: [&str; 3] = ["logo.png", "logo-fb.png", "logo-vk.png"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unsubscribe {
    pub email: String,
    pub code: String,
    /// `email=..&code=..`, form-encoded for the unsubscribe link.
    pub query: String,
}

impl Unsubscribe {
    pub fn new(email: &str, subscriber_id: i64) -> Self {
        let code = unsubscribe_code(subscriber_id);
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("email", email)
            .append_pair("code", &code)
            .finish();
        Self {
            email: email.to_string(),
            code,
            query,
        }
    }
}

/// Composed mail content for one subscriber in one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Digest {
    pub subscriber_id: i64,
    pub recipient: String,
    pub subject: String,
    pub header: String,
    pub offers_count: &'static str,
    pub show_all: String,
    pub unsubscribe: Unsubscribe,
    pub hits: Vec<Hit>,
    pub images: BTreeMap<String, PathBuf>,
    pub tags: Vec<String>,
    pub domain: String,
    pub translations: BTreeMap<String, String>,
}

impl Digest {
    /// Parameters consumed by the `agent/mailing` template.
    pub fn template_params(&self) -> Value {
        json!({
            "showAll": self.show_all,
            "unsubscribe": self.unsubscribe,
            "offers": self.hits,
            "domain": self.domain,
            "translations": self.translations,
        })
    }
}

/// Builds digests; holds only the location of the template images.
#[derive(Debug, Clone)]
pub struct DigestComposer {
    image_dir: PathBuf,
}

impl DigestComposer {
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
        }
    }

    pub fn compose(
        &self,
        subscriber: &Subscriber,
        total_hits: u64,
        mut hits: Vec<Hit>,
        translations: &TranslationCatalog,
        domain: &DomainSite,
        today: NaiveDate,
    ) -> Digest {
        let count = usize::try_from(total_hits)
            .unwrap_or(usize::MAX)
            .min(DIGEST_PAGE_SIZE);
        hits.truncate(DIGEST_PAGE_SIZE);

        let phrase = count_phrase(subscriber.digest_type, count);
        let header = translations.header_for(subscriber.digest_type).to_string();
        let strings = translations.for_digest(&header, phrase.noun);

        let images = DIGEST_IMAGES
            .iter()
            .map(|name| (name.to_string(), self.image_dir.join(name)))
            .collect();

        Digest {
            subscriber_id: subscriber.id,
            recipient: subscriber.email.address.clone(),
            subject: subject_line(&phrase.phrase, today, subscriber),
            header,
            offers_count: phrase.noun,
            show_all: show_all_link(subscriber),
            unsubscribe: Unsubscribe::new(&subscriber.email.address, subscriber.id),
            hits,
            images,
            tags: vec![
                "Agent".to_string(),
                "Agent mailing".to_string(),
                subscriber.digest_type.delivery_tag().to_string(),
            ],
            domain: domain.name.clone(),
            translations: strings,
        }
    }
}

/// `<phrase> за DD.MM.YY`, then ` - ` with the keyword and/or location titles.
pub fn subject_line(phrase: &str, today: NaiveDate, subscriber: &Subscriber) -> String {
    let mut subject = format!("{phrase} за {}", today.format("%d.%m.%y"));

    let titles: Vec<&str> = subscriber
        .regional_locations()
        .map(|location| location.title.as_str())
        .collect();
    let keywords = subscriber.keywords();

    if keywords.is_none() && titles.is_empty() {
        return subject;
    }

    subject.push_str(" - ");
    if let Some(keywords) = keywords {
        subject.push_str(keywords);
        if !titles.is_empty() {
            subject.push_str(", ");
        }
    }
    subject.push_str(&titles.join(","));
    subject
}

/// Site path listing everything the digest matched. The keyword is appended as stored.
pub fn show_all_link(subscriber: &Subscriber) -> String {
    let mut link = match subscriber.digest_type {
        DigestType::Vacancies => "/jobs".to_string(),
        DigestType::Cv => "/cv".to_string(),
        DigestType::Universal => String::new(),
    };

    let location_ids: Vec<String> = subscriber
        .regional_locations()
        .map(|location| location.id.to_string())
        .collect();
    if !location_ids.is_empty() {
        link.push_str("?location=");
        link.push_str(&location_ids.join("."));
        link.push('/');
    }

    if !subscriber.professions.is_empty() {
        let profession_ids: Vec<String> = subscriber
            .professions
            .iter()
            .map(|profession| profession.id.to_string())
            .collect();
        link.push(if location_ids.is_empty() { '?' } else { '&' });
        link.push_str("profession=");
        link.push_str(&profession_ids.join("."));
        link.push('/');
    }

    if let Some(keywords) = subscriber.keywords() {
        link.push_str(keywords);
    }

    link
}

pub fn unsubscribe_code(subscriber_id: i64) -> String {
    hex::encode(Sha256::digest(subscriber_id.to_string().as_bytes()))
}
