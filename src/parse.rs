use std::sync::Arc;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::record::{Record, RecordMetadata};
use crate::{Error, ParseError, Result, EXPECTED_ENTRIES_PER_PAGE};

/// Turns fetched listing pages and about documents into [`Record`]s.
///
/// Malformed items come back as `Err(ParseError)` next to the good ones, so callers can
/// count what was skipped without the batch failing.
#[derive(Debug)]
pub struct Extractor {
    community: Selector,
    rank: Selector,
    link: Selector,
    icon: Selector,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            community: create_selector("div[data-community-id]")?,
            rank: create_selector("h6.flex.flex-col")?,
            link: create_selector("a.text-current")?,
            icon: create_selector("faceplate-img")?,
        })
    }

    /// Extracts every community on a listing page, in document order.
    pub fn extract_listing(
        &self,
        html: &str,
        page: usize,
        scraped_at: DateTime<Utc>,
    ) -> Vec<std::result::Result<Record, ParseError>> {
        let doc = Html::parse_document(html);

        let mut items = Vec::with_capacity(EXPECTED_ENTRIES_PER_PAGE);
        for (index, div) in doc.select(&self.community).enumerate() {
            let item = self.extract_item(div, index, scraped_at);
            if let Err(e) = &item {
                debug!(page, "skipping item: {e}");
            }
            items.push(item);
        }
        items
    }

    fn extract_item(
        &self,
        div: ElementRef,
        index: usize,
        scraped_at: DateTime<Utc>,
    ) -> std::result::Result<Record, ParseError> {
        let attrs = div.value();
        let id = attr_text(attrs.attr("data-community-id")).ok_or(ParseError::MissingId { index })?;
        let name = attr_text(attrs.attr("data-prefixed-name")).ok_or_else(|| {
            ParseError::MissingName {
                index,
                id: id.clone(),
            }
        })?;

        let metadata = RecordMetadata {
            rank: div
                .select(&self.rank)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_owned())
                .filter(|rank| !rank.is_empty()),
            url: div
                .select(&self.link)
                .next()
                .and_then(|el| attr_text(el.value().attr("href"))),
            icon: div
                .select(&self.icon)
                .next()
                .and_then(|el| attr_text(el.value().attr("src"))),
            ..RecordMetadata::default()
        };

        Ok(Record {
            id,
            name,
            subscribers: attr_count(attrs.attr("data-subscribers-count")),
            active_users: attr_count(attrs.attr("data-active-count")),
            icon_url: attrs.attr("data-icon-url").unwrap_or_default().to_owned(),
            description: attrs
                .attr("data-public-description-text")
                .unwrap_or_default()
                .to_owned(),
            scraped_at,
            metadata,
        })
    }

    /// Parses the JSON returned by a community's about endpoint.
    pub fn extract_about(
        &self,
        json: &str,
        scraped_at: DateTime<Utc>,
    ) -> std::result::Result<Record, ParseError> {
        let about: AboutResponse =
            serde_json::from_str(json).map_err(|e| ParseError::About(e.to_string()))?;
        let data = about.data;

        let id = attr_text(data.name.as_deref()).ok_or(ParseError::MissingId { index: 0 })?;
        let name = attr_text(data.display_name_prefixed.as_deref())
            .or_else(|| {
                attr_text(data.display_name.as_deref()).map(|name| format!("r/{name}"))
            })
            .ok_or_else(|| ParseError::MissingName {
                index: 0,
                id: id.clone(),
            })?;

        let icon_url = [data.community_icon.as_deref(), data.icon_img.as_deref()]
            .into_iter()
            .find_map(attr_text)
            .map(|url| url.replace("&amp;", "&"))
            .unwrap_or_default();

        Ok(Record {
            id,
            name,
            subscribers: data.subscribers.unwrap_or(0),
            active_users: data
                .active_user_count
                .or(data.accounts_active)
                .unwrap_or(0),
            icon_url,
            description: data.public_description.unwrap_or_default(),
            scraped_at,
            metadata: RecordMetadata {
                url: data.url,
                nsfw: data.over18,
                created_utc: data.created_utc,
                ..RecordMetadata::default()
            },
        })
    }
}

/// Parses a listing page on a blocking thread.
pub(crate) async fn parse_listing(
    extractor: Arc<Extractor>,
    html: String,
    page: usize,
) -> Result<Vec<std::result::Result<Record, ParseError>>> {
    let items = spawn_blocking(move || extractor.extract_listing(&html, page, Utc::now())).await?;
    Ok(items)
}

#[derive(Debug, Deserialize)]
struct AboutResponse {
    data: AboutData,
}

#[derive(Debug, Deserialize)]
struct AboutData {
    name: Option<String>,
    display_name: Option<String>,
    display_name_prefixed: Option<String>,
    subscribers: Option<u64>,
    active_user_count: Option<u64>,
    accounts_active: Option<u64>,
    community_icon: Option<String>,
    icon_img: Option<String>,
    public_description: Option<String>,
    url: Option<String>,
    over18: Option<bool>,
    created_utc: Option<f64>,
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

/// Trimmed attribute value, `None` when missing or blank.
fn attr_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Count attribute; anything missing or non-numeric is `0`.
fn attr_count(value: Option<&str>) -> u64 {
    value
        .map(|v| v.trim().replace(',', ""))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <div data-community-id="t5_2qh1i" data-prefixed-name="r/AskReddit"
               data-subscribers-count="45000000" data-active-count="12000"
               data-icon-url="https://img/ask.png"
               data-public-description-text="Ask anything">
            <h6 class="flex flex-col"> 1 </h6>
            <a class="text-current" href="/r/AskReddit/">r/AskReddit</a>
            <faceplate-img src="https://img/ask-small.png"></faceplate-img>
          </div>
          <div class="ad">not a community</div>
          <div data-community-id="" data-prefixed-name="r/ghost"></div>
          <div data-community-id="t5_nameless" data-prefixed-name="  "></div>
          <div data-community-id="t5_2qh0y" data-prefixed-name="r/python"
               data-subscribers-count="lots"></div>
        </body></html>
    "#;

    #[test]
    fn listing_items_come_back_in_document_order() {
        let extractor = Extractor::new().unwrap();
        let items = extractor.extract_listing(LISTING, 1, Utc::now());
        assert_eq!(items.len(), 4);

        let first = items[0].as_ref().unwrap();
        assert_eq!(first.id, "t5_2qh1i");
        assert_eq!(first.name, "r/AskReddit");
        assert_eq!(first.subscribers, 45_000_000);
        assert_eq!(first.active_users, 12_000);
        assert_eq!(first.icon_url, "https://img/ask.png");
        assert_eq!(first.description, "Ask anything");
        assert_eq!(first.metadata.rank.as_deref(), Some("1"));
        assert_eq!(first.metadata.url.as_deref(), Some("/r/AskReddit/"));
        assert_eq!(first.metadata.icon.as_deref(), Some("https://img/ask-small.png"));

        assert_eq!(items[1], Err(ParseError::MissingId { index: 1 }));
        assert_eq!(
            items[2],
            Err(ParseError::MissingName {
                index: 2,
                id: "t5_nameless".into()
            })
        );
    }

    #[test]
    fn bad_counts_are_zero_filled() {
        let extractor = Extractor::new().unwrap();
        let items = extractor.extract_listing(LISTING, 1, Utc::now());
        let python = items[3].as_ref().unwrap();
        assert_eq!(python.id, "t5_2qh0y");
        assert_eq!(python.subscribers, 0);
        assert_eq!(python.active_users, 0);
        assert!(python.metadata.is_empty());
    }

    #[test]
    fn page_without_communities_is_empty() {
        let extractor = Extractor::new().unwrap();
        let html = "<html><body><p>nothing</p></body></html>";
        let items = extractor.extract_listing(html, 9, Utc::now());
        assert!(items.is_empty());
    }

    #[test]
    fn attr_count_accepts_separators() {
        assert_eq!(attr_count(Some(" 1,234 ")), 1234);
        assert_eq!(attr_count(Some("-5")), 0);
        assert_eq!(attr_count(None), 0);
    }

    #[test]
    fn about_document_maps_to_record() {
        let json = r#"{"kind":"t5","data":{
            "name":"t5_2qh0y","display_name":"Python","display_name_prefixed":"r/Python",
            "subscribers":1300000,"active_user_count":null,"accounts_active":850,
            "community_icon":"https://styles/icon.png?width=256&amp;s=abc","icon_img":"",
            "public_description":"News about Python","url":"/r/Python/",
            "over18":false,"created_utc":1201230879.0}}"#;
        let extractor = Extractor::new().unwrap();
        let record = extractor.extract_about(json, Utc::now()).unwrap();

        assert_eq!(record.id, "t5_2qh0y");
        assert_eq!(record.name, "r/Python");
        assert_eq!(record.subscribers, 1_300_000);
        assert_eq!(record.active_users, 850);
        assert_eq!(record.icon_url, "https://styles/icon.png?width=256&s=abc");
        assert_eq!(record.description, "News about Python");
        assert_eq!(record.metadata.url.as_deref(), Some("/r/Python/"));
        assert_eq!(record.metadata.nsfw, Some(false));
        assert_eq!(record.metadata.created_utc, Some(1201230879.0));
    }

    #[test]
    fn about_document_falls_back_to_display_name() {
        let json = r#"{"data":{"name":"t5_x","display_name":"rust"}}"#;
        let extractor = Extractor::new().unwrap();
        let record = extractor.extract_about(json, Utc::now()).unwrap();
        assert_eq!(record.name, "r/rust");
        assert_eq!(record.subscribers, 0);
        assert_eq!(record.icon_url, "");
    }

    #[test]
    fn about_document_without_id_is_rejected() {
        let extractor = Extractor::new().unwrap();
        let err = extractor
            .extract_about(r#"{"data":{"display_name":"rust"}}"#, Utc::now())
            .unwrap_err();
        assert_eq!(err, ParseError::MissingId { index: 0 });
        assert!(matches!(
            extractor.extract_about("<html>", Utc::now()),
            Err(ParseError::About(_))
        ));
    }
}
