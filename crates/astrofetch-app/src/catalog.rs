//! HTTP catalog adapter.
//!
//! # Design
//! - Raw response entries are deserialised into private structs and turned
//!   into `CatalogItem` values in one pass; nothing raw leaves this module.
//! - Identifiers arrive as numbers or strings; both are accepted.
//! - Credentials are opaque JSON fields merged into every request body.

use std::time::Duration;

use astrofetch_config::CatalogConfig;
use astrofetch_core::{CatalogError, CatalogItem, CatalogPage, CatalogSource, PageRequest};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

const COMPANION_PAGE_LIMIT: u32 = 100;
const DATE_FORMATS: [&str; 3] = ["%b. %d, %Y", "%B %d, %Y", "%Y-%m-%d"];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];
const DEFAULT_DEVICE: &str = "Unknown";
const DEFAULT_MEDIA_KIND: &str = "png";
const COMPANION_MEDIA_KIND: &str = "FITS";

/// Catalog reached over JSON POST endpoints.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: Client,
    pictures_url: String,
    companions_url: String,
    credentials: Map<String, Value>,
}

impl HttpCatalog {
    /// Adapter using an existing client.
    #[must_use]
    pub fn new(client: Client, config: &CatalogConfig) -> Self {
        let base = config.base_url.trim_end_matches('/');
        Self {
            client,
            pictures_url: format!("{base}{}", config.pictures_endpoint),
            companions_url: format!("{base}{}", config.companions_endpoint),
            credentials: config.credentials.clone(),
        }
    }

    /// Adapter with a dedicated client honouring the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn from_config(config: &CatalogConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.request_timeout().min(Duration::from_secs(30)))
            .user_agent(concat!("astrofetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| AppError::http("catalog.client", config.base_url.clone(), err))?;
        Ok(Self::new(client, config))
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        fields: Value,
    ) -> Result<T, CatalogError> {
        let mut body = self.credentials.clone();
        if let Value::Object(fields) = fields {
            body.extend(fields);
        }

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| CatalogError::Unavailable {
                detail: err.to_string(),
            })?;
        let status = response.status();
        debug!(url, status = status.as_u16(), "catalog response");
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(CatalogError::AuthExpired);
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CatalogError::Unavailable {
                detail: format!("status {status} from {url}"),
            });
        }
        if !status.is_success() {
            return Err(CatalogError::Malformed {
                detail: format!("status {status} from {url}"),
            });
        }
        response.json::<T>().await.map_err(|err| {
            if err.is_decode() {
                CatalogError::Malformed {
                    detail: err.to_string(),
                }
            } else {
                CatalogError::Unavailable {
                    detail: err.to_string(),
                }
            }
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn fetch_page(&self, request: PageRequest) -> Result<CatalogPage, CatalogError> {
        let view_type = if request.group_id == 0 {
            "photoRoll"
        } else {
            "missions"
        };
        let raw: RawPicturesResponse = self
            .post(
                &self.pictures_url,
                json!({
                    "firstImageNumber": request.offset + 1,
                    "maxImageCount": request.limit,
                    "scheduledMissionId": request.group_id,
                    "viewType": view_type,
                }),
            )
            .await?;

        let total_count = match raw.total_count.as_ref() {
            None | Some(Value::Null) => 0,
            Some(value) => count_value(value).ok_or_else(|| CatalogError::Malformed {
                detail: format!("unusable totalCount {value}"),
            })?,
        };
        let entries = raw.image_list.len() as u64;
        let items = raw
            .image_list
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.into_item(request.offset + index as u64))
            .collect();
        Ok(CatalogPage {
            items,
            total_count,
            entries,
        })
    }

    async fn companions(&self, parent: &CatalogItem) -> Result<Vec<CatalogItem>, CatalogError> {
        if parent.group_id == 0 {
            return Ok(Vec::new());
        }
        let raw: RawCompanionResponse = self
            .post(
                &self.companions_url,
                json!({
                    "firstImageNumber": 1,
                    "maxImageCount": COMPANION_PAGE_LIMIT,
                    "scheduledMissionId": parent.group_id,
                    "viewType": "missions",
                }),
            )
            .await?;
        Ok(raw
            .group_list
            .into_iter()
            .flat_map(|group| {
                let instrument = group.group_name.and_then(non_blank);
                group
                    .group_image_list
                    .into_iter()
                    .filter_map(move |entry| entry.into_item(parent, instrument.clone()))
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPicturesResponse {
    #[serde(default)]
    total_count: Option<Value>,
    #[serde(default)]
    image_list: Vec<RawPicture>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPicture {
    #[serde(default)]
    image_id: Option<Value>,
    #[serde(default)]
    customer_image_id: Option<Value>,
    #[serde(default)]
    mission_id: Option<Value>,
    #[serde(default)]
    scheduled_mission_id: Option<Value>,
    #[serde(default)]
    image_title: Option<String>,
    #[serde(default, rename = "imageDownloadURL")]
    image_download_url: Option<String>,
    #[serde(default)]
    image_type: Option<String>,
    #[serde(default)]
    telescope_name: Option<String>,
    #[serde(default)]
    instrument_name: Option<String>,
    #[serde(default)]
    display_date: Option<String>,
    #[serde(default)]
    display_time: Option<String>,
}

impl RawPicture {
    fn into_item(self, position: u64) -> Option<CatalogItem> {
        let secondary_id = self.customer_image_id.as_ref().and_then(text_value);
        let Some(item_id) = self
            .image_id
            .as_ref()
            .and_then(text_value)
            .or_else(|| secondary_id.clone())
        else {
            warn!(position, "catalog entry without an identifier; skipped");
            return None;
        };
        let Some(source_url) = self.image_download_url.and_then(non_blank) else {
            warn!(item_id = %item_id, "catalog entry without a download url; skipped");
            return None;
        };
        let group_id = [self.mission_id, self.scheduled_mission_id]
            .iter()
            .flatten()
            .find_map(count_value)
            .unwrap_or(0);

        Some(CatalogItem {
            captured_at: parse_capture(
                self.display_date.as_deref().unwrap_or_default(),
                self.display_time.as_deref().unwrap_or_default(),
            ),
            item_id,
            secondary_id,
            title: self.image_title.unwrap_or_default().trim().to_string(),
            source_url,
            media_kind: self
                .image_type
                .and_then(non_blank)
                .unwrap_or_else(|| DEFAULT_MEDIA_KIND.to_string()),
            group_id,
            device_name: self
                .telescope_name
                .and_then(non_blank)
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            instrument: self.instrument_name.and_then(non_blank),
            position,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompanionResponse {
    #[serde(default)]
    group_list: Vec<RawCompanionGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompanionGroup {
    #[serde(default)]
    group_name: Option<String>,
    #[serde(default)]
    group_image_list: Vec<RawCompanion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompanion {
    #[serde(default)]
    image_id: Option<Value>,
    #[serde(default, rename = "imageURL")]
    image_url: Option<String>,
}

impl RawCompanion {
    fn into_item(self, parent: &CatalogItem, instrument: Option<String>) -> Option<CatalogItem> {
        let item_id = self.image_id.as_ref().and_then(text_value)?;
        let Some(source_url) = self.image_url.and_then(non_blank) else {
            warn!(item_id = %item_id, group_id = parent.group_id, "companion without a url; skipped");
            return None;
        };
        Some(CatalogItem {
            item_id,
            secondary_id: None,
            title: parent.title.clone(),
            source_url,
            media_kind: COMPANION_MEDIA_KIND.to_string(),
            group_id: parent.group_id,
            captured_at: parent.captured_at,
            device_name: parent.device_name.clone(),
            instrument,
            position: parent.position,
        })
    }
}

/// Non-empty text of a string or number value.
fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_blank(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Non-negative integer carried as a number or a numeric string.
fn count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) if text.trim().is_empty() => Some(0),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Capture time from the catalog's display date and UTC display time.
/// Both parts are required.
fn parse_capture(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let date = date.trim();
    let time = time.trim();
    let time = time.strip_suffix("UTC").unwrap_or(time).trim();
    if date.is_empty() || time.is_empty() {
        return None;
    }
    let day = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date, format).ok())?;
    let clock = TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(time, format).ok())?;
    Some(day.and_time(clock).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use httpmock::MockServer;
    use httpmock::prelude::*;

    fn catalog_for(server: &MockServer) -> HttpCatalog {
        let mut config = CatalogConfig {
            base_url: server.base_url(),
            ..CatalogConfig::default()
        };
        config
            .credentials
            .insert("token".to_string(), Value::String("secret".to_string()));
        HttpCatalog::from_config(&config).expect("client should build")
    }

    fn request(offset: u64, group_id: u64) -> PageRequest {
        PageRequest {
            offset,
            limit: 25,
            group_id,
        }
    }

    #[test]
    fn capture_parsing_accepts_each_display_shape() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 10, 22, 15, 0).single();
        assert_eq!(parse_capture("Mar. 10, 2024", "22:15 UTC"), expected);
        assert_eq!(parse_capture("March 10, 2024", "22:15:00"), expected);
        assert_eq!(parse_capture("2024-03-10", "22:15:00 UTC"), expected);
        assert_eq!(parse_capture("2024-03-10", ""), None);
        assert_eq!(parse_capture("sometime", "22:15"), None);
    }

    #[test]
    fn raw_entries_convert_with_defaults() {
        let raw: RawPicture = match serde_json::from_value(json!({
            "imageId": 88123,
            "customerImageId": "551",
            "scheduledMissionId": "4411",
            "imageTitle": "  Trifid Nebula (M20) ",
            "imageDownloadURL": "https://cdn.example.invalid/m20.png",
            "displayDate": "Mar. 10, 2024",
            "displayTime": "22:15 UTC"
        })) {
            Ok(raw) => raw,
            Err(err) => panic!("fixture should deserialise: {err}"),
        };
        let Some(item) = raw.into_item(7) else {
            panic!("entry should convert");
        };
        assert_eq!(item.item_id, "88123");
        assert_eq!(item.secondary_id.as_deref(), Some("551"));
        assert_eq!(item.group_id, 4411);
        assert_eq!(item.title, "Trifid Nebula (M20)");
        assert_eq!(item.media_kind, "png");
        assert_eq!(item.device_name, "Unknown");
        assert_eq!(item.position, 7);
        assert!(item.captured_at.is_some());
    }

    #[test]
    fn entries_without_id_or_url_are_dropped() {
        let no_url: RawPicture = match serde_json::from_value(json!({"imageId": 1})) {
            Ok(raw) => raw,
            Err(err) => panic!("fixture should deserialise: {err}"),
        };
        assert!(no_url.into_item(0).is_none());

        let no_id: RawPicture = match serde_json::from_value(
            json!({"imageDownloadURL": "https://cdn.example.invalid/a.png"}),
        ) {
            Ok(raw) => raw,
            Err(err) => panic!("fixture should deserialise: {err}"),
        };
        assert!(no_id.into_item(0).is_none());
    }

    #[test]
    fn counts_accept_numbers_and_strings() {
        assert_eq!(count_value(&json!(120)), Some(120));
        assert_eq!(count_value(&json!("120")), Some(120));
        assert_eq!(count_value(&json!("")), Some(0));
        assert_eq!(count_value(&json!("many")), None);
        assert_eq!(count_value(&json!(-1)), None);
    }

    #[tokio::test]
    async fn page_request_carries_credentials_and_one_based_position() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/images/getMyPictures")
                .json_body(json!({
                    "token": "secret",
                    "firstImageNumber": 26,
                    "maxImageCount": 25,
                    "scheduledMissionId": 0,
                    "viewType": "photoRoll"
                }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "totalCount": "120",
                    "imageList": [
                        {
                            "imageId": 5001,
                            "imageTitle": "Orion Nebula (M42)",
                            "imageDownloadURL": "https://cdn.example.invalid/5001.png",
                            "telescopeName": "Canary Four",
                            "displayDate": "Mar. 10, 2024",
                            "displayTime": "22:15 UTC"
                        },
                        {"imageId": 5002, "imageTitle": "no url"}
                    ]
                }));
        });

        let page = catalog_for(&server)
            .fetch_page(request(25, 0))
            .await
            .expect("page should load");
        mock.assert();
        assert_eq!(page.total_count, 120);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.entries, 2);
        assert_eq!(page.items[0].item_id, "5001");
        assert_eq!(page.items[0].position, 25);
        assert_eq!(page.items[0].device_name, "Canary Four");
    }

    #[tokio::test]
    async fn rejected_session_maps_to_auth_expired() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/images/getMyPictures");
            then.status(401);
        });

        let err = catalog_for(&server).fetch_page(request(0, 0)).await;
        assert!(matches!(err, Err(CatalogError::AuthExpired)));
    }

    #[tokio::test]
    async fn server_errors_are_transient_and_garbage_is_malformed() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/images/getMyPictures");
            then.status(503);
        });
        server.mock(|when, then| {
            when.method(POST).path("/api/images/getMissionFITS");
            then.status(200)
                .header("content-type", "application/json")
                .body("<html>login</html>");
        });
        let catalog = catalog_for(&server);

        let outage = catalog.fetch_page(request(0, 0)).await;
        assert!(matches!(&outage, Err(err) if err.is_transient()));

        let mut parent = astrofetch_core::CatalogItem {
            item_id: "1".to_string(),
            secondary_id: None,
            title: "M42".to_string(),
            source_url: "https://cdn.example.invalid/1.png".to_string(),
            media_kind: "png".to_string(),
            group_id: 9,
            captured_at: None,
            device_name: "Canary Four".to_string(),
            instrument: None,
            position: 0,
        };
        let garbage = catalog.companions(&parent).await;
        assert!(matches!(garbage, Err(CatalogError::Malformed { .. })));

        parent.group_id = 0;
        let none = catalog.companions(&parent).await.expect("no lookup for ungrouped items");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn companions_inherit_parent_metadata() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/images/getMissionFITS")
                .json_body(json!({
                    "token": "secret",
                    "firstImageNumber": 1,
                    "maxImageCount": 100,
                    "scheduledMissionId": 4411,
                    "viewType": "missions"
                }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "groupList": [{
                        "groupName": "Luminance",
                        "groupImageList": [
                            {"imageId": 9001, "imageURL": "https://cdn.example.invalid/9001.fits"},
                            {"imageId": 9002}
                        ]
                    }]
                }));
        });
        let parent = astrofetch_core::CatalogItem {
            item_id: "1".to_string(),
            secondary_id: None,
            title: "Trifid Nebula (M20)".to_string(),
            source_url: "https://cdn.example.invalid/1.png".to_string(),
            media_kind: "png".to_string(),
            group_id: 4411,
            captured_at: None,
            device_name: "Canary Two".to_string(),
            instrument: None,
            position: 3,
        };

        let companions = catalog_for(&server)
            .companions(&parent)
            .await
            .expect("companions should load");
        mock.assert();
        assert_eq!(companions.len(), 1);
        assert_eq!(companions[0].item_id, "9001");
        assert_eq!(companions[0].media_kind, "FITS");
        assert_eq!(companions[0].instrument.as_deref(), Some("Luminance"));
        assert_eq!(companions[0].title, parent.title);
        assert_eq!(companions[0].group_id, 4411);
    }
}
