//! Apple universal-links manifest.

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Json},
};
use serde::Serialize;

pub const APP_IDS: [&str; 2] = [
    "RF4X369C9P.com.cognonta.raphacure",
    "RF4X369C9P.com.rcure.app",
];
pub const CACHE_CONTROL: &str = "public, max-age=3600, must-revalidate";

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct AppSiteAssociation {
    applinks: AppLinks,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
struct AppLinks {
    apps: Vec<String>,
    details: Vec<AppLinkDetail>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
struct AppLinkDetail {
    #[serde(rename = "appID")]
    app_id: &'static str,
    paths: Vec<&'static str>,
}

impl Default for AppSiteAssociation {
    fn default() -> Self {
        Self {
            applinks: AppLinks {
                apps: Vec::new(),
                details: APP_IDS
                    .into_iter()
                    .map(|app_id| AppLinkDetail {
                        app_id,
                        paths: vec!["*"],
                    })
                    .collect(),
            },
        }
    }
}

pub async fn app_site_association() -> impl IntoResponse {
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL)),
        ],
        Json(AppSiteAssociation::default()),
    )
}
