// SPDX-License-Identifier: AGPL-3.0-or-later
//! Push and notification-click handling

use gpw_core::{ClientHost, ClientId, GpwResult, NotificationData, NotificationHost, NotificationIntent};
use serde::{Deserialize, Serialize};

use crate::config::NotificationConfig;

/// Push message body. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PushPayload {
    /// Decode a push body. Absent, empty or malformed data yields the empty
    /// payload.
    pub fn decode(data: Option<&[u8]>) -> Self {
        let Some(data) = data.filter(|d| !d.is_empty()) else {
            return Self::default();
        };
        match serde_json::from_slice(data) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Ignoring undecodable push payload: {}", e);
                Self::default()
            }
        }
    }

    /// Fill missing or empty fields from `defaults`
    pub fn into_intent(self, defaults: &NotificationConfig) -> NotificationIntent {
        fn or(value: Option<String>, default: &str) -> String {
            value.filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
        }

        NotificationIntent {
            title: or(self.title, &defaults.default_title),
            body: or(self.body, &defaults.default_body),
            icon: defaults.icon.clone(),
            badge: defaults.badge.clone(),
            data: NotificationData {
                url: or(self.url, &defaults.default_url),
            },
        }
    }
}

/// A click on a shown notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationClick {
    pub tag: String,
    pub data: Option<NotificationData>,
}

/// Decode, build and display. Returns the host tag with the shown intent.
pub async fn handle_push(
    data: Option<&[u8]>,
    defaults: &NotificationConfig,
    host: &dyn NotificationHost,
) -> GpwResult<(String, NotificationIntent)> {
    let intent = PushPayload::decode(data).into_intent(defaults);
    let tag = host.show(&intent).await?;
    tracing::info!("Showing notification {} ({})", tag, intent.title);
    Ok((tag, intent))
}

/// Close the notification, then focus a client already at the target URL
/// or open a new window there.
pub async fn handle_click(
    click: &NotificationClick,
    defaults: &NotificationConfig,
    notifications: &dyn NotificationHost,
    clients: &dyn ClientHost,
) -> GpwResult<ClientId> {
    notifications.close(&click.tag).await?;

    let url = click
        .data
        .as_ref()
        .map(|d| d.url.as_str())
        .filter(|u| !u.is_empty())
        .unwrap_or(defaults.default_url.as_str());

    let existing = clients.list().await?.into_iter().find(|c| c.url == url);
    match existing {
        Some(client) => {
            tracing::debug!("Focusing client {} at {}", client.id, url);
            clients.focus(&client.id).await?;
            Ok(client.id)
        }
        None => {
            tracing::debug!("Opening window at {}", url);
            clients.open_window(url).await
        }
    }
}
