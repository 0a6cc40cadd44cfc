//! Configuration assembly: an optional TOML file overridden by environment
//! variables and flags, validated into the supervisor's config.

use crate::cli::Args;
use crate::error::{AppError, Result};
use chat_aggregator::credentials::FacebookAppConfig;
use chat_aggregator::platforms::{KickConfig, KickTransport, YouTubeConfig};
use chat_aggregator::supervisor::AggregatorConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_NOTIFY_TOPIC: &str = "chat-notifier";
const DEFAULT_CONTROL_TOPIC: &str = "chatcontrol";
const DEFAULT_NTFY_BASE_URL: &str = "https://ntfy.sh";

/// TOML file counterpart of the CLI options.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub youtube_api_key: Option<String>,
    pub youtube_channel_id: Option<String>,
    pub youtube_video_id: Option<String>,
    pub facebook_app_id: Option<String>,
    pub facebook_app_secret: Option<String>,
    pub facebook_user_token: Option<String>,
    pub facebook_page_id: Option<String>,
    pub kick_channel: Option<String>,
    pub kick_username: Option<String>,
    pub kick_transport: Option<String>,
    pub notify_topic: Option<String>,
    pub control_topic: Option<String>,
    pub ntfy_base_url: Option<String>,
}

impl FileConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        let text = fs::read_to_string(&path)?;
        Ok(toml::from_str(&text)?)
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatrelay").join("config.toml"))
    }
}

/// Merge flags/environment over the file config and validate per platform.
pub fn build(args: Args, file: FileConfig) -> Result<AggregatorConfig> {
    let youtube_api_key = args.youtube_api_key.or(file.youtube_api_key);
    let youtube_channel_id = args.youtube_channel_id.or(file.youtube_channel_id);
    let youtube_video_id = args.youtube_video_id.or(file.youtube_video_id);

    let youtube = match (youtube_api_key, youtube_channel_id) {
        (Some(api_key), Some(channel_id)) => Some(YouTubeConfig {
            api_key,
            channel_id,
            video_id: youtube_video_id,
        }),
        (None, None) => None,
        _ => {
            return Err(AppError::InvalidConfig(
                "youtube_api_key and youtube_channel_id must be set together".into(),
            ));
        }
    };

    let facebook_parts = [
        args.facebook_app_id.or(file.facebook_app_id),
        args.facebook_app_secret.or(file.facebook_app_secret),
        args.facebook_user_token.or(file.facebook_user_token),
        args.facebook_page_id.or(file.facebook_page_id),
    ];
    let facebook = match facebook_parts {
        [Some(app_id), Some(app_secret), Some(user_token), Some(page_id)] => {
            Some(FacebookAppConfig {
                app_id,
                app_secret,
                user_token,
                page_id,
            })
        }
        [None, None, None, None] => None,
        _ => {
            return Err(AppError::InvalidConfig(
                "facebook_app_id, facebook_app_secret, facebook_user_token and \
                 facebook_page_id must be set together"
                    .into(),
            ));
        }
    };

    let kick_transport = match args.kick_transport.or(file.kick_transport) {
        Some(value) => value
            .parse::<KickTransport>()
            .map_err(AppError::InvalidConfig)?,
        None => KickTransport::default(),
    };
    let kick = args
        .kick_channel
        .or(file.kick_channel)
        .map(|channel| KickConfig {
            channel,
            username: args.kick_username.or(file.kick_username),
            transport: kick_transport,
        });

    if youtube.is_none() && facebook.is_none() && kick.is_none() {
        return Err(AppError::InvalidConfig(
            "at least one platform must be configured".into(),
        ));
    }

    Ok(AggregatorConfig {
        youtube,
        facebook,
        kick,
        notify_topic: args
            .notify_topic
            .or(file.notify_topic)
            .unwrap_or_else(|| DEFAULT_NOTIFY_TOPIC.into()),
        control_topic: args
            .control_topic
            .or(file.control_topic)
            .unwrap_or_else(|| DEFAULT_CONTROL_TOPIC.into()),
        ntfy_base_url: args
            .ntfy_base_url
            .or(file.ntfy_base_url)
            .unwrap_or_else(|| DEFAULT_NTFY_BASE_URL.into()),
    })
}
