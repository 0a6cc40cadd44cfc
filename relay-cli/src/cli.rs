use clap::Parser;
use std::path::PathBuf;

/// Relay live chat from YouTube, Facebook and Kick to an ntfy topic.
///
/// Every option can also come from its environment variable or from an
/// optional TOML config file; flags and environment win over the file.
#[derive(Debug, Parser)]
#[command(name = "chatrelay", version, about)]
pub struct Args {
    /// Path to a TOML config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose logging (debug level).
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub youtube_api_key: Option<String>,

    #[arg(long, env = "YOUTUBE_CHANNEL_ID")]
    pub youtube_channel_id: Option<String>,

    /// Pin a specific video instead of searching for an active broadcast.
    #[arg(long, env = "YOUTUBE_VIDEO_ID")]
    pub youtube_video_id: Option<String>,

    #[arg(long, env = "FACEBOOK_APP_ID")]
    pub facebook_app_id: Option<String>,

    #[arg(long, env = "FACEBOOK_APP_SECRET", hide_env_values = true)]
    pub facebook_app_secret: Option<String>,

    #[arg(long, env = "FACEBOOK_USER_TOKEN", hide_env_values = true)]
    pub facebook_user_token: Option<String>,

    #[arg(long, env = "FACEBOOK_PAGE_ID")]
    pub facebook_page_id: Option<String>,

    #[arg(long, env = "KICK_CHANNEL")]
    pub kick_channel: Option<String>,

    /// IRC nick for the Kick chat connection.
    #[arg(long, env = "KICK_USERNAME")]
    pub kick_username: Option<String>,

    /// Kick chat transport: "websocket" (default) or "polling".
    #[arg(long, env = "KICK_TRANSPORT")]
    pub kick_transport: Option<String>,

    /// Topic chat messages are posted to.
    #[arg(long, env = "NTFY_TOPIC")]
    pub notify_topic: Option<String>,

    /// Topic consumed as the remote start/stop switch.
    #[arg(long, env = "NTFY_CONTROL_TOPIC")]
    pub control_topic: Option<String>,

    #[arg(long, env = "NTFY_BASE_URL")]
    pub ntfy_base_url: Option<String>,
}
