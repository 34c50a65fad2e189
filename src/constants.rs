//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Persistence keys and file naming
pub mod storage {
    /// Key of the single global layer snapshot
    pub const STORAGE_KEY: &str = "sports-overlay-resources";

    /// Extension used for snapshot files
    pub const SNAPSHOT_EXTENSION: &str = "json";

    /// Subdirectory (under the data dir) that receives uploaded images
    pub const IMAGES_DIR: &str = "images";
}

/// Sync channel constants
pub mod sync {
    /// Name of the shared broadcast channel
    pub const CHANNEL_NAME: &str = "overlay-sync";

    /// Fallback polling cadence in milliseconds
    pub const POLL_INTERVAL_MS: u64 = 2000;

    /// Wire tag for a snapshot message
    pub const UPDATE_TAG: &str = "update";

    /// Maximum message size (10 MB) to prevent DoS via memory exhaustion
    pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

    /// Socket file extension for subscriber endpoints
    pub const SOCKET_EXTENSION: &str = "sock";

    /// Per-subscriber write timeout in milliseconds
    pub const WRITE_TIMEOUT_MS: u64 = 500;

    /// Subscriber gives up on a stalled publisher connection after this long
    pub const READ_TIMEOUT_MS: u64 = 2000;
}

/// Resource admission limits
pub mod limits {
    /// Hard cap on image layers in one store
    pub const MAX_IMAGE_LAYERS: usize = 15;

    /// Largest accepted upload in bytes (10 MiB)
    pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

    /// Smallest text font size
    pub const MIN_FONT_SIZE: f64 = 10.0;

    /// Largest text font size
    pub const MAX_FONT_SIZE: f64 = 400.0;

    /// Display names keep this many characters of the text
    pub const NAME_TEXT_CHARS: usize = 10;
}

/// Default layer geometry and content
pub mod defaults {
    /// Spawn position for layers created without geometry
    pub const SPAWN_X: f64 = 100.0;
    pub const SPAWN_Y: f64 = 100.0;

    pub const IMAGE_WIDTH: f64 = 200.0;
    pub const IMAGE_HEIGHT: f64 = 200.0;

    pub const SHAPE_WIDTH: f64 = 200.0;
    pub const RECT_HEIGHT: f64 = 120.0;
    pub const CIRCLE_HEIGHT: f64 = 200.0;

    /// Text width is chars * font size * this factor
    pub const TEXT_WIDTH_FACTOR: f64 = 0.6;
    /// Text height is font size * this factor
    pub const TEXT_HEIGHT_FACTOR: f64 = 1.5;

    pub const FONT_FAMILY: &str = "Pretendard";
    pub const FONT_SIZE: f64 = 24.0;
    pub const TEXT_COLOR: &str = "#000000";

    pub const SHAPE_FILL: &str = "#3b82f6";
    pub const SHAPE_STROKE: &str = "transparent";

    pub const OPACITY: f64 = 1.0;
}

/// Keyboard nudge steps
pub mod nudge {
    /// Arrow key step without modifier
    pub const STEP: f64 = 1.0;

    /// Arrow key step with the modifier held
    pub const STEP_LARGE: f64 = 10.0;
}

/// Config file location
pub mod config {
    /// Application directory under the platform config/data dirs
    pub const APP_DIR: &str = "sports-overlay";

    /// Config file name
    pub const FILENAME: &str = "config.json";
}

/// Config value bounds enforced after load
pub mod validation {
    pub const MIN_POLL_INTERVAL_MS: u64 = 100;
    pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;
}

/// Authentication
pub mod auth {
    /// Environment variable holding the editor access token
    pub const TOKEN_ENV: &str = "OVERLAY_ACCESS_TOKEN";
}
