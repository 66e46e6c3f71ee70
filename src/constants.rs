//! Application-wide constants
//!
//! Magic numbers and string literals used throughout the application,
//! providing a single source of truth for constant values.

/// Configuration and state file locations
pub mod config {
    /// Directory under the platform config dir
    pub const APP_DIR: &str = "snapback";

    /// Settings file name
    pub const SETTINGS_FILENAME: &str = "settings.json";

    /// Persisted snapshot store file name
    pub const HISTORY_FILENAME: &str = "history.json";
}

/// Window positioning constants
pub mod positioning {
    /// Maximum move attempts before falling back to the churn workaround
    pub const MOVE_ATTEMPTS: u32 = 3;

    /// Delay between the two churn moves, in milliseconds
    pub const CHURN_DELAY_MS: u64 = 50;

    /// Baseline DPI that scaling factors are expressed against
    /// (96 DPI = 100% in display settings)
    pub const BASE_DPI: u32 = 96;
}

/// Snapshot history constants
pub mod history {
    /// Maximum history frames kept per snapshot
    pub const DEFAULT_MAX_FRAMES: usize = 10;

    /// Name of the standing sentinel snapshot that matches any
    /// display configuration
    pub const GLOBAL_SNAPSHOT: &str = "Global";

    /// Name given to rules created without one
    pub const UNNAMED_RULE: &str = "Unnamed rule";
}
