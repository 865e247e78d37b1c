//! Constants for webforge

/// Default manifest file name
pub const MANIFEST_FILE: &str = "webforge.toml";

/// Debug log file, written next to the working directory
pub const LOG_FILE: &str = "webforge.log";

/// Token delimiter pattern: `@_@name@_@`
pub const TOKEN_PATTERN: &str = r"@_@(.*?)@_@";

/// Default port for the static file server
pub const DEFAULT_PORT: u16 = 8080;

/// Default indent width for the prettify stage
pub const DEFAULT_INDENT: usize = 4;

/// Quiet period before a batch of filesystem events triggers a rebuild
pub const WATCH_DEBOUNCE_MS: u64 = 200;

/// Path of the server-sent-events endpoint used for live reload
pub const LIVERELOAD_PATH: &str = "/__livereload";
