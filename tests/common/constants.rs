//! Shared constants for end-to-end tests
//!
//! When test data changes (user credentials, canned lyrics, etc.),
//! update only this file.

// ============================================================================
// Test User Credentials
// ============================================================================

/// Regular test user email
pub const TEST_USER: &str = "testuser@example.com";

/// Regular test user password
pub const TEST_PASS: &str = "testpass123";

/// A second regular user, used to check that songs stay private
pub const OTHER_USER: &str = "otheruser@example.com";

/// Password of the second regular user
pub const OTHER_PASS: &str = "otherpass123";

/// Admin test user email
pub const ADMIN_USER: &str = "admin@example.com";

/// Admin test user password
pub const ADMIN_PASS: &str = "adminpass123";

// ============================================================================
// Canned songs served by the fake lyrics API
// ============================================================================

/// A song whose lyrics mention two countries
pub const KNOWN_ARTIST: &str = "Artist A";
pub const KNOWN_TITLE: &str = "Title A";
pub const KNOWN_LYRICS: &str = "We drove from Paris in France all the way down to Rome in Italy";

/// Summary and countries the fake LLM returns for `KNOWN_LYRICS`
pub const KNOWN_SUMMARY: &str = "A road trip from France to Italy.";
pub const KNOWN_COUNTRIES: [&str; 2] = ["France", "Italy"];

/// A song the lyrics API knows but has no lyrics for
pub const EMPTY_ARTIST: &str = "Silent Artist";
pub const EMPTY_TITLE: &str = "Instrumental";

/// A song whose lyrics make the fake LLM answer with broken JSON
pub const GARBLED_ARTIST: &str = "Garbled Artist";
pub const GARBLED_TITLE: &str = "Noise";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Maximum time to wait for a song analysis to finish (milliseconds)
pub const ANALYSIS_TIMEOUT_MS: u64 = 5000;

/// Polling interval for the song status endpoint (milliseconds)
pub const STATUS_POLL_INTERVAL_MS: u64 = 20;
