pub mod reno;
pub mod selective_repeat;

pub use reno::RenoSender;
pub use selective_repeat::SelectiveRepeatSender;

use std::time::Duration;

/// Spacing between repeated EOF transmissions (spec §4.5: "5-10 times at
/// ~50ms spacing"; both variants use the same cadence).
pub const EOF_RESEND_SPACING: Duration = Duration::from_millis(50);
/// Number of times the EOF marker is (re-)sent once the stream drains.
pub const EOF_RESEND_COUNT: u32 = 5;
/// How long the sender blocks waiting for the initial handshake datagram.
pub const HANDSHAKE_WAIT: Duration = Duration::from_secs(5);
