//! Device-side context recorded next to the capture: user interaction and
//! CPU utilisation. Timestamps are seconds on the trace clock.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserEventKind {
    ScreenTouch,
    Key,
    ScreenLandscape,
    ScreenPortrait,
    Other,
}

impl UserEventKind {
    pub fn is_orientation_change(&self) -> bool {
        matches!(
            self,
            UserEventKind::ScreenLandscape | UserEventKind::ScreenPortrait
        )
    }
}

/// One press/release interaction.
///
/// # Examples
/// ```
/// use radiotrace_core::{UserEvent, UserEventKind};
///
/// let events: Vec<UserEvent> = serde_json::from_str(
///     r#"[{"press": 1.0, "release": 1.2, "kind": "screen_touch"}]"#,
/// )?;
/// assert_eq!(events[0].kind, UserEventKind::ScreenTouch);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserEvent {
    pub press: f64,
    pub release: f64,
    #[serde(default = "default_kind")]
    pub kind: UserEventKind,
}

fn default_kind() -> UserEventKind {
    UserEventKind::Other
}

/// Total CPU usage in percent at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuSample {
    pub timestamp: f64,
    pub usage: f64,
}
