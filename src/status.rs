//! Activity log and the per-tick status snapshot
//!
//! This is everything a renderer needs to draw the current state. The loop
//! publishes a [`StatusSnapshot`] through a watch channel every tick; the
//! drawing itself lives outside this crate.

use crate::config::{Params, CONFIG_ITEMS};
use crate::mapping::Mode;
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub const LOG_CAPACITY: usize = 14;
const MAX_MESSAGE_CHARS: usize = 59;
const SHORTENED_CHARS: usize = 56;

/// Cuts messages that would not fit one log line
pub fn shorten(message: &str) -> String {
    if message.chars().count() > MAX_MESSAGE_CHARS {
        let head: String = message.chars().take(SHORTENED_CHARS).collect();
        format!("{}...", head)
    } else {
        message.to_string()
    }
}

/// Bounded list of timestamped user-facing events, oldest first
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    entries: VecDeque<String>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: &str) {
        self.add_at(message, Local::now());
    }

    pub fn add_at(&mut self, message: &str, time: DateTime<Local>) {
        info!("{}", message);
        self.entries
            .push_back(format!("[{}] {}", time.format("%H:%M"), shorten(message)));
        while self.entries.len() > LOG_CAPACITY {
            self.entries.pop_front();
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub connected: bool,
    pub device_name: Option<String>,
    pub mode: Mode,
    pub selection: usize,
    pub params: Params,
    pub motion_active: bool,
    pub speed: f64,
    pub pressed_buttons: Vec<usize>,
    pub using_file: bool,
    pub last_saved: Option<DateTime<Local>>,
    /// Analog axes 0 to 3
    pub axes: [f32; 4],
    pub log: Vec<String>,
}

impl StatusSnapshot {
    pub fn summary(&self) -> String {
        let device = match (&self.device_name, self.connected) {
            (Some(name), true) => name.as_str(),
            (None, true) => "gamepad",
            (_, false) => "no gamepad",
        };
        let mut summary = format!(
            "{} | {} | motion {} | speed {:.1} | file {}",
            device,
            self.mode,
            if self.motion_active { "on" } else { "off" },
            self.speed,
            if self.using_file { "yes" } else { "no" },
        );
        if self.mode == Mode::Config {
            if let Some(item) = CONFIG_ITEMS.get(self.selection) {
                let value = self.params.value_of(item.name).unwrap_or_default();
                summary.push_str(&format!(" | {} {}", item.label(), item.format(value)));
            }
        }
        summary
    }
}

/// Logs a summary line whenever mode, connection or motion flag change
pub fn spawn_status_reporter(mut receiver: watch::Receiver<StatusSnapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last: Option<(Mode, bool, bool)> = None;
        while receiver.changed().await.is_ok() {
            let (key, summary) = {
                let status = receiver.borrow_and_update();
                (
                    (status.mode, status.connected, status.motion_active),
                    status.summary(),
                )
            };
            if last != Some(key) {
                debug!("Status: {}", summary);
                last = Some(key);
            }
        }
        debug!("Status channel closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn log_keeps_most_recent_entries() {
        let mut log = ActivityLog::new();
        for i in 0..20 {
            log.add(&format!("entry {}", i));
        }
        let lines = log.lines();
        assert_eq!(lines.len(), LOG_CAPACITY);
        assert!(lines[0].ends_with("entry 6"));
        assert!(lines[LOG_CAPACITY - 1].ends_with("entry 19"));
    }

    #[test]
    fn log_lines_are_timestamped() {
        let mut log = ActivityLog::new();
        let time = Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap();
        log.add_at("MUTE", time);
        assert_eq!(log.lines(), vec!["[09:05] MUTE"]);
    }

    #[test]
    fn long_messages_are_shortened() {
        let exact = "x".repeat(59);
        assert_eq!(shorten(&exact), exact);

        let long = "y".repeat(60);
        let short = shorten(&long);
        assert_eq!(short.chars().count(), 59);
        assert!(short.ends_with("..."));

        // multi-byte characters count as one
        let arrows = "→".repeat(70);
        assert_eq!(shorten(&arrows).chars().count(), 59);
    }

    #[test]
    fn summary_mentions_mode_and_device() {
        let snapshot = StatusSnapshot {
            connected: true,
            device_name: Some("Xbox Controller".to_string()),
            mode: Mode::Config,
            motion_active: true,
            ..Default::default()
        };
        let summary = snapshot.summary();
        assert!(summary.starts_with("Xbox Controller | CONFIG"));
        assert!(summary.ends_with("| Sensitivity 1.2"));

        let offline = StatusSnapshot::default();
        assert!(offline.summary().starts_with("no gamepad | NORMAL"));
    }

    #[tokio::test]
    async fn reporter_stops_when_sender_dropped() {
        let (tx, rx) = watch::channel(StatusSnapshot::default());
        let reporter = spawn_status_reporter(rx);
        tx.send_replace(StatusSnapshot {
            connected: true,
            ..Default::default()
        });
        drop(tx);
        reporter.await.unwrap();
    }
}
