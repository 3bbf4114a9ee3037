//! Trigger specifications and the wire codec.
//!
//! A [`TriggerSpec`] is one recurring fire condition: minute, hour, and a
//! weekday group. On disk it is a 5-field cron-shaped line
//! (`minute hour * * day-pattern`); over the control API it travels as a
//! [`WireTrigger`] with zero-padded string fields and a human day label.
//! This module is the only place that knows both mappings.

use serde::{Deserialize, Serialize};

/// The four recognized weekday-matching groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayGroup {
    /// All seven days.
    EveryDay,
    /// Monday through Friday inclusive.
    Weekdays,
    /// Saturday only.
    Saturday,
    /// Sunday only.
    Sunday,
}

impl DayGroup {
    /// Map a cron day-of-week pattern to a group.
    ///
    /// `*` and `0-6` both mean every day; anything outside the closed set
    /// is unrepresentable and returns `None`.
    pub fn from_pattern(pattern: &str) -> Option<Self> {
        match pattern {
            "*" | "0-6" => Some(Self::EveryDay),
            "1-5" => Some(Self::Weekdays),
            "6" => Some(Self::Saturday),
            "0" => Some(Self::Sunday),
            _ => None,
        }
    }

    /// The cron day-of-week pattern written to the settings file.
    pub fn pattern(self) -> &'static str {
        match self {
            Self::EveryDay => "0-6",
            Self::Weekdays => "1-5",
            Self::Saturday => "6",
            Self::Sunday => "0",
        }
    }

    /// Map a wire-form day label to a group. Unknown labels return `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "All days" => Some(Self::EveryDay),
            "Monday To Friday" => Some(Self::Weekdays),
            "Saturday" => Some(Self::Saturday),
            "Sunday" => Some(Self::Sunday),
            _ => None,
        }
    }

    /// The human-facing label shown in the UI.
    pub fn label(self) -> &'static str {
        match self {
            Self::EveryDay => "All days",
            Self::Weekdays => "Monday To Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }

    /// Returns `true` when the group matches the given weekday.
    pub fn matches(self, weekday: chrono::Weekday) -> bool {
        use chrono::Weekday::{Sat, Sun};
        match self {
            Self::EveryDay => true,
            Self::Weekdays => !matches!(weekday, Sat | Sun),
            Self::Saturday => weekday == Sat,
            Self::Sunday => weekday == Sun,
        }
    }
}

impl std::fmt::Display for DayGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One recurring fire condition. Immutable once constructed; minute and
/// hour are always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Minute of hour (0-59).
    pub minute: u8,
    /// Hour of day (0-23, local time).
    pub hour: u8,
    /// Which weekdays this trigger fires on.
    pub days: DayGroup,
}

impl TriggerSpec {
    /// Build a trigger, rejecting out-of-range minute or hour.
    pub fn new(minute: u8, hour: u8, days: DayGroup) -> Option<Self> {
        if minute > 59 || hour > 23 {
            return None;
        }
        Some(Self { minute, hour, days })
    }

    /// Parse one persisted 5-field line: `minute hour * * day-pattern`.
    ///
    /// Lines with a field count other than five, a non-numeric or
    /// out-of-range minute/hour, or an unrecognized day pattern do not
    /// parse. The day-of-month and month positions are wildcards and are
    /// not inspected.
    pub fn parse_line(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return None;
        }
        let minute: u8 = fields[0].parse().ok()?;
        let hour: u8 = fields[1].parse().ok()?;
        let days = DayGroup::from_pattern(fields[4])?;
        Self::new(minute, hour, days)
    }

    /// Render the persisted 5-field line, tab-separated.
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t*\t*\t{}",
            self.minute,
            self.hour,
            self.days.pattern()
        )
    }

    /// Short identity used in ring logs, e.g. `10:05 Saturday`.
    pub fn describe(&self) -> String {
        format!("{:02}:{:02} {}", self.hour, self.minute, self.days.label())
    }
}

/// Wire form of a trigger as exchanged with the control UI.
///
/// All fields are strings: `hour`/`minute` zero-padded to two digits,
/// `index` a zero-padded positional ordinal, `day` one of the four labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTrigger {
    /// Zero-padded ordinal of the trigger's position in the schedule.
    pub index: String,
    /// Hour of day, two digits.
    pub hour: String,
    /// Minute of hour, two digits.
    pub minute: String,
    /// Human day label.
    pub day: String,
}

/// Strip the fixed-width padding from a wire numeric field.
///
/// Length-1 fields are already unpadded and pass through untouched;
/// longer fields lose at most one leading zero: `"05"` → `"5"`,
/// `"5"` → `"5"`, `"23"` → `"23"`, `"00"` → `"0"`.
fn unpad(field: &str) -> &str {
    if field.len() <= 1 {
        field
    } else {
        field.strip_prefix('0').unwrap_or(field)
    }
}

/// Decode wire triggers into internal specs.
///
/// Entries with an unknown day label or an unparseable hour/minute are
/// dropped from the result; the remaining entries survive in order.
pub fn decode_wire(wire: &[WireTrigger]) -> Vec<TriggerSpec> {
    wire.iter()
        .filter_map(|w| {
            let minute: u8 = unpad(&w.minute).parse().ok()?;
            let hour: u8 = unpad(&w.hour).parse().ok()?;
            let days = DayGroup::from_label(&w.day)?;
            let spec = TriggerSpec::new(minute, hour, days);
            if spec.is_none() {
                tracing::debug!(
                    minute = %w.minute,
                    hour = %w.hour,
                    "dropping out-of-range wire trigger"
                );
            }
            spec
        })
        .collect()
}

/// Encode internal specs into wire triggers for rendering.
///
/// Hour and minute are rendered as exactly two digits; the index is the
/// two-digit zero-padded position in the sequence.
pub fn encode_wire(specs: &[TriggerSpec]) -> Vec<WireTrigger> {
    specs
        .iter()
        .enumerate()
        .map(|(i, spec)| WireTrigger {
            index: format!("{i:02}"),
            hour: format!("{:02}", spec.hour),
            minute: format!("{:02}", spec.minute),
            day: spec.days.label().to_owned(),
        })
        .collect()
}

/// Parse persisted trigger lines, silently skipping malformed entries.
pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> Vec<TriggerSpec> {
    lines
        .iter()
        .filter_map(|line| {
            let parsed = TriggerSpec::parse_line(line.as_ref());
            if parsed.is_none() {
                tracing::debug!(line = line.as_ref(), "skipping malformed trigger line");
            }
            parsed
        })
        .collect()
}
