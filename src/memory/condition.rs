//! Condition tag parsing and evaluation.
//!
//! Rules carry condition tags in one of three fixed grammars:
//! - `time==HH:MM` — fires during that exact minute of the day
//! - `last_message_elapsed>N` — fires once N seconds have passed since
//!   the last logged message
//! - `weekday==A-B` — fires when the ISO weekday (1=Mon..7=Sun) falls in
//!   the inclusive range
//!
//! Anything else is invalid and inert: it never triggers and never errors.

use chrono::{DateTime, Datelike, Local, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

/// Substituted when a rule ends up with no valid condition tags.
pub const DEFAULT_CONDITION_TAG: &str = "time==08:00";

static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^time==(\d{2}):(\d{2})$").unwrap());
static ELAPSED_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^last_message_elapsed>(\d+)$").unwrap());
static WEEKDAY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^weekday==(\d)-(\d)$").unwrap());

/// A parsed condition tag.
///
/// Parsing is purely syntactic: out-of-range values such as `time==25:61`
/// produce a tag that simply never evaluates true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionTag {
    TimeOfDay { hour: u8, minute: u8 },
    ElapsedSince { seconds: u64 },
    WeekdayRange { start: u8, end: u8 },
}

impl ConditionTag {
    /// Parse a tag string against the three grammars. Returns `None` for
    /// anything that does not match exactly.
    pub fn parse(tag: &str) -> Option<ConditionTag> {
        if let Some(caps) = TIME_PATTERN.captures(tag) {
            return Some(ConditionTag::TimeOfDay {
                hour: caps[1].parse().ok()?,
                minute: caps[2].parse().ok()?,
            });
        }
        if let Some(caps) = ELAPSED_PATTERN.captures(tag) {
            return Some(ConditionTag::ElapsedSince {
                seconds: caps[1].parse().ok()?,
            });
        }
        if let Some(caps) = WEEKDAY_PATTERN.captures(tag) {
            return Some(ConditionTag::WeekdayRange {
                start: caps[1].parse().ok()?,
                end: caps[2].parse().ok()?,
            });
        }
        None
    }

    /// Evaluate this tag against the current time and the time of the
    /// last recorded message.
    pub fn evaluate(&self, now: DateTime<Local>, last_activity: Option<DateTime<Local>>) -> bool {
        match *self {
            ConditionTag::TimeOfDay { hour, minute } => {
                now.hour() == u32::from(hour) && now.minute() == u32::from(minute)
            }
            ConditionTag::ElapsedSince { seconds } => match last_activity {
                Some(last) => {
                    let elapsed = now.signed_duration_since(last).num_seconds();
                    elapsed > 0 && elapsed as u64 > seconds
                }
                None => false,
            },
            ConditionTag::WeekdayRange { start, end } => {
                let weekday = now.weekday().number_from_monday() as u8;
                start <= weekday && weekday <= end
            }
        }
    }
}

/// Evaluate a raw tag string. Unrecognized tags fail open to "not
/// triggered" rather than erroring.
pub fn evaluate_tag(tag: &str, now: DateTime<Local>, last_activity: Option<DateTime<Local>>) -> bool {
    match ConditionTag::parse(tag) {
        Some(parsed) => parsed.evaluate(now, last_activity),
        None => {
            log::debug!("[CONDITION] Unknown condition tag: {}", tag);
            false
        }
    }
}

/// Keep only tags matching one of the three grammars; if none survive,
/// substitute the default tag.
pub fn sanitize_tags(tags: &[String]) -> Vec<String> {
    let valid: Vec<String> = tags
        .iter()
        .filter(|t| ConditionTag::parse(t).is_some())
        .cloned()
        .collect();

    if valid.is_empty() {
        vec![DEFAULT_CONDITION_TAG.to_string()]
    } else {
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn parses_all_three_grammars() {
        assert_eq!(
            ConditionTag::parse("time==08:00"),
            Some(ConditionTag::TimeOfDay { hour: 8, minute: 0 })
        );
        assert_eq!(
            ConditionTag::parse("last_message_elapsed>1200"),
            Some(ConditionTag::ElapsedSince { seconds: 1200 })
        );
        assert_eq!(
            ConditionTag::parse("weekday==1-5"),
            Some(ConditionTag::WeekdayRange { start: 1, end: 5 })
        );
    }

    #[test]
    fn rejects_malformed_tags() {
        for tag in [
            "time==8:00",
            "time==08:00:00",
            "time=08:00",
            "last_message_elapsed>",
            "last_message_elapsed>12s",
            "weekday==1-10",
            "weekday==mon-fri",
            "every_full_moon",
            "",
        ] {
            assert_eq!(ConditionTag::parse(tag), None, "tag {:?} should be invalid", tag);
        }
    }

    #[test]
    fn time_tag_matches_only_the_exact_minute() {
        let tag = ConditionTag::parse("time==12:30").unwrap();
        assert!(tag.evaluate(at(2025, 6, 3, 12, 30, 0), None));
        assert!(tag.evaluate(at(2025, 6, 3, 12, 30, 59), None));
        assert!(!tag.evaluate(at(2025, 6, 3, 12, 29, 59), None));
        assert!(!tag.evaluate(at(2025, 6, 3, 12, 31, 0), None));
        assert!(!tag.evaluate(at(2025, 6, 3, 0, 30, 0), None));
    }

    #[test]
    fn out_of_range_time_never_fires() {
        let tag = ConditionTag::parse("time==25:61").unwrap();
        for hour in 0..24 {
            assert!(!tag.evaluate(at(2025, 6, 3, hour, 0, 0), None));
        }
    }

    #[test]
    fn elapsed_requires_prior_activity() {
        let tag = ConditionTag::parse("last_message_elapsed>600").unwrap();
        assert!(!tag.evaluate(at(2025, 6, 3, 12, 0, 0), None));
    }

    #[test]
    fn elapsed_is_strictly_greater_than() {
        let tag = ConditionTag::parse("last_message_elapsed>600").unwrap();
        let last = at(2025, 6, 3, 12, 0, 0);
        assert!(!tag.evaluate(at(2025, 6, 3, 12, 10, 0), Some(last))); // exactly 600s
        assert!(tag.evaluate(at(2025, 6, 3, 12, 10, 1), Some(last))); // 601s
        assert!(!tag.evaluate(at(2025, 6, 3, 12, 5, 0), Some(last)));
    }

    #[test]
    fn weekday_range_is_inclusive() {
        // 2025-06-02 is a Monday.
        let weekdays = ConditionTag::parse("weekday==1-5").unwrap();
        assert!(weekdays.evaluate(at(2025, 6, 2, 9, 0, 0), None)); // Mon
        assert!(weekdays.evaluate(at(2025, 6, 6, 9, 0, 0), None)); // Fri
        assert!(!weekdays.evaluate(at(2025, 6, 7, 9, 0, 0), None)); // Sat
        assert!(!weekdays.evaluate(at(2025, 6, 8, 9, 0, 0), None)); // Sun

        let weekend = ConditionTag::parse("weekday==6-7").unwrap();
        assert!(weekend.evaluate(at(2025, 6, 7, 9, 0, 0), None));
        assert!(weekend.evaluate(at(2025, 6, 8, 9, 0, 0), None));
        assert!(!weekend.evaluate(at(2025, 6, 4, 9, 0, 0), None));
    }

    #[test]
    fn unknown_tags_evaluate_false() {
        assert!(!evaluate_tag("on_rainy_days", at(2025, 6, 3, 12, 0, 0), None));
    }

    #[test]
    fn sanitize_keeps_valid_list_unchanged() {
        let tags = vec!["time==07:30".to_string(), "weekday==1-5".to_string()];
        assert_eq!(sanitize_tags(&tags), tags);
    }

    #[test]
    fn sanitize_strips_invalid_tags() {
        let tags = vec![
            "time==07:30".to_string(),
            "whenever".to_string(),
            "last_message_elapsed>60".to_string(),
        ];
        assert_eq!(
            sanitize_tags(&tags),
            vec!["time==07:30".to_string(), "last_message_elapsed>60".to_string()]
        );
    }

    #[test]
    fn sanitize_substitutes_default_when_nothing_survives() {
        let tags = vec!["whenever".to_string(), "time==noon".to_string()];
        assert_eq!(sanitize_tags(&tags), vec![DEFAULT_CONDITION_TAG.to_string()]);
        assert_eq!(sanitize_tags(&[]), vec![DEFAULT_CONDITION_TAG.to_string()]);
    }
}
