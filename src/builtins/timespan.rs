use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::builtins::format_number;

const TICK: u64 = 50;
const SECOND: u64 = 1000;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const MONTH: u64 = 30 * DAY;
const YEAR: u64 = 365 * DAY;

/// Game time runs this many times faster than real time.
const GAME_TIME_FACTOR: f64 = 72.0;

static CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+:\d\d(:\d\d)?(\.\d{1,4})?$").expect("static pattern"));
static AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("static pattern"));

const UNITS: [(&str, &str, u64); 8] = [
    ("tick", "ticks", TICK),
    ("second", "seconds", SECOND),
    ("minute", "minutes", MINUTE),
    ("hour", "hours", HOUR),
    ("day", "days", DAY),
    ("week", "weeks", WEEK),
    ("month", "months", MONTH),
    ("year", "years", YEAR),
];

/// Units used when printing, largest first.
const DISPLAY_UNITS: [(&str, &str, u64); 4] = [
    ("day", "days", DAY),
    ("hour", "hours", HOUR),
    ("minute", "minutes", MINUTE),
    ("second", "seconds", SECOND),
];

/// A non-negative duration with millisecond precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timespan {
    millis: u64,
}

impl Timespan {
    pub fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub fn from_ticks(ticks: u64) -> Self {
        Self {
            millis: ticks.saturating_mul(TICK),
        }
    }

    pub fn millis(&self) -> u64 {
        self.millis
    }

    pub fn ticks(&self) -> u64 {
        (self.millis as f64 / TICK as f64).round() as u64
    }

    /// Parse `MM:SS[.ms]`, `HH:MM:SS[.ms]`, or phrases like
    /// `2 minutes and 30 seconds`, `a day` and `5 minecraft minutes`.
    pub fn parse(text: &str) -> Option<Timespan> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if CLOCK.is_match(text) {
            return Self::parse_clock(text);
        }

        let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
        let mut millis = 0u64;
        let mut game_time: Option<bool> = None;
        let mut i = 0;

        while i < words.len() {
            let mut word = words[i].as_str();
            if word == "and" {
                if i == 0 || i == words.len() - 1 {
                    return None;
                }
                i += 1;
                continue;
            }

            let mut amount = 1.0;
            if word == "a" || word == "an" || AMOUNT.is_match(word) {
                if i == words.len() - 1 {
                    return None;
                }
                if AMOUNT.is_match(word) {
                    amount = word.parse::<f64>().ok()?;
                }
                i += 1;
                word = words[i].as_str();
            }

            let mut is_game_time = false;
            if matches!(word, "real" | "rl" | "irl") || matches!(word, "minecraft" | "mc") {
                is_game_time = matches!(word, "minecraft" | "mc");
                if i == words.len() - 1 || game_time.is_some_and(|g| g != is_game_time) {
                    return None;
                }
                i += 1;
                word = words[i].as_str();
            } else if game_time == Some(true) {
                is_game_time = true;
            }

            let unit = word.strip_suffix(',').unwrap_or(word);
            let (_, _, unit_millis) = UNITS
                .iter()
                .find(|(singular, plural, _)| *singular == unit || *plural == unit)?;

            if is_game_time && *unit_millis != TICK {
                amount /= GAME_TIME_FACTOR;
            }
            let part = (amount * *unit_millis as f64).round();
            if !part.is_finite() || part >= u64::MAX as f64 {
                return None;
            }
            millis = millis.checked_add(part as u64)?;
            game_time = Some(is_game_time);
            i += 1;
        }

        Some(Timespan { millis })
    }

    /// `None` when a group does not fit or the total overflows.
    fn parse_clock(text: &str) -> Option<Timespan> {
        const PARTS: [u64; 4] = [HOUR, MINUTE, SECOND, 1];
        let parts: Vec<u64> = text
            .split(|c: char| c == ':' || c == '.')
            .map(|p| p.parse().ok())
            .collect::<Option<_>>()?;
        let offset = if (parts.len() == 3 && !text.contains('.')) || parts.len() == 4 {
            0
        } else {
            1
        };
        let millis = parts
            .iter()
            .enumerate()
            .try_fold(0u64, |total, (i, v)| total.checked_add(PARTS[offset + i].checked_mul(*v)?))?;
        Some(Timespan { millis })
    }

    /// `1 minute and 30 seconds`: the largest unit that fits, plus the next
    /// smaller unit when the remainder prints as non-zero.
    pub fn to_display(&self, accuracy: usize) -> String {
        let millis = self.millis;
        for pair in DISPLAY_UNITS.windows(2) {
            let (big, small) = (pair[0], pair[1]);
            if millis < big.2 {
                continue;
            }
            let rest = (millis % big.2) as f64 / small.2 as f64;
            let rest_text = format_number(rest, accuracy);
            if rest_text != "0" {
                let whole = (millis / big.2) as f64;
                return format!(
                    "{} and {}",
                    with_amount(whole, big, accuracy),
                    with_amount(rest, small, accuracy)
                );
            }
            return with_amount(millis as f64 / big.2 as f64, big, accuracy);
        }
        with_amount(millis as f64 / SECOND as f64, DISPLAY_UNITS[3], accuracy)
    }
}

fn with_amount(amount: f64, (singular, plural, _): (&str, &str, u64), accuracy: usize) -> String {
    let number = format_number(amount, accuracy);
    let noun = if number == "1" { singular } else { plural };
    format!("{} {}", number, noun)
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display(2))
    }
}
