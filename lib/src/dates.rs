// Copyright 2024 The Grove Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Timestamp rendering for commit display.
//!
//! Commit timestamps are epoch seconds plus a `±HHMM` zone as found on the
//! author/committer lines; everything here renders in that original zone.

use chrono::TimeZone as _;

/// Presentation styles for a commit timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateStyle {
    /// `Thu Apr 7 15:13:13 2005 -0700`
    #[default]
    Default,
    /// `Thu, 7 Apr 2005 15:13:13 -0700`
    Rfc2822,
    /// Humanized offset from the current time, e.g. `2 days ago`
    Relative,
    /// `2005-04-07 15:13:13 -0700`
    Iso8601,
}

/// Converts a `±HHMM` zone value (e.g. `-730` for seven and a half hours
/// west) to an offset in seconds.
fn tz_offset_seconds(tz: i32) -> i32 {
    let hours = tz.abs() / 100;
    let minutes = tz.abs() % 100;
    (hours * 3600 + minutes * 60) * tz.signum()
}

fn to_datetime(epoch: u64, tz: i32) -> Option<chrono::DateTime<chrono::FixedOffset>> {
    let offset = chrono::FixedOffset::east_opt(tz_offset_seconds(tz))
        .unwrap_or_else(|| chrono::FixedOffset::east_opt(0).unwrap());
    let utc = chrono::Utc
        .timestamp_opt(i64::try_from(epoch).ok()?, 0)
        .single()?;
    Some(utc.with_timezone(&offset))
}

/// Renders a timestamp in the given style, with relative dates measured
/// against the system clock.
pub fn show_date(epoch: u64, tz: i32, style: DateStyle) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    show_date_at(epoch, tz, style, now)
}

/// Like [`show_date`], but relative dates are measured against `now_epoch`.
pub fn show_date_at(epoch: u64, tz: i32, style: DateStyle, now_epoch: u64) -> String {
    if style == DateStyle::Relative {
        return match now_epoch.checked_sub(epoch) {
            Some(elapsed) => {
                timeago::Formatter::new().convert(std::time::Duration::from_secs(elapsed))
            }
            None => "in the future".to_string(),
        };
    }
    let Some(datetime) = to_datetime(epoch, tz) else {
        return epoch.to_string();
    };
    let format = match style {
        DateStyle::Default => "%a %b %-d %H:%M:%S %Y %z",
        DateStyle::Rfc2822 => "%a, %-d %b %Y %H:%M:%S %z",
        DateStyle::Iso8601 => "%Y-%m-%d %H:%M:%S %z",
        DateStyle::Relative => unreachable!(),
    };
    datetime.format(format).to_string()
}
