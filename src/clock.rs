use time::{macros::format_description, Date, OffsetDateTime, UtcOffset};

/// Wall clock pinned to the configured UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    offset: UtcOffset,
}

impl Clock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }

    pub fn today(&self) -> Date {
        self.now().date()
    }
}

/// `YYYY-MM-DD HH:MM:SS`, the timestamp format of history entries.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    at.format(&format)
        .unwrap_or_else(|_| format_date(at.date()))
}

pub fn format_date(date: Date) -> String {
    let format = format_description!("[year]-[month]-[day]");
    date.format(&format).unwrap_or_default()
}

pub fn parse_date(raw: &str) -> Option<Date> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw.get(..10)?, &format).ok()
}

/// `19 Oct` style label used by the calendar view.
pub fn pretty_date(date: Date) -> String {
    let format = format_description!("[day] [month repr:short]");
    date.format(&format).unwrap_or_default()
}
