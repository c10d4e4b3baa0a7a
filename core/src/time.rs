use chrono::{DateTime, Local};

/// Timestamp embedded in output file names, `YYYYMMDD_HHMMSS` in local time.
pub fn output_timestamp(time: DateTime<Local>) -> String {
    time.format("%Y%m%d_%H%M%S").to_string()
}

pub fn current_output_timestamp() -> String {
    output_timestamp(Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_underscore_separator() {
        let time = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(output_timestamp(time), "20240307_090501");
    }
}
