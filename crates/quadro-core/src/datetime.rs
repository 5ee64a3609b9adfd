use chrono::{
  DateTime,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;

const TIMEZONE_ENV_VAR: &str =
  "QUADRO_TIMEZONE";
pub const DEFAULT_TIMEZONE: &str =
  "America/Sao_Paulo";

const NAIVE_FORMATS: [&str; 4] = [
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%d %H:%M"
];

/// Picks the board timezone: the
/// environment wins over the config
/// value, which wins over the default.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, "env")
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_TIMEZONE,
    "default"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }
  match trimmed.parse::<Tz>() {
    | Ok(tz) => Some(tz),
    | Err(error) => {
      tracing::warn!(
        source,
        value = trimmed,
        %error,
        "ignoring invalid timezone"
      );
      None
    }
  }
}

/// Calendar day of `dt` as seen on the
/// board's wall clock.
#[must_use]
pub fn local_date(
  dt: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  dt.with_timezone(tz).date_naive()
}

/// Parses the timestamp shapes the
/// backend emits: RFC 3339, naive ISO
/// (taken as UTC), bare dates (midnight
/// UTC) and the RFC 2822 form Flask
/// uses when serializing datetimes.
pub fn parse_backend_datetime(
  raw: &str
) -> Option<DateTime<Utc>> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(
      trimmed
    )
  {
    return Some(dt.with_timezone(&Utc));
  }

  for format in NAIVE_FORMATS {
    if let Ok(naive) =
      NaiveDateTime::parse_from_str(
        trimmed, format
      )
    {
      return Some(
        Utc.from_utc_datetime(&naive)
      );
    }
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      trimmed, "%Y-%m-%d"
    )
    && let Some(naive) =
      date.and_hms_opt(0, 0, 0)
  {
    return Some(
      Utc.from_utc_datetime(&naive)
    );
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc2822(
      trimmed
    )
  {
    return Some(dt.with_timezone(&Utc));
  }

  tracing::debug!(
    value = trimmed,
    "unrecognized backend timestamp"
  );
  None
}

/// Parses user input for a due date.
/// Zone-less values are read on the
/// board's wall clock.
pub fn parse_local_datetime(
  raw: &str,
  tz: &Tz
) -> Option<DateTime<Utc>> {
  let trimmed = raw.trim();
  if let Ok(dt) =
    DateTime::parse_from_rfc3339(
      trimmed
    )
  {
    return Some(dt.with_timezone(&Utc));
  }

  let naive = NAIVE_FORMATS
    .iter()
    .find_map(|format| {
      NaiveDateTime::parse_from_str(
        trimmed, format
      )
      .ok()
    })
    .or_else(|| {
      NaiveDate::parse_from_str(
        trimmed, "%Y-%m-%d"
      )
      .ok()
      .and_then(|date| {
        date.and_hms_opt(23, 59, 0)
      })
    })?;
  tz.from_local_datetime(&naive)
    .earliest()
    .map(|dt| dt.with_timezone(&Utc))
}

/// Naive UTC ISO 8601, the only shape
/// the backend's `fromisoformat` accepts
/// on every Python version.
#[must_use]
pub fn format_backend_datetime(
  dt: DateTime<Utc>
) -> String {
  dt.naive_utc()
    .format("%Y-%m-%dT%H:%M:%S")
    .to_string()
}

#[must_use]
pub fn format_local(
  dt: DateTime<Utc>,
  tz: &Tz
) -> String {
  dt.with_timezone(tz)
    .format("%Y-%m-%d %H:%M")
    .to_string()
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::*;

  #[test]
  fn parses_every_backend_shape() {
    let expected = Utc
      .with_ymd_and_hms(
        2025, 1, 14, 10, 0, 0
      )
      .single()
      .expect("valid instant");

    for raw in [
      "2025-01-14T10:00:00Z",
      "2025-01-14T07:00:00-03:00",
      "2025-01-14T10:00:00",
      "2025-01-14T10:00:00.000",
      "2025-01-14 10:00:00",
      "Tue, 14 Jan 2025 10:00:00 GMT"
    ] {
      assert_eq!(
        parse_backend_datetime(raw),
        Some(expected),
        "{raw}"
      );
    }

    assert_eq!(
      parse_backend_datetime(
        "2025-01-14"
      ),
      Utc
        .with_ymd_and_hms(
          2025, 1, 14, 0, 0, 0
        )
        .single()
    );
    assert_eq!(
      parse_backend_datetime("amanhã"),
      None
    );
    assert_eq!(
      parse_backend_datetime("  "),
      None
    );
  }

  #[test]
  fn local_date_uses_board_timezone() {
    let tz: Tz = "America/Sao_Paulo"
      .parse()
      .expect("known timezone");
    let late_evening = Utc
      .with_ymd_and_hms(
        2025, 3, 2, 1, 30, 0
      )
      .single()
      .expect("valid instant");
    assert_eq!(
      local_date(late_evening, &tz),
      NaiveDate::from_ymd_opt(
        2025, 3, 1
      )
      .expect("valid date")
    );
  }

  #[test]
  fn local_input_uses_board_timezone() {
    let tz: Tz = "America/Sao_Paulo"
      .parse()
      .expect("known timezone");
    assert_eq!(
      parse_local_datetime(
        "2025-03-01 09:30",
        &tz
      ),
      Utc
        .with_ymd_and_hms(
          2025, 3, 1, 12, 30, 0
        )
        .single()
    );
    assert_eq!(
      parse_local_datetime(
        "2025-03-01",
        &tz
      ),
      Utc
        .with_ymd_and_hms(
          2025, 3, 2, 2, 59, 0
        )
        .single()
    );
    assert_eq!(
      parse_local_datetime("logo", &tz),
      None
    );
  }

  #[test]
  fn formatting_is_parseable_back() {
    let dt = Utc
      .with_ymd_and_hms(
        2025, 6, 30, 23, 59, 0
      )
      .single()
      .expect("valid instant");
    let text =
      format_backend_datetime(dt);
    assert_eq!(
      text,
      "2025-06-30T23:59:00"
    );
    assert_eq!(
      parse_backend_datetime(&text),
      Some(dt)
    );
  }
}
