use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Days,
  Local,
  NaiveDate,
  Utc
};

/// The user's calendar day; due dates
/// are compared against it.
pub fn today() -> NaiveDate {
  Local::now().date_naive()
}

#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_due_date(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!(
            "date out of range: \
             tomorrow"
          )
        });
    }
    | _ => {}
  }

  if let Some(rest) =
    lower.strip_prefix('+')
    && let Some(count) =
      rest.strip_suffix('d')
  {
    let days: u64 =
      count.parse().with_context(
        || {
          format!(
            "invalid day offset: \
             {token}"
          )
        }
      )?;
    return today
      .checked_add_days(Days::new(days))
      .ok_or_else(|| {
        anyhow!(
          "date out of range: {token}"
        )
      });
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "expected YYYY-MM-DD, today, \
       tomorrow or +Nd, got: {token}"
    )
  })
}

pub fn format_timestamp(
  ts: DateTime<Utc>
) -> String {
  ts.with_timezone(&Local)
    .format("%Y-%m-%d %H:%M")
    .to_string()
}
