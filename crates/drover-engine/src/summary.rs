//! Plain-text status table for a finished group run.

use crate::result::GroupRunResult;

/// Render the per-task status table: name, status, duration, error.
pub fn render_summary(result: &GroupRunResult) -> String {
  let header = ("Task", "Status", "Duration", "Error");

  let rows: Vec<(String, String, String, String)> = result
    .results
    .iter()
    .map(|r| {
      (
        r.name.clone(),
        r.status.to_string(),
        format!("{:.2?}", r.duration),
        r.error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
      )
    })
    .collect();

  let width = |select: fn(&(String, String, String, String)) -> &String, min: usize| {
    rows.iter().map(|r| select(r).len()).max().unwrap_or(0).max(min)
  };
  let w_name = width(|r| &r.0, header.0.len());
  let w_status = width(|r| &r.1, header.1.len());
  let w_duration = width(|r| &r.2, header.2.len());

  let mut out = String::new();
  out.push_str(&format!(
    "{:<w_name$}  {:<w_status$}  {:<w_duration$}  {}\n",
    header.0, header.1, header.2, header.3
  ));
  for (name, status, duration, error) in &rows {
    out.push_str(&format!(
      "{name:<w_name$}  {status:<w_status$}  {duration:<w_duration$}  {error}\n"
    ));
  }
  out
}
