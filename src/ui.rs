use crate::models::{parse_date, Bucket, Granularity, Record};
use std::fmt::Write as _;

const CHART_WIDTH: f64 = 760.0;
const CHART_HEIGHT: f64 = 280.0;
const TEXT_BAR_WIDTH: usize = 40;

pub fn render_dashboard(granularity: Granularity, buckets: &[Bucket], records: &[Record]) -> String {
    INDEX_HTML
        .replace("{{TITLE}}", &title(granularity))
        .replace("{{TABS}}", &render_tabs(granularity))
        .replace("{{CHART}}", &render_svg_chart(buckets))
        .replace("{{ROWS}}", &render_rows(records))
        .replace("{{COUNT}}", &records.len().to_string())
}

fn title(granularity: Granularity) -> String {
    let name = granularity.as_str();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("{}{} Website Visits", first.to_ascii_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

fn render_tabs(active: Granularity) -> String {
    Granularity::ALL
        .iter()
        .map(|granularity| {
            let class = if *granularity == active { "tab active" } else { "tab" };
            format!(
                r#"<a class="{class}" href="/?granularity={value}">{value}</a>"#,
                value = granularity.as_str()
            )
        })
        .collect()
}

fn render_svg_chart(buckets: &[Bucket]) -> String {
    if buckets.is_empty() {
        return r#"<p class="empty">No data yet. Add an entry below.</p>"#.to_string();
    }

    let max = buckets.iter().map(|bucket| bucket.visits).max().unwrap_or(0).max(1) as f64;
    let slot = CHART_WIDTH / buckets.len() as f64;
    let bar = (slot * 0.7).max(1.0);

    let mut svg = format!(
        r#"<svg viewBox="0 0 {w} {h}" role="img" aria-label="visits chart">"#,
        w = CHART_WIDTH,
        h = CHART_HEIGHT + 40.0
    );
    for (index, bucket) in buckets.iter().enumerate() {
        let height = bucket.visits as f64 / max * CHART_HEIGHT;
        let x = index as f64 * slot + (slot - bar) / 2.0;
        let y = CHART_HEIGHT - height;
        let _ = write!(
            svg,
            r#"<g><title>{label}: {visits} visits</title><rect x="{x:.1}" y="{y:.1}" width="{bar:.1}" height="{height:.1}" rx="3"/><text x="{tx:.1}" y="{ty:.1}">{label}</text></g>"#,
            label = escape_html(&bucket.label),
            visits = bucket.visits,
            tx = x + bar / 2.0,
            ty = CHART_HEIGHT + 24.0,
        );
    }
    svg.push_str("</svg>");
    svg
}

fn render_rows(records: &[Record]) -> String {
    let mut sorted: Vec<&Record> = records.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    sorted
        .into_iter()
        .map(|record| {
            format!(
                r#"<tr data-id="{id}"><td>{date}</td><td>{visits}</td><td><button class="edit" data-id="{id}" data-visits="{visits}">Edit</button> <button class="delete" data-id="{id}">Delete</button></td></tr>"#,
                id = escape_html(&record.id),
                date = escape_html(&display_date(&record.date)),
                visits = record.visits,
            )
        })
        .collect()
}

fn display_date(date: &str) -> String {
    parse_date(date)
        .map(|date| date.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| date.to_string())
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Horizontal bar chart for terminals, one line per bucket.
pub fn render_text_chart(granularity: Granularity, buckets: &[Bucket]) -> String {
    let mut out = format!("{}\n", title(granularity));
    if buckets.is_empty() {
        out.push_str("  (no data)\n");
        return out;
    }

    let max = buckets.iter().map(|bucket| bucket.visits).max().unwrap_or(0).max(1);
    let label_width = buckets
        .iter()
        .map(|bucket| bucket.label.chars().count())
        .max()
        .unwrap_or(0);
    for bucket in buckets {
        let width = (bucket.visits as u128 * TEXT_BAR_WIDTH as u128 / max as u128) as usize;
        let _ = writeln!(
            out,
            "  {label:<label_width$}  {bar:<bar_width$}  {visits}",
            label = bucket.label,
            bar = "#".repeat(width),
            bar_width = TEXT_BAR_WIDTH,
            visits = bucket.visits,
        );
    }
    out
}

/// Entries newest first, the way the dashboard lists them.
pub fn render_table(records: &[Record]) -> String {
    let mut sorted: Vec<&Record> = records.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    let mut out = format!("{:<12}  {:>10}  {}\n", "DATE", "VISITS", "ID");
    for record in sorted {
        let _ = writeln!(out, "{:<12}  {:>10}  {}", record.date, record.visits, record.id);
    }
    out
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Analytics Dashboard</title>
  <style>
    :root {
      --bg: #111827;
      --card: #1f2937;
      --ink: #f3f4f6;
      --muted: #9ca3af;
      --accent: #06b6d4;
      --danger: #dc2626;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: system-ui, sans-serif;
      display: flex;
      justify-content: center;
      padding: 32px 16px;
    }

    main {
      width: min(960px, 100%);
      display: grid;
      gap: 24px;
    }

    h1 {
      text-align: center;
      margin: 0;
    }

    .card {
      background: var(--card);
      border-radius: 16px;
      padding: 24px;
    }

    .tabs {
      display: flex;
      gap: 8px;
      margin-bottom: 16px;
    }

    .tab {
      padding: 6px 14px;
      border-radius: 6px;
      background: #374151;
      color: var(--muted);
      text-decoration: none;
      text-transform: capitalize;
    }

    .tab.active {
      background: var(--accent);
      color: white;
    }

    svg rect {
      fill: var(--accent);
    }

    svg text {
      fill: var(--muted);
      font-size: 11px;
      text-anchor: middle;
    }

    table {
      width: 100%;
      border-collapse: collapse;
    }

    td, th {
      padding: 8px;
      text-align: left;
      border-bottom: 1px solid #374151;
    }

    button {
      border: 0;
      border-radius: 4px;
      padding: 4px 10px;
      color: white;
      background: #2563eb;
      cursor: pointer;
    }

    button.delete {
      background: var(--danger);
    }

    button:disabled {
      background: #6b7280;
      cursor: not-allowed;
    }

    .error {
      color: #f87171;
      min-height: 1.2em;
    }
  </style>
</head>
<body>
  <main>
    <h1>Analytics Dashboard</h1>
    <section class="card">
      <h2>{{TITLE}}</h2>
      <nav class="tabs">{{TABS}}</nav>
      {{CHART}}
    </section>
    <section class="card">
      <h2>Manage Stats</h2>
      <form id="add-form">
        <input type="date" id="date" required />
        <input type="number" id="visits" min="0" placeholder="e.g., 5000" required />
        <button type="submit">Add Entry</button>
      </form>
      <p class="error" id="error"></p>
      <h3>Existing Entries ({{COUNT}})</h3>
      <table>
        <thead><tr><th>Date</th><th>Visits</th><th></th></tr></thead>
        <tbody>{{ROWS}}</tbody>
      </table>
    </section>
  </main>
  <script>
    const errorEl = document.getElementById('error');

    async function send(url, options, button) {
      errorEl.textContent = '';
      if (button) button.disabled = true;
      try {
        const res = await fetch(url, options);
        if (!res.ok) {
          const body = await res.json().catch(() => ({}));
          throw new Error(body.error || 'Request failed');
        }
        window.location.reload();
      } catch (err) {
        errorEl.textContent = err.message;
        if (button) button.disabled = false;
      }
    }

    document.getElementById('add-form').addEventListener('submit', (event) => {
      event.preventDefault();
      const date = document.getElementById('date').value;
      const visits = Number(document.getElementById('visits').value);
      send('/trafficStat', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ date, visits }),
      }, event.submitter);
    });

    document.querySelectorAll('button.edit').forEach((button) => {
      button.addEventListener('click', () => {
        const value = window.prompt('Visits', button.dataset.visits);
        if (value === null) return;
        send(`/trafficStats/${button.dataset.id}`, {
          method: 'PUT',
          headers: { 'Content-Type': 'application/json' },
          body: JSON.stringify({ visits: Number(value) }),
        }, button);
      });
    });

    document.querySelectorAll('button.delete').forEach((button) => {
      button.addEventListener('click', () => {
        send(`/trafficStats/${button.dataset.id}`, { method: 'DELETE' }, button);
      });
    });
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bucket(label: &str, visits: u64, day: u32) -> Bucket {
        Bucket {
            label: label.to_string(),
            visits,
            period_start: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
        }
    }

    #[test]
    fn dashboard_marks_active_tab_and_lists_rows() {
        let records = vec![Record {
            id: "abc".to_string(),
            date: "2025-03-01".to_string(),
            visits: 120,
        }];
        let html = render_dashboard(Granularity::Weekly, &[bucket("Week of Feb 24", 120, 1)], &records);

        assert!(html.contains("Weekly Website Visits"));
        assert!(html.contains(r#"<a class="tab active" href="/?granularity=weekly">"#));
        assert!(html.contains("Week of Feb 24: 120 visits"));
        assert!(html.contains(r#"data-id="abc""#));
        assert!(html.contains("Mar 1, 2025"));
    }

    #[test]
    fn empty_chart_shows_placeholder() {
        let html = render_dashboard(Granularity::Daily, &[], &[]);
        assert!(html.contains("No data yet"));
    }

    #[test]
    fn text_chart_scales_to_largest_bucket() {
        let chart = render_text_chart(
            Granularity::Daily,
            &[bucket("Mar 1", 20, 1), bucket("Mar 2", 10, 2)],
        );
        let lines: Vec<&str> = chart.lines().collect();

        assert_eq!(lines[0], "Daily Website Visits");
        assert_eq!(lines[1].matches('#').count(), TEXT_BAR_WIDTH);
        assert_eq!(lines[2].matches('#').count(), TEXT_BAR_WIDTH / 2);
        assert!(lines[2].ends_with("10"));
    }

    #[test]
    fn table_lists_newest_first() {
        let records = vec![
            Record {
                id: "old".to_string(),
                date: "2025-03-01".to_string(),
                visits: 1,
            },
            Record {
                id: "new".to_string(),
                date: "2025-03-05".to_string(),
                visits: 2,
            },
        ];
        let table = render_table(&records);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[1].starts_with("2025-03-05"));
        assert!(lines[2].starts_with("2025-03-01"));
    }

    #[test]
    fn labels_are_escaped() {
        assert_eq!(escape_html(r#"<b>"x"&"#), "&lt;b&gt;&quot;x&quot;&amp;");
    }
}
