//! HTML dashboard
//!
//! Renders the whole session as one page. All dynamic text goes through
//! `escape`, including process names. AI output is rendered as markdown
//! with raw HTML turned back into text.

use devopt_common::{Phase, Recommendation, SessionState, Snapshot};
use pulldown_cmark::{Event, Options, Parser};
use std::fmt::Write;

const STYLE: &str = "\
body{font-family:sans-serif;max-width:960px;margin:2em auto;padding:0 1em;color:#222}\
h1{font-size:1.6em}h2{font-size:1.2em;border-bottom:1px solid #ddd;padding-bottom:.2em}\
.error{background:#fde2e2;border:1px solid #e99;padding:.6em;margin:1em 0}\
.running{background:#eef4ff;border:1px solid #9bd;padding:.6em;margin:1em 0}\
.actions form{display:inline-block;margin-right:.5em}\
.metric{margin:.4em 0}.metric progress{width:60%;vertical-align:middle}\
table{border-collapse:collapse;width:100%;font-size:.9em}\
th,td{border-bottom:1px solid #eee;padding:.2em .4em;text-align:left}\
.prose{background:#f7f7f7;padding:.2em .8em}pre{white-space:pre-wrap}";

/// Escape text for HTML element and attribute content
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Human-readable byte count, 1024-based
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/// Full page for the session
pub fn render(state: &SessionState, engine: &str) -> String {
    let mut page = String::new();

    page.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
    if state.phase == Phase::Running {
        page.push_str("<meta http-equiv=\"refresh\" content=\"2\">");
    }
    let _ = write!(
        page,
        "<title>Developer Environment Optimizer</title><style>{}</style></head><body>",
        STYLE
    );
    let _ = write!(
        page,
        "<h1>Developer Environment Optimizer</h1><p>Engine: {} &middot; Session: {}</p>",
        escape(engine),
        state.phase
    );

    if let Some(error) = &state.last_error {
        let _ = write!(page, "<div class=\"error\">{}</div>", escape(error));
    }

    render_actions(&mut page, state.phase);

    match (&state.phase, &state.snapshot) {
        (Phase::Running, _) => {
            page.push_str("<div class=\"running\">Analyzing your environment...</div>");
        }
        (_, Some(snapshot)) => {
            render_snapshot(&mut page, snapshot);
            if let Some(recommendation) = &state.recommendation {
                render_recommendation(&mut page, recommendation);
            }
            render_applied(&mut page, &state.applied_changes);
            render_processes(&mut page, snapshot);
        }
        (_, None) => {
            page.push_str("<p>Run an analysis to collect system metrics and get recommendations.</p>");
        }
    }

    page.push_str("</body></html>\n");
    page
}

fn render_actions(page: &mut String, phase: Phase) {
    let running = phase == Phase::Running;
    page.push_str("<div class=\"actions\">");
    let _ = write!(
        page,
        "<form method=\"post\" action=\"/analysis/run\"><button{}>Run analysis</button></form>",
        if running { " disabled" } else { "" }
    );
    if phase == Phase::Done {
        page.push_str(
            "<form method=\"post\" action=\"/analysis/apply\"><button>Apply configuration changes</button></form>",
        );
    }
    page.push_str("<form method=\"post\" action=\"/analysis/reset\"><button>Reset</button></form>");
    page.push_str("</div>");
}

fn metric_bar(page: &mut String, label: &str, percent: f32) {
    let clamped = percent.clamp(0.0, 100.0);
    let _ = write!(
        page,
        "<div class=\"metric\">{}: <progress max=\"100\" value=\"{:.1}\"></progress> {:.1}%</div>",
        label, clamped, percent
    );
}

fn render_snapshot(page: &mut String, snapshot: &Snapshot) {
    page.push_str("<h2>System metrics</h2>");
    metric_bar(page, "CPU", snapshot.cpu_percent);
    metric_bar(page, "Memory", snapshot.memory.percent);
    metric_bar(page, "Disk", snapshot.disk.percent);

    page.push_str("<h2>System</h2><ul>");
    let _ = write!(page, "<li>Operating system: {}</li>", escape(&snapshot.os));
    let _ = write!(page, "<li>Python: {}</li>", escape(&snapshot.python_version));
    if snapshot.screen_resolution.is_known() {
        let _ = write!(
            page,
            "<li>Screen resolution: {} x {}</li>",
            snapshot.screen_resolution.width(),
            snapshot.screen_resolution.height()
        );
    } else {
        page.push_str("<li>Screen resolution: unavailable</li>");
    }
    page.push_str("</ul>");

    page.push_str("<h2>Network</h2><ul>");
    let _ = write!(page, "<li>Sent: {}</li>", format_bytes(snapshot.network.bytes_sent));
    let _ = write!(page, "<li>Received: {}</li>", format_bytes(snapshot.network.bytes_recv));
    let _ = write!(page, "<li>Total: {}</li>", format_bytes(snapshot.network.total()));
    page.push_str("</ul>");

    page.push_str("<h2>GPU</h2>");
    match &snapshot.gpu {
        Some(gpu) => {
            let _ = write!(
                page,
                "<ul><li>{}</li><li>Load: {:.1}%</li><li>Memory: {:.0} / {:.0} MB</li></ul>",
                escape(&gpu.name),
                gpu.load_percent,
                gpu.memory_used,
                gpu.memory_total
            );
        }
        None => page.push_str("<p>No GPU information available.</p>"),
    }
}

fn render_recommendation(page: &mut String, recommendation: &Recommendation) {
    page.push_str("<h2>Recommendations</h2>");
    if recommendation.is_empty() {
        page.push_str("<p>No recommendations available.</p>");
        return;
    }
    match recommendation {
        Recommendation::Prose(text) => {
            let _ = write!(page, "<div class=\"prose\">{}</div>", render_markdown(text));
        }
        Recommendation::Advisories(items) => {
            page.push_str("<ul>");
            for item in items {
                let _ = write!(page, "<li>{}</li>", escape(item));
            }
            page.push_str("</ul>");
        }
    }
}

/// Markdown from the model as HTML. Raw HTML in the input is shown as text.
pub fn render_markdown(text: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let events = Parser::new_ext(text, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, events);
    html_output
}

fn render_applied(page: &mut String, applied: &[String]) {
    if applied.is_empty() {
        return;
    }
    page.push_str("<h2>Applied changes</h2><ul>");
    for line in applied {
        let _ = write!(page, "<li>{}</li>", escape(line));
    }
    page.push_str("</ul>");
}

fn render_processes(page: &mut String, snapshot: &Snapshot) {
    let _ = write!(page, "<h2>Top processes ({})</h2>", snapshot.processes.len());
    if snapshot.processes.is_empty() {
        page.push_str("<p>No process information available.</p>");
        return;
    }
    page.push_str("<table><tr><th>PID</th><th>Name</th><th>CPU %</th><th>Memory %</th></tr>");
    for process in &snapshot.processes {
        let _ = write!(
            page,
            "<tr><td>{}</td><td>{}</td><td>{:.1}</td><td>{:.1}</td></tr>",
            process.pid,
            escape(&process.name),
            process.cpu_percent,
            process.memory_percent
        );
    }
    page.push_str("</table>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use devopt_common::{GpuInfo, NetworkCounters, ProcessEntry, ScreenResolution};

    fn done_state() -> SessionState {
        let mut snapshot = Snapshot::with_usage(37.5, 61.0, 88.0);
        snapshot.processes = vec![ProcessEntry {
            pid: 42,
            name: "<script>alert(1)</script>".to_string(),
            cpu_percent: 12.0,
            memory_percent: 3.0,
        }];
        snapshot.screen_resolution = ScreenResolution(2560, 1440);
        SessionState {
            phase: Phase::Done,
            snapshot: Some(snapshot),
            recommendation: Some(Recommendation::Advisories(vec!["Use a bigger font & more RAM".to_string()])),
            ..SessionState::default()
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&#39;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00 GB");
    }

    #[test]
    fn test_not_run_page() {
        let page = render(&SessionState::default(), "rules");
        assert!(page.contains("Run analysis"));
        assert!(page.contains("Session: not run"));
        assert!(!page.contains("/analysis/apply"));
        assert!(!page.contains("http-equiv=\"refresh\""));
        assert!(!page.contains("<table>"));
    }

    #[test]
    fn test_running_page_refreshes() {
        let state = SessionState {
            phase: Phase::Running,
            ..SessionState::default()
        };
        let page = render(&state, "ai");
        assert!(page.contains("http-equiv=\"refresh\""));
        assert!(page.contains("<button disabled>Run analysis</button>"));
    }

    #[test]
    fn test_done_page_escapes_dynamic_text() {
        let page = render(&done_state(), "rules");
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!page.contains("<script>"));
        assert!(page.contains("Use a bigger font &amp; more RAM"));
        assert!(page.contains("Screen resolution: 2560 x 1440"));
        assert!(page.contains("No GPU information available."));
        assert!(page.contains("/analysis/apply"));
    }

    #[test]
    fn test_network_totals() {
        let mut state = done_state();
        if let Some(snapshot) = state.snapshot.as_mut() {
            snapshot.network = NetworkCounters { bytes_sent: 1024, bytes_recv: 2048 };
        }
        let page = render(&state, "rules");
        assert!(page.contains("<li>Sent: 1.00 KB</li>"));
        assert!(page.contains("<li>Received: 2.00 KB</li>"));
        assert!(page.contains("<li>Total: 3.00 KB</li>"));
    }

    #[test]
    fn test_empty_recommendation_is_never_blank() {
        for recommendation in [
            Recommendation::Prose(String::new()),
            Recommendation::Prose(" \n ".to_string()),
            Recommendation::Advisories(Vec::new()),
        ] {
            let state = SessionState {
                recommendation: Some(recommendation),
                ..done_state()
            };
            let page = render(&state, "ai");
            assert!(page.contains("<h2>Recommendations</h2><p>No recommendations available.</p>"));
            assert!(!page.contains("<div class=\"prose\"></div>"));
        }
    }

    #[test]
    fn test_prose_rendered_as_markdown() {
        let state = SessionState {
            recommendation: Some(Recommendation::Prose(
                "1. **Close** unused tabs\n2. Add `swap`".to_string(),
            )),
            ..done_state()
        };
        let page = render(&state, "ai");
        assert!(page.contains("<ol>"));
        assert!(page.contains("<li><strong>Close</strong> unused tabs</li>"));
        assert!(page.contains("<li>Add <code>swap</code></li>"));
        assert!(page.contains("<div class=\"prose\">"));
    }

    #[test]
    fn test_markdown_raw_html_is_escaped() {
        let html = render_markdown("Try <b>this</b>\n\n<script>alert(1)</script>\n");
        assert!(html.contains("Try &lt;b&gt;this&lt;/b&gt;"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_gpu_and_applied_sections() {
        let mut state = done_state();
        if let Some(snapshot) = state.snapshot.as_mut() {
            snapshot.gpu = Some(GpuInfo {
                name: "RTX 3060".to_string(),
                load_percent: 12.0,
                memory_used: 1024.0,
                memory_total: 12288.0,
            });
        }
        state.applied_changes = vec!["No editor settings changes needed.".to_string()];
        state.last_error = Some("Analysis failed: boom".to_string());

        let page = render(&state, "rules");
        assert!(page.contains("RTX 3060"));
        assert!(page.contains("Memory: 1024 / 12288 MB"));
        assert!(page.contains("<h2>Applied changes</h2>"));
        assert!(page.contains("<div class=\"error\">Analysis failed: boom</div>"));
    }
}
