//! Index page listing every configured script

use crate::routes::RouteTable;

const STYLE: &str = r#"
    :root {
      --bg: #0a0a0f;
      --surface: rgba(255,255,255,0.03);
      --border: rgba(255,255,255,0.06);
      --text: #c8ccd4;
      --text-dim: #5a5f6b;
      --accent: #00e5a0;
      --amber: #f0b232;
      --red: #f05a5a;
      --mono: 'JetBrains Mono', 'Fira Code', monospace;
      --sans: 'DM Sans', system-ui, sans-serif;
    }
    *, *::before, *::after { box-sizing: border-box; margin: 0; padding: 0; }
    body { font-family: var(--sans); background: var(--bg); color: var(--text); min-height: 100vh; }
    .wrapper { max-width: 640px; margin: 0 auto; padding: 6rem 1.5rem 4rem; }
    .logo { display: inline-flex; align-items: center; gap: 0.6rem; margin-bottom: 0.75rem; }
    .logo-icon {
      width: 36px; height: 36px; border-radius: 8px;
      background: linear-gradient(135deg, var(--accent), #34d399);
      display: flex; align-items: center; justify-content: center;
      font-family: var(--mono); font-weight: 700; color: var(--bg);
    }
    .logo-text { font-family: var(--mono); font-size: 1.35rem; font-weight: 700; color: #e4e7ec; }
    .tagline { font-size: 0.95rem; color: var(--text-dim); line-height: 1.6; margin-bottom: 3rem; }
    .card {
      background: var(--surface); border: 1px solid var(--border); border-radius: 12px;
      padding: 1.25rem 1.5rem; margin-bottom: 1rem;
      animation: fade-up 0.5s ease both;
    }
    .card-header { display: flex; align-items: center; gap: 0.75rem; margin-bottom: 0.6rem; }
    .dots { display: flex; gap: 5px; }
    .dots span { width: 8px; height: 8px; border-radius: 50%; }
    .dots span:nth-child(1) { background: var(--red); }
    .dots span:nth-child(2) { background: var(--amber); }
    .dots span:nth-child(3) { background: var(--accent); }
    .card-title { font-family: var(--mono); font-size: 0.85rem; font-weight: 500; color: #e4e7ec; }
    .card-desc { font-size: 0.85rem; color: var(--text-dim); margin-bottom: 1rem; line-height: 1.5; }
    .cmd-row {
      display: flex; align-items: center; gap: 0.5rem; cursor: pointer;
      background: rgba(0,0,0,0.3); border: 1px solid var(--border); border-radius: 8px;
      padding: 0.6rem 0.75rem;
    }
    .prompt { font-family: var(--mono); color: var(--accent); font-size: 0.85rem; user-select: none; }
    .cmd-row code {
      font-family: var(--mono); font-size: 0.78rem; color: var(--text); flex: 1;
      white-space: nowrap; overflow: hidden; text-overflow: ellipsis;
    }
    .empty { color: var(--text-dim); font-size: 0.9rem; }
    .toast {
      position: fixed; bottom: 2rem; left: 50%; transform: translateX(-50%);
      background: var(--accent); color: var(--bg); font-family: var(--mono); font-size: 0.78rem;
      padding: 0.5rem 1.25rem; border-radius: 100px; opacity: 0; transition: opacity 0.3s;
    }
    .toast.show { opacity: 1; }
    .footer { margin-top: 3rem; font-size: 0.75rem; color: var(--text-dim); }
    @keyframes fade-up {
      from { opacity: 0; transform: translateY(16px); }
      to { opacity: 1; transform: translateY(0); }
    }
"#;

const SCRIPT: &str = r#"
    function copyCmd(el) {
      const code = el.querySelector('code');
      if (!code) return;
      navigator.clipboard.writeText(code.textContent || '').then(function() {
        const t = document.getElementById('toast');
        if (!t) return;
        t.classList.add('show');
        setTimeout(function() { t.classList.remove('show'); }, 1800);
      });
    }
"#;

/// Escape text for use in HTML element content and attribute values
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

/// Render the listing page. Pure: the same table and host always
/// produce the same bytes.
pub fn render_index(routes: &RouteTable, public_host: &str) -> String {
    let host = escape_html(public_host);
    let mut cards = String::new();

    for (i, route) in routes.iter().enumerate() {
        let path = escape_html(&route.path);
        // Staggered entrance, 120ms apart
        let delay_ms = 100 + i * 120;

        cards.push_str(&format!(
            r#"
      <div class="card" style="animation-delay:{delay_ms}ms">
        <div class="card-header">
          <div class="dots"><span></span><span></span><span></span></div>
          <span class="card-title">{path}</span>
        </div>"#
        ));
        if let Some(description) = &route.description {
            cards.push_str(&format!(
                r#"
        <p class="card-desc">{}</p>"#,
                escape_html(description)
            ));
        }
        cards.push_str(&format!(
            r#"
        <div class="cmd-row" onclick="copyCmd(this)" title="Click to copy">
          <span class="prompt">$</span>
          <code>curl -sLO https://{host}{path}</code>
        </div>
      </div>"#
        ));
    }

    if routes.is_empty() {
        cards.push_str(r#"
      <p class="empty">No scripts configured.</p>"#);
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Scripts</title>
  <meta name="description" content="Run remote scripts with a single command">
  <style>{STYLE}</style>
</head>
<body>
  <div class="wrapper">
    <div class="logo">
      <div class="logo-icon">./</div>
      <span class="logo-text">Scripts</span>
    </div>
    <p class="tagline">Fetch a script with <strong>curl</strong> and run it directly.</p>
{cards}
    <div class="footer">Served by {host}</div>
  </div>
  <div class="toast" id="toast">Copied to clipboard</div>
  <script>{SCRIPT}</script>
</body>
</html>
"#
    )
}
