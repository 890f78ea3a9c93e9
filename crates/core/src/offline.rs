//! Synthesized responses served when neither network nor cache can answer.

use crate::Response;

/// The offline HTML document returned to navigations.
pub fn offline_page(app_name: &str) -> Response {
    let app_name = escape_html(app_name);
    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{app_name} - Offline</title>
<style>
  body {{ font-family: system-ui, sans-serif; min-height: 100vh; margin: 0; display: flex;
         align-items: center; justify-content: center; background: #0a0a1a; color: #f0f8ff; }}
  main {{ max-width: 36rem; padding: 2.5rem; text-align: center; }}
  h1 {{ color: #ff9900; }}
  button {{ padding: .8rem 1.6rem; border: 0; border-radius: .5rem; font-weight: bold; cursor: pointer; }}
</style>
</head>
<body>
<main>
<h1>You're Offline</h1>
<p>Please check your internet connection. Some features of {app_name} need a connection to work.</p>
<button onclick="window.location.reload()">Try Again</button>
</main>
</body>
</html>
"#
    );

    Response::ok(html)
        .with_header("Content-Type", "text/html; charset=utf-8")
        .with_header("Cache-Control", "no-cache")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Minimal response for failed non-navigation requests.
pub fn service_unavailable(status: u16) -> Response {
    Response::new(status, "Service Unavailable")
        .with_header("Content-Type", "text/plain; charset=utf-8")
        .with_header("Cache-Control", "no-store")
}
