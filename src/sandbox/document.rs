// ABOUTME: Renders the sandbox document installed behind each Document handle

use crate::config::PlaygroundConfig;
use serde_json::json;

/// Build the HTML document hosting user modules.
///
/// Carries the import map, the loading placeholder and the mount region.
pub fn render_document(config: &PlaygroundConfig) -> String {
    let import_map = json!({ "imports": config.import_map }).to_string();
    let class = if config.sandbox.dark { " class=\"dark\"" } else { "" };

    format!(
        r#"<!doctype html>
<html{class}>
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <script type="importmap">{import_map}</script>
  </head>
  <body>
    <div id="load" style="display: flex; height: 80vh; align-items: center; justify-content: center;">
      <p style="font-size: 1.5rem">Loading the playground...</p>
    </div>
    <div id="{mount}"></div>
  </body>
</html>
"#,
        class = class,
        import_map = escape_script(&import_map),
        mount = escape_attribute(&config.sandbox.mount_region),
    )
}

// A literal "</script" inside the import map would close the tag early
fn escape_script(text: &str) -> String {
    text.replace("</", "<\\/")
}

fn escape_attribute(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
