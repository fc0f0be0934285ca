//! HTML wrapper that overlays a client-side image map on a raster

use regex::Regex;
use std::sync::OnceLock;

const DEFAULT_MAP_NAME: &str = "catgraph";

fn map_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"<map\b[^>]*?\b(?:name|id)\s*=\s*"([^"]*)""#).expect("valid map name pattern")
    })
}

/// Name of the first `<map>` in `markup`.
pub fn map_name(markup: &str) -> Option<&str> {
    map_name_pattern()
        .captures(markup)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|name| !name.is_empty())
}

fn escape_html(text: &str) -> String {
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

/// One HTML document showing `image_file` with `map_markup` applied.
///
/// The image is referenced by file name, so the wrapper must be served
/// from the same place as the raster.
pub fn wrap(title: &str, image_file: &str, map_markup: &str) -> String {
    let name = map_name(map_markup).unwrap_or(DEFAULT_MAP_NAME);
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>{title}</title>\n\
         </head>\n\
         <body>\n\
         <img src=\"{src}\" usemap=\"#{name}\" alt=\"{title}\" border=\"0\">\n\
         {map}\n\
         </body>\n\
         </html>\n",
        title = escape_html(title),
        src = escape_html(image_file),
        name = escape_html(name),
        map = map_markup.trim(),
    )
}
