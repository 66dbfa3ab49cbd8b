//! Static page rendering.

use maud::{html, PreEscaped, DOCTYPE};

/// Object key the page is published under.
pub const PAGE_KEY: &str = "index.html";
pub const PAGE_CONTENT_TYPE: &str = "text/html";

const STYLE: &str = "\
body{margin:0;min-height:100vh;display:flex;flex-direction:column;\
align-items:center;justify-content:center;font-family:sans-serif;color:#fff}\
body.green{background-color:#2e7d32}\
body.red{background-color:#c62828}\
h1{font-size:6rem;margin:0.5rem 0}\
footer a{color:#fff}";

/// Turn a weather kind into a present participle: drop one trailing `e` or
/// `s`, then append `ing` (`snow` → `snowing`, `drizzle` → `drizzling`).
///
/// Deliberately naive; `thunderstorm` becomes `thunderstorming`.
pub fn verb_form(weather_kind: &str) -> String {
    let kind = weather_kind.trim().to_lowercase();
    let stem = kind
        .strip_suffix('e')
        .or_else(|| kind.strip_suffix('s'))
        .unwrap_or(kind.as_str());
    format!("{stem}ing")
}

/// Render the whole page for `label`.
///
/// Labels starting with `"no"` answer `NO.` on a green background; anything
/// else answers `YES!!!` on red. Identical input yields identical bytes.
pub fn render_page(label: &str, weather_kind: &str, location_name: &str, source_url: &str) -> String {
    let (answer, class) = if label.starts_with("no") {
        ("NO.", "green")
    } else {
        ("YES!!!", "red")
    };
    let question = format!("Is it {} in {}?", verb_form(weather_kind), location_name);

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (question) }
                style { (PreEscaped(STYLE)) }
            }
            body class=(class) {
                h2 { (question) }
                h1 { (answer) }
                footer {
                    a href=(source_url) { "Weather data source" }
                }
            }
        }
    }
    .into_string()
}
