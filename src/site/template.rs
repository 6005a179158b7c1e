use maud::{DOCTYPE, Markup, PreEscaped, html};

use super::PAGES;

/// Pages linked from the main navigation, in order.
const NAV: &[&str] = &[
    "index",
    "collections",
    "impacts",
    "sustainability",
    "community",
    "about",
    "contact",
];

fn href(name: &str) -> String {
    if name == "index" {
        "/".to_string()
    } else {
        format!("/{name}")
    }
}

fn title_of(name: &str) -> &str {
    PAGES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, t)| *t)
        .unwrap_or(name)
}

/// Full HTML page wrapping a trusted page fragment.
pub fn page(name: &str, title: &str, content_html: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                meta property="og:title" content=(title);
                link rel="stylesheet" href="/static/css/site.css";
            }
            body {
                header {
                    nav aria-label="main" {
                        ul {
                            @for n in NAV {
                                li {
                                    @if *n == name {
                                        span aria-current="page" { (title_of(n)) }
                                    } @else {
                                        a href=(href(n)) { (title_of(n)) }
                                    }
                                }
                            }
                        }
                    }
                }
                main {
                    (PreEscaped(content_html))
                }
                footer {
                    a href="/admin/" { "Admin" }
                }
            }
        }
    }
}
