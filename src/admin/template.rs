use maud::{DOCTYPE, Markup, PreEscaped, html};

use crate::{session::Flash, sheets::Record};

use super::fields::FIELDS;

/// Everything the dashboard renders.
#[derive(Default)]
pub struct DashboardView {
    pub headers: Vec<String>,
    pub preview: Vec<Record>,
    pub rows: Vec<Record>,
    pub warning: Option<String>,
    pub flashes: Vec<Flash>,
}

// ── Shared page shell ──────────────────────────────────────────────────────────

fn shell(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " | Resource Admin" }
                style { (PreEscaped(BASE_CSS)) }
            }
            body {
                (body)
            }
        }
    }
}

fn flash_list(flashes: &[Flash]) -> Markup {
    html! {
        @if !flashes.is_empty() {
            div class="flashes" {
                @for f in flashes {
                    p class={ "flash " (f.level.css_class()) } { (f.message) }
                }
            }
        }
    }
}

// ── Login page ─────────────────────────────────────────────────────────────────

pub fn login_page(flashes: &[Flash]) -> Markup {
    shell(
        "Login",
        html! {
            div class="login-wrap" {
                div class="login-logo" { "Resource" span { "·" } "Admin" }
                p class="login-sub" { "Sign in to manage the resource sheet" }
                (flash_list(flashes))
                form method="post" action="/admin/login" class="login-form" {
                    div class="form-group" {
                        label for="username" { "Username" }
                        input type="text" id="username" name="username"
                            autocomplete="username" autofocus required;
                    }
                    div class="form-group" {
                        label for="password" { "Password" }
                        input type="password" id="password" name="password"
                            autocomplete="current-password" required;
                    }
                    button type="submit" { "Sign in" }
                }
            }
        },
    )
}

// ── Dashboard ──────────────────────────────────────────────────────────────────

pub fn dashboard(view: &DashboardView) -> Markup {
    shell(
        "Dashboard",
        html! {
            header class="topbar" {
                span class="brand" { "Resource" span { "·" } "Admin" }
                a href="/" { "View site" }
                a href="/admin/logout" { "Log out" }
            }
            main class="dashboard" {
                (flash_list(&view.flashes))
                @if let Some(w) = &view.warning {
                    p class="flash flash-warning" { (w) }
                }

                section {
                    h2 { "Preview" }
                    (preview_table(&view.headers, &view.preview))
                }

                section {
                    h2 { "Add a resource" }
                    (add_form())
                }

                section {
                    h2 { "Manage rows" }
                    p class="muted" {
                        "Saving a row replaces every cell in it; cleared inputs clear the cell. "
                        "Row numbers change after a delete, so reload before editing again."
                    }
                    (manage_table(&view.headers, &view.rows))
                }
            }
        },
    )
}

fn preview_table(headers: &[String], rows: &[Record]) -> Markup {
    html! {
        @if headers.is_empty() {
            p class="muted" { "No columns to show." }
        } @else if rows.is_empty() {
            p class="muted" { "The sheet has no data rows yet." }
        } @else {
            div class="table-wrap" {
                table {
                    thead { tr { @for h in headers { th { (h) } } } }
                    tbody {
                        @for r in rows {
                            tr { @for h in headers { td { (r.get(h).unwrap_or("")) } } }
                        }
                    }
                }
            }
        }
    }
}

fn add_form() -> Markup {
    html! {
        form method="post" action="/admin/add" class="grid-form" {
            @for field in FIELDS {
                div class="form-group" {
                    label for={ "add-" (field.name) } { (field.headers[0]) }
                    @if field.name == "notes" {
                        textarea id={ "add-" (field.name) } name=(field.name) rows="2" {}
                    } @else {
                        input type=(input_type(field.name)) id={ "add-" (field.name) } name=(field.name);
                    }
                }
            }
            div class="form-actions" {
                button type="submit" class="btn-primary" { "Add row" }
            }
        }
    }
}

fn input_type(field: &str) -> &'static str {
    match field {
        "url" => "url",
        _ => "text",
    }
}

fn manage_table(headers: &[String], rows: &[Record]) -> Markup {
    html! {
        @if rows.is_empty() {
            p class="muted" { "Nothing to manage." }
        } @else {
            div class="table-wrap" {
                table class="manage" {
                    thead {
                        tr {
                            th { "Row" }
                            @for h in headers { th { (h) } }
                            th { "Actions" }
                        }
                    }
                    tbody {
                        @for r in rows {
                            @let form_id = format!("row-{}", r.sheet_row);
                            tr {
                                td class="row-no" { (r.sheet_row) }
                                @for (i, (h, v)) in r.values.iter().enumerate() {
                                    td {
                                        input type="hidden" form=(form_id)
                                            name={ "header_" (i) } value=(h);
                                        input type="text" form=(form_id)
                                            name={ "field_" (i) } value=(v);
                                    }
                                }
                                td class="actions" {
                                    form id=(form_id) method="post" action="/admin/update" {
                                        input type="hidden" name="sheet_row" value=(r.sheet_row);
                                        button type="submit" class="btn-secondary" { "Save" }
                                    }
                                    form method="post" action="/admin/delete" {
                                        input type="hidden" name="sheet_row" value=(r.sheet_row);
                                        button type="submit" class="btn-danger" { "Delete" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

// ── Styles ─────────────────────────────────────────────────────────────────────

const BASE_CSS: &str = r#"
*, *::before, *::after { box-sizing: border-box; margin: 0; padding: 0; }

:root {
  --bg:           #0d0f14;
  --surface:      #141720;
  --surface-2:    #1b2030;
  --border:       #242a3d;
  --text:         #dde1ed;
  --muted:        #68718f;
  --accent:       #c9a84c;
  --accent-hi:    #ddbf6a;
  --danger:       #e05555;
  --success:      #4caf82;
  --info:         #5b8def;
}

body {
  font-family: Georgia, serif;
  background: var(--bg);
  color: var(--text);
  -webkit-font-smoothing: antialiased;
}

a { color: var(--accent); text-decoration: none; }
a:hover { color: var(--accent-hi); }

/* ── Login ── */
.login-wrap {
  max-width: 380px;
  margin: 12vh auto 0;
  padding: 2.5rem;
  background: var(--surface);
  border: 1px solid var(--border);
  border-radius: 14px;
}
.login-logo { font-size: 1.5rem; font-weight: 800; margin-bottom: 0.375rem; }
.login-logo span, .brand span { color: var(--accent); }
.login-sub { color: var(--muted); font-size: 0.8125rem; margin-bottom: 2rem; }
.login-form { display: flex; flex-direction: column; }
.form-group { display: flex; flex-direction: column; gap: 0.375rem; margin-bottom: 1rem; }
label {
  font-size: 0.7rem;
  font-weight: 700;
  text-transform: uppercase;
  letter-spacing: 0.09em;
  color: var(--muted);
}
input, textarea {
  padding: 0.5rem 0.75rem;
  background: var(--surface-2);
  border: 1px solid var(--border);
  border-radius: 8px;
  font: inherit;
  color: var(--text);
  outline: none;
}
input:focus, textarea:focus { border-color: var(--accent); }
button {
  padding: 0.5rem 0.9rem;
  border: none;
  border-radius: 8px;
  font-weight: 700;
  cursor: pointer;
}
.login-form button, .btn-primary { background: var(--accent); color: var(--bg); }
.login-form button:hover, .btn-primary:hover { background: var(--accent-hi); }
.btn-secondary { background: var(--surface-2); color: var(--text); border: 1px solid var(--border); }
.btn-danger { background: transparent; color: var(--danger); border: 1px solid var(--danger); }

/* ── Flash ── */
.flashes { margin-bottom: 1rem; }
.flash {
  font-size: 0.875rem;
  padding: 0.5rem 0.75rem;
  border-radius: 6px;
  margin-bottom: 0.5rem;
  border: 1px solid;
}
.flash-success { color: var(--success); border-color: var(--success); }
.flash-info    { color: var(--info);    border-color: var(--info); }
.flash-warning { color: var(--accent);  border-color: var(--accent); }
.flash-danger  { color: var(--danger);  border-color: var(--danger); }

/* ── Dashboard ── */
.topbar {
  display: flex;
  gap: 1.5rem;
  align-items: center;
  padding: 0.9rem 1.5rem;
  background: var(--surface);
  border-bottom: 1px solid var(--border);
}
.topbar .brand { font-weight: 800; margin-right: auto; }
.dashboard { padding: 1.5rem; max-width: 1400px; margin: 0 auto; }
.dashboard section { margin-bottom: 2.5rem; }
.dashboard h2 { font-size: 1.1rem; margin-bottom: 0.75rem; }
.muted { color: var(--muted); font-size: 0.875rem; margin-bottom: 0.75rem; }
.grid-form {
  display: grid;
  grid-template-columns: repeat(auto-fill, minmax(220px, 1fr));
  gap: 0 1rem;
}
.form-actions { grid-column: 1 / -1; }
.table-wrap { overflow-x: auto; border: 1px solid var(--border); border-radius: 8px; }
table { border-collapse: collapse; width: 100%; font-size: 0.85rem; }
th, td { padding: 0.4rem 0.6rem; border-bottom: 1px solid var(--border); text-align: left; vertical-align: top; }
th { background: var(--surface); color: var(--muted); white-space: nowrap; }
.manage input[type=text] { min-width: 10rem; width: 100%; }
.row-no { color: var(--muted); }
.actions { display: flex; gap: 0.4rem; }
"#;
