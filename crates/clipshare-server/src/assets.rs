//! Embedded static assets for the `GET /` UI and `GET /static/...` (spec
//! §4.4). Small and fixed at build time, so plain `include_str!` is enough —
//! no need for an asset-bundling crate.

pub const INDEX_HTML: &str = include_str!("../assets/index.html");
pub const LANDING_TEXT: &str = include_str!("../assets/landing.txt");

/// `(path suffix under /static/, content-type, bytes)`.
const STATIC_FILES: &[(&str, &str, &str)] = &[(
    "style.css",
    "text/css; charset=utf-8",
    include_str!("../assets/static/style.css"),
)];

/// Looks up `name` (the part of the path after `/static/`) among the
/// embedded assets.
pub fn lookup_static(name: &str) -> Option<(&'static str, &'static str)> {
    STATIC_FILES
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|(_, ct, body)| (*ct, *body))
}
