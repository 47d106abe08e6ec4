use rust_embed::RustEmbed;

/// Embedded static web assets (CSS, JS)
#[derive(RustEmbed)]
#[folder = "static/"]
#[prefix = "static/"]
pub struct StaticAssets;

/// Embedded database migrations
#[derive(RustEmbed)]
#[folder = "src/database/migrations/"]
#[prefix = "migrations/"]
pub struct MigrationAssets;

impl StaticAssets {
    pub fn get_asset(path: &str) -> Option<rust_embed::EmbeddedFile> {
        Self::get(path)
    }

    /// Content type for a file name, by extension
    pub fn get_content_type(path: &str) -> &'static str {
        match path.rsplit('.').next() {
            Some("html") => "text/html; charset=utf-8",
            Some("css") => "text/css; charset=utf-8",
            Some("js") => "application/javascript; charset=utf-8",
            Some("json") => "application/json; charset=utf-8",
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            Some("svg") => "image/svg+xml; charset=utf-8",
            Some("ico") => "image/x-icon",
            _ => "application/octet-stream",
        }
    }
}

impl MigrationAssets {
    /// All migration files as `(file name, sql)`, ordered by file name
    pub fn get_migrations() -> Vec<(String, String)> {
        let mut migrations: Vec<(String, String)> = Self::iter()
            .filter_map(|file_path| {
                let file = Self::get(&file_path)?;
                let content = String::from_utf8_lossy(&file.data).to_string();
                let name = file_path
                    .strip_prefix("migrations/")
                    .unwrap_or(&file_path)
                    .to_string();
                Some((name, content))
            })
            .collect();

        migrations.sort_by(|a, b| a.0.cmp(&b.0));
        migrations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(StaticAssets::get_content_type("static/app.css"), "text/css; charset=utf-8");
        assert_eq!(StaticAssets::get_content_type("channel_3.webp"), "image/webp");
        assert_eq!(
            StaticAssets::get_content_type("noextension"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_migrations_are_embedded_in_order() {
        let migrations = MigrationAssets::get_migrations();
        assert!(!migrations.is_empty());
        assert!(migrations[0].0.starts_with("001_"));
        assert!(migrations.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_static_assets_present() {
        assert!(StaticAssets::get_asset("static/app.css").is_some());
        assert!(StaticAssets::get_asset("static/refresh.js").is_some());
    }
}
