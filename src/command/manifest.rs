//! Manifest attributes for the fat artifact produced by the packaging step.

use std::fmt::Write as _;

use crate::config::LaunchConfig;

/// Attributes the fat jar's `META-INF/MANIFEST.MF` needs so `java -jar` starts the app.
///
/// `Main-Class` is the launcher; `Main-Verticle` is only present when a main module is set.
pub fn manifest_attributes(config: &LaunchConfig) -> Vec<(&'static str, String)> {
    let mut attrs = vec![(
        "Main-Class",
        config.launcher_class.class_name().to_string(),
    )];
    let main_module = config.main_module.trim();
    if !main_module.is_empty() {
        attrs.push(("Main-Verticle", main_module.to_string()));
    }
    attrs
}

/// Render attributes in manifest syntax (`Key: Value`, one per line).
pub fn render_manifest(attrs: &[(&'static str, String)]) -> String {
    let mut out = String::new();
    for (key, value) in attrs {
        let _ = writeln!(out, "{key}: {value}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_LAUNCHER, Launcher};

    #[test]
    fn default_launcher_with_verticle() {
        let cfg = LaunchConfig {
            main_module: "sample.App".into(),
            ..Default::default()
        };
        assert_eq!(
            render_manifest(&manifest_attributes(&cfg)),
            format!("Main-Class: {DEFAULT_LAUNCHER}\nMain-Verticle: sample.App\n")
        );
    }

    #[test]
    fn custom_launcher_without_verticle() {
        let cfg = LaunchConfig {
            launcher_class: Launcher::from("sample.AppLauncher"),
            ..Default::default()
        };
        assert_eq!(
            manifest_attributes(&cfg),
            vec![("Main-Class", "sample.AppLauncher".to_string())]
        );
    }
}
