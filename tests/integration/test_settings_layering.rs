//! Defaults, settings file, and environment layering.

use ragrepo::Settings;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_environment_overrides_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
    fs::write(
        &path,
        "content_root = \"docs\"\n\n[search]\ntop_k = 3\n\n[server]\nbind = \"0.0.0.0:9000\"\n",
    )
    .unwrap();

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.search.top_k, 3);
    assert_eq!(settings.content_root.to_str(), Some("docs"));
    assert_eq!(settings.server.bind, "0.0.0.0:9000");
    // Untouched sections keep their defaults
    assert_eq!(settings.indexing.extensions, vec!["md".to_string()]);

    // SAFETY: this is the only test in the binary touching this variable
    unsafe {
        std::env::set_var("RAGREPO_SEARCH__MAX_QUERY_CHARS", "64");
    }
    let settings = Settings::load_from(&path).unwrap();
    unsafe {
        std::env::remove_var("RAGREPO_SEARCH__MAX_QUERY_CHARS");
    }

    assert_eq!(settings.search.max_query_chars, 64);
    assert_eq!(settings.search.top_k, 3);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    Settings::init_config_file(temp_dir.path(), false).unwrap();

    assert!(Settings::init_config_file(temp_dir.path(), false).is_err());
    assert!(Settings::init_config_file(temp_dir.path(), true).is_ok());
}
