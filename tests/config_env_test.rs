//! Settings overrides through LABELTREE_* environment variables.
//!
//! Kept as a single test in its own binary: environment variables are process-wide.

use std::env;
use std::fs;

use tempfile::TempDir;

use labeltree::util::testing::init_test_setup;
use labeltree::{Settings, TreeError};

#[test]
fn given_env_vars_when_load_then_env_overrides_file() {
    init_test_setup();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("labeltree.toml");
    fs::write(&path, "path_separator = \".\"\ninitial_capacity = 4\n").unwrap();

    env::set_var("LABELTREE_PATH_SEPARATOR", "->");
    let settings = Settings::load(Some(&path)).expect("load settings");
    assert_eq!(settings.path_separator, "->");
    assert_eq!(settings.initial_capacity, 4);

    env::set_var("LABELTREE_INITIAL_CAPACITY", "32");
    let settings = Settings::load(Some(&path)).expect("load settings");
    assert_eq!(settings.initial_capacity, 32);

    env::set_var("LABELTREE_INITIAL_CAPACITY", "lots");
    let result = Settings::load(Some(&path));
    assert!(matches!(result, Err(TreeError::Config { .. })));

    env::remove_var("LABELTREE_PATH_SEPARATOR");
    env::remove_var("LABELTREE_INITIAL_CAPACITY");
    let settings = Settings::load(Some(&path)).expect("load settings");
    assert_eq!(settings.path_separator, ".");
}
