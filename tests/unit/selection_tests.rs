use std::collections::BTreeSet;

use stacksnap::{
    selection::{SelectionStore, SyncChanges},
    units::{discover_units, representable_name, DEFAULT_MANIFESTS},
};
use tempfile::tempdir;

fn key_set(store: &SelectionStore) -> BTreeSet<String> {
    store.names().map(str::to_string).collect()
}

#[test]
fn missing_file_means_no_selection_yet() -> stacksnap::Result<()> {
    let dir = tempdir()?;
    assert!(SelectionStore::load(&dir.path().join("selection.conf"))?.is_none());
    Ok(())
}

#[test]
fn unreadable_file_is_a_configuration_error() {
    let dir = tempdir().unwrap();
    // A directory in place of the file cannot be read as text.
    let path = dir.path().join("selection.conf");
    std::fs::create_dir_all(&path).unwrap();

    let err = SelectionStore::load(&path).expect_err("directory must not load");
    let actual = err.downcast_ref::<stacksnap::Error>().unwrap();
    assert!(matches!(actual, stacksnap::Error::Config(_)));
    assert_eq!(stacksnap::EXIT_CONFIG, actual.exit_code());
}

#[test]
fn synchronize_adds_disabled_and_removes_vanished() -> stacksnap::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("selection.conf");
    std::fs::write(&path, "old=true\nkeep=true\n")?;

    let mut store = SelectionStore::load_or_empty(&path)?;
    let changes = store.synchronize(["keep", "new"]);

    assert_eq!(
        SyncChanges {
            added: vec!["new".into()],
            removed: vec!["old".into()],
        },
        changes
    );
    assert!(store.is_enabled("keep"));
    assert!(!store.is_enabled("new"));
    assert!(store.contains("new"));
    assert!(!store.contains("old"));
    Ok(())
}

#[test]
fn synchronize_then_save_then_load_matches_discovery() -> stacksnap::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("state/selection.conf");
    std::fs::create_dir_all(path.parent().unwrap())?;
    std::fs::write(&path, "# managed\ngone=true\nb=true\n/srv/shared=true\n")?;

    let discovered = ["a", "b", "c"];
    let mut store = SelectionStore::load_or_empty(&path)?;
    store.synchronize(discovered);
    store.save()?;

    let reloaded = SelectionStore::load(&path)?.expect("file written");
    let expected: BTreeSet<String> = discovered.iter().map(|s| s.to_string()).collect();
    assert_eq!(expected, key_set(&reloaded));
    assert!(reloaded.is_enabled("b"));
    Ok(())
}

#[test]
fn second_synchronize_is_a_no_op() -> stacksnap::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("selection.conf");
    let mut store = SelectionStore::load_or_empty(&path)?;

    let first = store.synchronize(["app1", "app2"]);
    assert_eq!(2, first.added.len());
    store.save()?;

    let mut store = SelectionStore::load_or_empty(&path)?;
    let second = store.synchronize(["app2", "app1"]);
    assert!(second.is_empty());
    Ok(())
}

#[test]
fn preserved_lines_are_written_back_verbatim_and_in_order() -> stacksnap::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("selection.conf");
    let original = "# stacks to back up\nzeta=true\n\n/mnt/nas/photos=false\n  # indented note\nalpha=maybe\nmid=false\n";
    std::fs::write(&path, original)?;

    let mut store = SelectionStore::load_or_empty(&path)?;
    assert_eq!(path.as_path(), store.path());
    assert_eq!(5, store.preserved_lines().len());
    store.synchronize(["mid", "zeta"]);
    store.save()?;

    let written = std::fs::read_to_string(&path)?;
    assert_eq!(
        "# stacks to back up\n\n/mnt/nas/photos=false\n  # indented note\nalpha=maybe\nmid=false\nzeta=true\n",
        written
    );
    Ok(())
}

#[test]
fn set_enabled_is_in_memory_until_saved() -> stacksnap::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("selection.conf");
    std::fs::write(&path, "app1=false\n")?;

    let mut store = SelectionStore::load_or_empty(&path)?;
    store.set_enabled("app1", true)?;
    assert_eq!(vec!["app1".to_string()], store.enabled_units());
    assert_eq!("app1=false\n", std::fs::read_to_string(&path)?);

    store.save()?;
    assert_eq!("app1=true\n", std::fs::read_to_string(&path)?);
    Ok(())
}

#[test]
fn set_enabled_rejects_unknown_units() {
    let mut store = SelectionStore::parse("selection.conf", "app1=false\n");
    let err = store.set_enabled("ghost", true).expect_err("unknown unit");
    assert!(matches!(
        err.downcast_ref::<stacksnap::Error>(),
        Some(stacksnap::Error::UnknownUnit(name)) if name == "ghost"
    ));
}

#[test]
fn save_leaves_no_temporary_files_behind() -> stacksnap::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("selection.conf");
    let mut store = SelectionStore::empty(&path);
    store.synchronize(["app1"]);
    store.save()?;

    let files: Vec<_> = std::fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(vec!["selection.conf".to_string()], files);
    Ok(())
}

#[test]
fn duplicate_entries_keep_the_last_value() {
    let store = SelectionStore::parse("selection.conf", "app=true\napp=false\n");
    assert!(!store.is_enabled("app"));
    assert_eq!("app=false\n", store.render());
}

#[test]
fn awkward_directory_names_never_break_the_round_trip() -> stacksnap::Result<()> {
    let root = tempdir()?;
    for name in ["#ops", "a=b", " pad", "pad ", "ok", "with space"] {
        let dir = root.path().join(name);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("compose.yaml"), "services: {}\n")?;
    }
    let manifests: Vec<String> = DEFAULT_MANIFESTS.iter().map(|m| m.to_string()).collect();
    let path = root.path().join(".stacksnap/selection.conf");

    let discovered: Vec<String> = discover_units(root.path(), &manifests)?
        .into_iter()
        .map(|u| u.name)
        .collect();
    assert_eq!(vec!["ok".to_string(), "with space".to_string()], discovered);

    let mut store = SelectionStore::load_or_empty(&path)?;
    store.synchronize(&discovered);
    store.save()?;
    let first = std::fs::read_to_string(&path)?;

    let mut reloaded = SelectionStore::load(&path)?.expect("file written");
    let expected: BTreeSet<String> = discovered.iter().cloned().collect();
    assert_eq!(expected, key_set(&reloaded));

    assert!(reloaded.synchronize(&discovered).is_empty());
    reloaded.save()?;
    assert_eq!(first, std::fs::read_to_string(&path)?);
    Ok(())
}

#[test]
fn representable_names() {
    for name in ["app1", "with space", "media.server", "x_y-z"] {
        assert!(representable_name(name), "{name:?}");
    }
    for name in ["", "#ops", "/abs", "a=b", " pad", "pad ", "line\nbreak"] {
        assert!(!representable_name(name), "{name:?}");
    }
}
