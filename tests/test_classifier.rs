mod common;

use common::*;
use std::path::Path;

#[test]
fn test_classifies_common_extensions() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let media = MediaTypes::builtin();

    let cases = [
        ("photo.png", Some(MediaKind::Image)),
        ("photo.jpg", Some(MediaKind::Image)),
        ("PHOTO.JPEG", Some(MediaKind::Image)),
        ("scan.bmp", Some(MediaKind::Image)),
        ("clip.mp4", Some(MediaKind::Video)),
        ("clip.avi", Some(MediaKind::Video)),
        ("notes.txt", None),
        ("README", None),
    ];

    for (name, expected) in cases {
        let path = write_bytes(dir.path(), name, b"not really media");
        assert_eq!(media.classify(&path)?, expected, "classifying {}", name);
    }

    Ok(())
}

#[test]
fn test_missing_file_is_not_found() {
    let media = MediaTypes::builtin();
    let result = media.classify(Path::new("/definitely/not/here.png"));
    assert!(matches!(result, Err(LabError::NotFound(_))));
}

#[test]
fn test_directory_is_not_found() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let result = MediaTypes::builtin().classify(dir.path());
    assert!(matches!(result, Err(LabError::NotFound(_))));
    Ok(())
}

#[test]
fn test_extra_tables_extend_builtin_types() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = write_bytes(dir.path(), "capture.zzv", b"");

    assert_eq!(MediaTypes::builtin().classify(&path)?, None);

    let table = "# custom types\nvideo/x-lab-capture\tzzv zzw\napplication/x-lab-notes lnote\n";
    let media = MediaTypes::from_tables(&[table]);
    assert_eq!(media.classify(&path)?, Some(MediaKind::Video));
    assert_eq!(
        media.guess_type(Path::new("x.ZZW")).as_deref(),
        Some("video/x-lab-capture")
    );

    let notes = write_bytes(dir.path(), "todo.lnote", b"");
    assert_eq!(media.classify(&notes)?, None);

    Ok(())
}

#[test]
fn test_builtin_database_wins_over_tables() {
    let media = MediaTypes::from_tables(&["text/plain png"]);
    let guess = media.guess_type(Path::new("photo.png"));
    assert_eq!(guess.as_deref(), Some("image/png"));
}

#[test]
fn test_first_table_wins_for_duplicate_extensions() {
    let media = MediaTypes::from_tables(&["video/x-first qqq", "image/x-second qqq"]);
    assert_eq!(
        media.guess_type(Path::new("a.qqq")).as_deref(),
        Some("video/x-first")
    );
}
