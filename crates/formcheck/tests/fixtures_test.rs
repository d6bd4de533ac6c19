use std::fs;

use formcheck::{from_str, ErrorKind};

#[test]
fn test_valid_fixtures() -> Result<(), Box<dyn std::error::Error>> {
    let valid_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/valid");
    for entry in fs::read_dir(valid_dir)? {
        let path = entry?.path();
        let content = fs::read_to_string(&path)?;
        if let Err(err) = from_str(&content) {
            return Err(std::io::Error::other(format!("Failed to parse valid file {path:?}: {err}")).into());
        }
    }
    Ok(())
}

#[test]
fn test_invalid_fixtures() -> Result<(), Box<dyn std::error::Error>> {
    let invalid_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/invalid");
    for entry in fs::read_dir(invalid_dir)? {
        let path = entry?.path();
        let content = fs::read_to_string(&path)?;
        if from_str(&content).is_ok() {
            return Err(std::io::Error::other(format!("Should fail to parse invalid file: {path:?}")).into());
        }
    }
    Ok(())
}

#[test]
fn test_invalid_fixture_kinds() -> Result<(), Box<dyn std::error::Error>> {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/invalid");
    let cases = [
        ("mismatched_tag.xml", "mismatched"),
        ("unknown_entity.xml", "entity"),
        ("root_not_form.xml", "root"),
        ("duplicate_attribute.xml", "duplicate"),
        ("unexpected_eof.xml", "eof"),
    ];
    for (file, expected) in cases {
        let content = fs::read_to_string(format!("{dir}/{file}"))?;
        let err = from_str(&content).err().ok_or("expected a parse error")?;
        let kind = match err.kind() {
            ErrorKind::MismatchedTag { .. } => "mismatched",
            ErrorKind::InvalidEntity { .. } => "entity",
            ErrorKind::RootNotForm { .. } => "root",
            ErrorKind::DuplicateAttribute { .. } => "duplicate",
            ErrorKind::UnexpectedEof => "eof",
            _ => "other",
        };
        assert_eq!(kind, expected, "{file}: {err}");
    }
    Ok(())
}

#[test]
fn test_error_excerpt_points_at_line() -> Result<(), Box<dyn std::error::Error>> {
    let source = "<form>\n  <p>\n  </div>\n</form>";
    let err = from_str(source).err().ok_or("expected a parse error")?;
    assert_eq!(err.span().start.line, 3);
    assert_eq!(err.excerpt(source), Some("  </div>"));
    Ok(())
}
